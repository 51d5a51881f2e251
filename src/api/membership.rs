use super::{
    extract::{Json, Path},
    ok, ApiResponse,
};
use crate::{
    error::{AppError, AppResult},
    models::{Member, Registration, RegistrationStatus},
    AppState,
};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use serde::Serialize;

async fn apply(
    Extension(state): Extension<AppState>,
    Json(member): Json<Member>,
) -> AppResult<Json<ApiResponse<Registration>>> {
    let applied = state
        .registrar
        .apply_membership(member)
        .await
        .map_err(AppError::domain)?;
    drop(applied.emails);

    Ok(ok(
        "Application received, you will hear from us by email",
        applied.registration,
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    roll_no: String,
    status: RegistrationStatus,
}

async fn status(
    Extension(state): Extension<AppState>,
    Path(roll_no): Path<String>,
) -> AppResult<Json<ApiResponse<StatusResponse>>> {
    let status = state
        .registrar
        .membership_status(&roll_no)
        .await
        .map_err(AppError::domain)?;

    Ok(ok(
        format!("application is {status}"),
        StatusResponse {
            roll_no: roll_no.trim().to_ascii_uppercase(),
            status,
        },
    ))
}

pub fn app() -> Router {
    Router::new()
        .route("/apply", post(apply))
        .route("/status/:roll_no", get(status))
}
