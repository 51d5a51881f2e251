use super::{
    extract::{Json, Path},
    ok, ApiResponse,
};
use crate::{
    error::{AppError, AppResult, ErrorKind},
    models::{Event, Registration},
    registration::{RegistrationForm, Registered},
    AppState,
};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use chrono::Utc;

async fn list(Extension(state): Extension<AppState>) -> AppResult<Json<ApiResponse<Vec<Event>>>> {
    let events = state
        .store()
        .list_events(false)
        .await
        .map_err(AppError::domain)?;
    Ok(ok("events loaded", events))
}

async fn info(
    Extension(state): Extension<AppState>,
    Path(event_id): Path<i32>,
) -> AppResult<Json<ApiResponse<Event>>> {
    let event = state
        .store()
        .get_event(event_id)
        .await
        .map_err(AppError::domain)?
        .filter(|event| event.visible)
        .ok_or_else(|| AppError::new(ErrorKind::NotFound, "event not found"))?;
    Ok(ok("event loaded", event))
}

async fn register(
    Extension(state): Extension<AppState>,
    Path(event_id): Path<i32>,
    Json(form): Json<RegistrationForm>,
) -> AppResult<Json<ApiResponse<Registration>>> {
    let Registered {
        registration,
        emails,
    } = state
        .registrar
        .register(event_id, form, Utc::now())
        .await
        .map_err(AppError::domain)?;
    // confirmations go out in the background
    drop(emails);

    let message = match &registration.team_name {
        Some(team) => format!("Team {team} registered successfully"),
        None => "Registered successfully".to_string(),
    };
    Ok(ok(message, registration))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/:event_id", get(info))
        .route("/:event_id/register", post(register))
}
