use super::{
    extract::{Json, Path, Query},
    ok, ApiResponse,
};
use crate::{
    error::{AppError, AppResult, ErrorKind},
    roll_no::{validate_roll_no, Entry},
};
use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct CheckQuery {
    branch: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckResponse {
    roll_no: String,
    branch_code: String,
    admission_year: u8,
    entry: Entry,
}

async fn check(
    Path(roll_no): Path<String>,
    Query(query): Query<CheckQuery>,
) -> AppResult<Json<ApiResponse<CheckResponse>>> {
    let branch = query.branch.as_deref().filter(|b| !b.trim().is_empty());
    let roll = validate_roll_no(&roll_no, branch)
        .map_err(|e| AppError::new(ErrorKind::Validation, e.to_string()))?;

    Ok(ok(
        "roll number is valid",
        CheckResponse {
            branch_code: roll.branch_code().to_string(),
            admission_year: roll.admission_year(),
            entry: roll.entry(),
            roll_no: roll.into_string(),
        },
    ))
}

pub fn app() -> Router {
    Router::new().route("/:roll_no", get(check))
}
