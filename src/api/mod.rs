use axum::Router;
use extract::Json;
use serde::Serialize;
use std::borrow::Cow;

pub mod admin;
pub mod content;
pub mod events;
pub mod extract;
pub mod membership;
pub mod roll_no;

/// Body of every successful call.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T>(message: impl Into<Cow<'static, str>>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data: Some(data),
    })
}

pub fn done(message: impl Into<Cow<'static, str>>) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data: None,
    })
}

pub fn app() -> Router {
    Router::new()
        .nest("/events", events::app())
        .nest("/membership", membership::app())
        .nest("/roll-no", roll_no::app())
        .nest("/content", content::app())
        .nest("/admin", admin::app())
}
