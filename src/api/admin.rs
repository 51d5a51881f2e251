use super::{
    done,
    extract::{Json, Path, Query},
    ok, ApiResponse,
};
use crate::{
    auth::AdminOnly,
    email::DispatchReport,
    error::{AppError, AppResult, ErrorKind},
    events,
    models::{Event, EventInput, Popup, Registration, RegistrationFilter, RegistrationStatus, Stats},
    AppState,
};
use axum::{
    http::header::SET_COOKIE,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Extension, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct SessionResponse {
    username: String,
}

async fn login(
    Extension(state): Extension<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    if !state.admin.verify(req.username.trim(), &req.password)? {
        tracing::warn!(username = %req.username, "failed admin login");
        return Err(AppError::new(
            ErrorKind::Unauthorized,
            "invalid username or password",
        ));
    }

    let username = req.username.trim().to_string();
    let token = state.sessions.issue(&username)?;
    tracing::info!(username = %username, "admin logged in");

    Ok((
        [(SET_COOKIE, state.sessions.cookie(&token))],
        ok("logged in", SessionResponse { username }),
    ))
}

async fn logout(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        [(SET_COOKIE, state.sessions.expired_cookie())],
        done("logged out"),
    )
}

async fn session(AdminOnly(claims): AdminOnly) -> Json<ApiResponse<SessionResponse>> {
    ok("session is active", SessionResponse { username: claims.sub })
}

async fn stats(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
) -> AppResult<Json<ApiResponse<Stats>>> {
    let stats = state.store().stats().await.map_err(AppError::domain)?;
    Ok(ok("stats loaded", stats))
}

fn event_not_found() -> AppError {
    AppError::new(ErrorKind::NotFound, "event not found")
}

async fn list_events(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
) -> AppResult<Json<ApiResponse<Vec<Event>>>> {
    let events = state
        .store()
        .list_events(true)
        .await
        .map_err(AppError::domain)?;
    Ok(ok("events loaded", events))
}

async fn create_event(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
    Json(input): Json<EventInput>,
) -> AppResult<Json<ApiResponse<Event>>> {
    let input = events::validate(input).map_err(AppError::domain)?;
    let event = state
        .store()
        .create_event(input)
        .await
        .map_err(AppError::domain)?;
    tracing::info!(event_id = event.id, title = %event.title, "event created");
    Ok(ok("event created", event))
}

async fn update_event(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
    Path(event_id): Path<i32>,
    Json(input): Json<EventInput>,
) -> AppResult<Json<ApiResponse<Event>>> {
    let input = events::validate(input).map_err(AppError::domain)?;
    let event = state
        .store()
        .update_event(event_id, input)
        .await
        .map_err(AppError::domain)?
        .ok_or_else(event_not_found)?;
    Ok(ok("event updated", event))
}

async fn delete_event(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
    Path(event_id): Path<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !state
        .store()
        .delete_event(event_id)
        .await
        .map_err(AppError::domain)?
    {
        return Err(event_not_found());
    }
    tracing::info!(event_id, "event deleted");
    Ok(done("event and its registrations deleted"))
}

#[derive(Deserialize)]
struct ToggleRequest {
    open: bool,
}

async fn set_registration_open(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
    Path(event_id): Path<i32>,
    Json(req): Json<ToggleRequest>,
) -> AppResult<Json<ApiResponse<Event>>> {
    let event = state
        .store()
        .set_registration_open(event_id, req.open)
        .await
        .map_err(AppError::domain)?
        .ok_or_else(event_not_found)?;
    let message = if event.registration_open {
        "registration opened"
    } else {
        "registration closed"
    };
    Ok(ok(message, event))
}

#[derive(Deserialize)]
struct AnnouncementRequest {
    subject: String,
    message: String,
}

async fn notify(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
    Path(event_id): Path<i32>,
    Json(req): Json<AnnouncementRequest>,
) -> AppResult<Json<ApiResponse<DispatchReport>>> {
    let report = state
        .registrar
        .announce(event_id, &req.subject, &req.message)
        .await
        .map_err(AppError::domain)?;
    Ok(ok(
        format!("sent to {} registrants, {} failed", report.sent, report.failed),
        report,
    ))
}

async fn list_registrations(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
    Query(filter): Query<RegistrationFilter>,
) -> AppResult<Json<ApiResponse<Vec<Registration>>>> {
    let registrations = state
        .store()
        .list_registrations(&filter)
        .await
        .map_err(AppError::domain)?;
    Ok(ok("registrations loaded", registrations))
}

async fn decide(
    state: AppState,
    id: i32,
    to: RegistrationStatus,
) -> AppResult<Json<ApiResponse<Registration>>> {
    let decision = state
        .registrar
        .decide(id, to)
        .await
        .map_err(AppError::domain)?;
    drop(decision.email);

    let message = if decision.changed {
        format!("registration {to}")
    } else {
        format!("registration was already {to}")
    };
    Ok(ok(message, decision.registration))
}

async fn approve(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<Registration>>> {
    decide(state, id, RegistrationStatus::Approved).await
}

async fn reject(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<Registration>>> {
    decide(state, id, RegistrationStatus::Rejected).await
}

async fn delete_registration(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<Registration>>> {
    let registration = state
        .store()
        .delete_registration(id)
        .await
        .map_err(AppError::domain)?
        .ok_or_else(|| AppError::new(ErrorKind::NotFound, "registration not found"))?;
    tracing::info!(
        registration_id = id,
        seats = registration.seats(),
        "registration deleted"
    );
    Ok(ok("registration deleted", registration))
}

async fn list_popups(
    Extension(state): Extension<AppState>,
    _: AdminOnly,
) -> AppResult<Json<ApiResponse<Vec<Popup>>>> {
    let popups = state
        .store()
        .list_popups(false)
        .await
        .map_err(AppError::domain)?;
    Ok(ok("popups loaded", popups))
}

pub fn app() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
        .route("/stats", get(stats))
        .route("/events", get(list_events).post(create_event))
        .route("/events/:event_id", put(update_event).delete(delete_event))
        .route("/events/:event_id/registration", patch(set_registration_open))
        .route("/events/:event_id/notify", post(notify))
        .route("/registrations", get(list_registrations))
        .route("/registrations/:id", delete(delete_registration))
        .route("/registrations/:id/approve", post(approve))
        .route("/registrations/:id/reject", post(reject))
        .route("/popups", get(list_popups))
}
