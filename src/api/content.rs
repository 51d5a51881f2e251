use super::{
    done,
    extract::{Json, Path, Query},
    ok, ApiResponse,
};
use crate::{
    auth::AdminOnly,
    content,
    error::{AppError, AppResult, ErrorKind},
    models::{GalleryInput, GalleryItem, Popup, PopupInput, RosterEntry, RosterInput},
    AppState,
};
use axum::{
    routing::{delete, get, put},
    Extension, Router,
};
use serde::Deserialize;

fn not_found(what: &'static str) -> AppError {
    AppError::new(ErrorKind::NotFound, format!("{what} not found"))
}

async fn list_roster(
    Extension(state): Extension<AppState>,
) -> AppResult<Json<ApiResponse<Vec<RosterEntry>>>> {
    let roster = state.store().list_roster().await.map_err(AppError::domain)?;
    Ok(ok("roster loaded", roster))
}

async fn create_roster_entry(
    Extension(state): Extension<AppState>,
    AdminOnly(_): AdminOnly,
    Json(input): Json<RosterInput>,
) -> AppResult<Json<ApiResponse<RosterEntry>>> {
    let input = content::roster(input).map_err(AppError::domain)?;
    let entry = state
        .store()
        .create_roster_entry(input)
        .await
        .map_err(AppError::domain)?;
    Ok(ok("roster entry added", entry))
}

async fn update_roster_entry(
    Extension(state): Extension<AppState>,
    AdminOnly(_): AdminOnly,
    Path(id): Path<i32>,
    Json(input): Json<RosterInput>,
) -> AppResult<Json<ApiResponse<RosterEntry>>> {
    let input = content::roster(input).map_err(AppError::domain)?;
    let entry = state
        .store()
        .update_roster_entry(id, input)
        .await
        .map_err(AppError::domain)?
        .ok_or_else(|| not_found("roster entry"))?;
    Ok(ok("roster entry updated", entry))
}

async fn delete_roster_entry(
    Extension(state): Extension<AppState>,
    AdminOnly(_): AdminOnly,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !state
        .store()
        .delete_roster_entry(id)
        .await
        .map_err(AppError::domain)?
    {
        return Err(not_found("roster entry"));
    }
    Ok(done("roster entry deleted"))
}

async fn active_popups(
    Extension(state): Extension<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Popup>>>> {
    let popups = state.store().list_popups(true).await.map_err(AppError::domain)?;
    Ok(ok("popups loaded", popups))
}

async fn create_popup(
    Extension(state): Extension<AppState>,
    AdminOnly(_): AdminOnly,
    Json(input): Json<PopupInput>,
) -> AppResult<Json<ApiResponse<Popup>>> {
    let input = content::popup(input).map_err(AppError::domain)?;
    let popup = state
        .store()
        .create_popup(input)
        .await
        .map_err(AppError::domain)?;
    Ok(ok("popup created", popup))
}

async fn update_popup(
    Extension(state): Extension<AppState>,
    AdminOnly(_): AdminOnly,
    Path(id): Path<i32>,
    Json(input): Json<PopupInput>,
) -> AppResult<Json<ApiResponse<Popup>>> {
    let input = content::popup(input).map_err(AppError::domain)?;
    let popup = state
        .store()
        .update_popup(id, input)
        .await
        .map_err(AppError::domain)?
        .ok_or_else(|| not_found("popup"))?;
    Ok(ok("popup updated", popup))
}

async fn delete_popup(
    Extension(state): Extension<AppState>,
    AdminOnly(_): AdminOnly,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !state.store().delete_popup(id).await.map_err(AppError::domain)? {
        return Err(not_found("popup"));
    }
    Ok(done("popup deleted"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GalleryQuery {
    event_id: Option<i32>,
}

async fn list_gallery(
    Extension(state): Extension<AppState>,
    Query(query): Query<GalleryQuery>,
) -> AppResult<Json<ApiResponse<Vec<GalleryItem>>>> {
    let items = state
        .store()
        .list_gallery(query.event_id)
        .await
        .map_err(AppError::domain)?;
    Ok(ok("gallery loaded", items))
}

async fn create_gallery_item(
    Extension(state): Extension<AppState>,
    AdminOnly(_): AdminOnly,
    Json(input): Json<GalleryInput>,
) -> AppResult<Json<ApiResponse<GalleryItem>>> {
    let input = content::gallery(input).map_err(AppError::domain)?;
    if let Some(event_id) = input.event_id {
        state
            .store()
            .get_event(event_id)
            .await
            .map_err(AppError::domain)?
            .ok_or_else(|| not_found("event"))?;
    }

    let item = state
        .store()
        .create_gallery_item(input)
        .await
        .map_err(AppError::domain)?;
    Ok(ok("gallery item added", item))
}

async fn delete_gallery_item(
    Extension(state): Extension<AppState>,
    AdminOnly(_): AdminOnly,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !state
        .store()
        .delete_gallery_item(id)
        .await
        .map_err(AppError::domain)?
    {
        return Err(not_found("gallery item"));
    }
    Ok(done("gallery item deleted"))
}

pub fn app() -> Router {
    Router::new()
        .route("/roster", get(list_roster).post(create_roster_entry))
        .route(
            "/roster/:id",
            put(update_roster_entry).delete(delete_roster_entry),
        )
        .route("/popups", get(active_popups).post(create_popup))
        .route("/popups/:id", put(update_popup).delete(delete_popup))
        .route("/gallery", get(list_gallery).post(create_gallery_item))
        .route("/gallery/:id", delete(delete_gallery_item))
}
