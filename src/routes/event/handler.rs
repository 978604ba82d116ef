use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use validator::Validate;

use crate::{
    AppState,
    error::{ApiResult, AppError, CreatedResult},
    extract::{Json, Path, Query},
    routes::{admin::model::DeletedResponse, can_view_private, ensure_admin},
    utils::{Claims, success_to_api_response},
};

use super::model::{Event, EventFilter, EventRequest};

fn event_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Evento {} no encontrado", id))
}

#[axum::debug_handler]
pub async fn list_events(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Query(filter): Query<EventFilter>,
) -> ApiResult<Vec<Event>> {
    let include_private = can_view_private(&state.pool, claims.as_deref()).await?;
    Ok(success_to_api_response(
        Event::list(&state.pool, include_private, &filter).await?,
    ))
}

#[axum::debug_handler]
pub async fn get_event(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i32>,
) -> ApiResult<Event> {
    let include_private = can_view_private(&state.pool, claims.as_deref()).await?;
    let event = Event::find_by_id(&state.pool, id, include_private)
        .await?
        .ok_or_else(|| event_not_found(id))?;
    Ok(success_to_api_response(event))
}

#[axum::debug_handler]
pub async fn create_event(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Json(req): Json<EventRequest>,
) -> CreatedResult<Event> {
    ensure_admin(claims.as_deref())?;
    req.validate()?;

    let event = Event::create(&state.pool, &req).await?;
    tracing::info!("Event {} created", event.id);
    Ok((StatusCode::CREATED, success_to_api_response(event)))
}

#[axum::debug_handler]
pub async fn update_event(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i32>,
    Json(req): Json<EventRequest>,
) -> ApiResult<Event> {
    ensure_admin(claims.as_deref())?;
    req.validate()?;

    let event = Event::update(&state.pool, id, &req)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => event_not_found(id),
            other => other,
        })?;
    Ok(success_to_api_response(event))
}

#[axum::debug_handler]
pub async fn delete_event(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i32>,
) -> ApiResult<DeletedResponse> {
    ensure_admin(claims.as_deref())?;

    if !Event::delete(&state.pool, id).await? {
        return Err(event_not_found(id));
    }
    tracing::info!("Event {} deleted", id);
    Ok(success_to_api_response(DeletedResponse { id }))
}
