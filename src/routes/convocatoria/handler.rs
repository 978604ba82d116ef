use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use validator::Validate;

use crate::{
    AppState,
    error::{ApiResult, AppError, CreatedResult},
    extract::{Json, Path},
    routes::{admin::model::DeletedResponse, can_view_private, ensure_admin},
    utils::{Claims, success_to_api_response},
};

use super::model::{Convocatoria, ConvocatoriaRequest};

fn convocatoria_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Convocatoria {} no encontrada", id))
}

#[axum::debug_handler]
pub async fn list_convocatorias(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
) -> ApiResult<Vec<Convocatoria>> {
    let include_private = can_view_private(&state.pool, claims.as_deref()).await?;
    Ok(success_to_api_response(
        Convocatoria::list(&state.pool, include_private).await?,
    ))
}

#[axum::debug_handler]
pub async fn get_convocatoria(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i32>,
) -> ApiResult<Convocatoria> {
    let include_private = can_view_private(&state.pool, claims.as_deref()).await?;
    let convocatoria = Convocatoria::find_by_id(&state.pool, id, include_private)
        .await?
        .ok_or_else(|| convocatoria_not_found(id))?;
    Ok(success_to_api_response(convocatoria))
}

#[axum::debug_handler]
pub async fn create_convocatoria(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Json(req): Json<ConvocatoriaRequest>,
) -> CreatedResult<Convocatoria> {
    ensure_admin(claims.as_deref())?;
    req.validate()?;

    let convocatoria = Convocatoria::create(&state.pool, &req).await?;
    tracing::info!("Convocatoria {} created", convocatoria.id);
    Ok((StatusCode::CREATED, success_to_api_response(convocatoria)))
}

#[axum::debug_handler]
pub async fn update_convocatoria(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i32>,
    Json(req): Json<ConvocatoriaRequest>,
) -> ApiResult<Convocatoria> {
    ensure_admin(claims.as_deref())?;
    req.validate()?;

    let convocatoria = Convocatoria::update(&state.pool, id, &req)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => convocatoria_not_found(id),
            other => other,
        })?;
    Ok(success_to_api_response(convocatoria))
}

#[axum::debug_handler]
pub async fn delete_convocatoria(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i32>,
) -> ApiResult<DeletedResponse> {
    ensure_admin(claims.as_deref())?;

    if !Convocatoria::delete(&state.pool, id).await? {
        return Err(convocatoria_not_found(id));
    }
    tracing::info!("Convocatoria {} deleted", id);
    Ok(success_to_api_response(DeletedResponse { id }))
}
