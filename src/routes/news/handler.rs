use axum::{
    extract::{Extension, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::{ApiResult, AppError, CreatedResult},
    extract::{Json, Path},
    routes::{admin::model::DeletedResponse, can_view_private, ensure_admin},
    utils::{Claims, success_to_api_response},
};

use super::model::{News, NewsRequest};

fn news_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Noticia {} no encontrada", id))
}

#[axum::debug_handler]
pub async fn list_news(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
) -> ApiResult<Vec<News>> {
    let include_private = can_view_private(&state.pool, claims.as_deref()).await?;
    Ok(success_to_api_response(
        News::list(&state.pool, include_private).await?,
    ))
}

#[axum::debug_handler]
pub async fn get_news(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i32>,
) -> ApiResult<News> {
    let include_private = can_view_private(&state.pool, claims.as_deref()).await?;
    let news = News::find_by_id(&state.pool, id, include_private)
        .await?
        .ok_or_else(|| news_not_found(id))?;
    Ok(success_to_api_response(news))
}

#[axum::debug_handler]
pub async fn create_news(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Json(req): Json<NewsRequest>,
) -> CreatedResult<News> {
    ensure_admin(claims.as_deref())?;
    req.check(state.config.max_image_bytes)?;

    let news = News::create(&state.pool, &req).await?;
    tracing::info!("News {} created", news.id);
    Ok((StatusCode::CREATED, success_to_api_response(news)))
}

#[axum::debug_handler]
pub async fn update_news(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i32>,
    Json(req): Json<NewsRequest>,
) -> ApiResult<News> {
    ensure_admin(claims.as_deref())?;
    req.check(state.config.max_image_bytes)?;

    let news = News::update(&state.pool, id, &req)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => news_not_found(id),
            other => other,
        })?;
    Ok(success_to_api_response(news))
}

#[axum::debug_handler]
pub async fn delete_news(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i32>,
) -> ApiResult<DeletedResponse> {
    ensure_admin(claims.as_deref())?;

    if !News::delete(&state.pool, id).await? {
        return Err(news_not_found(id));
    }
    tracing::info!("News {} deleted", id);
    Ok(success_to_api_response(DeletedResponse { id }))
}
