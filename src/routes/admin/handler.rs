use axum::extract::{Extension, State};
use validator::Validate;

use crate::{
    AppState,
    error::{ApiResult, AppError},
    extract::{Json, Path, Query},
    routes::user::model::{Role, UpdateUserRequest, User, UserFilter, UserFlag},
    utils::{Claims, hash_password, success_to_api_response},
};

use super::model::DeletedResponse;

fn user_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Usuario {} no encontrado", id))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Vec<User>> {
    Ok(success_to_api_response(User::list(&state.pool, &filter).await?))
}

#[axum::debug_handler]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<User> {
    let user = User::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    Ok(success_to_api_response(user))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<User> {
    req.validate()?;
    let password_hash = req.password.as_deref().map(hash_password).transpose()?;

    let user = User::update(&state.pool, id, &req, password_hash)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => user_not_found(id),
            AppError::Conflict(_) => {
                AppError::Conflict("El nombre de usuario o el email ya están en uso".into())
            }
            other => other,
        })?;

    tracing::info!("User {} updated", id);
    Ok(success_to_api_response(user))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<DeletedResponse> {
    if claims.user_id() == Some(id) {
        return Err(AppError::Validation(
            "Un administrador no puede eliminar su propia cuenta".into(),
        ));
    }

    if !User::delete(&state.pool, id).await? {
        return Err(user_not_found(id));
    }

    tracing::info!("User {} deleted by {}", id, claims.sub);
    Ok(success_to_api_response(DeletedResponse { id }))
}

#[axum::debug_handler]
pub async fn approve_user(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<User> {
    let user = User::approve(&state.pool, id)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => user_not_found(id),
            other => other,
        })?;
    Ok(success_to_api_response(user))
}

async fn toggle(state: &AppState, id: i32, flag: UserFlag) -> ApiResult<User> {
    let user = User::toggle_flag(&state.pool, id, flag)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => user_not_found(id),
            other => other,
        })?;
    tracing::info!("User {} flag {:?} toggled", id, flag);
    Ok(success_to_api_response(user))
}

/// 切换会费状态
#[axum::debug_handler]
pub async fn toggle_cotizo(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<User> {
    toggle(&state, id, UserFlag::Cotizo).await
}

/// 切换学会会员状态
#[axum::debug_handler]
pub async fn toggle_miembro_sociedad(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<User> {
    toggle(&state, id, UserFlag::MiembroSociedad).await
}

#[axum::debug_handler]
pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Vec<Role>> {
    Ok(success_to_api_response(Role::list(&state.pool).await?))
}
