use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    AppState,
    cache::TokenCacheOperations,
    config::Config,
    error::{ApiResult, AppError, CreatedResult},
    extract::Json,
    middleware::BearerToken,
    utils::{Claims, generate_token, hash_password, success_to_api_response, valid_password},
};

use super::model::{
    Categoria, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, User,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> CreatedResult<User> {
    req.validate()?;
    let password_hash = hash_password(&req.password)?;

    let user = User::create(&state.pool, &req, &password_hash)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict("El nombre de usuario o el email ya están registrados".into())
            }
            other => other,
        })?;

    Ok((StatusCode::CREATED, success_to_api_response(user)))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let invalid = || AppError::AuthFailed("Usuario o contraseña incorrectos".into());

    let user = User::find_by_login(&state.pool, &req.nombre_usuario)
        .await?
        .ok_or_else(invalid)?;

    if !user.verify_login(&req.password)? {
        tracing::info!("Failed login for user {}", user.id);
        return Err(invalid());
    }

    // 未审核账号不能登录
    if !user.aprobado {
        return Err(AppError::Forbidden(
            "La cuenta está pendiente de aprobación".into(),
        ));
    }

    let (token, expires_at) = generate_token(user.id, &user.rol.nombre, &state.config)?;
    tracing::info!("User {} logged in", user.id);

    Ok(success_to_api_response(LoginResponse {
        token,
        expires_at,
        user,
    }))
}

/// 启动时校验令牌并返回当前用户
#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<User> {
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;
    let user = User::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !user.aprobado {
        return Err(AppError::Forbidden(
            "La cuenta está pendiente de aprobación".into(),
        ));
    }

    Ok(success_to_api_response(user))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> ApiResult<LogoutResponse> {
    TokenCacheOperations::revoke_token(&state.redis, &token, claims.exp).await?;
    tracing::info!("User {} logged out", claims.sub);
    Ok(success_to_api_response(LogoutResponse {}))
}

/// 注册表单使用，无需登录
#[axum::debug_handler]
pub async fn list_categorias(State(state): State<AppState>) -> ApiResult<Vec<Categoria>> {
    Ok(success_to_api_response(Categoria::list(&state.pool).await?))
}

/// 启动时按配置确保管理员账号存在，未配置则跳过
pub async fn bootstrap_admin(pool: &PgPool, config: &Config) -> Result<Option<i32>, AppError> {
    let Some(seed) = config.admin_seed() else {
        tracing::info!("ADMIN_USERNAME/ADMIN_PASSWORD not set, skipping admin bootstrap");
        return Ok(None);
    };

    valid_password(&seed.password)
        .map_err(|_| AppError::Validation("ADMIN_PASSWORD debe tener entre 6 y 72 bytes".into()))?;
    let password_hash = hash_password(&seed.password)?;

    let id = User::upsert_admin(pool, &seed.username, &seed.email, &password_hash).await?;
    tracing::info!("Admin account {} ({}) ready", seed.username, id);
    Ok(Some(id))
}
