use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};

use crate::{
    AppState,
    cache::TokenCacheOperations,
    error::AppError,
    utils::{Claims, verify_token},
};

/// 当前请求携带的原始令牌，注销时使用
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

type BearerHeader = Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>;

/// 没有 Authorization 头时返回 None；格式不对视为未认证
fn bearer_token(header: BearerHeader) -> Result<Option<String>, AppError> {
    match header {
        Ok(TypedHeader(Authorization(bearer))) => Ok(Some(bearer.token().to_string())),
        Err(rejection) if rejection.is_missing() => Ok(None),
        Err(_) => Err(AppError::Unauthorized),
    }
}

async fn authenticate(state: &AppState, token: &str) -> Result<Claims, AppError> {
    let claims = verify_token(token, &state.config)?;

    // Redis 不可用时放行，仅记录警告
    match TokenCacheOperations::is_revoked(&state.redis, token).await {
        Ok(true) => return Err(AppError::Unauthorized),
        Ok(false) => {}
        Err(e) => tracing::warn!("Revocation check skipped: {}", e),
    }

    Ok(claims)
}

/// 必须携带有效令牌
pub async fn auth_middleware(
    State(state): State<AppState>,
    header: BearerHeader,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(header)?.ok_or(AppError::Unauthorized)?;

    let claims = authenticate(&state, &token).await?;
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(BearerToken(token));

    Ok(next.run(request).await)
}

/// 令牌可选；携带时必须有效
pub async fn optional_auth(
    State(state): State<AppState>,
    header: BearerHeader,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = bearer_token(header)? {
        let claims = authenticate(&state, &token).await?;
        request.extensions_mut().insert(claims);
    }

    Ok(next.run(request).await)
}

/// 管理员路由，需放在 auth_middleware 之内
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    match request.extensions().get::<Claims>() {
        Some(claims) if claims.is_admin() => Ok(next.run(request).await),
        Some(_) => Err(AppError::Forbidden(
            "Se requieren permisos de administrador".into(),
        )),
        None => Err(AppError::Unauthorized),
    }
}
