pub mod admin;
pub mod convocatoria;
pub mod event;
pub mod news;
pub mod planning;
pub mod report;
pub mod user;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    AppState,
    config::Config,
    error::AppError,
    middleware::{RateLimiter, auth_middleware, log_errors, optional_auth, rate_limit, require_admin},
    utils::{ApiResponse, Claims, success_to_api_response},
};

use self::user::model::User;

/// 是否可以查看非公开内容：管理员或已审核的学会会员
pub async fn can_view_private(pool: &PgPool, claims: Option<&Claims>) -> Result<bool, AppError> {
    let Some(claims) = claims else {
        return Ok(false);
    };
    if claims.is_admin() {
        return Ok(true);
    }
    let Some(user_id) = claims.user_id() else {
        return Ok(false);
    };

    Ok(User::find_by_id(pool, user_id)
        .await?
        .is_some_and(|u| u.aprobado && u.can_view_private()))
}

/// 内容写操作只允许管理员
pub fn ensure_admin(claims: Option<&Claims>) -> Result<(), AppError> {
    match claims {
        Some(c) if c.is_admin() => Ok(()),
        Some(_) => Err(AppError::Forbidden(
            "Se requieren permisos de administrador".into(),
        )),
        None => Err(AppError::Unauthorized),
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

async fn health_check() -> Json<ApiResponse<HealthResponse>> {
    success_to_api_response(HealthResponse { status: "ok" })
}

fn cors_layer(config: &Config) -> CorsLayer {
    #[cfg(debug_assertions)]
    {
        let _ = config;
        tracing::debug!("Adding permissive CORS layer for development mode");
        CorsLayer::permissive()
    }

    #[cfg(not(debug_assertions))]
    {
        use axum::http::{HeaderValue, Method, header};

        let mut cors = CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .expose_headers([header::CONTENT_DISPOSITION]);
        match config.frontend_url.parse::<HeaderValue>() {
            Ok(origin) => cors = cors.allow_origin(origin),
            Err(_) => tracing::warn!("Invalid FRONTEND_URL, CORS will reject all origins"),
        }
        cors
    }
}

fn public_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(user::login))
        .route("/auth/register", post(user::register))
        .route("/categorias", get(user::list_categorias))
        .route("/news", get(news::list_news).post(news::create_news))
        .route(
            "/news/{id}",
            get(news::get_news)
                .put(news::update_news)
                .delete(news::delete_news),
        )
        .route("/events", get(event::list_events).post(event::create_event))
        .route(
            "/events/{id}",
            get(event::get_event)
                .put(event::update_event)
                .delete(event::delete_event),
        )
        .route(
            "/convocatorias",
            get(convocatoria::list_convocatorias).post(convocatoria::create_convocatoria),
        )
        .route(
            "/convocatorias/{id}",
            get(convocatoria::get_convocatoria)
                .put(convocatoria::update_convocatoria)
                .delete(convocatoria::delete_convocatoria),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), optional_auth))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(user::me))
        .route("/auth/logout", post(user::logout))
        // 教学计划
        .route("/planning/activity-types", get(planning::list_activity_types))
        .route(
            "/planning/activities",
            get(planning::list_activities).post(planning::create_activity),
        )
        .route(
            "/planning/activities/{id}",
            put(planning::update_activity).delete(planning::delete_activity),
        )
        .route("/planning/summary", get(planning::get_summary))
        .route("/planning/overview", get(planning::get_overview))
        // 报表
        .route("/reports/filters", get(report::get_filters))
        .route("/reports/teaching-overload", get(report::teaching_overload))
        .route("/reports/overload-payment", get(report::overload_payment))
        .route("/reports/{kind}/{format}", get(report::download))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(admin::list_users))
        .route(
            "/admin/users/{id}",
            get(admin::get_user)
                .put(admin::update_user)
                .delete(admin::delete_user),
        )
        .route("/admin/users/{id}/aprobar", patch(admin::approve_user))
        .route("/admin/users/{id}/cotizar", patch(admin::toggle_cotizo))
        .route(
            "/admin/users/{id}/hacerMiembroSociedad",
            patch(admin::toggle_miembro_sociedad),
        )
        .route("/admin/roles", get(admin::list_roles))
        .route(
            "/admin/planning/users/{user_id}/activities",
            get(planning::admin_list_activities).post(planning::admin_create_activity),
        )
        .route(
            "/admin/planning/users/{user_id}/activities/{id}",
            put(planning::admin_update_activity).delete(planning::admin_delete_activity),
        )
        .route(
            "/admin/planning/users/{user_id}/summary",
            get(planning::admin_get_summary),
        )
        .route(
            "/admin/planning/users/{user_id}/overview",
            get(planning::admin_get_overview),
        )
        // 先鉴权再校验角色
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// 组装完整路由
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_routes(&state))
        .merge(protected_routes(&state))
        .merge(admin_routes(&state));

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(base, api)
    };

    let rate_limiter = Arc::new(RateLimiter::new(
        state.redis.clone(),
        state.config.clone(),
    ));

    router
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(state.config.body_limit()))
        .layer(middleware::from_fn(log_errors))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit))
        .layer(cors_layer(&state.config))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
