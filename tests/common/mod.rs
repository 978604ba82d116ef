use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use gestion_departamento::{
    AppState,
    config::Config,
    routes::{create_router, user::bootstrap_admin},
    utils::generate_token,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::OnceCell;
use tower::ServiceExt;

#[allow(dead_code)]
pub const LIVE_ADMIN_USERNAME: &str = "admin_pruebas";
#[allow(dead_code)]
pub const LIVE_ADMIN_PASSWORD: &str = "pruebas123";

/// 需要真实 Postgres 与 Redis 的测试通过环境变量开启
#[allow(dead_code)]
pub fn live_services_available() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok() && std::env::var("TEST_REDIS_URL").is_ok()
}

/// 未配置 TEST_DATABASE_URL / TEST_REDIS_URL 时跳过
#[macro_export]
macro_rules! require_live_services {
    () => {
        if !crate::common::live_services_available() {
            eprintln!("⚠️  Skipping: TEST_DATABASE_URL / TEST_REDIS_URL not set");
            return;
        }
    };
}

/// 离线测试应用：数据库与 Redis 都指向不可达端口，
/// 只覆盖在访问存储之前就会返回的路径
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Config) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (Router, Config) {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy(&config.database_url)
        .expect("Failed to build lazy pool");
    let redis = redis::Client::open(config.redis_url.clone()).expect("Invalid redis url");

    let state = AppState {
        pool,
        config: config.clone(),
        redis: Arc::new(redis),
    };

    (create_router(state), config)
}

#[allow(dead_code)]
pub fn live_config() -> Config {
    let mut config = Config::test_default();
    config.database_url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
    config.redis_url = std::env::var("TEST_REDIS_URL").expect("TEST_REDIS_URL not set");
    config.admin_username = Some(LIVE_ADMIN_USERNAME.into());
    config.admin_password = Some(LIVE_ADMIN_PASSWORD.into());
    config
}

static LIVE_SETUP: OnceCell<()> = OnceCell::const_new();

/// 连接真实服务的应用；迁移与管理员初始化只执行一次
#[allow(dead_code)]
pub async fn create_live_app() -> (Router, AppState) {
    let config = live_config();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to test database");

    LIVE_SETUP
        .get_or_init(|| async {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run migrations");
            bootstrap_admin(&pool, &config)
                .await
                .expect("Failed to bootstrap admin");
        })
        .await;

    let redis = redis::Client::open(config.redis_url.clone()).expect("Invalid redis url");
    let state = AppState {
        pool,
        config,
        redis: Arc::new(redis),
    };

    (create_router(state.clone()), state)
}

/// 每次运行都不同的后缀，避免唯一约束冲突
#[allow(dead_code)]
pub fn unique_suffix() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}", nanos)
}

#[allow(dead_code)]
pub fn create_test_jwt(user_id: i32, rol: &str, config: &Config) -> String {
    generate_token(user_id, rol, config)
        .expect("Failed to sign test token")
        .0
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// 发送一次请求并解析信封
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}
