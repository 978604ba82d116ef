//! 需要真实 Postgres 与 Redis 的端到端测试
//!
//! 运行方式：
//! TEST_DATABASE_URL=postgres://... TEST_REDIS_URL=redis://... cargo test --test live_api_tests

use axum::http::StatusCode;
use gestion_departamento::{cache::RateLimitCacheOperations, routes::user::bootstrap_admin};
use serde_json::{Value, json};

#[macro_use]
mod common;

use common::{LIVE_ADMIN_PASSWORD, LIVE_ADMIN_USERNAME, send};

async fn login(app: &axum::Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"nombre_usuario": username, "password": password})),
    )
    .await
}

async fn admin_token(app: &axum::Router) -> String {
    let (status, body) = login(app, LIVE_ADMIN_USERNAME, LIVE_ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK, "admin login failed: {}", body);
    body["resp_data"]["token"].as_str().unwrap().to_string()
}

fn ids(body: &Value) -> Vec<i64> {
    body["resp_data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["id"].as_i64())
        .collect()
}

#[tokio::test]
async fn bootstrapped_admin_can_log_in() {
    require_live_services!();
    let (app, state) = common::create_live_app().await;

    // 重复初始化返回同一账号
    let first = bootstrap_admin(&state.pool, &state.config).await.unwrap();
    let second = bootstrap_admin(&state.pool, &state.config).await.unwrap();
    assert!(first.is_some());
    assert_eq!(first, second);

    let (status, body) = login(&app, LIVE_ADMIN_USERNAME, LIVE_ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"]["user"]["rol"]["nombre"], "admin");
    assert_eq!(body["resp_data"]["user"]["aprobado"], true);
}

#[tokio::test]
async fn catalogs_are_seeded() {
    require_live_services!();
    let (app, _) = common::create_live_app().await;
    let token = admin_token(&app).await;

    let (status, body) = send(&app, "GET", "/api/planning/activity-types", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["resp_data"].as_array().unwrap().is_empty());

    let (status, body) = send(&app, "GET", "/api/categorias", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["resp_data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleted_news_disappears_from_list() {
    require_live_services!();
    let (app, _) = common::create_live_app().await;
    let token = admin_token(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/news",
        Some(&token),
        Some(json!({
            "titulo": format!("Jornada {}", common::unique_suffix()),
            "contenido": "Texto de la noticia",
            "ispublica": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["resp_data"]["id"].as_i64().unwrap();

    let (_, body) = send(&app, "GET", "/api/news", None, None).await;
    assert!(ids(&body).contains(&id));

    let (status, _) = send(&app, "DELETE", &format!("/api/news/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/news", None, None).await;
    assert!(!ids(&body).contains(&id));

    let (status, body) = send(&app, "GET", &format!("/api/news/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 1004);
}

#[tokio::test]
async fn approved_user_logout_revokes_token() {
    require_live_services!();
    let (app, _) = common::create_live_app().await;
    let admin = admin_token(&app).await;

    let username = format!("u{}", common::unique_suffix());
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "nombre": "Lucía",
            "apellidos": "Martín",
            "nombre_usuario": username,
            "email": format!("{}@uni.es", username),
            "password": "secreto1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    let id = body["resp_data"]["id"].as_i64().unwrap();

    // 未审核前不能登录
    let (status, _) = login(&app, &username, "secreto1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/admin/users/{}/aprobar", id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = login(&app, &username, "secreto1").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["resp_data"]["token"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1002);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/admin/users/{}", id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn created_activity_counts_in_summary() {
    require_live_services!();
    let (app, _) = common::create_live_app().await;
    let token = admin_token(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/planning/activities",
        Some(&token),
        Some(json!({
            "tipo_actividad_id": 1,
            "fecha": "2024-03-01",
            "horas_dedicadas": 2.5
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    let id = body["resp_data"]["id"].as_i64().unwrap();

    let range = "fecha_inicio=2024-03-01&fecha_fin=2024-03-31";
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/planning/summary?{}", range),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entry = body["resp_data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["tipo_actividad_id"] == 1)
        .cloned()
        .expect("summary has no entry for type 1");
    assert!(entry["total_horas"].as_f64().unwrap() >= 2.5);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/planning/activities/{}", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/planning/activities?{}", range),
        Some(&token),
        None,
    )
    .await;
    assert!(!ids(&body).contains(&id));
}

#[tokio::test]
async fn rate_limit_counter_always_expires() {
    require_live_services!();
    let (_, state) = common::create_live_app().await;
    let ip = format!("test-{}", common::unique_suffix());

    assert_eq!(RateLimitCacheOperations::hit(&state.redis, &ip, 30).await.unwrap(), 1);
    assert_eq!(RateLimitCacheOperations::hit(&state.redis, &ip, 30).await.unwrap(), 2);

    let ttl = RateLimitCacheOperations::ttl(&state.redis, &ip).await.unwrap();
    assert!((1..=30).contains(&ttl), "unexpected ttl {}", ttl);
}
