//! 鉴权与角色校验相关的接口测试

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use tower::ServiceExt;

mod common;

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_check_is_public() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["resp_data"]["status"], "ok");
}

#[tokio::test]
async fn me_requires_token() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(get("/api/auth/me", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = common::body_json(response).await;
    assert_eq!(body["code"], 1002);
}

#[tokio::test]
async fn planning_rejects_invalid_token() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(get(
            "/api/planning/activities?fecha_inicio=2024-01-01&fecha_fin=2024-12-31",
            Some("not.a.jwt"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() {
    let (app, config) = common::create_test_app();
    let mut other = config.clone();
    other.jwt_secret = "a_completely_different_secret_value".into();
    let token = common::create_test_jwt(7, "usuario", &other);

    let response = app
        .oneshot(get("/api/reports/filters", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_forbid_regular_users() {
    let (app, config) = common::create_test_app();
    let token = common::create_test_jwt(7, "usuario", &config);

    let response = app
        .oneshot(get("/api/admin/users", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = common::body_json(response).await;
    assert_eq!(body["code"], 1003);
}

#[tokio::test]
async fn admin_routes_require_token() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(get("/api/admin/roles", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_cannot_delete_own_account() {
    let (app, config) = common::create_test_app();
    let token = common::create_test_jwt(1, "admin", &config);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/admin/users/1")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_listing_rejects_bad_token() {
    let (app, _) = common::create_test_app();

    // 可选鉴权：携带令牌时必须有效
    let response = app
        .oneshot(get("/api/news", Some("garbage")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(get("/api/nothing-here", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_bearer_authorization_is_401_envelope() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/me")
                .header(header::AUTHORIZATION, "Basic YWRtaW46c2VjcmV0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = common::body_json(response).await;
    assert_eq!(body["code"], 1002);
}

#[tokio::test]
async fn malformed_header_on_public_route_is_401() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/events")
                .header(header::AUTHORIZATION, "Bearer")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
