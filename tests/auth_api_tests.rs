//! Tests for the register, login, refresh and logout endpoints.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{
    PASSWORD, body_json, cookie_value, create_test_app, create_user, post_json, set_cookies,
    test_config, test_db, with_cookies,
};
use flightdesk::{
    ServerConfig,
    auth::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME},
    create_app,
    rate_limit::RateLimitConfig,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

fn login_request(email: &str, password: &str) -> Request<Body> {
    post_json(
        "/api/auth/login",
        json!({ "email": email, "password": password }),
    )
}

#[tokio::test]
async fn test_health() {
    let (app, _) = create_test_app().await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_register_success() {
    let (app, db) = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/auth/register",
            json!({ "username": "pilot", "email": "pilot@example.com", "password": PASSWORD }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "User registered");
    assert_eq!(body["user"]["email"], "pilot@example.com");

    let id = body["user"]["id"].as_i64().unwrap();
    let user = db.users().get_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.username, "pilot");
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let (app, db) = create_test_app().await;
    create_user(&db, "pilot", "pilot@example.com").await;

    let response = app
        .oneshot(post_json(
            "/api/auth/register",
            json!({ "username": "other", "email": "PILOT@example.com", "password": PASSWORD }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Email is already in use");
}

#[tokio::test]
async fn test_register_validation() {
    let (app, _) = create_test_app().await;

    let cases = [
        json!({ "email": "pilot@example.com", "password": PASSWORD }),
        json!({ "username": "pilot", "password": PASSWORD }),
        json!({ "username": "pilot", "email": "pilot@example.com" }),
        json!({ "username": "pilot", "email": "not-an-email", "password": PASSWORD }),
        json!({ "username": "x".repeat(33), "email": "pilot@example.com", "password": PASSWORD }),
    ];

    for body in cases {
        let response = app
            .clone()
            .oneshot(post_json("/api/auth/register", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }
}

#[tokio::test]
async fn test_login_sets_both_cookies() {
    let (app, db) = create_test_app().await;
    let id = create_user(&db, "pilot", "pilot@example.com").await;

    let response = app
        .oneshot(login_request("pilot@example.com", PASSWORD))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);

    let access = cookies
        .iter()
        .find(|c| c.starts_with("accessToken="))
        .unwrap();
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("SameSite=Strict"));
    assert!(access.contains("Path=/"));
    assert!(access.contains("Max-Age=3600"));
    assert!(!access.contains("Secure"));

    let refresh = cookies
        .iter()
        .find(|c| c.starts_with("refreshToken="))
        .unwrap();
    assert!(refresh.contains("Max-Age=604800"));

    let body = body_json(response).await;
    assert_eq!(body["user"]["id"], id);
    assert_eq!(body["user"]["username"], "pilot");
    assert_eq!(body["user"]["role"], "user");
    assert!(db.tokens().get(id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_login_missing_fields() {
    let (app, _) = create_test_app().await;

    let response = app
        .oneshot(post_json("/api/auth/login", json!({ "email": "pilot@example.com" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"], json!({ "email": false, "password": true }));
}

#[tokio::test]
async fn test_login_bad_credentials() {
    let (app, db) = create_test_app().await;
    create_user(&db, "pilot", "pilot@example.com").await;

    for (email, password) in [
        ("pilot@example.com", "wrong password"),
        ("nobody@example.com", PASSWORD),
    ] {
        let response = app
            .clone()
            .oneshot(login_request(email, password))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(
            body_json(response).await["error"],
            "Invalid email or password"
        );
    }
}

#[tokio::test]
async fn test_login_secure_cookies() {
    let db = test_db().await;
    create_user(&db, "pilot", "pilot@example.com").await;
    let app = create_app(&ServerConfig {
        secure_cookies: true,
        ..test_config(db)
    });

    let response = app
        .oneshot(login_request("pilot@example.com", PASSWORD))
        .await
        .unwrap();

    let cookies = set_cookies(&response);
    assert!(cookies.iter().all(|c| c.ends_with("; Secure")));
}

#[tokio::test]
async fn test_login_rate_limited() {
    let db = test_db().await;
    let app = create_app(&ServerConfig {
        rate_limit: Arc::new(RateLimitConfig::new(2, false)),
        ..test_config(db)
    });

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(login_request("nobody@example.com", PASSWORD))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .oneshot(login_request("nobody@example.com", PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

/// Log in and return (access, refresh) cookie values.
async fn login(app: &axum::Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(login_request("pilot@example.com", PASSWORD))
        .await
        .unwrap();
    let cookies = set_cookies(&response);
    (
        cookie_value(&cookies, ACCESS_COOKIE_NAME).unwrap(),
        cookie_value(&cookies, REFRESH_COOKIE_NAME).unwrap(),
    )
}

#[tokio::test]
async fn test_refresh_rotates_pair() {
    let (app, db) = create_test_app().await;
    let id = create_user(&db, "pilot", "pilot@example.com").await;
    let (_, refresh) = login(&app).await;

    let response = app
        .clone()
        .oneshot(with_cookies(
            "POST",
            "/api/auth/refresh",
            &[(REFRESH_COOKIE_NAME, refresh.as_str())],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    let new_refresh = cookie_value(&cookies, REFRESH_COOKIE_NAME).unwrap();
    assert!(cookie_value(&cookies, ACCESS_COOKIE_NAME).is_some());
    assert_ne!(new_refresh, refresh);
    assert_eq!(body_json(response).await["user"]["id"], id);

    // Presenting the rotated-away token again fails and sets nothing
    let response = app
        .oneshot(with_cookies(
            "POST",
            "/api/auth/refresh",
            &[(REFRESH_COOKIE_NAME, refresh.as_str())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());
    assert_eq!(body_json(response).await["error"], "Invalid refresh token");
}

#[tokio::test]
async fn test_refresh_without_cookie() {
    let (app, _) = create_test_app().await;

    let response = app
        .oneshot(with_cookies("POST", "/api/auth/refresh", &[]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "No refresh token");
}

#[tokio::test]
async fn test_logout_revokes_and_clears() {
    let (app, db) = create_test_app().await;
    let id = create_user(&db, "pilot", "pilot@example.com").await;
    let (access, refresh) = login(&app).await;

    let response = app
        .clone()
        .oneshot(with_cookies(
            "POST",
            "/api/auth/logout",
            &[
                (ACCESS_COOKIE_NAME, access.as_str()),
                (REFRESH_COOKIE_NAME, refresh.as_str()),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    assert_eq!(body_json(response).await["message"], "Logged out");
    assert!(db.tokens().get(id).await.unwrap().is_none());

    let response = app
        .oneshot(with_cookies(
            "POST",
            "/api/auth/refresh",
            &[(REFRESH_COOKIE_NAME, refresh.as_str())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_with_refresh_cookie_only() {
    let (app, db) = create_test_app().await;
    let id = create_user(&db, "pilot", "pilot@example.com").await;
    let (_, refresh) = login(&app).await;

    let response = app
        .oneshot(with_cookies(
            "POST",
            "/api/auth/logout",
            &[(REFRESH_COOKIE_NAME, refresh.as_str())],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(db.tokens().get(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_logout_without_session() {
    let (app, _) = create_test_app().await;

    let response = app
        .oneshot(with_cookies("POST", "/api/auth/logout", &[]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookies(&response).len(), 2);
}
