#![allow(clippy::unwrap_used, clippy::missing_panics_doc, unreachable_pub)]
use reqwest::StatusCode;
use serde_json::{Value, json};

mod common;

use common::{ADMIN_EMAIL, ADMIN_PASSWORD, TestApp};

#[tokio::test]
async fn test_login_returns_session() {
    let app = TestApp::spawn().await;

    let resp = app.login("  Admin@Example.com ", ADMIN_PASSWORD).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Login successful");

    let data = &body["data"];
    assert!(!data["token"].as_str().unwrap().is_empty());
    assert!(!data["refresh_token"].as_str().unwrap().is_empty());
    assert!(data["expires_at"].is_string());
    assert!(data["refresh_expires_at"].is_string());
    assert_eq!(data["user"]["email"], ADMIN_EMAIL);
    assert_eq!(data["user"]["role"], "admin");
    assert!(data["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::spawn().await;

    let wrong_password = app.login(ADMIN_EMAIL, "definitely-wrong").await;
    let unknown_email = app.login("nobody@example.com", ADMIN_PASSWORD).await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_email.json().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a["success"], false);
}

#[tokio::test]
async fn test_login_with_missing_fields_is_unauthorized() {
    let app = TestApp::spawn().await;

    for payload in [json!({}), json!({ "email": ADMIN_EMAIL }), json!({ "email": "", "password": "" })] {
        let resp =
            app.client.post(format!("{}/auth/login", app.server_url)).json(&payload).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "payload {payload} should be rejected");
    }

    let resp = app
        .client
        .post(format!("{}/auth/login", app.server_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_owner_login_me_logout_scenario() {
    let app = TestApp::spawn().await;
    let admin_token = app.admin_token().await;
    app.create_user(&admin_token, "owner@example.com", "owner-password", "owner").await;

    let session = app.login_ok("owner@example.com", "owner-password").await;
    let token = session["token"].as_str().unwrap();

    let resp = app.get("/auth/me", Some(token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["email"], "owner@example.com");
    assert_eq!(body["data"]["full_name"], "Test User");
    assert_eq!(body["data"]["phone"], Value::Null, "phone is only shown to admins");

    let resp = app.client.delete(format!("{}/auth/logout", app.server_url)).bearer_auth(token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Logout successful");

    let resp = app.get("/auth/me", Some(token)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Second logout with the revoked token
    let resp = app.client.delete(format!("{}/auth/logout", app.server_url)).bearer_auth(token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_leaves_other_sessions_valid() {
    let app = TestApp::spawn().await;
    let first = app.admin_token().await;
    let second = app.admin_token().await;

    let resp = app.client.delete(format!("{}/auth/logout", app.server_url)).bearer_auth(&first).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(app.get("/auth/me", Some(&first)).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/auth/me", Some(&second)).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let app = TestApp::spawn().await;
    let session = app.login_ok(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let refresh_1 = session["refresh_token"].as_str().unwrap().to_string();

    let resp = app
        .client
        .post(format!("{}/auth/refresh", app.server_url))
        .json(&json!({ "refresh_token": refresh_1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    let refresh_2 = body["data"]["refresh_token"].as_str().unwrap().to_string();
    let token_2 = body["data"]["token"].as_str().unwrap().to_string();
    assert_ne!(refresh_1, refresh_2, "Refresh token should rotate");
    assert_eq!(app.get("/auth/me", Some(&token_2)).await.status(), StatusCode::OK);

    let resp = app
        .client
        .post(format!("{}/auth/refresh", app.server_url))
        .json(&json!({ "refresh_token": refresh_1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "Old refresh token should be invalidated");
}

#[tokio::test]
async fn test_new_login_invalidates_previous_refresh_token() {
    let app = TestApp::spawn().await;
    let first = app.login_ok(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let second = app.login_ok(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let refresh = |token: Value| {
        let app = &app;
        async move {
            app.client
                .post(format!("{}/auth/refresh", app.server_url))
                .json(&json!({ "refresh_token": token }))
                .send()
                .await
                .unwrap()
                .status()
        }
    };

    assert_eq!(refresh(first["refresh_token"].clone()).await, StatusCode::UNAUTHORIZED);
    assert_eq!(refresh(second["refresh_token"].clone()).await, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_after_logout_fails() {
    let app = TestApp::spawn().await;
    let session = app.login_ok(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let resp = app
        .client
        .delete(format!("{}/auth/logout", app.server_url))
        .bearer_auth(session["token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .client
        .post(format!("{}/auth/refresh", app.server_url))
        .json(&json!({ "refresh_token": session["refresh_token"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_payload_never_includes_phone() {
    let app = TestApp::spawn().await;
    let admin_token = app.admin_token().await;
    let created = app.create_user(&admin_token, "second-admin@example.com", "password123", "admin").await;
    assert_eq!(created["phone"], "555-0100");

    let session = app.login_ok("second-admin@example.com", "password123").await;
    assert_eq!(session["user"]["role"], "admin");
    assert_eq!(session["user"]["phone"], Value::Null);

    let resp = app
        .client
        .post(format!("{}/auth/refresh", app.server_url))
        .json(&json!({ "refresh_token": session["refresh_token"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["user"]["phone"], Value::Null);
}
