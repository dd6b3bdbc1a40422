#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, unreachable_pub)]
use jsonwebtoken::{EncodingKey, Header, encode};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

mod common;

use common::{ADMIN_EMAIL, JWT_SECRET, TestApp};

#[tokio::test]
async fn test_unauthenticated_access_denied() {
    let app = TestApp::spawn().await;
    let target = Uuid::new_v4();

    let endpoints = vec![
        ("GET", format!("{}/auth/me", app.server_url)),
        ("DELETE", format!("{}/auth/logout", app.server_url)),
        ("GET", format!("{}/users", app.server_url)),
        ("POST", format!("{}/users", app.server_url)),
        ("GET", format!("{}/users/{target}", app.server_url)),
        ("PUT", format!("{}/users/{target}", app.server_url)),
        ("DELETE", format!("{}/users/{target}", app.server_url)),
    ];

    for (method, url) in endpoints {
        let resp = match method {
            "GET" => app.client.get(&url).send().await.unwrap(),
            "POST" => app.client.post(&url).send().await.unwrap(),
            "PUT" => app.client.put(&url).send().await.unwrap(),
            "DELETE" => app.client.delete(&url).send().await.unwrap(),
            _ => panic!("Unsupported method"),
        };

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "Endpoint {method} {url} should require authentication");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Authentication required");
    }
}

#[tokio::test]
async fn test_invalid_tokens_rejected_identically() {
    let app = TestApp::spawn().await;
    let session = app.login_ok(ADMIN_EMAIL, common::ADMIN_PASSWORD).await;
    let user_id = session["user"]["id"].as_str().unwrap();
    let now = time::OffsetDateTime::now_utc().unix_timestamp();

    let claims = |iat: i64, exp: i64| {
        json!({ "jti": Uuid::new_v4().to_string(), "user_id": user_id, "email": ADMIN_EMAIL, "role": "admin", "iat": iat, "exp": exp })
    };

    let forged = encode(&Header::default(), &claims(now, now + 3600), &EncodingKey::from_secret(b"some_other_secret_entirely_1234567")).unwrap();
    let expired =
        encode(&Header::default(), &claims(now - 7200, now - 3600), &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap();
    let wrong_alg = encode(
        &Header::new(jsonwebtoken::Algorithm::HS512),
        &claims(now, now + 3600),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();

    let mut bodies = Vec::new();
    for token in [forged.as_str(), expired.as_str(), wrong_alg.as_str(), "invalid-token"] {
        let resp = app.get("/auth/me", Some(token)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        bodies.push(resp.json::<Value>().await.unwrap());
    }
    assert!(bodies.windows(2).all(|w| w[0] == w[1]), "failure bodies must not reveal the reason");
}

#[tokio::test]
async fn test_token_for_unknown_user_rejected() {
    let app = TestApp::spawn().await;
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let claims = json!({
        "jti": Uuid::new_v4().to_string(),
        "user_id": Uuid::new_v4(),
        "email": "ghost@example.com",
        "role": "admin",
        "iat": now,
        "exp": now + 3600,
    });
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap();

    assert_eq!(app.get("/users", Some(&token)).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_auth_header() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(format!("{}/auth/me", app.server_url))
        .header("Authorization", "NotBearer some-token")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = TestApp::spawn().await;
    let request_id = Uuid::new_v4().to_string();

    let resp = app.client.get(format!("{}/health", app.server_url)).header("x-request-id", &request_id).send().await.unwrap();

    assert_eq!(resp.headers().get("x-request-id").unwrap().to_str().unwrap(), request_id);

    let resp = app.client.get(format!("{}/health", app.server_url)).send().await.unwrap();
    assert!(resp.headers().get("x-request-id").is_some());
}
