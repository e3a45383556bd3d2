mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn test_register_and_profile() {
    let app = spawn_app().await;
    let token = app.register("alice", "secret1").await;

    let (status, body) = app.get("/v1/auth/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["role"], "user");

    let (status, body) = app.get("/v1/auth/verify", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
}

#[tokio::test]
async fn test_missing_and_invalid_token() {
    let app = spawn_app().await;

    let (status, body) = app.get("/v1/auth/profile", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "No token provided");

    let (status, body) = app.get("/v1/auth/profile", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_register_validation() {
    let app = spawn_app().await;
    app.register("bob", "secret1").await;

    let (status, body) = app
        .json(
            "POST",
            "/v1/auth/register",
            None,
            &json!({"username": "bob", "password": "another1"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = app
        .json(
            "POST",
            "/v1/auth/register",
            None,
            &json!({"username": "carol", "password": "abc"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            "POST",
            "/v1/auth/register",
            None,
            &json!({"username": "a b", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login() {
    let app = spawn_app().await;
    app.register("dave", "secret1").await;

    let (status, body) = app
        .json(
            "POST",
            "/v1/auth/login",
            None,
            &json!({"username": "dave", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));

    let (status, body) = app
        .json(
            "POST",
            "/v1/auth/login",
            None,
            &json!({"username": "dave", "password": "wrong-password"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");

    let (status, _) = app
        .json(
            "POST",
            "/v1/auth/login",
            None,
            &json!({"username": "nobody", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let app = spawn_app().await;
    let token = app.register("erin", "secret1").await;

    let (status, _) = app
        .json(
            "PUT",
            "/v1/auth/password",
            Some(&token),
            &json!({"oldPassword": "wrong-one", "newPassword": "secret2"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .json(
            "PUT",
            "/v1/auth/password",
            Some(&token),
            &json!({"oldPassword": "secret1", "newPassword": "secret2"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .json(
            "POST",
            "/v1/auth/login",
            None,
            &json!({"username": "erin", "password": "secret2"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = spawn_app().await;
    let user_token = app.register("frank", "secret1").await;

    let (status, body) = app.get("/v1/admin/stats", Some(&user_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin privileges required");

    let (status, _) = app.get("/v1/config/full", Some(&user_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = app.admin_token().await;
    let (status, body) = app.get("/v1/admin/stats", Some(&admin_token)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app.get("/v1/admin/users", Some(&admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_admin_reset_password() {
    let app = spawn_app().await;
    app.register("grace", "secret1").await;
    let admin_token = app.admin_token().await;

    let (_, users) = app
        .get("/v1/admin/users?keyword=grace", Some(&admin_token))
        .await;
    let user_id = users["data"][0]["_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .json(
            "PUT",
            &format!("/v1/admin/users/{user_id}/reset-password"),
            Some(&admin_token),
            &json!({"newPassword": "fresh-pass"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .json(
            "POST",
            "/v1/auth/login",
            None,
            &json!({"username": "grace", "password": "fresh-pass"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .get("/v1/admin/users/no-such-user", Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_verification_code_rate_limit() {
    let app = spawn_app().await;

    let (status, body) = app
        .json(
            "POST",
            "/v1/auth/code/send",
            None,
            &json!({"email": "someone@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .json(
            "POST",
            "/v1/auth/code/send",
            None,
            &json!({"email": "someone@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, body) = app
        .json(
            "POST",
            "/v1/auth/code/verify",
            None,
            &json!({"email": "someone@example.com", "code": "000000x"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["verified"], false);

    let (status, _) = app
        .json(
            "POST",
            "/v1/auth/code/send",
            None,
            &json!({"email": "not-an-email"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
