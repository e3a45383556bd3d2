mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn test_feedback_lifecycle() {
    let app = spawn_app().await;
    let token = app.register("alice", "secret1").await;
    let admin = app.admin_token().await;

    let (status, body) = app
        .json(
            "POST",
            "/v1/feedback",
            Some(&token),
            &json!({"title": "Upload fails", "content": "Large files time out", "type": "bug"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "open");
    assert_eq!(body["data"]["type"], "bug");
    assert_eq!(body["data"]["username"], "alice");
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .json(
            "PUT",
            &format!("/v1/feedback/admin/{id}/reply"),
            Some(&admin),
            &json!({"reply": "Fixed in the next release"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "replied");
    assert_eq!(body["data"]["adminReply"], "Fixed in the next release");

    let (_, body) = app.get("/v1/feedback/my", Some(&token)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["adminReply"], "Fixed in the next release");

    let (status, body) = app
        .json(
            "PUT",
            &format!("/v1/feedback/admin/{id}/status"),
            Some(&admin),
            &json!({"status": "resolved"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "resolved");

    let (_, body) = app.get("/v1/feedback/admin/stats", Some(&admin)).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["byStatus"]["resolved"], 1);
    assert_eq!(body["data"]["byStatus"]["open"], 0);
    assert_eq!(body["data"]["byType"]["bug"], 1);

    let (_, body) = app
        .get("/v1/feedback/admin/all?status=resolved", Some(&admin))
        .await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_feedback_validation() {
    let app = spawn_app().await;
    let token = app.register("bob", "secret1").await;
    let admin = app.admin_token().await;

    let (status, _) = app
        .json(
            "POST",
            "/v1/feedback",
            Some(&token),
            &json!({"title": "", "content": "body"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            "PUT",
            "/v1/feedback/admin/999/status",
            Some(&admin),
            &json!({"status": "resolved"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            "PUT",
            "/v1/feedback/admin/999/status",
            Some(&admin),
            &json!({"status": "archived"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/v1/feedback/admin/all", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
