use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common;

#[tokio::test]
async fn test_dashboard_counts_are_scoped() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    common::create_task(&app, &fx.head_a, json!({ "title": "Aberta", "assigned_to": fx.member_a.id })).await;
    common::create_task(&app, &fx.head_a, json!({ "title": "Atrasada", "due_date": "2020-01-01" })).await;
    common::create_task(&app, &fx.head_b, json!({ "title": "Do conselho" })).await;

    let (status, master) = common::get(&app, "/api/dashboard/stats", &fx.master.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(master["entities"], 2);
    assert_eq!(master["users"], 6);
    assert_eq!(master["open_tasks"], 3);
    assert_eq!(master["overdue_tasks"], 1);

    let (_, head) = common::get(&app, "/api/dashboard/stats", &fx.head_a.token).await;
    assert_eq!(head["entities"], 1);
    assert_eq!(head["users"], 3);
    assert_eq!(head["open_tasks"], 2);
    assert_eq!(head["overdue_tasks"], 1);

    let (_, member) = common::get(&app, "/api/dashboard/stats", &fx.member_a.token).await;
    assert_eq!(member["users"], 1);
    assert_eq!(member["open_tasks"], 1);
    assert_eq!(member["overdue_tasks"], 0);
}

#[tokio::test]
async fn test_dashboard_counts_sent_communications_and_unread() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.head_a,
        json!({ "title": "Aviso", "body": "Texto", "recipient_user_ids": [fx.member_a.id] }),
    )
    .await;
    common::post_empty(&app, &format!("/api/communications/{}/send", id), &fx.head_a.token).await;

    let (_, head) = common::get(&app, "/api/dashboard/stats", &fx.head_a.token).await;
    assert_eq!(head["communications_sent_30d"], 1);
    assert_eq!(head["unread_notifications"], 0);

    let (_, member) = common::get(&app, "/api/dashboard/stats", &fx.member_a.token).await;
    assert_eq!(member["unread_notifications"], 1);

    let (_, other) = common::get(&app, "/api/dashboard/stats", &fx.head_b.token).await;
    assert_eq!(other["communications_sent_30d"], 0);
}

#[tokio::test]
async fn test_dashboard_requires_login() {
    let (app, _pool, _fx, _guard) = common::test_app().await;

    let (status, _) = common::get_anonymous(&app, "/api/dashboard/stats").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_feature_flags_are_public() {
    let (app, _pool, _fx, _guard) = common::test_app().await;

    let (status, body) = common::get_anonymous(&app, "/api/config/features").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["s3"], false);
    assert_eq!(body["mailgun"], false);
}
