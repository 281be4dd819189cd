use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common;

#[tokio::test]
async fn test_seeded_badges_are_listed() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::get(&app, "/api/achievements", &fx.member_a.token).await;

    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes.len(), 8);
    assert!(codes.contains(&"first_task"));
    assert!(codes.contains(&"open_government"));
}

#[tokio::test]
async fn test_badge_management_is_master_only() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let badge = json!({
        "code": "first_message",
        "name": "Primeira mensagem",
        "criterion": "communications_sent",
        "threshold": 1
    });

    let (status, _) = common::post_json(&app, "/api/achievements", badge.clone(), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = common::post_json(&app, "/api/achievements", badge.clone(), &fx.master.token).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["criterion"], "communications_sent");

    let (status, _) = common::post_json(&app, "/api/achievements", badge, &fx.master.token).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_badge_threshold_must_be_positive() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json(
        &app,
        "/api/achievements",
        json!({ "code": "zero", "name": "Zero", "criterion": "tasks_completed", "threshold": 0 }),
        &fx.master.token,
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["threshold"].is_string());
}

#[tokio::test]
async fn test_sending_communication_evaluates_sender() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    common::post_json(
        &app,
        "/api/achievements",
        json!({
            "code": "first_message",
            "name": "Primeira mensagem",
            "criterion": "communications_sent",
            "threshold": 1
        }),
        &fx.master.token,
    )
    .await;

    let id = common::create_draft(
        &app,
        &fx.member_a,
        json!({ "title": "Oi", "body": "Texto", "recipient_user_ids": [fx.member_a2.id] }),
    )
    .await;
    common::post_empty(&app, &format!("/api/communications/{}/send", id), &fx.member_a.token).await;

    let (_, body) = common::get(
        &app,
        &format!("/api/users/{}/achievements", fx.member_a.id),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(body["counters"]["communications_sent"], 1);
    assert_eq!(body["badges"][0]["code"], "first_message");
}

#[tokio::test]
async fn test_evaluate_awards_new_badges_once() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_task(
        &app,
        &fx.head_a,
        json!({ "title": "Feita", "assigned_to": fx.member_a.id }),
    )
    .await;
    common::patch_json(
        &app,
        &format!("/api/tasks/{}/status", id),
        json!({ "status": "completed" }),
        &fx.member_a.token,
    )
    .await;

    // A new badge that the existing activity already satisfies.
    common::post_json(
        &app,
        "/api/achievements",
        json!({ "code": "starter", "name": "Inicio", "criterion": "tasks_completed", "threshold": 1 }),
        &fx.master.token,
    )
    .await;

    let uri = format!("/api/users/{}/achievements/evaluate", fx.member_a.id);
    let (status, body) = common::post_empty(&app, &uri, &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], fx.member_a.id);
    assert_eq!(body["awarded"].as_array().unwrap().len(), 1);
    assert_eq!(body["awarded"][0]["code"], "starter");

    let (_, again) = common::post_empty(&app, &uri, &fx.head_a.token).await;
    assert_eq!(again["awarded"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_other_users_achievements_follow_user_visibility() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::get(
        &app,
        &format!("/api/users/{}/achievements", fx.member_a2.id),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::post_empty(
        &app,
        &format!("/api/users/{}/achievements/evaluate", fx.member_b.id),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_leaderboard_is_entity_scoped_for_non_masters() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    for (head, assignee) in [(&fx.head_a, &fx.member_a), (&fx.head_b, &fx.member_b)] {
        let id = common::create_task(
            &app,
            head,
            json!({ "title": "Pontuar", "assigned_to": assignee.id }),
        )
        .await;
        common::patch_json(
            &app,
            &format!("/api/tasks/{}/status", id),
            json!({ "status": "completed" }),
            &assignee.token,
        )
        .await;
    }

    let (status, all) = common::get(&app, "/api/achievements/leaderboard", &fx.master.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, health) = common::get(&app, "/api/achievements/leaderboard", &fx.member_a2.token).await;
    let entries = health.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["user_id"], fx.member_a.id);
    assert_eq!(entries[0]["badge_count"], 1);
}
