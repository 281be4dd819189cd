use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common;

#[tokio::test]
async fn test_head_creates_task_for_member() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json(
        &app,
        "/api/tasks",
        json!({
            "title": "Consolidar relatorio",
            "priority": "high",
            "due_date": "2030-01-31",
            "assigned_to": fx.member_a.id
        }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["priority"], "high");
    assert_eq!(body["entity_id"], fx.health);
    assert_eq!(body["assigned_to"], fx.member_a.id);
    assert_eq!(body["overdue"], false);
}

#[tokio::test]
async fn test_past_due_open_task_is_overdue() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (_, body) = common::post_json(
        &app,
        "/api/tasks",
        json!({ "title": "Atrasada", "due_date": "2020-01-01" }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(body["overdue"], true);
}

#[tokio::test]
async fn test_member_can_only_assign_self() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/tasks",
        json!({ "title": "Para colega", "assigned_to": fx.member_a2.id }),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::post_json(
        &app,
        "/api/tasks",
        json!({ "title": "Para mim", "assigned_to": fx.member_a.id }),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_assignee_must_belong_to_task_entity() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/tasks",
        json!({ "title": "Fora", "assigned_to": fx.member_b.id }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_head_cannot_file_under_other_entity() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/tasks",
        json!({ "title": "Outra entidade", "entity_id": fx.council }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_master_must_name_entity() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(&app, "/api/tasks", json!({ "title": "Sem entidade" }), &fx.master.token).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = common::post_json(
        &app,
        "/api/tasks",
        json!({ "title": "Com entidade", "entity_id": fx.council }),
        &fx.master.token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["entity_id"], fx.council);
}

#[tokio::test]
async fn test_empty_title_is_422() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json(&app, "/api/tasks", json!({ "title": "" }), &fx.head_a.token).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["title"].is_string());
}

#[tokio::test]
async fn test_task_visibility() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_task(
        &app,
        &fx.head_a,
        json!({ "title": "Visivel", "assigned_to": fx.member_a.id }),
    )
    .await;
    let uri = format!("/api/tasks/{}", id);

    let (status, _) = common::get(&app, &uri, &fx.member_a.token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = common::get(&app, &uri, &fx.member_a2.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::get(&app, &uri, &fx.head_b.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::get(&app, "/api/tasks/999999", &fx.master.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_task_list_scoping() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    common::create_task(&app, &fx.head_a, json!({ "title": "A1", "assigned_to": fx.member_a.id })).await;
    common::create_task(&app, &fx.head_a, json!({ "title": "A2" })).await;
    common::create_task(&app, &fx.head_b, json!({ "title": "B1" })).await;

    let (_, all) = common::get(&app, "/api/tasks", &fx.master.token).await;
    assert_eq!(all["meta"]["total"], 3);

    let (_, health) = common::get(&app, "/api/tasks", &fx.head_a.token).await;
    assert_eq!(health["meta"]["total"], 2);

    let (_, mine) = common::get(&app, "/api/tasks", &fx.member_a.token).await;
    assert_eq!(mine["meta"]["total"], 1);
    assert_eq!(mine["data"][0]["title"], "A1");
}

#[tokio::test]
async fn test_assignee_updates_status_but_cannot_edit() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_task(
        &app,
        &fx.head_a,
        json!({ "title": "Executar", "assigned_to": fx.member_a.id }),
    )
    .await;

    let (status, _) = common::put_json(
        &app,
        &format!("/api/tasks/{}", id),
        json!({ "title": "Renomeada" }),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = common::patch_json(
        &app,
        &format!("/api/tasks/{}/status", id),
        json!({ "status": "in_progress" }),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");
}

#[tokio::test]
async fn test_completing_task_awards_first_task_badge() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_task(
        &app,
        &fx.head_a,
        json!({ "title": "Primeira", "assigned_to": fx.member_a.id }),
    )
    .await;

    let (status, body) = common::patch_json(
        &app,
        &format!("/api/tasks/{}/status", id),
        json!({ "status": "completed" }),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body["completed_at"].is_string());

    let (_, achievements) = common::get(
        &app,
        &format!("/api/users/{}/achievements", fx.member_a.id),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(achievements["counters"]["tasks_completed"], 1);
    assert_eq!(achievements["badges"][0]["code"], "first_task");

    let (status, reopened) = common::patch_json(
        &app,
        &format!("/api/tasks/{}/status", id),
        json!({ "status": "in_progress" }),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reopened["status"], "in_progress");
    assert!(reopened["completed_at"].is_null());
}

#[tokio::test]
async fn test_creator_deletes_task() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_task(&app, &fx.member_a, json!({ "title": "Rascunho" })).await;
    let uri = format!("/api/tasks/{}", id);

    let (status, _) = common::delete(&app, &uri, &fx.member_a2.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::delete(&app, &uri, &fx.member_a.token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = common::get(&app, &uri, &fx.member_a.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
