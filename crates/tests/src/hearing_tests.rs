use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common;

async fn schedule(app: &axum::Router, head: &common::TestUser, title: &str) -> i64 {
    let (status, body) = common::post_json(
        app,
        "/api/hearings",
        json!({
            "title": title,
            "location": "Camara Municipal",
            "scheduled_at": "2031-03-10T19:00:00Z"
        }),
        &head.token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_head_schedules_hearing_for_own_entity() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json(
        &app,
        "/api/hearings",
        json!({ "title": "Orcamento participativo", "scheduled_at": "2031-03-10T19:00:00Z" }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["entity_id"], fx.health);
    assert_eq!(body["status"], "scheduled");
    assert_eq!(body["created_by"], fx.head_a.id);
}

#[tokio::test]
async fn test_hearing_creation_rules() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let request = |entity: Option<i64>| -> Value {
        json!({ "title": "Audiencia", "scheduled_at": "2031-03-10T19:00:00Z", "entity_id": entity })
    };

    let (status, _) = common::post_json(&app, "/api/hearings", request(None), &fx.member_a.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) =
        common::post_json(&app, "/api/hearings", request(Some(fx.council)), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = common::post_json(&app, "/api/hearings", request(None), &fx.master.token).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["entity_id"].is_string());

    let (status, _) =
        common::post_json(&app, "/api/hearings", request(Some(fx.council)), &fx.master.token).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_hearings_are_public_to_all_users() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = schedule(&app, &fx.head_a, "Plano diretor").await;

    let (status, body) = common::get(&app, &format!("/api/hearings/{}", id), &fx.member_b.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Plano diretor");

    let (_, list) = common::get(&app, "/api/hearings?upcoming=true", &fx.member_b.token).await;
    assert_eq!(list["meta"]["total"], 1);

    let (status, _) = common::get_anonymous(&app, &format!("/api/hearings/{}", id)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_only_organizing_head_manages_hearing() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = schedule(&app, &fx.head_a, "Mobilidade").await;
    let uri = format!("/api/hearings/{}", id);
    let update = json!({ "title": "Mobilidade urbana", "scheduled_at": "2031-04-01T19:00:00Z" });

    let (status, _) = common::put_json(&app, &uri, update.clone(), &fx.head_b.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::put_json(&app, &uri, update.clone(), &fx.member_a.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = common::put_json(&app, &uri, update, &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Mobilidade urbana");

    let (status, _) = common::delete(&app, &uri, &fx.head_a.token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = common::get(&app, &uri, &fx.head_a.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_holding_hearing_records_attendance_and_awards_heads() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = schedule(&app, &fx.head_a, "Saude da familia").await;
    let hold_uri = format!("/api/hearings/{}/hold", id);

    let (status, body) = common::post_json(
        &app,
        &hold_uri,
        json!({ "attendance_count": -1 }),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);

    let (status, body) = common::post_json(
        &app,
        &hold_uri,
        json!({ "attendance_count": 84, "summary": "Demandas registradas" }),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "held");
    assert_eq!(body["attendance_count"], 84);

    let (_, achievements) = common::get(
        &app,
        &format!("/api/users/{}/achievements", fx.head_a.id),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(achievements["counters"]["hearings_held"], 1);
    assert_eq!(achievements["badges"][0]["code"], "first_hearing");

    // Members do not earn hearing badges.
    let (_, member) = common::get(
        &app,
        &format!("/api/users/{}/achievements", fx.member_a.id),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(member["counters"]["hearings_held"], 0);
}

#[tokio::test]
async fn test_closed_hearing_cannot_change_again() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = schedule(&app, &fx.head_a, "Cancelada").await;

    let (status, body) =
        common::post_empty(&app, &format!("/api/hearings/{}/cancel", id), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, _) =
        common::post_empty(&app, &format!("/api/hearings/{}/cancel", id), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = common::post_json(
        &app,
        &format!("/api/hearings/{}/hold", id),
        json!({ "attendance_count": 10 }),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = common::put_json(
        &app,
        &format!("/api/hearings/{}", id),
        json!({ "title": "Reaberta", "scheduled_at": "2031-05-01T19:00:00Z" }),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_hearing_list_filters_by_entity_and_status() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let held = schedule(&app, &fx.head_a, "Realizada").await;
    schedule(&app, &fx.head_a, "Agendada").await;
    schedule(&app, &fx.head_b, "Do conselho").await;
    common::post_json(
        &app,
        &format!("/api/hearings/{}/hold", held),
        json!({ "attendance_count": 12 }),
        &fx.head_a.token,
    )
    .await;

    let (_, all) = common::get(&app, "/api/hearings", &fx.member_a.token).await;
    assert_eq!(all["meta"]["total"], 3);

    let (_, health) =
        common::get(&app, &format!("/api/hearings?entity_id={}", fx.health), &fx.member_a.token).await;
    assert_eq!(health["meta"]["total"], 2);

    let (_, done) = common::get(&app, "/api/hearings?status=held", &fx.member_a.token).await;
    assert_eq!(done["meta"]["total"], 1);
    assert_eq!(done["data"][0]["title"], "Realizada");

    let (_, upcoming) = common::get(&app, "/api/hearings?upcoming=true", &fx.member_a.token).await;
    assert_eq!(upcoming["meta"]["total"], 2);
}
