use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{self, TestUser};

async fn create_subject(app: &axum::Router, creator: &TestUser, name: &str) -> i64 {
    let (status, body) = common::post_json(
        app,
        "/api/subjects",
        json!({ "name": name, "color": "#1e90ff" }),
        &creator.token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

async fn create_meeting(app: &axum::Router, organizer: &TestUser, body: Value) -> Value {
    let (status, created) = common::post_json(app, "/api/meetings", body, &organizer.token).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    created
}

fn meeting_body(participants: &[i64]) -> Value {
    json!({
        "title": "Reuniao do conselho",
        "location": "Sala 2",
        "meeting_url": "https://meet.example.org/conselho",
        "starts_at": "2030-03-10T14:00:00Z",
        "ends_at": "2030-03-10T16:00:00Z",
        "participant_ids": participants
    })
}

// -- Subjects ----------------------------------------------------------------

#[tokio::test]
async fn test_members_cannot_create_subjects() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/subjects",
        json!({ "name": "Orcamento" }),
        &fx.member_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_subjects_are_visible_to_everyone() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = create_subject(&app, &fx.head_a, "Saude publica").await;

    let (status, body) = common::get(&app, &format!("/api/subjects/{}", id), &fx.member_b.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Saude publica");
    assert_eq!(body["color"], "#1e90ff");

    let (status, list) = common::get(&app, "/api/subjects?q=saude", &fx.member_b.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["meta"]["total"], 1);
}

#[tokio::test]
async fn test_invalid_subject_color_is_422() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json(
        &app,
        "/api/subjects",
        json!({ "name": "Cores", "color": "blue" }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["color"].is_string());
}

#[tokio::test]
async fn test_only_creator_side_manages_subject() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = create_subject(&app, &fx.head_a, "Transporte").await;
    let uri = format!("/api/subjects/{}", id);

    let (status, _) = common::put_json(&app, &uri, json!({ "name": "Mobilidade" }), &fx.head_b.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = common::put_json(&app, &uri, json!({ "name": "Mobilidade" }), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Mobilidade");

    let (status, _) = common::delete(&app, &uri, &fx.master.token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_subject_groups_tasks_and_meetings() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let subject = create_subject(&app, &fx.head_a, "Vacinacao").await;

    common::create_task(
        &app,
        &fx.head_a,
        json!({ "title": "Levantar estoque", "subject_id": subject }),
    )
    .await;
    let mut body = meeting_body(&[fx.member_a.id]);
    body["subject_id"] = json!(subject);
    create_meeting(&app, &fx.head_a, body).await;

    let (status, tasks) =
        common::get(&app, &format!("/api/subjects/{}/tasks", subject), &fx.master.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks["meta"]["total"], 1);

    let (status, meetings) =
        common::get(&app, &format!("/api/subjects/{}/meetings", subject), &fx.master.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meetings["meta"]["total"], 1);
}

// -- Meetings ----------------------------------------------------------------

#[tokio::test]
async fn test_create_meeting_with_participants() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let created = create_meeting(&app, &fx.head_a, meeting_body(&[fx.member_a.id, fx.member_b.id])).await;

    assert_eq!(created["status"], "scheduled");
    assert_eq!(created["organizer_id"], fx.head_a.id);
    assert_eq!(created["participants"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_meeting_end_before_start_is_400() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let mut body = meeting_body(&[]);
    body["ends_at"] = json!("2030-03-10T13:00:00Z");
    let (status, _) = common::post_json(&app, "/api/meetings", body, &fx.head_a.token).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_meeting_url_must_be_http() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let mut body = meeting_body(&[]);
    body["meeting_url"] = json!("ftp://meet.example.org");
    let (status, body) = common::post_json(&app, "/api/meetings", body, &fx.head_a.token).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["meeting_url"].is_string());
}

#[tokio::test]
async fn test_meeting_with_unknown_participant_is_422() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(&app, "/api/meetings", meeting_body(&[999_999]), &fx.head_a.token).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_participants_can_view_but_outsiders_cannot() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let created = create_meeting(&app, &fx.head_a, meeting_body(&[fx.member_b.id])).await;
    let uri = format!("/api/meetings/{}", created["id"]);

    let (status, _) = common::get(&app, &uri, &fx.member_b.token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = common::get(&app, &uri, &fx.member_a2.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::get(&app, &uri, &fx.head_b.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_participant_cannot_edit_meeting() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let created = create_meeting(&app, &fx.head_a, meeting_body(&[fx.member_a.id])).await;
    let uri = format!("/api/meetings/{}", created["id"]);

    let (status, _) = common::put_json(&app, &uri, meeting_body(&[fx.member_a.id]), &fx.member_a.token).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_replace_participants() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let created = create_meeting(&app, &fx.head_a, meeting_body(&[fx.member_a.id])).await;
    let uri = format!("/api/meetings/{}/participants", created["id"]);

    let (status, body) = common::put_json(
        &app,
        &uri,
        json!({ "user_ids": [fx.member_a2.id, fx.head_b.id] }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["user_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&fx.member_a2.id));
    assert!(ids.contains(&fx.head_b.id));
}

#[tokio::test]
async fn test_attendance_only_for_participants() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let created = create_meeting(&app, &fx.head_a, meeting_body(&[fx.member_a.id])).await;
    let uri = format!("/api/meetings/{}/attendance", created["id"]);

    let (status, _) = common::post_json(
        &app,
        &uri,
        json!({ "user_id": fx.member_b.id, "attended": true }),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = common::post_json(
        &app,
        &uri,
        json!({ "user_id": fx.member_a.id, "attended": true }),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participants"][0]["attended"], true);
}

#[tokio::test]
async fn test_meeting_lifecycle_and_attendance_badge() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let created = create_meeting(&app, &fx.head_a, meeting_body(&[fx.member_a.id])).await;
    let id = created["id"].as_i64().unwrap();

    common::post_json(
        &app,
        &format!("/api/meetings/{}/attendance", id),
        json!({ "user_id": fx.member_a.id, "attended": true }),
        &fx.head_a.token,
    )
    .await;

    let status_uri = format!("/api/meetings/{}/status", id);
    let (status, _) =
        common::patch_json(&app, &status_uri, json!({ "status": "completed" }), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) =
        common::patch_json(&app, &status_uri, json!({ "status": "in_progress" }), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        common::patch_json(&app, &status_uri, json!({ "status": "completed" }), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (status, achievements) = common::get(
        &app,
        &format!("/api/users/{}/achievements", fx.member_a.id),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(achievements["counters"]["meetings_attended"], 1);
    let codes: Vec<&str> = achievements["badges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["code"].as_str().unwrap())
        .collect();
    assert!(codes.contains(&"first_meeting"));
}

#[tokio::test]
async fn test_attendance_after_completion_awards_badge() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let created = create_meeting(&app, &fx.head_a, meeting_body(&[fx.member_a.id])).await;
    let id = created["id"].as_i64().unwrap();
    let status_uri = format!("/api/meetings/{}/status", id);

    for next in ["in_progress", "completed"] {
        let (status, _) =
            common::patch_json(&app, &status_uri, json!({ "status": next }), &fx.head_a.token).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = common::post_json(
        &app,
        &format!("/api/meetings/{}/attendance", id),
        json!({ "user_id": fx.member_a.id, "attended": true }),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, achievements) = common::get(
        &app,
        &format!("/api/users/{}/achievements", fx.member_a.id),
        &fx.member_a.token,
    )
    .await;
    assert!(achievements["badges"]
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b["code"] == "first_meeting"));
}

#[tokio::test]
async fn test_completed_meeting_cannot_be_edited() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let created = create_meeting(&app, &fx.head_a, meeting_body(&[])).await;
    let id = created["id"].as_i64().unwrap();
    let status_uri = format!("/api/meetings/{}/status", id);

    common::patch_json(&app, &status_uri, json!({ "status": "cancelled" }), &fx.head_a.token).await;

    let (status, _) =
        common::put_json(&app, &format!("/api/meetings/{}", id), meeting_body(&[]), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_notify_participants_creates_notifications() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let created = create_meeting(&app, &fx.head_a, meeting_body(&[fx.member_a.id, fx.member_a2.id])).await;

    let (status, summary) = common::post_empty(
        &app,
        &format!("/api/meetings/{}/notify", created["id"]),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", summary);
    assert_eq!(summary["status"], "sent");
    assert_eq!(summary["delivered"], 2);

    let (_, notifications) = common::get(&app, "/api/notifications", &fx.member_a2.token).await;
    assert_eq!(notifications["meta"]["total"], 1);
}

#[tokio::test]
async fn test_notify_without_participants_is_400() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let created = create_meeting(&app, &fx.head_a, meeting_body(&[])).await;

    let (status, _) = common::post_empty(
        &app,
        &format!("/api/meetings/{}/notify", created["id"]),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_meeting_list_for_member_shows_own_meetings() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    create_meeting(&app, &fx.head_a, meeting_body(&[fx.member_a.id])).await;
    create_meeting(&app, &fx.head_a, meeting_body(&[])).await;

    let (_, mine) = common::get(&app, "/api/meetings", &fx.member_a.token).await;
    assert_eq!(mine["meta"]["total"], 1);

    let (_, entity) = common::get(&app, "/api/meetings", &fx.head_a.token).await;
    assert_eq!(entity["meta"]["total"], 2);

    let (_, other) = common::get(&app, "/api/meetings", &fx.member_b.token).await;
    assert_eq!(other["meta"]["total"], 0);
}
