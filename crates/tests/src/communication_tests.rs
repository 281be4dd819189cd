use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common;

#[tokio::test]
async fn test_create_draft_with_user_and_entity_recipients() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json(
        &app,
        "/api/communications",
        json!({
            "title": "Convocacao",
            "body": "Reuniao extraordinaria na sexta-feira.",
            "recipient_user_ids": [fx.member_b.id, fx.member_b.id],
            "recipient_entity_ids": [fx.health]
        }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "draft");
    assert_eq!(body["channel"], "system");
    assert_eq!(body["sender_id"], fx.head_a.id);
    // Duplicate recipients are collapsed.
    assert_eq!(body["recipients"].as_array().unwrap().len(), 2);
    assert!(body["recipients"]
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["delivery_status"] == "pending"));
}

#[tokio::test]
async fn test_communication_without_recipients_is_400() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/communications",
        json!({ "title": "Vazio", "body": "Sem destinatarios" }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_recipient_is_422() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json(
        &app,
        "/api/communications",
        json!({ "title": "Oi", "body": "Teste", "recipient_user_ids": [999_999] }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["recipient_user_ids"].is_string());
}

#[tokio::test]
async fn test_member_cannot_address_other_entities() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/communications",
        json!({ "title": "Oi", "body": "Teste", "recipient_user_ids": [fx.member_b.id] }),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::post_json(
        &app,
        "/api/communications",
        json!({ "title": "Oi", "body": "Teste", "recipient_entity_ids": [fx.council] }),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::post_json(
        &app,
        "/api/communications",
        json!({ "title": "Oi", "body": "Teste", "recipient_user_ids": [fx.member_a2.id] }),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_drafts_are_hidden_from_recipients() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.head_a,
        json!({ "title": "Rascunho", "body": "Ainda nao", "recipient_user_ids": [fx.member_b.id] }),
    )
    .await;

    let (status, _) = common::get(&app, &format!("/api/communications/{}", id), &fx.member_b.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, inbox) = common::get(&app, "/api/communications?box=inbox", &fx.member_b.token).await;
    assert_eq!(inbox["meta"]["total"], 0);
}

#[tokio::test]
async fn test_send_delivers_in_app_and_notifies_entity_users() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.head_a,
        json!({
            "title": "Aviso geral",
            "body": "Atualizacao do calendario.",
            "recipient_user_ids": [fx.member_a.id],
            "recipient_entity_ids": [fx.council]
        }),
    )
    .await;

    let (status, summary) =
        common::post_empty(&app, &format!("/api/communications/{}/send", id), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK, "{}", summary);
    assert_eq!(summary["status"], "sent");
    assert_eq!(summary["delivered"], 2);
    assert_eq!(summary["failed"], 0);

    let (_, detail) = common::get(&app, &format!("/api/communications/{}", id), &fx.head_a.token).await;
    assert_eq!(detail["status"], "sent");
    assert!(detail["sent_at"].is_string());
    assert!(detail["recipients"]
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["delivery_status"] == "delivered" && r["delivered_channel"] == "system"));

    // Every active user of the recipient entity gets a notification.
    for user in [&fx.member_a, &fx.head_b, &fx.member_b] {
        let (_, notifications) = common::get(&app, "/api/notifications?unread=true", &user.token).await;
        assert_eq!(notifications["meta"]["total"], 1, "user {}", user.username);
        assert_eq!(notifications["data"][0]["communication_id"], id);
    }

    let (_, untouched) = common::get(&app, "/api/notifications", &fx.member_a2.token).await;
    assert_eq!(untouched["meta"]["total"], 0);
}

#[tokio::test]
async fn test_user_in_both_lists_is_notified_once() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.master,
        json!({
            "title": "Duplo",
            "body": "Uma vez so",
            "recipient_user_ids": [fx.member_b.id],
            "recipient_entity_ids": [fx.council]
        }),
    )
    .await;

    common::post_empty(&app, &format!("/api/communications/{}/send", id), &fx.master.token).await;

    let (_, notifications) = common::get(&app, "/api/notifications", &fx.member_b.token).await;
    assert_eq!(notifications["meta"]["total"], 1);
}

#[tokio::test]
async fn test_sent_communication_cannot_be_resent_or_edited() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.head_a,
        json!({ "title": "Uma vez", "body": "Texto", "recipient_user_ids": [fx.member_a.id] }),
    )
    .await;
    let send_uri = format!("/api/communications/{}/send", id);

    let (status, _) = common::post_empty(&app, &send_uri, &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = common::post_empty(&app, &send_uri, &fx.head_a.token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = common::put_json(
        &app,
        &format!("/api/communications/{}", id),
        json!({ "title": "Editada", "body": "Texto", "recipient_user_ids": [fx.member_a.id] }),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = common::delete(&app, &format!("/api/communications/{}", id), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_concurrent_sends_deliver_once() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.head_a,
        json!({
            "title": "Corrida",
            "body": "Texto",
            "recipient_user_ids": [fx.member_a.id, fx.member_a2.id]
        }),
    )
    .await;
    let send_uri = format!("/api/communications/{}/send", id);

    let ((first, _), (second, _)) = tokio::join!(
        common::post_empty(&app, &send_uri, &fx.head_a.token),
        common::post_empty(&app, &send_uri, &fx.head_a.token),
    );
    let mut statuses = [first, second];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    for user in [&fx.member_a, &fx.member_a2] {
        let (_, notifications) = common::get(&app, "/api/notifications", &user.token).await;
        assert_eq!(notifications["meta"]["total"], 1, "user {}", user.username);
    }

    let (_, detail) = common::get(&app, &format!("/api/communications/{}", id), &fx.head_a.token).await;
    assert_eq!(detail["status"], "sent");
}

#[tokio::test]
async fn test_email_without_provider_fails_delivery() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.head_a,
        json!({
            "title": "Por email",
            "body": "Texto",
            "channel": "email",
            "recipient_user_ids": [fx.member_a.id]
        }),
    )
    .await;

    let (status, summary) =
        common::post_empty(&app, &format!("/api/communications/{}/send", id), &fx.head_a.token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["status"], "failed");
    assert_eq!(summary["failed"], 1);

    let (_, detail) = common::get(&app, &format!("/api/communications/{}", id), &fx.head_a.token).await;
    assert_eq!(detail["recipients"][0]["delivery_status"], "failed");
    assert!(detail["recipients"][0]["error"].is_string());
}

#[tokio::test]
async fn test_sender_updates_and_deletes_draft() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.member_a,
        json!({ "title": "Primeira versao", "body": "Texto", "recipient_user_ids": [fx.member_a2.id] }),
    )
    .await;
    let uri = format!("/api/communications/{}", id);

    let (status, body) = common::put_json(
        &app,
        &uri,
        json!({ "title": "Segunda versao", "body": "Texto novo", "recipient_entity_ids": [fx.health] }),
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["title"], "Segunda versao");
    assert_eq!(body["recipients"].as_array().unwrap().len(), 1);
    assert_eq!(body["recipients"][0]["entity_id"], fx.health);

    let (status, _) = common::delete(&app, &uri, &fx.member_a2.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::delete(&app, &uri, &fx.member_a.token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_mailboxes() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.head_a,
        json!({ "title": "Para o conselho", "body": "Texto", "recipient_user_ids": [fx.member_b.id] }),
    )
    .await;
    common::post_empty(&app, &format!("/api/communications/{}/send", id), &fx.head_a.token).await;
    common::create_draft(
        &app,
        &fx.head_a,
        json!({ "title": "Rascunho", "body": "Texto", "recipient_user_ids": [fx.member_a.id] }),
    )
    .await;

    let (_, sent) = common::get(&app, "/api/communications?box=sent", &fx.head_a.token).await;
    assert_eq!(sent["meta"]["total"], 2);

    let (_, drafts) = common::get(&app, "/api/communications?box=sent&status=draft", &fx.head_a.token).await;
    assert_eq!(drafts["meta"]["total"], 1);

    let (_, inbox) = common::get(&app, "/api/communications?box=inbox", &fx.member_b.token).await;
    assert_eq!(inbox["meta"]["total"], 1);
    assert_eq!(inbox["data"][0]["title"], "Para o conselho");

    let (_, member_inbox) = common::get(&app, "/api/communications?box=inbox", &fx.member_a.token).await;
    assert_eq!(member_inbox["meta"]["total"], 0);
}

#[tokio::test]
async fn test_mark_read_marks_recipient_and_notification() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.head_a,
        json!({ "title": "Leitura", "body": "Texto", "recipient_user_ids": [fx.member_a.id] }),
    )
    .await;
    common::post_empty(&app, &format!("/api/communications/{}/send", id), &fx.head_a.token).await;

    let read_uri = format!("/api/communications/{}/read", id);
    let (status, _) = common::post_empty(&app, &read_uri, &fx.member_a.token).await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = common::get(&app, &format!("/api/communications/{}", id), &fx.head_a.token).await;
    assert!(detail["recipients"][0]["read_at"].is_string());

    let (_, unread) = common::get(&app, "/api/notifications?unread=true", &fx.member_a.token).await;
    assert_eq!(unread["meta"]["total"], 0);

    // The sender is not a recipient.
    let (status, _) = common::post_empty(&app, &read_uri, &fx.head_a.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notifications_read_individually_and_in_bulk() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    for title in ["Um", "Dois", "Tres"] {
        let id = common::create_draft(
            &app,
            &fx.head_a,
            json!({ "title": title, "body": "Texto", "recipient_user_ids": [fx.member_a.id] }),
        )
        .await;
        common::post_empty(&app, &format!("/api/communications/{}/send", id), &fx.head_a.token).await;
    }

    let (_, list) = common::get(&app, "/api/notifications", &fx.member_a.token).await;
    assert_eq!(list["meta"]["total"], 3);
    let first = list["data"][0]["id"].as_i64().unwrap();

    let (status, _) =
        common::post_empty(&app, &format!("/api/notifications/{}/read", first), &fx.member_a2.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) =
        common::post_empty(&app, &format!("/api/notifications/{}/read", first), &fx.member_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["read"], true);

    let (status, body) = common::post_empty(&app, "/api/notifications/read-all", &fx.member_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "2 notification(s) marked as read");
}

#[tokio::test]
async fn test_attachments_require_storage_flag() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let id = common::create_draft(
        &app,
        &fx.head_a,
        json!({ "title": "Com anexo", "body": "Texto", "recipient_user_ids": [fx.member_a.id] }),
    )
    .await;

    let (status, body) = common::post_json(
        &app,
        &format!("/api/communications/{}/attachments", id),
        json!({ "file_name": "ata.pdf", "content_type": "application/pdf", "size_bytes": 2048 }),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Attachments are disabled");

    let (status, list) =
        common::get(&app, &format!("/api/communications/{}/attachments", id), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 0);
}
