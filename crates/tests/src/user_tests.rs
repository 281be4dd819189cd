use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common;

#[tokio::test]
async fn test_head_creates_member_with_generated_password() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json(
        &app,
        "/api/users",
        json!({ "username": "carla.dias", "display_name": "Carla Dias" }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["user"]["role"], "entity_member");
    assert_eq!(body["user"]["entity_id"], fx.health);
    let generated = body["generated_password"].as_str().unwrap();
    assert!(generated.len() >= 8);

    let (status, _) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": "carla.dias", "password": generated }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_head_cannot_create_heads() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/users",
        json!({ "username": "outro.chefe", "display_name": "Outro", "role": "entity_head" }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_head_cannot_create_users_in_other_entity() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/users",
        json!({ "username": "intruso", "display_name": "Intruso", "entity_id": fx.council }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_member_cannot_create_users() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/users",
        json!({ "username": "novo.membro", "display_name": "Novo" }),
        &fx.member_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_master_head_requires_entity() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json(
        &app,
        "/api/users",
        json!({
            "username": "chefe.sem.entidade",
            "display_name": "Chefe",
            "role": "entity_head",
            "password": "long-enough-password"
        }),
        &fx.master.token,
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["entity_id"].is_string());
}

#[tokio::test]
async fn test_duplicate_username_is_conflict() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/users",
        json!({ "username": "member.a", "display_name": "Copia", "password": "long-enough-password" }),
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_user_list_is_scoped_by_role() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (_, all) = common::get(&app, "/api/users", &fx.master.token).await;
    assert_eq!(all["meta"]["total"], 6);

    let (_, entity) = common::get(&app, "/api/users", &fx.head_a.token).await;
    assert_eq!(entity["meta"]["total"], 3);

    let (_, own) = common::get(&app, "/api/users", &fx.member_b.token).await;
    assert_eq!(own["meta"]["total"], 1);
    assert_eq!(own["data"][0]["id"], fx.member_b.id);
}

#[tokio::test]
async fn test_member_cannot_view_colleague_profile() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let uri = format!("/api/users/{}", fx.member_a2.id);
    let (status, _) = common::get(&app, &uri, &fx.member_a.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::get(&app, &uri, &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_user_updates_own_profile() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let uri = format!("/api/users/{}", fx.member_a.id);
    let (status, body) = common::put_json(
        &app,
        &uri,
        json!({ "display_name": "Membro A", "whatsapp": "+5511999990000" }),
        &fx.member_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["display_name"], "Membro A");
    assert_eq!(body["whatsapp"], "+5511999990000");
}

#[tokio::test]
async fn test_cannot_delete_own_account() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let uri = format!("/api/users/{}", fx.head_a.id);
    let (status, _) = common::delete(&app, &uri, &fx.head_a.token).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_head_deletes_member_of_own_entity() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::delete(
        &app,
        &format!("/api/users/{}", fx.member_b.id),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::delete(
        &app,
        &format!("/api/users/{}", fx.member_a2.id),
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_master_promotes_member_to_head() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let uri = format!("/api/users/{}/role", fx.member_b.id);
    let (status, body) = common::put_json(
        &app,
        &uri,
        json!({ "role": "entity_head", "entity_id": fx.council }),
        &fx.master.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "entity_head");

    let (status, _) = common::put_json(
        &app,
        &uri,
        json!({ "role": "entity_member", "entity_id": fx.council }),
        &fx.head_b.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_master_cannot_change_own_role() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let uri = format!("/api/users/{}/role", fx.master.id);
    let (status, _) = common::put_json(
        &app,
        &uri,
        json!({ "role": "entity_member", "entity_id": fx.health }),
        &fx.master.token,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deactivated_user_cannot_log_in() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let uri = format!("/api/users/{}/active", fx.member_a.id);
    let (status, body) = common::put_json(&app, &uri, json!({ "active": false }), &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    let (status, _) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": fx.member_a.username, "password": common::TEST_PASSWORD }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_head_resets_member_password() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let uri = format!("/api/users/{}/reset-password", fx.member_a2.id);
    let (status, body) = common::post_empty(&app, &uri, &fx.head_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "member.a2");
    let password = body["password"].as_str().unwrap().to_string();

    let (status, _) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": "member.a2", "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": "member.a2", "password": common::TEST_PASSWORD }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
