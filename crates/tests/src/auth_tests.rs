use axum::http::StatusCode;
use serde_json::json;

use crate::common;

#[tokio::test]
async fn test_login_with_username_returns_tokens() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": fx.head_a.username, "password": common::TEST_PASSWORD }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], fx.head_a.id);
    assert_eq!(body["user"]["role"], "entity_head");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_login_with_email_is_case_insensitive() {
    let (app, _pool, _fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": "MEMBER.A@gov.test", "password": common::TEST_PASSWORD }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["user"]["username"], "member.a");
}

/// Sets `MASTER_EMAIL` for one test and clears it even if the test fails.
struct MasterEmail;

impl MasterEmail {
    fn set(email: &str) -> Self {
        std::env::set_var("MASTER_EMAIL", email);
        MasterEmail
    }
}

impl Drop for MasterEmail {
    fn drop(&mut self) {
        std::env::remove_var("MASTER_EMAIL");
    }
}

#[tokio::test]
async fn test_login_promotes_master_email() {
    let (app, _pool, fx, _guard) = common::test_app().await;
    let _master_email = MasterEmail::set("Member.A@gov.test");

    let (status, body) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": fx.member_a.username, "password": common::TEST_PASSWORD }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["user"]["id"], fx.member_a.id);
    assert_eq!(body["user"]["role"], "master_implementer");
}

#[tokio::test]
async fn test_login_wrong_password_returns_401() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": fx.member_a.username, "password": "not-the-password" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid login or password");
}

#[tokio::test]
async fn test_login_unknown_user_returns_same_401() {
    let (app, _pool, _fx, _guard) = common::test_app().await;

    let (status, body) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": "nobody", "password": common::TEST_PASSWORD }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid login or password");
}

#[tokio::test]
async fn test_login_deactivated_account_returns_403() {
    let (app, pool, fx, _guard) = common::test_app().await;
    sqlx::query("UPDATE users SET active = FALSE WHERE id = $1")
        .bind(fx.member_b.id)
        .execute(&pool)
        .await
        .unwrap();

    let (status, _) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": fx.member_b.username, "password": common::TEST_PASSWORD }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_refresh_rotates_and_revokes_old_token() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (_, login) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": fx.member_a.username, "password": common::TEST_PASSWORD }),
    )
    .await;
    let first = login["refresh_token"].as_str().unwrap().to_string();

    let (status, rotated) = common::post_json_anonymous(
        &app,
        "/api/auth/refresh",
        json!({ "refresh_token": first }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refresh_token"].as_str().unwrap(), first);

    let (status, _) = common::post_json_anonymous(
        &app,
        "/api/auth/refresh",
        json!({ "refresh_token": first }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_token_is_not_a_refresh_token() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_json_anonymous(
        &app,
        "/api/auth/refresh",
        json!({ "refresh_token": fx.member_a.token }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_refresh_tokens() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (_, login) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": fx.head_b.username, "password": common::TEST_PASSWORD }),
    )
    .await;
    let refresh = login["refresh_token"].as_str().unwrap().to_string();
    let access = login["access_token"].as_str().unwrap().to_string();

    let (status, _) = common::post_empty(&app, "/api/auth/logout", &access).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = common::post_json_anonymous(
        &app,
        "/api/auth/refresh",
        json!({ "refresh_token": refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_requires_authentication() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::get_anonymous(&app, "/api/auth/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = common::get(&app, "/api/auth/me", &fx.member_a.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], fx.member_a.id);
    assert_eq!(body["entity_id"], fx.health);
}

#[tokio::test]
async fn test_garbage_bearer_token_is_unauthenticated() {
    let (app, _pool, _fx, _guard) = common::test_app().await;

    let (status, _) = common::get(&app, "/api/auth/me", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_checks_current_password() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::put_json(
        &app,
        "/api/auth/password",
        json!({ "current_password": "wrong-password", "new_password": "brand-new-pass" }),
        &fx.member_a2.token,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = common::put_json(
        &app,
        "/api/auth/password",
        json!({ "current_password": common::TEST_PASSWORD, "new_password": "brand-new-pass" }),
        &fx.member_a2.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": fx.member_a2.username, "password": "brand-new-pass" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_rejects_short_password() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, body) = common::put_json(
        &app,
        "/api/auth/password",
        json!({ "current_password": common::TEST_PASSWORD, "new_password": "short" }),
        &fx.member_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["new_password"].is_string());
}
