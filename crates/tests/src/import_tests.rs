use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common;

#[tokio::test]
async fn test_entity_import_skips_existing_names() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let csv = "nome;sigla;email\n\
               Secretaria de Obras;SEOB;obras@gov.test\n\
               SECRETARIA DE SAUDE;SS;\n\
               Secretaria de Obras;SEOB;\n";
    let (status, report) = common::post_csv(&app, "/api/import/entities", csv, &fx.master.token).await;

    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["created"], 1);
    assert_eq!(report["skipped"], 2);
    assert_eq!(report["errors"].as_array().unwrap().len(), 0);
    assert_eq!(report["credentials"].as_array().unwrap().len(), 0);

    let (_, entities) = common::get(&app, "/api/entities", &fx.master.token).await;
    assert_eq!(entities["meta"]["total"], 3);
}

#[tokio::test]
async fn test_entity_import_creates_heads_with_credentials() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let csv = "name,responsible,email\nOuvidoria Geral,Joana Prado,ouvidoria@gov.test\n";
    let (status, report) = common::post_csv(
        &app,
        "/api/import/entities?create_heads=true",
        csv,
        &fx.master.token,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["created"], 1);
    let credential = &report["credentials"][0];
    assert_eq!(credential["username"], "joana.prado");
    assert_eq!(credential["display_name"], "Joana Prado");

    let (status, login) = common::post_json_anonymous(
        &app,
        "/api/auth/login",
        json!({ "login": "joana.prado", "password": credential["password"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user"]["role"], "entity_head");
    assert_eq!(login["user"]["entity_id"], credential["entity_id"]);
}

#[tokio::test]
async fn test_entity_import_reports_invalid_rows() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let csv = "name,email\nProcuradoria,not-an-email\n,vazio@gov.test\nControladoria,\n";
    let (status, report) = common::post_csv(&app, "/api/import/entities", csv, &fx.master.token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["created"], 1);
    let errors = report["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["line"], 2);
    assert_eq!(errors[1]["line"], 3);
}

#[tokio::test]
async fn test_entity_import_is_master_only() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) =
        common::post_csv(&app, "/api/import/entities", "name\nNova\n", &fx.head_a.token).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_import_without_name_column_or_body_is_400() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_csv(&app, "/api/import/entities", "   ", &fx.master.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        common::post_csv(&app, "/api/import/entities", "sigla\nSS\n", &fx.master.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_head_imports_members_but_not_heads() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let csv = "nome;email;papel\n\
               João Conceição;joao@gov.test;membro\n\
               Chefe Novo;chefe@gov.test;chefe\n\
               Repetido;member.a@gov.test;\n";
    let (status, report) = common::post_csv(
        &app,
        &format!("/api/import/entities/{}/users", fx.health),
        csv,
        &fx.head_a.token,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["created"], 1);
    assert_eq!(report["skipped"], 1);
    assert_eq!(report["errors"][0]["line"], 3);
    assert_eq!(report["credentials"][0]["username"], "joao.conceicao");
    assert_eq!(report["credentials"][0]["entity_id"], fx.health);

    let (_, users) = common::get(&app, &format!("/api/entities/{}/users", fx.health), &fx.head_a.token).await;
    assert_eq!(users.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_user_import_suffixes_taken_usernames() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let csv = "name,role\nAna Lima,head\nAna Maria Lima,member\n";
    let (status, report) = common::post_csv(
        &app,
        &format!("/api/import/entities/{}/users", fx.council),
        csv,
        &fx.master.token,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["created"], 2);
    assert_eq!(report["credentials"][0]["username"], "ana.lima");
    assert_eq!(report["credentials"][1]["username"], "ana.lima2");
}

#[tokio::test]
async fn test_user_import_into_other_entity_is_forbidden() {
    let (app, _pool, fx, _guard) = common::test_app().await;

    let (status, _) = common::post_csv(
        &app,
        &format!("/api/import/entities/{}/users", fx.council),
        "name\nAlguem\n",
        &fx.head_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::post_csv(
        &app,
        &format!("/api/import/entities/{}/users", fx.health),
        "name\nAlguem\n",
        &fx.member_a.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
