use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    middleware,
    Router,
};
use comunigov_server::auth::jwt::{create_access_token, TokenSubject};
use comunigov_server::db::AppState;
use serde_json::Value;
use sqlx::{Pool, Postgres};
use tokio::sync::Mutex;
use tower::ServiceExt;

/// Global mutex ensuring tests run sequentially against the shared database.
/// Each test acquires this lock before truncating and seeding.
static TEST_MUTEX: std::sync::LazyLock<Mutex<()>> = std::sync::LazyLock::new(|| Mutex::new(()));

/// Password shared by every seeded account.
pub const TEST_PASSWORD: &str = "correct-horse-42";

/// Argon2 is slow in debug builds, so the hash is computed once per process.
static PASSWORD_HASH: std::sync::LazyLock<String> = std::sync::LazyLock::new(|| {
    comunigov_server::auth::password::hash_password(TEST_PASSWORD)
        .expect("Failed to hash test password")
});

const SEEDED_BADGES: &str = "'first_task', 'task_runner', 'task_master', 'first_meeting', \
     'committed', 'communicator', 'first_hearing', 'open_government'";

/// A seeded account with a ready-to-use access token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub entity_id: Option<i64>,
    pub token: String,
}

/// Two entities with a head and members each, plus one master.
///
/// - `health`: `head_a`, `member_a`, `member_a2`
/// - `council`: `head_b`, `member_b`
#[derive(Debug, Clone)]
pub struct Fixture {
    pub health: i64,
    pub council: i64,
    pub master: TestUser,
    pub head_a: TestUser,
    pub member_a: TestUser,
    pub member_a2: TestUser,
    pub head_b: TestUser,
    pub member_b: TestUser,
}

/// Build a test router backed by a real Postgres pool.
/// Acquires a global lock, truncates all tables and seeds the [`Fixture`].
/// The returned `MutexGuard` must be held for the duration of the test.
pub async fn test_app() -> (Router, Pool<Postgres>, Fixture, tokio::sync::MutexGuard<'static, ()>) {
    let guard = TEST_MUTEX.lock().await;

    let _ = dotenvy::dotenv();
    if std::env::var("JWT_SECRET").map(|s| s.is_empty()).unwrap_or(true) {
        std::env::set_var("JWT_SECRET", "integration-test-secret");
    }

    let database_url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("TEST_DATABASE_URL or DATABASE_URL must be set for tests");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query(
        "TRUNCATE notifications, communication_attachments, communication_recipients, communications, \
         user_achievements, public_hearings, tasks, meeting_participants, meetings, subjects, \
         refresh_tokens, users, entities RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to truncate");

    sqlx::query(&format!("DELETE FROM achievements WHERE code NOT IN ({})", SEEDED_BADGES))
        .execute(&pool)
        .await
        .expect("Failed to reset badges");

    let fixture = seed(&pool).await;

    let state = AppState::new(pool.clone());
    // The permissive auth middleware attaches claims when a Bearer token is present.
    let router = comunigov_server::rest::api_router()
        .layer(middleware::from_fn(comunigov_server::auth::middleware::auth_middleware))
        .with_state(state);

    (router, pool, fixture, guard)
}

/// Insert an entity and return its id.
pub async fn seed_entity(pool: &Pool<Postgres>, name: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO entities (name, entity_type, email) VALUES ($1, 'secretariat', $2) RETURNING id",
    )
    .bind(name)
    .bind(format!("{}@gov.test", name.to_lowercase().replace(' ', ".")))
    .fetch_one(pool)
    .await
    .expect("Failed to seed entity")
}

/// Insert a user and mint an access token for it.
pub async fn seed_user(
    pool: &Pool<Postgres>,
    username: &str,
    role: &str,
    entity_id: Option<i64>,
) -> TestUser {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, email, password_hash, display_name, role, entity_id) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(username)
    .bind(format!("{}@gov.test", username))
    .bind(PASSWORD_HASH.as_str())
    .bind(username.replace('.', " "))
    .bind(role)
    .bind(entity_id)
    .fetch_one(pool)
    .await
    .expect("Failed to seed user");

    TestUser {
        id,
        username: username.to_string(),
        entity_id,
        token: token_for(id, username, role, entity_id),
    }
}

/// Mint an access token without touching the database.
pub fn token_for(user_id: i64, username: &str, role: &str, entity_id: Option<i64>) -> String {
    create_access_token(&TokenSubject {
        user_id,
        username: username.to_string(),
        role: role.to_string(),
        entity_id,
    })
    .expect("Failed to create test JWT")
}

async fn seed(pool: &Pool<Postgres>) -> Fixture {
    let health = seed_entity(pool, "Secretaria de Saude").await;
    let council = seed_entity(pool, "Conselho Municipal").await;

    Fixture {
        health,
        council,
        master: seed_user(pool, "master", "master_implementer", None).await,
        head_a: seed_user(pool, "head.a", "entity_head", Some(health)).await,
        member_a: seed_user(pool, "member.a", "entity_member", Some(health)).await,
        member_a2: seed_user(pool, "member.a2", "entity_member", Some(health)).await,
        head_b: seed_user(pool, "head.b", "entity_head", Some(council)).await,
        member_b: seed_user(pool, "member.b", "entity_member", Some(council)).await,
    }
}

/// GET a route with a Bearer token.
pub async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, Some(token), None).await
}

/// GET a route without credentials.
pub async fn get_anonymous(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None, None).await
}

/// POST JSON with a Bearer token.
pub async fn post_json(app: &Router, uri: &str, body: Value, token: &str) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

/// POST JSON without credentials (login, refresh).
pub async fn post_json_anonymous(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, None, Some(body)).await
}

/// POST with no body and a Bearer token (state transitions).
pub async fn post_empty(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(token), None).await
}

/// PUT JSON with a Bearer token.
pub async fn put_json(app: &Router, uri: &str, body: Value, token: &str) -> (StatusCode, Value) {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

/// PATCH JSON with a Bearer token.
pub async fn patch_json(app: &Router, uri: &str, body: Value, token: &str) -> (StatusCode, Value) {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

/// DELETE a route with a Bearer token.
pub async fn delete(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// POST a CSV document with a Bearer token.
pub async fn post_csv(app: &Router, uri: &str, csv: &str, token: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "text/csv")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(csv.to_string()))
        .unwrap();

    dispatch(app, req).await
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    dispatch(app, req).await
}

/// Send a request through the router and parse the response.
async fn dispatch(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(req)
        .await
        .expect("Failed to send request");

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");

    let body: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&body_bytes).to_string(),
        ))
    };

    (status, body)
}

/// Create a system-channel communication as `sender` and return its id.
pub async fn create_draft(app: &Router, sender: &TestUser, body: Value) -> i64 {
    let (status, created) = post_json(app, "/api/communications", body, &sender.token).await;
    assert_eq!(status, StatusCode::CREATED, "create draft failed: {}", created);
    created["id"].as_i64().expect("communication id")
}

/// Create a task and return its id.
pub async fn create_task(app: &Router, creator: &TestUser, body: Value) -> i64 {
    let (status, created) = post_json(app, "/api/tasks", body, &creator.token).await;
    assert_eq!(status, StatusCode::CREATED, "create task failed: {}", created);
    created["id"].as_i64().expect("task id")
}
