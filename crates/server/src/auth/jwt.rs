use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{User, UserRole};

/// Token type discriminator. Prevents using a refresh token as an access token.
const TOKEN_TYPE_ACCESS: &str = "access";
const TOKEN_TYPE_REFRESH: &str = "refresh";

/// JWT claims stored in access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub entity_id: Option<i64>,
    pub exp: i64,
    pub iat: i64,
    /// Unique token identifier so two tokens minted in the same second
    /// still hash differently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// "access" or "refresh".
    #[serde(default)]
    pub typ: String,
}

impl Claims {
    pub fn user_role(&self) -> UserRole {
        UserRole::from_str_or_default(&self.role)
    }
}

/// Identity fields copied into every token.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub entity_id: Option<i64>,
}

impl From<&User> for TokenSubject {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.id,
            username: u.username.clone(),
            role: u.role.clone(),
            entity_id: u.entity_id,
        }
    }
}

impl From<&Claims> for TokenSubject {
    fn from(c: &Claims) -> Self {
        Self {
            user_id: c.sub,
            username: c.username.clone(),
            role: c.role.clone(),
            entity_id: c.entity_id,
        }
    }
}

/// SHA-256 of a raw JWT as lowercase hex. Only this hash is persisted for
/// refresh tokens.
pub fn hash_token(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn jwt_secret() -> Result<Vec<u8>, jsonwebtoken::errors::Error> {
    match std::env::var("JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => Ok(secret.into_bytes()),
        _ => {
            tracing::error!("JWT_SECRET is not configured");
            Err(ErrorKind::InvalidKeyFormat.into())
        }
    }
}

pub fn access_token_expiry_minutes() -> i64 {
    crate::config::env_parse("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", 15)
}

pub fn refresh_token_expiry_days() -> i64 {
    crate::config::env_parse("JWT_REFRESH_TOKEN_EXPIRY_DAYS", 7)
}

fn issue(
    subject: &TokenSubject,
    typ: &str,
    lifetime: Duration,
) -> Result<(String, chrono::DateTime<Utc>), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expires_at = now + lifetime;
    let claims = Claims {
        sub: subject.user_id,
        username: subject.username.clone(),
        role: subject.role.clone(),
        entity_id: subject.entity_id,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        jti: Some(uuid::Uuid::new_v4().to_string()),
        typ: typ.to_string(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&jwt_secret()?),
    )?;
    Ok((token, expires_at))
}

pub fn create_access_token(subject: &TokenSubject) -> Result<String, jsonwebtoken::errors::Error> {
    issue(
        subject,
        TOKEN_TYPE_ACCESS,
        Duration::minutes(access_token_expiry_minutes()),
    )
    .map(|(token, _)| token)
}

pub fn create_refresh_token(
    subject: &TokenSubject,
) -> Result<(String, chrono::DateTime<Utc>), jsonwebtoken::errors::Error> {
    issue(
        subject,
        TOKEN_TYPE_REFRESH,
        Duration::days(refresh_token_expiry_days()),
    )
}

fn decode_claims(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(&jwt_secret()?),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Validate an access token. Rejects tokens with `typ: "refresh"`.
pub fn validate_access_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let claims = decode_claims(token)?;
    if claims.typ != TOKEN_TYPE_ACCESS {
        return Err(ErrorKind::InvalidToken.into());
    }
    Ok(claims)
}

/// Validate a refresh token. Requires `typ: "refresh"`.
pub fn validate_refresh_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let claims = decode_claims(token)?;
    if claims.typ != TOKEN_TYPE_REFRESH {
        return Err(ErrorKind::InvalidToken.into());
    }
    Ok(claims)
}
