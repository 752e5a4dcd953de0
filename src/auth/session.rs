/// Server-side admin sessions
use crate::{
    error::{AppError, AppResult},
    request::RequestContext,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::fmt;
use uuid::Uuid;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "admin_session";

/// Session token length in bytes before encoding
const SESSION_TOKEN_BYTES: usize = 32;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// SHA-256 of a session token, hex encoded. Only this form is stored.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn timestamp(at: DateTime<Utc>) -> String {
    // Fixed width so stored values compare lexically
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The session token a request presented, passed explicitly into guards
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    token: String,
}

impl SessionCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Bearer header first, then the session cookie
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        if let Some(token) = extract_bearer_token(headers) {
            return Some(Self::new(token));
        }

        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }

    pub fn token_hash(&self) -> String {
        hash_token(&self.token)
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionCredentials
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        SessionCredentials::from_headers(&parts.headers).ok_or(AppError::Unauthenticated)
    }
}

/// Stored session record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub id: String,
    pub admin_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Session store: creation, lookup and sign-out
#[derive(Clone)]
pub struct SessionManager {
    db: SqlitePool,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(db: SqlitePool, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Generate a cryptographically secure session token
    fn generate_token() -> String {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Open a session for an admin, returning the token to hand to the client
    pub async fn create_session(
        &self,
        admin_id: &str,
        request: &RequestContext,
    ) -> AppResult<(SessionCredentials, AdminSession)> {
        let credentials = SessionCredentials::new(Self::generate_token());
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + self.ttl;

        sqlx::query(
            r#"
            INSERT INTO admin_sessions (id, token_hash, admin_id, created_at, expires_at, ip_address, user_agent)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(credentials.token_hash())
        .bind(admin_id)
        .bind(timestamp(now))
        .bind(timestamp(expires_at))
        .bind(&request.ip_address)
        .bind(&request.user_agent)
        .execute(&self.db)
        .await?;

        Ok((
            credentials,
            AdminSession {
                id,
                admin_id: admin_id.to_string(),
                created_at: now,
                expires_at,
            },
        ))
    }

    /// Look up the unexpired session for presented credentials
    pub async fn get_session(
        &self,
        credentials: &SessionCredentials,
    ) -> AppResult<Option<AdminSession>> {
        let row = sqlx::query(
            "SELECT id, admin_id, created_at, expires_at FROM admin_sessions WHERE token_hash = ?1",
        )
        .bind(credentials.token_hash())
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let parse = |column: &str| -> AppResult<DateTime<Utc>> {
            let value: String = row.get(column);
            DateTime::parse_from_rfc3339(&value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| AppError::Internal(format!("Invalid {}: {}", column, e)))
        };

        let session = AdminSession {
            id: row.get("id"),
            admin_id: row.get("admin_id"),
            created_at: parse("created_at")?,
            expires_at: parse("expires_at")?,
        };

        // Expired rows are left for `cleanup_expired`
        if session.expires_at <= Utc::now() {
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Invalidate the session behind the credentials. Returns whether one existed.
    pub async fn sign_out(&self, credentials: &SessionCredentials) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE token_hash = ?1")
            .bind(credentials.token_hash())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete expired sessions
    pub async fn cleanup_expired(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE expires_at <= ?1")
            .bind(timestamp(Utc::now()))
            .execute(&self.db)
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::info!(deleted, "Cleaned up expired admin sessions");
        }
        Ok(deleted)
    }
}
