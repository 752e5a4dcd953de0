/// Unified error types and the JSON error envelope
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::REQUEST_ID_HEADER;

/// Main error type for the back office
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No session, or the session does not belong to an active admin
    #[error("Authentication required")]
    Unauthenticated,

    /// Login attempt with an unknown email or a wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Authenticated, but the role is below what the operation needs
    #[error("Not authorized: {0}")]
    Forbidden(String),

    /// Missing or incorrect anti-forgery token on a mutating request
    #[error("CSRF validation failed: {0}")]
    CsrfInvalid(String),

    /// Session or persistent store unavailable
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate admin email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation errors; the message is shown to the client
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client-facing message for authentication failures
pub const MSG_UNAUTHENTICATED: &str = "未授權，請先登入";
/// Client-facing message for insufficient role
pub const MSG_FORBIDDEN: &str = "權限不足";
/// Client-facing message for CSRF rejections
pub const MSG_CSRF_INVALID: &str = "CSRF 驗證失敗";
/// Client-facing message for failed logins
pub const MSG_INVALID_CREDENTIALS: &str = "帳號或密碼錯誤";
/// Client-facing message for anything whose details must stay server-side
pub const MSG_INTERNAL: &str = "伺服器內部錯誤";

impl AppError {
    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::CsrfInvalid(_) => StatusCode::FORBIDDEN,
            AppError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Internal(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the client
    pub fn client_message(&self) -> String {
        match self {
            AppError::Unauthenticated => MSG_UNAUTHENTICATED.to_string(),
            AppError::InvalidCredentials => MSG_INVALID_CREDENTIALS.to_string(),
            AppError::Forbidden(_) => MSG_FORBIDDEN.to_string(),
            AppError::CsrfInvalid(_) => MSG_CSRF_INVALID.to_string(),
            AppError::Upstream(_) => "服務暫時無法使用".to_string(),
            AppError::NotFound(_) => "找不到資源".to_string(),
            AppError::Conflict(_) => "資料衝突".to_string(),
            AppError::Validation(message) => message.clone(),
            AppError::RateLimitExceeded { .. } => "請求過於頻繁，請稍後再試".to_string(),
            // Don't leak details
            AppError::Database(_) | AppError::Internal(_) | AppError::Io(_) => {
                MSG_INTERNAL.to_string()
            }
        }
    }

    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Unauthenticated => "unauthenticated",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Forbidden(_) => "forbidden",
            AppError::CsrfInvalid(_) => "csrf_invalid",
            AppError::Upstream(_) => "upstream",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Validation(_) => "validation",
            AppError::RateLimitExceeded { .. } => "rate_limited",
            AppError::Internal(_) => "internal",
            AppError::Io(_) => "io",
        }
    }

    /// Attach a request id, producing the envelope handlers return
    pub fn with_request_id(self, request_id: impl Into<String>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self,
            request_id: request_id.into(),
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::RateLimitExceeded { retry_after } => Some(retry_after.as_secs().max(1)),
            _ => None,
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Convert AppError to HTTP response without a correlation id
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = self.retry_after();
        let body = Json(ErrorBody {
            error: self.client_message(),
            request_id: None,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// An error tagged with the request id it occurred under.
///
/// Rendering logs the full error against the id, then emits
/// `{ "error": ..., "requestId": ... }` with the id echoed in `x-request-id`.
#[derive(Debug)]
pub struct ErrorEnvelope {
    pub error: AppError,
    pub request_id: String,
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let ErrorEnvelope { error, request_id } = self;
        let status = error.status();

        if status.is_server_error() {
            tracing::error!(request_id = %request_id, kind = error.kind(), error = %error, "Request failed");
        } else {
            tracing::warn!(request_id = %request_id, kind = error.kind(), error = %error, "Request rejected");
        }

        let retry_after = error.retry_after();
        let body = Json(ErrorBody {
            error: error.client_message(),
            request_id: Some(request_id.clone()),
        });

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert(REQUEST_ID_HEADER, value);
        }
        if let Some(secs) = retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Build the error response for a failure under the given request id
pub fn create_error_response(error: AppError, request_id: &str) -> Response {
    error.with_request_id(request_id).into_response()
}

/// Result type alias for back-office operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("editor < superadmin".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::CsrfInvalid("missing".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let err = AppError::Internal("connection string postgres://secret".into());
        assert_eq!(err.client_message(), MSG_INTERNAL);

        let err = AppError::Database(sqlx::Error::PoolClosed);
        assert_eq!(err.client_message(), MSG_INTERNAL);
    }

    #[tokio::test]
    async fn test_envelope_carries_request_id() {
        let response = create_error_response(AppError::Unauthenticated, "req_abc123");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            "req_abc123"
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], MSG_UNAUTHENTICATED);
        assert_eq!(body["requestId"], "req_abc123");
    }

    #[tokio::test]
    async fn test_plain_error_has_no_request_id() {
        let response = AppError::Forbidden("x".into()).into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "權限不足" }));
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = AppError::RateLimitExceeded {
            retry_after: std::time::Duration::from_secs(30),
        }
        .into_response();
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "30");
    }
}
