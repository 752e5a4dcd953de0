/// CSRF protection for state-changing admin requests
///
/// Tokens are stateless: `nonce.mac`, where the MAC is HMAC-SHA256 over the
/// caller's session binding and the nonce. A token minted for one session is
/// useless with any other.
use crate::{
    auth::session::SessionCredentials,
    error::{AppError, AppResult},
    metrics,
    request::RequestContext,
};
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the anti-forgery token
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Nonce length in bytes
const CSRF_NONCE_LENGTH: usize = 16;

/// Binding used when no session is present (e.g. logout without a session)
const ANONYMOUS_BINDING: &str = "anonymous";

/// Check if request requires CSRF validation
pub fn requires_csrf_validation(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    )
}

/// Issues and verifies session-bound CSRF tokens
pub struct CsrfProtector {
    secret: Vec<u8>,
}

impl CsrfProtector {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    fn binding(credentials: Option<&SessionCredentials>) -> String {
        credentials
            .map(SessionCredentials::token_hash)
            .unwrap_or_else(|| ANONYMOUS_BINDING.to_string())
    }

    fn mac(&self, binding: &str, nonce: &[u8]) -> AppResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid CSRF key: {}", e)))?;
        mac.update(binding.as_bytes());
        mac.update(b":");
        mac.update(nonce);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Mint a token bound to the given session (or to "no session")
    pub fn issue_token(&self, credentials: Option<&SessionCredentials>) -> AppResult<String> {
        let mut nonce = [0u8; CSRF_NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mac = self.mac(&Self::binding(credentials), &nonce)?;
        Ok(format!("{}.{}", hex::encode(nonce), hex::encode(mac)))
    }

    /// Verify a presented token against the request's session
    pub fn verify_token(
        &self,
        token: &str,
        credentials: Option<&SessionCredentials>,
    ) -> AppResult<()> {
        let (nonce_hex, mac_hex) = token
            .split_once('.')
            .ok_or_else(|| AppError::CsrfInvalid("malformed token".to_string()))?;

        let nonce = hex::decode(nonce_hex)
            .map_err(|_| AppError::CsrfInvalid("malformed nonce".to_string()))?;
        if nonce.len() != CSRF_NONCE_LENGTH {
            return Err(AppError::CsrfInvalid("malformed nonce".to_string()));
        }
        let presented = hex::decode(mac_hex)
            .map_err(|_| AppError::CsrfInvalid("malformed mac".to_string()))?;

        let expected = self.mac(&Self::binding(credentials), &nonce)?;
        if expected.as_slice().ct_eq(presented.as_slice()).into() {
            Ok(())
        } else {
            Err(AppError::CsrfInvalid("token does not match session".to_string()))
        }
    }

    /// Full check for a request: method filter, header extraction, verification
    pub fn validate_request(
        &self,
        method: &Method,
        headers: &axum::http::HeaderMap,
    ) -> AppResult<()> {
        if !requires_csrf_validation(method) {
            return Ok(());
        }

        let token = headers
            .get(CSRF_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::CsrfInvalid("token missing".to_string()))?;

        let credentials = SessionCredentials::from_headers(headers);
        self.verify_token(token, credentials.as_ref())
    }
}

/// CSRF middleware: rejects mutating requests without a valid token before
/// the wrapped handler runs. Other methods pass through untouched.
pub async fn with_csrf_protection(
    State(csrf): State<Arc<CsrfProtector>>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(e) = csrf.validate_request(request.method(), request.headers()) {
        let (parts, _body) = request.into_parts();
        let ctx = RequestContext::from_parts(&parts);
        metrics::record_auth_denial("csrf");
        tracing::warn!(
            request_id = %ctx.request_id,
            method = %parts.method,
            path = %parts.uri.path(),
            "CSRF validation failed"
        );
        return ctx.fail(e).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    const SECRET: &str = "csrf-secret-csrf-secret-csrf-secret";

    #[test]
    fn test_method_filter() {
        assert!(requires_csrf_validation(&Method::POST));
        assert!(requires_csrf_validation(&Method::PUT));
        assert!(requires_csrf_validation(&Method::DELETE));
        assert!(requires_csrf_validation(&Method::PATCH));
        assert!(!requires_csrf_validation(&Method::GET));
        assert!(!requires_csrf_validation(&Method::HEAD));
        assert!(!requires_csrf_validation(&Method::OPTIONS));
    }

    #[test]
    fn test_token_bound_to_session() {
        let csrf = CsrfProtector::new(SECRET);
        let alice = SessionCredentials::new("alice-session");
        let bob = SessionCredentials::new("bob-session");

        let token = csrf.issue_token(Some(&alice)).unwrap();
        assert!(csrf.verify_token(&token, Some(&alice)).is_ok());
        assert!(csrf.verify_token(&token, Some(&bob)).is_err());
        assert!(csrf.verify_token(&token, None).is_err());

        let anonymous = csrf.issue_token(None).unwrap();
        assert!(csrf.verify_token(&anonymous, None).is_ok());
        assert!(csrf.verify_token(&anonymous, Some(&alice)).is_err());
    }

    #[test]
    fn test_token_bound_to_secret() {
        let token = CsrfProtector::new(SECRET).issue_token(None).unwrap();
        let other = CsrfProtector::new("another-secret-another-secret-xx");
        assert!(other.verify_token(&token, None).is_err());
    }

    #[test]
    fn test_malformed_tokens() {
        let csrf = CsrfProtector::new(SECRET);
        for token in ["", "no-dot", "zz.zz", "00.00", "abcd.", ".abcd"] {
            assert!(
                matches!(csrf.verify_token(token, None), Err(AppError::CsrfInvalid(_))),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn test_validate_request() {
        let csrf = CsrfProtector::new(SECRET);
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer s1"));

        // Safe methods are never checked
        assert!(csrf.validate_request(&Method::GET, &headers).is_ok());
        assert!(csrf.validate_request(&Method::HEAD, &headers).is_ok());

        // Missing token
        assert!(csrf.validate_request(&Method::POST, &headers).is_err());

        let token = csrf
            .issue_token(Some(&SessionCredentials::new("s1")))
            .unwrap();
        headers.insert(CSRF_HEADER, HeaderValue::from_str(&token).unwrap());
        assert!(csrf.validate_request(&Method::DELETE, &headers).is_ok());

        headers.insert("authorization", HeaderValue::from_static("Bearer s2"));
        assert!(csrf.validate_request(&Method::PATCH, &headers).is_err());
    }
}
