/// Per-request correlation context
use crate::error::{AppError, ErrorEnvelope};
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::{convert::Infallible, net::SocketAddr};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the correlation id, inbound and outbound
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generate a fresh correlation id (`req_` followed by 32 hex digits)
pub fn generate_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

/// Inbound ids are reused only if they are short and log-safe
pub fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Request id generator for `SetRequestIdLayer`
#[derive(Clone, Default)]
pub struct MakeCorrelationId;

impl MakeRequestId for MakeCorrelationId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let request_id = generate_request_id().parse().ok()?;
        Some(RequestId::new(request_id))
    }
}

/// Client address fixed once per request by [`normalize_request`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub Option<String>);

/// Outermost middleware. Strips an unusable inbound correlation id so
/// `SetRequestIdLayer` mints a fresh one, and resolves the client address
/// according to `trust_proxy`. Everything downstream reads the same values.
pub async fn normalize_request(
    State(trust_proxy): State<bool>,
    mut request: axum::extract::Request,
    next: Next,
) -> Response {
    let usable = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .is_some_and(is_valid_request_id);
    if !usable {
        request.headers_mut().remove(REQUEST_ID_HEADER);
    }

    let addr = resolve_client_addr(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        trust_proxy,
    );
    request.extensions_mut().insert(ClientAddr(addr));

    next.run(request).await
}

/// Proxy headers are honoured only when the deployment says a proxy sets them
pub fn resolve_client_addr(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> Option<String> {
    let forwarded = if trust_proxy {
        forwarded_ip(headers)
    } else {
        None
    };
    forwarded.or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

/// Correlation id plus the client details recorded in audit entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Build from request parts, generating an id when none is usable
    pub fn from_parts(parts: &Parts) -> Self {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|id| is_valid_request_id(id))
            .map(str::to_string)
            .unwrap_or_else(generate_request_id);

        let ip_address = match parts.extensions.get::<ClientAddr>() {
            Some(ClientAddr(addr)) => addr.clone(),
            None => resolve_client_addr(
                &parts.headers,
                parts.extensions.get::<ConnectInfo<SocketAddr>>(),
                false,
            ),
        };

        let user_agent = parts
            .headers
            .get("user-agent")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        Self {
            request_id,
            ip_address,
            user_agent,
        }
    }

    /// Tag an error with this request's id
    pub fn fail(&self, error: AppError) -> ErrorEnvelope {
        error.with_request_id(self.request_id.clone())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestContext::from_parts(parts))
    }
}

/// Client address as reported by a fronting proxy
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}
