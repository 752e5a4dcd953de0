/// Rate Limiting System
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{AppError, AppResult},
    request::RequestContext,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

const DEFAULT_LOGIN_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => unreachable!(),
};
const DEFAULT_ADMIN_RPS: NonZeroU32 = match NonZeroU32::new(50) {
    Some(n) => n,
    None => unreachable!(),
};

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    /// Login attempts, keyed by client address
    login: Arc<DefaultKeyedRateLimiter<String>>,
    /// Everything else under the admin API
    admin: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let login_quota = Quota::per_minute(
            NonZeroU32::new(config.login_per_minute).unwrap_or(DEFAULT_LOGIN_PER_MINUTE),
        );

        let admin_rps = NonZeroU32::new(config.admin_rps).unwrap_or(DEFAULT_ADMIN_RPS);
        let admin_quota = Quota::per_second(admin_rps)
            .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(admin_rps));

        Self {
            enabled: config.enabled,
            login: Arc::new(GovernorLimiter::keyed(login_quota)),
            admin: Arc::new(GovernorLimiter::direct(admin_quota)),
        }
    }

    /// Check rate limit for a login attempt from `client`
    pub fn check_login(&self, client: &str) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.login
            .check_key(&client.to_string())
            .map_err(|_| AppError::RateLimitExceeded {
                retry_after: Duration::from_secs(60),
            })
    }

    /// Drop per-client login state that has fully recovered
    pub fn prune(&self) -> usize {
        self.login.retain_recent();
        self.login.shrink_to_fit();
        self.login.len()
    }

    /// Check rate limit for the admin API
    pub fn check_admin(&self) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.admin.check().map_err(|_| AppError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }
}

/// Rate limiting middleware for the admin API
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Response {
    match ctx.rate_limiter.check_admin() {
        Ok(()) => next.run(request).await,
        Err(e) => {
            let (parts, _body) = request.into_parts();
            let request_ctx = RequestContext::from_parts(&parts);
            tracing::warn!(
                request_id = %request_ctx.request_id,
                path = %parts.uri.path(),
                "Admin API rate limit exceeded"
            );
            request_ctx.fail(e).into_response()
        }
    }
}
