/// API routes and handlers
pub mod admin_auth;
pub mod audit;
pub mod returns;

use crate::{context::AppContext, csrf::with_csrf_protection, rate_limit::rate_limit_middleware};
use axum::{middleware, Router};

/// Build API routes
///
/// Admin routes sit behind the CSRF check and the admin rate limit; the
/// storefront routes do not.
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    let protected = Router::new()
        .merge(admin_auth::routes())
        .merge(audit::routes())
        .layer(middleware::from_fn_with_state(
            ctx.csrf.clone(),
            with_csrf_protection,
        ))
        .layer(middleware::from_fn_with_state(
            ctx.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(returns::routes())
}
