/// Route guards for the admin API
use crate::{
    admin::{has_permission, AdminUser, Role},
    auth::{resolver::check_admin_auth, session::SessionCredentials},
    context::AppContext,
    error::{AppError, AppResult, ErrorEnvelope},
    metrics,
    request::RequestContext,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Require an active admin session.
///
/// `Err(Unauthenticated)` (401) when no admin can be resolved, otherwise the admin.
pub async fn require_admin(
    ctx: &AppContext,
    credentials: Option<&SessionCredentials>,
) -> AppResult<AdminUser> {
    match check_admin_auth(&ctx.sessions, &ctx.directory, credentials).await {
        Some(admin) => Ok(admin),
        None => {
            metrics::record_auth_denial("unauthenticated");
            Err(AppError::Unauthenticated)
        }
    }
}

/// Check an already resolved admin against a required role
pub fn ensure_role(admin: &AdminUser, required: Role) -> AppResult<()> {
    if has_permission(admin, required) {
        return Ok(());
    }

    metrics::record_auth_denial("forbidden");
    tracing::warn!(
        admin_id = %admin.id,
        role = %admin.role,
        required = %required,
        "Admin role below requirement"
    );
    Err(AppError::Forbidden(format!(
        "{} holds {}, requires {} or higher",
        admin.id, admin.role, required
    )))
}

/// Require an active admin session holding at least `required`.
///
/// 401 without a session, 403 when the role is insufficient.
pub async fn require_admin_role(
    ctx: &AppContext,
    credentials: Option<&SessionCredentials>,
    required: Role,
) -> AppResult<AdminUser> {
    let admin = require_admin(ctx, credentials).await?;
    ensure_role(&admin, required)?;
    Ok(admin)
}

/// Admin authentication context - requires an active admin session
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub admin: AdminUser,
    pub credentials: SessionCredentials,
    pub request: RequestContext,
}

impl AdminAuthContext {
    /// Role check whose failure is already tagged with the request id
    pub fn require_role(&self, required: Role) -> Result<(), ErrorEnvelope> {
        ensure_role(&self.admin, required).map_err(|e| self.request.fail(e))
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = ErrorEnvelope;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let request = RequestContext::from_parts(parts);
        let credentials = SessionCredentials::from_headers(&parts.headers);

        let admin = require_admin(state, credentials.as_ref())
            .await
            .map_err(|e| request.fail(e))?;

        tracing::debug!(
            request_id = %request.request_id,
            admin_id = %admin.id,
            role = %admin.role,
            "Admin authenticated"
        );

        Ok(AdminAuthContext {
            admin,
            // A resolved admin implies credentials were presented
            credentials: credentials.ok_or_else(|| request.fail(AppError::Unauthenticated))?,
            request,
        })
    }
}

/// Macro to require specific admin role
/// Usage: require_admin_role!(auth, Role::SuperAdmin);
#[macro_export]
macro_rules! require_admin_role {
    ($auth:expr, $required:expr) => {
        if let Err(e) = $auth.require_role($required) {
            return Err(e.into());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    const SECRET: &str = "test-secret-test-secret-test-secret";

    async fn context() -> AppContext {
        AppContext::new(ServerConfig::in_memory(SECRET)).await.unwrap()
    }

    async fn login_as(ctx: &AppContext, email: &str, role: Role) -> SessionCredentials {
        let admin = ctx
            .directory
            .provision(email, "Staff", role, "riesling-spatlese")
            .await
            .unwrap();
        let request = RequestContext {
            request_id: "req_guard".to_string(),
            ip_address: None,
            user_agent: None,
        };
        ctx.sessions.create_session(&admin.id, &request).await.unwrap().0
    }

    #[tokio::test]
    async fn test_require_admin_without_session() {
        let ctx = context().await;
        let err = require_admin(&ctx, None).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));

        let forged = SessionCredentials::new("forged");
        let err = require_admin(&ctx, Some(&forged)).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_require_admin_role_outcomes() {
        let ctx = context().await;
        let editor = login_as(&ctx, "editor@example.com", Role::Editor).await;

        // Authorized
        let admin = require_admin_role(&ctx, Some(&editor), Role::Viewer)
            .await
            .unwrap();
        assert_eq!(admin.role, Role::Editor);
        assert!(require_admin_role(&ctx, Some(&editor), Role::Editor)
            .await
            .is_ok());

        // Insufficient role
        let err = require_admin_role(&ctx, Some(&editor), Role::SuperAdmin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(err.client_message(), "權限不足");

        // Unauthenticated takes precedence over role
        let err = require_admin_role(&ctx, None, Role::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_every_role_below_requirement_is_forbidden() {
        let ctx = context().await;
        let all = [Role::Viewer, Role::Editor, Role::Admin, Role::SuperAdmin];

        for (i, held) in all.iter().enumerate() {
            let creds = login_as(&ctx, &format!("staff{}@example.com", i), *held).await;
            for required in all {
                let result = require_admin_role(&ctx, Some(&creds), required).await;
                if *held < required {
                    assert!(matches!(result, Err(AppError::Forbidden(_))));
                } else {
                    assert!(result.is_ok());
                }
            }
        }
    }
}
