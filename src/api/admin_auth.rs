/// Admin authentication endpoints
use crate::{
    admin::{
        audit::{actions, targets},
        AdminUser, NewAuditEntry,
    },
    auth::{check_admin_auth, require_admin, SessionCredentials, SESSION_COOKIE},
    context::AppContext,
    error::{AppError, ErrorEnvelope},
    metrics,
    request::RequestContext,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Admin auth routes; mounted behind the CSRF layer. Login and a logout
/// without a session present a token from `/csrf` bound to "no session".
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/auth/login", post(login))
        .route("/api/admin/auth/logout", post(logout))
        .route("/api/admin/auth/me", get(me))
        .route("/api/admin/auth/csrf", get(csrf_token))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    admin: AdminUser,
    csrf_token: String,
}

#[derive(Debug, Serialize)]
struct MeResponse {
    admin: AdminUser,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CsrfTokenResponse {
    csrf_token: String,
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .build()
}

/// Exchange email and password for a session
async fn login(
    State(ctx): State<AppContext>,
    request: RequestContext,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), ErrorEnvelope> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!(request_id = %request.request_id, error = %e, "Malformed login body");
        request.fail(AppError::Validation("請求格式錯誤".to_string()))
    })?;

    let client = request.ip_address.as_deref().unwrap_or("unknown");
    ctx.rate_limiter
        .check_login(client)
        .map_err(|e| request.fail(e))?;

    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(request.fail(AppError::Validation("請輸入帳號與密碼".to_string())));
    }

    let admin = ctx
        .directory
        .authenticate(&req.email, &req.password)
        .await
        .map_err(|e| request.fail(e))?
        .ok_or_else(|| {
            metrics::record_auth_denial("invalid_credentials");
            request.fail(AppError::InvalidCredentials)
        })?;

    let (credentials, session) = ctx
        .sessions
        .create_session(&admin.id, &request)
        .await
        .map_err(|e| request.fail(e))?;

    let csrf_token = ctx
        .csrf
        .issue_token(Some(&credentials))
        .map_err(|e| request.fail(e))?;

    ctx.audit
        .create_audit_log(
            NewAuditEntry {
                actor_id: &admin.id,
                action: actions::LOGIN,
                target_type: targets::ADMIN,
                target_id: Some(&admin.id),
                metadata: json!({ "sessionId": session.id }),
            },
            &request,
        )
        .await;

    tracing::info!(
        request_id = %request.request_id,
        admin_id = %admin.id,
        role = %admin.role,
        "Admin logged in"
    );

    let cookie = session_cookie(
        credentials.token().to_string(),
        ctx.config.authentication.cookie_secure,
    );

    Ok((jar.add(cookie), Json(LoginResponse { admin, csrf_token })))
}

/// End the current session, if any.
///
/// Succeeds without a session. The audit write happens after sign-out and its
/// outcome never changes the response.
async fn logout(
    State(ctx): State<AppContext>,
    request: RequestContext,
    jar: CookieJar,
    credentials: Option<SessionCredentials>,
) -> Result<(CookieJar, Json<SuccessResponse>), ErrorEnvelope> {
    let admin = check_admin_auth(&ctx.sessions, &ctx.directory, credentials.as_ref()).await;

    if let Some(credentials) = &credentials {
        ctx.sessions
            .sign_out(credentials)
            .await
            .map_err(|e| request.fail(AppError::Upstream(format!("sign-out failed: {}", e))))?;
    }

    match &admin {
        Some(admin) => {
            ctx.audit
                .create_audit_log(
                    NewAuditEntry {
                        actor_id: &admin.id,
                        action: actions::LOGOUT,
                        target_type: targets::ADMIN,
                        target_id: Some(&admin.id),
                        metadata: json!({}),
                    },
                    &request,
                )
                .await;

            tracing::info!(
                request_id = %request.request_id,
                admin_id = %admin.id,
                "Admin logged out"
            );
        }
        None => {
            tracing::debug!(request_id = %request.request_id, "Logout without an admin session");
        }
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Json(SuccessResponse { success: true })))
}

/// Current admin identity
async fn me(
    State(ctx): State<AppContext>,
    request: RequestContext,
    credentials: Option<SessionCredentials>,
) -> Result<Json<MeResponse>, ErrorEnvelope> {
    let admin = require_admin(&ctx, credentials.as_ref())
        .await
        .map_err(|e| request.fail(e))?;

    Ok(Json(MeResponse { admin }))
}

/// Fresh CSRF token bound to the caller's session
async fn csrf_token(
    State(ctx): State<AppContext>,
    request: RequestContext,
    credentials: Option<SessionCredentials>,
) -> Result<Json<CsrfTokenResponse>, ErrorEnvelope> {
    let csrf_token = ctx
        .csrf
        .issue_token(credentials.as_ref())
        .map_err(|e| request.fail(e))?;

    Ok(Json(CsrfTokenResponse { csrf_token }))
}
