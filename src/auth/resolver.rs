/// Session to admin identity resolution
use crate::{
    admin::{AdminDirectory, AdminUser},
    auth::session::{SessionCredentials, SessionManager},
};

/// Resolve presented credentials into an active admin.
///
/// Fails closed: backend errors are logged and reported as "no admin", so
/// callers deny by default.
pub async fn check_admin_auth(
    sessions: &SessionManager,
    directory: &AdminDirectory,
    credentials: Option<&SessionCredentials>,
) -> Option<AdminUser> {
    let credentials = credentials?;

    let session = match sessions.get_session(credentials).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            tracing::debug!("No live session for presented token");
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session lookup failed, treating request as unauthenticated");
            return None;
        }
    };

    match directory.get_admin(&session.admin_id).await {
        Ok(Some(admin)) if admin.active => Some(admin),
        Ok(Some(admin)) => {
            tracing::warn!(admin_id = %admin.id, "Session belongs to an inactive admin");
            None
        }
        Ok(None) => {
            tracing::warn!(admin_id = %session.admin_id, "Session references a missing admin");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Admin lookup failed, treating request as unauthenticated");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{admin::Role, config::StorageConfig, db, request::RequestContext};
    use chrono::Duration;
    use sqlx::SqlitePool;

    async fn setup() -> (SqlitePool, SessionManager, AdminDirectory) {
        let pool = db::create_pool(&StorageConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        db::run_migrations(&pool).await.unwrap();
        (
            pool.clone(),
            SessionManager::new(pool.clone(), Duration::hours(1)),
            AdminDirectory::new(pool),
        )
    }

    fn request() -> RequestContext {
        RequestContext {
            request_id: "req_resolver".to_string(),
            ip_address: None,
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn test_resolves_active_admin() {
        let (_pool, sessions, directory) = setup().await;
        let admin = directory
            .provision("editor@example.com", "Editor", Role::Editor, "chenin-blanc-sec")
            .await
            .unwrap();
        let (creds, _) = sessions.create_session(&admin.id, &request()).await.unwrap();

        let resolved = check_admin_auth(&sessions, &directory, Some(&creds)).await;
        assert_eq!(resolved, Some(admin));
    }

    #[tokio::test]
    async fn test_missing_or_unknown_credentials() {
        let (_pool, sessions, directory) = setup().await;
        assert!(check_admin_auth(&sessions, &directory, None).await.is_none());

        let creds = SessionCredentials::new("forged");
        assert!(check_admin_auth(&sessions, &directory, Some(&creds))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_inactive_admin_not_resolved() {
        let (pool, sessions, directory) = setup().await;
        let admin = directory
            .provision("former@example.com", "Former", Role::Admin, "gewurztraminer")
            .await
            .unwrap();
        let (creds, _) = sessions.create_session(&admin.id, &request()).await.unwrap();

        sqlx::query("UPDATE admin_users SET active = 0 WHERE id = ?1")
            .bind(&admin.id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(check_admin_auth(&sessions, &directory, Some(&creds))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_backend_unavailable_fails_closed() {
        let (pool, sessions, directory) = setup().await;
        let admin = directory
            .provision("ops@example.com", "Ops", Role::SuperAdmin, "nebbiolo-langhe")
            .await
            .unwrap();
        let (creds, _) = sessions.create_session(&admin.id, &request()).await.unwrap();

        pool.close().await;

        assert!(check_admin_auth(&sessions, &directory, Some(&creds))
            .await
            .is_none());
    }
}
