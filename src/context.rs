/// Application context and dependency injection
use crate::{
    admin::{AdminDirectory, AuditLogger, Role},
    auth::SessionManager,
    config::ServerConfig,
    csrf::CsrfProtector,
    db,
    error::AppResult,
    rate_limit::RateLimiter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    // Identity & sessions
    pub directory: Arc<AdminDirectory>,
    pub sessions: Arc<SessionManager>,
    // Audit trail
    pub audit: Arc<AuditLogger>,
    // Request protection
    pub csrf: Arc<CsrfProtector>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        // Validate configuration
        config.validate()?;

        // Initialize database
        let pool = db::create_pool(&config.storage).await?;

        // Run migrations
        db::run_migrations(&pool).await?;

        // Test connection
        db::test_connection(&pool).await?;

        let ctx = Self::with_pool(config, pool);
        ctx.bootstrap_admin().await?;

        Ok(ctx)
    }

    /// Wire services over an already migrated pool
    pub fn with_pool(config: ServerConfig, pool: SqlitePool) -> Self {
        let session_ttl = chrono::Duration::hours(config.authentication.session_ttl_hours);

        Self {
            directory: Arc::new(AdminDirectory::new(pool.clone())),
            sessions: Arc::new(SessionManager::new(pool.clone(), session_ttl)),
            audit: Arc::new(AuditLogger::new(pool.clone())),
            csrf: Arc::new(CsrfProtector::new(&config.authentication.session_secret)),
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            config: Arc::new(config),
            db: pool,
        }
    }

    /// Provision the configured superadmin when no admin exists yet
    async fn bootstrap_admin(&self) -> AppResult<()> {
        let Some(bootstrap) = &self.config.authentication.bootstrap_admin else {
            return Ok(());
        };

        if self.directory.count().await? > 0 {
            tracing::debug!("Admins already provisioned, skipping bootstrap");
            return Ok(());
        }

        self.directory
            .provision(
                &bootstrap.email,
                &bootstrap.name,
                Role::SuperAdmin,
                &bootstrap.password,
            )
            .await?;

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
