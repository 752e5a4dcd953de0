/// Configuration management for the back office
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    /// Origins allowed to call the admin API with credentials
    pub allowed_origins: Vec<String>,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    ///
    /// Only enable behind a reverse proxy that overwrites these headers;
    /// otherwise clients choose their own address for rate limits and audits.
    pub trust_proxy: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite URL, e.g. `sqlite://./data/admin.sqlite` or `sqlite::memory:`
    pub database_url: String,
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Key for CSRF token MACs
    pub session_secret: String,
    pub session_ttl_hours: i64,
    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,
    /// Superadmin provisioned at startup when the directory is empty
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Out-of-band provisioning of the first admin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Login attempts per minute per client address
    pub login_per_minute: u32,
    /// Requests per second across the admin API
    pub admin_rps: u32,
    pub burst_size: u32,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env_or("CELLAR_HOSTNAME", "127.0.0.1");
        let port = env_or("CELLAR_PORT", "8080")
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let version = env_or("CELLAR_VERSION", env!("CARGO_PKG_VERSION"));
        let allowed_origins = env_or("CELLAR_ALLOWED_ORIGINS", "")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let trust_proxy = env_parse("CELLAR_TRUST_PROXY", false);

        let database_url = env_or("CELLAR_DATABASE_URL", "sqlite://./data/admin.sqlite");
        let max_connections = env_parse("CELLAR_DATABASE_MAX_CONNECTIONS", 10);

        let session_secret = env::var("CELLAR_SESSION_SECRET")
            .map_err(|_| AppError::Validation("Session secret required".to_string()))?;
        let session_ttl_hours = env_parse("CELLAR_SESSION_TTL_HOURS", 12);
        let cookie_secure = env_parse("CELLAR_COOKIE_SECURE", true);

        let bootstrap_admin = match (
            env::var("CELLAR_BOOTSTRAP_ADMIN_EMAIL"),
            env::var("CELLAR_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some(BootstrapAdmin {
                email,
                name: env_or("CELLAR_BOOTSTRAP_ADMIN_NAME", "Administrator"),
                password,
            }),
            _ => None,
        };

        let log_level = env_or("RUST_LOG", "info");
        let log_format = match env_or("CELLAR_LOG_FORMAT", "pretty").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                allowed_origins,
                trust_proxy,
            },
            storage: StorageConfig {
                database_url,
                max_connections,
            },
            authentication: AuthConfig {
                session_secret,
                session_ttl_hours,
                cookie_secure,
                bootstrap_admin,
            },
            rate_limit: RateLimitConfig {
                enabled: env_parse("CELLAR_RATE_LIMITS_ENABLED", true),
                login_per_minute: env_parse("CELLAR_RATE_LIMIT_LOGIN_PER_MINUTE", 10),
                admin_rps: env_parse("CELLAR_RATE_LIMIT_ADMIN_RPS", 50),
                burst_size: env_parse("CELLAR_RATE_LIMIT_BURST", 20),
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Configuration backed by an in-memory database, used by tests and local tooling
    pub fn in_memory(session_secret: &str) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                version: env!("CARGO_PKG_VERSION").to_string(),
                allowed_origins: Vec::new(),
                trust_proxy: false,
            },
            storage: StorageConfig {
                database_url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            authentication: AuthConfig {
                session_secret: session_secret.to_string(),
                session_ttl_hours: 12,
                cookie_secure: false,
                bootstrap_admin: None,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                login_per_minute: 10,
                admin_rps: 50,
                burst_size: 20,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.session_secret.len() < 32 {
            return Err(AppError::Validation(
                "Session secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.session_ttl_hours <= 0 {
            return Err(AppError::Validation(
                "Session TTL must be positive".to_string(),
            ));
        }

        if let Some(admin) = &self.authentication.bootstrap_admin {
            if admin.password.len() < 12 {
                return Err(AppError::Validation(
                    "Bootstrap admin password must be at least 12 characters".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.hostname, self.service.port)
    }
}
