//! Cellar admin
//!
//! Back-office service for the wine importer: admin authentication, role
//! checks, CSRF protection and the admin audit trail.

pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod csrf;
pub mod db;
pub mod error;
pub mod metrics;
pub mod rate_limit;
pub mod request;
pub mod server;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{AppError, AppResult, ErrorEnvelope};
