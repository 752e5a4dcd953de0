/// Cellar admin - back office for the wine importer
use cellar_admin::{
    config::{LogFormat, LoggingConfig},
    server, AppContext, AppResult, ServerConfig,
};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    init_tracing(&config.logging);

    // Print banner
    print_banner();

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start background maintenance
    spawn_maintenance(ctx.clone());

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("cellar_admin={},tower_http=debug", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Hourly: expired sessions and idle login rate-limit state
fn spawn_maintenance(ctx: AppContext) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            match ctx.sessions.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Expired admin sessions removed"),
                Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
            }

            let tracked = ctx.rate_limiter.prune();
            tracing::debug!(tracked, "Login rate limiter pruned");
        }
    });
}

fn print_banner() {
    println!(
        r#"
   ______     ____
  / ____/__  / / /___ ______
 / /   / _ \/ / / __ `/ ___/
/ /___/  __/ / / /_/ / /
\____/\___/_/_/\__,_/_/

        Cellar Admin v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
