//! # Flashmart API Server
//!
//! ```text
//! load config ─► open SQLite (migrations) ─► spawn MailDispatcher
//!      ─► bind ─► serve until Ctrl+C / SIGTERM
//!      ─► stop dispatcher ─► close pool
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use flashmart_api::auth::JwtManager;
use flashmart_api::mail::{mailer_from_settings, MailDispatcher};
use flashmart_api::{build_router, shutdown, ApiConfig, AppState};
use flashmart_core::{Clock, SystemClock};
use flashmart_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flashmart=info,tower_http=info")),
        )
        .with_target(true)
        .init();

    info!("Starting Flashmart API server...");

    let config = ApiConfig::load(None).context("Failed to load configuration")?;
    info!(
        addr = %config.server.bind_address(),
        database = %config.database.path.display(),
        mail = ?config.mail.mode,
        "Configuration loaded"
    );

    let db = Database::new(
        DbConfig::new(config.database.path.clone()).max_connections(config.database.max_connections),
    )
    .await
    .context("Failed to open database")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mailer = mailer_from_settings(&config.mail).context("Failed to build mailer")?;
    let (dispatcher, mail_handle) =
        MailDispatcher::new(db.clone(), clock.clone(), mailer, config.mail.clone());
    let dispatcher_task = tokio::spawn(dispatcher.run());

    let jwt = JwtManager::new(
        &config.auth.jwt_secret,
        config.auth.issuer.clone(),
        config.auth.token_lifetime_secs,
    );
    let state = AppState::new(db.clone(), clock, jwt, mail_handle.clone());
    let app = build_router(state, &config.server.allowed_origins);

    let bind_addr = config.server.bind_address();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!(addr = %bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = shutdown::wait().await {
                error!(error = %e, "Signal handling failed, shutting down");
            }
        })
        .await
        .context("Server error")?;

    mail_handle.shutdown().await;
    if let Err(e) = dispatcher_task.await {
        error!(error = %e, "Mail dispatcher task failed");
    }
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}
