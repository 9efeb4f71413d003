//! DentalScan backend server

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use dentalscan_core::MockAnalyzer;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dentalscan_server::{
    routes, AppState, Config, ConsoleEmailSender, EmailSender, FsBlobStore, InMemoryStore,
    SmtpConfig, SmtpEmailSender, SqliteStore, Store,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dentalscan_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");
    if config.identity_secret.is_none() {
        tracing::warn!("IDENTITY_SECRET not set, auth.signIn will refuse every caller");
    }

    let blobs = FsBlobStore::new(&config.upload_dir, config.files_url())
        .with_context(|| format!("failed to open upload directory {}", config.upload_dir))?;

    let email_sender: Box<dyn EmailSender> = match SmtpConfig::from_env() {
        Some(smtp) => match SmtpEmailSender::new(smtp) {
            Ok(sender) => Box::new(sender),
            Err(e) => {
                tracing::warn!(error = %e, "SMTP unavailable, falling back to console email");
                Box::new(ConsoleEmailSender::new())
            }
        },
        None => {
            tracing::info!("SMTP not configured, using console email");
            Box::new(ConsoleEmailSender::new())
        }
    };

    let app = match config.database_path() {
        Some(path) => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("failed to open database {}", path))?;
            tracing::info!(path = %path, "Using SQLite store");
            build_app(&config, store, blobs, email_sender)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data will not survive a restart");
            build_app(&config, InMemoryStore::new(), blobs, email_sender)
        }
    };

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("DentalScan listening on http://{}", addr);
    tracing::info!("Public URL {}", config.public_url);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_app<S: Store + 'static>(
    config: &Config,
    store: S,
    blobs: FsBlobStore,
    email_sender: Box<dyn EmailSender>,
) -> Router {
    let state = Arc::new(AppState::new(
        store,
        blobs,
        email_sender,
        MockAnalyzer::new(),
        config.settings(),
    ));
    routes::create_router(state)
}
