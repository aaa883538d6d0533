use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::handlers;
use slotbook::services::notify::webhook::WebhookNotifier;
use slotbook::services::notify::{LogNotifier, NotificationProvider};
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    if config.admin_token == "changeme" || config.token_secret == "changeme" {
        tracing::warn!("ADMIN_TOKEN or TOKEN_SECRET is using the default value");
    }

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn NotificationProvider> = match &config.notify_url {
        Some(url) => {
            anyhow::ensure!(
                !config.from_address.is_empty(),
                "FROM_ADDRESS must be set when NOTIFY_URL is configured"
            );
            tracing::info!("delivering notifications via webhook (url: {url})");
            Box::new(WebhookNotifier::new(
                url.clone(),
                config.from_address.clone(),
                config.token_secret.clone(),
            ))
        }
        None => {
            tracing::info!("NOTIFY_URL not set, notifications are only logged");
            Box::new(LogNotifier)
        }
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier,
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
