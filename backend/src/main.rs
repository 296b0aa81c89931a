// =============================================================================
// Confluence Engine — Main Entry Point
// =============================================================================
//
// Serves the fusion engine over HTTP. Quote source, signal store and alert
// channel are chosen from configuration at startup; missing pieces degrade
// (unenhanced signals, in-memory store, log-only alerts) rather than abort.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analyzer;
mod api;
mod app_state;
mod error;
mod factors;
mod fusion;
mod market_data;
mod notify;
mod runtime_config;
mod sessions;
mod signals;
mod store;
#[cfg(test)]
mod testing;
mod types;
mod volatility;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::{HttpQuoteSource, QuoteSource, UnavailableSource};
use crate::notify::{LogNotifier, NotificationChannel, TelegramNotifier};
use crate::runtime_config::RuntimeConfig;
use crate::store::{MemoryStore, SignalStore};

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Confluence Engine starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env(|key| std::env::var(key).ok());

    info!(
        symbols = ?config.symbols,
        tp_multipliers = ?config.fusion.tp_multipliers,
        yields_adjustment = config.volatility.yields_adjustment,
        "Configured watch-list"
    );

    // ── 2. Collaborators ─────────────────────────────────────────────────
    let quote_source: Arc<dyn QuoteSource> = match &config.quote_url {
        Some(url) => {
            info!(url = %url, "Using HTTP quote source");
            Arc::new(HttpQuoteSource::new(url.clone(), config.source_timeout())?)
        }
        None => {
            warn!("No quote URL configured; signals will be returned unenhanced");
            Arc::new(UnavailableSource)
        }
    };

    let store: Arc<dyn SignalStore> = match &config.store_path {
        Some(path) => Arc::new(MemoryStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };

    let notifier: Arc<dyn NotificationChannel> = match (
        std::env::var("TELEGRAM_TOKEN").ok().filter(|t| !t.is_empty()),
        std::env::var("TELEGRAM_CHAT_ID").ok().filter(|c| !c.is_empty()),
    ) {
        (Some(token), Some(chat_id)) => {
            info!("Telegram alerts enabled");
            Arc::new(TelegramNotifier::new(token, chat_id, config.source_timeout())?)
        }
        _ => Arc::new(LogNotifier),
    };

    // ── 3. Build shared state ────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, quote_source, store, notifier)?);

    // ── 4. Start the API server ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("Ready. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping");
    server.abort();

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Confluence Engine shut down complete.");
    Ok(())
}
