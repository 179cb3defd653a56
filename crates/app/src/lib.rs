//! LiveDesk application composition root
//!
//! Composes the conversations domain router with shared infrastructure.

use std::sync::Arc;

use axum::Router;
use livedesk_common::Config;
use livedesk_conversations::{AiRelay, ChangeFeed, ConversationsState, PgStore};
use livedesk_relay::{CompletionServiceFactory, RelayConfig};
use sqlx::PgPool;

/// Create the main application router with all routes and middleware
pub async fn create_app(config: Config, pool: PgPool) -> Result<Router, anyhow::Error> {
    let feed = Arc::new(ChangeFeed::new());
    let store = Arc::new(PgStore::new(pool, feed.clone()));

    let completions = CompletionServiceFactory::create(RelayConfig::from_config(&config))?;
    let relay = Arc::new(AiRelay::new(store.clone(), Arc::from(completions)));

    let conversations_state = ConversationsState {
        store,
        relay,
        feed,
    };

    let app = Router::new()
        .route("/health", axum::routing::get(health_check))
        .route("/", axum::routing::get(|| async { "LiveDesk API v0.1.0" }))
        .merge(livedesk_conversations::routes().with_state(conversations_state));

    Ok(app)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
