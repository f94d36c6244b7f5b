use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod models;
mod services;
mod storage;

use api::hub::ConnectionHub;
use config::Config;
use services::{
    broker::MessageBroker, conversations::ConversationService, history::HistoryService,
    presence::PresenceTracker,
};
use storage::{MemoryStore, RecordStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Arc<ConnectionHub>,
    pub conversations: Arc<ConversationService>,
    pub broker: Arc<MessageBroker>,
    pub presence: Arc<PresenceTracker>,
    pub history: Arc<HistoryService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "classtalk_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load();
    tracing::info!("Starting server in {} mode", config.server.environment);

    // The record store is an external collaborator; the in-memory
    // implementation stands in for it here.
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let hub = Arc::new(ConnectionHub::new());

    let state = AppState {
        conversations: Arc::new(ConversationService::new(store.clone())),
        broker: Arc::new(MessageBroker::new(
            store.clone(),
            hub.clone(),
            config.chat.queue_depth,
        )),
        presence: Arc::new(PresenceTracker::new(store.clone(), hub.clone())),
        history: Arc::new(HistoryService::new(store.clone(), &config.chat)),
        hub,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api::router::create_router(state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
