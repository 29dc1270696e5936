//! Chatroom AI service
//!
//! Stores chatrooms and their message history, and answers every user
//! message with a reply from a generative-language API. When the provider
//! is unreachable, rate limited or misconfigured, a canned reply is
//! recorded instead, so a turn is never left unanswered.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod countries;
mod providers;
mod routes;

use config::Config;
use crate::core::{
    AiGateway, ChatroomRegistry, ConversationOrchestrator, MessageLog, PersistentStore,
    ReplySource, SessionManager, SqliteBackend,
};
use countries::CountryDirectory;
use providers::GeminiClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub chatrooms: Arc<ChatroomRegistry>,
    pub messages: Arc<MessageLog>,
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub sessions: Arc<SessionManager>,
    pub countries: Arc<CountryDirectory>,
}

impl AppState {
    /// Wire every component over one store
    pub async fn build(config: Config, store: PersistentStore, replies: Arc<dyn ReplySource>) -> Self {
        let chatrooms = Arc::new(ChatroomRegistry::open(store.clone()).await);
        let messages = Arc::new(MessageLog::open(store.clone()).await);
        let sessions = Arc::new(SessionManager::open(store, config.chat.demo_otp.clone()).await);
        let orchestrator = Arc::new(ConversationOrchestrator::new(messages.clone(), replies));
        let countries = Arc::new(CountryDirectory::new(config.countries_url.clone()));

        Self {
            config,
            chatrooms,
            messages,
            orchestrator,
            sessions,
            countries,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatroom_ai=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let backend = SqliteBackend::new(&config.data_dir.join("chat.db")).await?;
    let store = PersistentStore::new(Arc::new(backend));

    let client = GeminiClient::new(config.provider.gemini())?;
    let gateway = AiGateway::new(Arc::new(client), config.provider.endpoints.clone())
        .with_fallbacks(config.chat.fallback_replies.clone());

    tracing::info!(
        endpoints = config.provider.endpoints.len(),
        "Configured AI gateway"
    );

    let state = AppState::build(config, store, Arc::new(gateway)).await;

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("Chatroom API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
