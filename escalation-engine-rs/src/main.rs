// escalation-engine-rs/src/main.rs
//
// Escalation engine entry point. Connects to the error store, builds
// the notification dispatcher from the environment, and runs the
// monitoring loop until the process is killed.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use escalation_engine::{
    ChannelConfig, EngineConfig, ErrorStore, EscalationEngine, NotificationDispatcher, PgStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting escalation engine...");

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let store = PgStore::connect(&database_url)
        .await
        .context("failed to connect to the error store")?;
    store
        .initialize()
        .await
        .context("failed to initialize the error store")?;
    let store: Arc<dyn ErrorStore> = Arc::new(store);

    let channels = ChannelConfig::from_env();
    info!(
        chat = channels.chat_webhook.is_some(),
        email = channels.email.is_some(),
        webhook = channels.webhook.is_some(),
        "notification channels configured"
    );
    let dispatcher =
        NotificationDispatcher::new(channels).context("failed to build notification client")?;

    let config = EngineConfig::from_env();
    let mut engine = EscalationEngine::new(store, dispatcher, config);
    engine.run().await;

    Ok(())
}
