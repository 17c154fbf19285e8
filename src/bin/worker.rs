//! Recall index worker.
//!
//! Operationally separate from the request-serving chat pipeline: started
//! on its own, it takes no input and talks only to the queue, the
//! embedding provider, and the vector store.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recall::config::Config;
use recall::error::Error;
use recall::services::{IndexWorker, IndexerService, RedisQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recall=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let queue_url = config.queue.url.as_deref().ok_or_else(|| {
        Error::Config("REDIS_URL must be set to run the index worker".to_string())
    })?;

    let queue = RedisQueue::connect(queue_url, config.queue.key.clone()).await?;
    let indexer = IndexerService::from_config(&config)?;

    let worker = IndexWorker::new(Arc::new(queue), indexer);
    let handle = worker.start().await;
    tracing::info!(queue = %config.queue.key, "Index worker running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    handle.stop().await;

    Ok(())
}
