use financial_doc_classifier::{
    api::start_server,
    config::ServiceConfig,
    engine::ClassificationEngine,
    review::InMemoryReviewQueue,
    service::ClassificationService,
    store::InMemoryDecisionStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = ServiceConfig::from_env()?;

    info!("Financial Document Classifier - API Server");
    info!(port = config.port, thresholds = ?config.thresholds_path, "Configuration loaded");

    // Invalid thresholds are fatal at startup
    let registry = config.load_registry()?;

    // Create components
    let engine = Arc::new(ClassificationEngine::new(registry));
    let service = Arc::new(ClassificationService::new(
        engine,
        Box::new(InMemoryDecisionStore::new()),
        Box::new(InMemoryReviewQueue::new()),
    ));

    info!("Classification service initialized");

    // Start API server
    start_server(service, config.port).await?;

    Ok(())
}
