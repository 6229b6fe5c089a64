use financial_doc_classifier::{
    config::ServiceConfig,
    engine::ClassificationEngine,
    models::{RawSignal, SignalSource},
    review::InMemoryReviewQueue,
    service::{ClassificationService, DocumentSignals},
    store::InMemoryDecisionStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn sample_documents() -> Vec<DocumentSignals> {
    let doc = |document_ref: &str, signals: Vec<RawSignal>| DocumentSignals {
        document_ref: document_ref.to_string(),
        signals,
    };

    vec![
        doc(
            "sample-invoice",
            vec![
                RawSignal::new(SignalSource::Ner, "invoice", 0.80),
                RawSignal::new(SignalSource::Llm, "Invoice", 0.82),
            ],
        ),
        doc(
            "sample-balance-sheet",
            vec![
                RawSignal::new(SignalSource::Ner, "financial_report", 0.65),
                RawSignal::new(SignalSource::Llm, "BalanceSheet", 0.68),
            ],
        ),
        doc(
            "sample-tax-form",
            vec![
                RawSignal::new(SignalSource::Ner, "bank_statement", 0.60),
                RawSignal::new(SignalSource::Llm, "TaxForm", 0.90),
            ],
        ),
        doc(
            "sample-ambiguous",
            vec![
                RawSignal::new(SignalSource::Ner, "invoice", 0.55),
                RawSignal::new(SignalSource::Llm, "Receipt", 0.58),
            ],
        ),
        doc(
            "sample-purchase-order",
            vec![RawSignal::new(SignalSource::Llm, "PurchaseOrder", 0.78)],
        ),
        doc("sample-blank-scan", vec![]),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    dotenv::dotenv().ok();

    info!("Financial Document Classifier starting");

    let config = ServiceConfig::from_env()?;
    let registry = config.load_registry()?;

    // Create components
    let engine = Arc::new(ClassificationEngine::new(registry));
    let service = ClassificationService::new(
        engine,
        Box::new(InMemoryDecisionStore::new()),
        Box::new(InMemoryReviewQueue::new()),
    );

    // Signals from a JSON file (array of documents), or the built-in samples
    let documents = match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "Reading document signals");
            let json = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Vec<DocumentSignals>>(&json)?
        }
        None => sample_documents(),
    };

    let outcomes = service.classify_batch(&documents).await;

    println!("\n=== CLASSIFICATION DECISIONS ===");
    for outcome in &outcomes {
        let record = &outcome.record;
        let c = &record.classification;
        println!(
            "\n{} -> {} @ {:.2} [{}] agreement={} review={}",
            record.document_ref,
            c.document_type,
            c.combined_confidence,
            c.tier,
            c.agreement,
            c.requires_human_review
        );
        for (i, step) in record.reasoning_trace.iter().enumerate() {
            println!("  {}: [{:?}] {}", i + 1, step.stage, step.detail);
        }
        if let Some(err) = &outcome.persistence_error {
            eprintln!("  audit write failed: {}", err);
        }
    }

    let pending = service.pending_reviews().await?;
    println!("\nPending human review: {}", pending.len());

    Ok(())
}
