//! Classification service
//!
//! Async shell around the synchronous engine: seals each decision into an
//! audit record, persists it and hands review work to the queue.
//! Collaborator failures are reported next to the decision, never in place
//! of it.

use crate::audit::AuditRecorder;
use crate::engine::ClassificationEngine;
use crate::error::ClassificationError;
use crate::models::{DecisionRecord, DocumentType, RawSignal};
use crate::review::{ReviewQueue, ReviewTicket};
use crate::store::{self, DecisionStore};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Raw signals for one document, as submitted by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSignals {
    pub document_ref: String,
    #[serde(default)]
    pub signals: Vec<RawSignal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationOutcome {
    pub record: DecisionRecord,
    /// Set when the audit write failed; the decision still stands
    pub persistence_error: Option<String>,
    pub review_error: Option<String>,
}

impl ClassificationOutcome {
    pub fn is_fully_recorded(&self) -> bool {
        self.persistence_error.is_none() && self.review_error.is_none()
    }
}

pub struct ClassificationService {
    engine: Arc<ClassificationEngine>,
    recorder: AuditRecorder,
    store: Box<dyn DecisionStore>,
    review_queue: Box<dyn ReviewQueue>,
}

impl ClassificationService {
    pub fn new(
        engine: Arc<ClassificationEngine>,
        store: Box<dyn DecisionStore>,
        review_queue: Box<dyn ReviewQueue>,
    ) -> Self {
        Self {
            engine,
            recorder: AuditRecorder::new(),
            store,
            review_queue,
        }
    }

    pub fn engine(&self) -> &ClassificationEngine {
        &self.engine
    }

    /// Decide, persist, and enqueue for review when flagged
    pub async fn classify(&self, document_ref: &str, signals: &[RawSignal]) -> ClassificationOutcome {
        let record = self
            .recorder
            .record_decision(self.engine.decide(document_ref, signals));
        self.dispatch(record).await
    }

    /// Each document is decided independently; a failure on one never
    /// affects the others.
    pub async fn classify_batch(&self, documents: &[DocumentSignals]) -> Vec<ClassificationOutcome> {
        let mut outcomes = Vec::with_capacity(documents.len());

        for document in documents {
            outcomes.push(self.classify(&document.document_ref, &document.signals).await);
        }

        let flagged = outcomes
            .iter()
            .filter(|o| o.record.classification.requires_human_review)
            .count();

        info!(
            documents = documents.len(),
            flagged_for_review = flagged,
            "Batch classified"
        );

        outcomes
    }

    /// Record a reviewer's verdict as a new record superseding `record_id`
    /// and close the review tickets raised for it
    pub async fn submit_correction(
        &self,
        record_id: Uuid,
        corrected_type: DocumentType,
        reviewer: &str,
    ) -> Result<DecisionRecord> {
        let previous = self
            .store
            .get(record_id)
            .await?
            .ok_or(ClassificationError::RecordNotFound(record_id))?;

        let correction = self
            .recorder
            .record_correction(&previous, corrected_type, reviewer);

        self.store.persist(&correction).await?;

        // the correction stands even if the queue cannot be updated
        if let Err(e) = self.review_queue.resolve(record_id).await {
            warn!(record_id = %record_id, error = %e, "Review ticket not resolved");
        }

        info!(
            record_id = %correction.record_id,
            supersedes = %record_id,
            document_type = %corrected_type,
            reviewer = %reviewer,
            "Correction recorded"
        );

        Ok(correction)
    }

    pub async fn get_record(&self, record_id: Uuid) -> Result<Option<DecisionRecord>> {
        self.store.get(record_id).await
    }

    pub async fn history(&self, record_id: Uuid) -> Result<Vec<DecisionRecord>> {
        store::history(self.store.as_ref(), record_id).await
    }

    pub async fn records_for_document(&self, document_ref: &str) -> Result<Vec<DecisionRecord>> {
        self.store.list_for_document(document_ref).await
    }

    pub async fn pending_reviews(&self) -> Result<Vec<ReviewTicket>> {
        self.review_queue.pending().await
    }

    async fn dispatch(&self, record: DecisionRecord) -> ClassificationOutcome {
        let persistence_error = match self.store.persist(&record).await {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    record_id = %record.record_id,
                    document_ref = %record.document_ref,
                    error = %e,
                    "Audit write failed; decision stands, retry required"
                );
                Some(e.to_string())
            }
        };

        let review_error = if record.classification.requires_human_review {
            match self.review_queue.enqueue(ReviewTicket::for_record(&record)).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(
                        record_id = %record.record_id,
                        error = %e,
                        "Review enqueue failed"
                    );
                    Some(e.to_string())
                }
            }
        } else {
            None
        };

        ClassificationOutcome {
            record,
            persistence_error,
            review_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceTier, SignalSource};
    use crate::registry::ThresholdRegistry;
    use crate::review::InMemoryReviewQueue;
    use crate::store::InMemoryDecisionStore;

    struct FailingStore;

    #[async_trait::async_trait]
    impl DecisionStore for FailingStore {
        async fn persist(&self, _record: &DecisionRecord) -> Result<()> {
            Err(ClassificationError::Persistence("disk full".to_string()))
        }

        async fn get(&self, _record_id: Uuid) -> Result<Option<DecisionRecord>> {
            Ok(None)
        }

        async fn list_for_document(&self, _document_ref: &str) -> Result<Vec<DecisionRecord>> {
            Ok(vec![])
        }
    }

    fn engine() -> Arc<ClassificationEngine> {
        Arc::new(ClassificationEngine::new(ThresholdRegistry::with_defaults().unwrap()))
    }

    fn service() -> ClassificationService {
        ClassificationService::new(
            engine(),
            Box::new(InMemoryDecisionStore::new()),
            Box::new(InMemoryReviewQueue::new()),
        )
    }

    #[tokio::test]
    async fn test_classify_persists_and_skips_queue_when_confident() {
        let service = service();
        let outcome = service
            .classify("doc-1", &[RawSignal::new(SignalSource::Llm, "invoice", 0.95)])
            .await;

        assert!(outcome.is_fully_recorded());
        assert_eq!(outcome.record.classification.tier, ConfidenceTier::High);
        assert!(service.get_record(outcome.record.record_id).await.unwrap().is_some());
        assert!(service.pending_reviews().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_low_tier_enqueued_for_review() {
        let service = service();
        let outcome = service.classify("doc-2", &[]).await;

        let pending = service.pending_reviews().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record_id, outcome.record.record_id);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_decision() {
        let service = ClassificationService::new(
            engine(),
            Box::new(FailingStore),
            Box::new(InMemoryReviewQueue::new()),
        );

        let outcome = service
            .classify("doc-3", &[RawSignal::new(SignalSource::Ner, "receipt", 0.9)])
            .await;

        assert_eq!(outcome.record.classification.tier, ConfidenceTier::High);
        assert!(outcome.persistence_error.as_deref().unwrap().contains("disk full"));
        assert!(outcome.record.verify_integrity());
    }

    #[tokio::test]
    async fn test_batch_isolates_bad_documents() {
        let service = service();
        let documents = vec![
            DocumentSignals {
                document_ref: "good".to_string(),
                signals: vec![RawSignal::new(SignalSource::Llm, "bank_statement", 0.92)],
            },
            DocumentSignals {
                document_ref: "bad".to_string(),
                signals: vec![RawSignal::new(SignalSource::Llm, "bank_statement", 4.0)],
            },
            DocumentSignals {
                document_ref: "also-good".to_string(),
                signals: vec![RawSignal::new(SignalSource::Ner, "credit memo", 0.9)],
            },
        ];

        let outcomes = service.classify_batch(&documents).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].record.classification.tier, ConfidenceTier::High);
        assert!(outcomes[1].record.classification.requires_human_review);
        assert_eq!(outcomes[1].record.rejected_signals.len(), 1);
        assert_eq!(
            outcomes[2].record.classification.document_type,
            DocumentType::CreditNote
        );
        assert_eq!(service.pending_reviews().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_correction_creates_linked_record() {
        let service = service();
        let outcome = service.classify("doc-4", &[]).await;
        let original_id = outcome.record.record_id;

        let correction = service
            .submit_correction(original_id, DocumentType::Invoice, "reviewer-1")
            .await
            .unwrap();

        assert_eq!(correction.supersedes, Some(original_id));
        assert!(service.pending_reviews().await.unwrap().is_empty());

        let original = service.get_record(original_id).await.unwrap().unwrap();
        assert_eq!(original.classification.document_type, DocumentType::Unknown);
        assert!(original.verify_integrity());

        let chain = service.history(correction.record_id).await.unwrap();
        assert_eq!(chain.len(), 2);

        let for_doc = service.records_for_document("doc-4").await.unwrap();
        assert_eq!(for_doc.len(), 2);
        assert_eq!(for_doc[1].record_id, correction.record_id);
    }

    #[tokio::test]
    async fn test_correction_leaves_other_tickets_pending() {
        let service = service();
        let corrected = service.classify("doc-5", &[]).await;
        let waiting = service.classify("doc-6", &[]).await;
        assert_eq!(service.pending_reviews().await.unwrap().len(), 2);

        service
            .submit_correction(corrected.record.record_id, DocumentType::Receipt, "reviewer-1")
            .await
            .unwrap();

        let pending = service.pending_reviews().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record_id, waiting.record.record_id);
    }

    #[tokio::test]
    async fn test_sequences_increase_across_documents() {
        let service = service();
        let a = service.classify("doc-7", &[]).await;
        let b = service.classify("doc-8", &[]).await;
        assert!(b.record.sequence > a.record.sequence);
    }

    #[tokio::test]
    async fn test_correction_of_missing_record() {
        let result = service()
            .submit_correction(Uuid::new_v4(), DocumentType::Invoice, "reviewer-1")
            .await;
        assert!(matches!(result, Err(ClassificationError::RecordNotFound(_))));
    }
}
