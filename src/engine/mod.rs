//! Classification engine - implements the decision flow
//!
//! INGEST → RECONCILE → ROUTE → VERIFY?
//!
//! Synchronous and side-effect free. Holds only the read-only threshold
//! registry, so one engine can be shared across threads without locking.
//! Sealing a [`Decision`] into a record is the audit recorder's job.

use crate::ingest::ingest;
use crate::models::{
    ClassificationSignal, CombinedClassification, ConfidenceTier, DecisionStage, DecisionStep,
    DocumentType, RawSignal, RejectedSignal,
};
use crate::reconciler::reconcile;
use crate::registry::ThresholdRegistry;
use crate::router::route;
use crate::verification::verify;
use tracing::{debug, warn};

/// Outcome of the decision flow for one document, ready to be recorded
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub document_ref: String,
    pub classification: CombinedClassification,
    pub reasoning_trace: Vec<DecisionStep>,
    pub rejected_signals: Vec<RejectedSignal>,
}

pub struct ClassificationEngine {
    registry: ThresholdRegistry,
}

impl ClassificationEngine {
    pub fn new(registry: ThresholdRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ThresholdRegistry {
        &self.registry
    }

    /// Decide on one document from the raw upstream signals.
    ///
    /// Always yields a decision: rejected signals, missing signals and
    /// unknown types all become LOW-tier human-review decisions.
    pub fn decide(&self, document_ref: &str, raw_signals: &[RawSignal]) -> Decision {
        debug!(document_ref = %document_ref, signals = raw_signals.len(), "Deciding document");

        let ingested = ingest(raw_signals);
        let mut trace = ingested.steps;

        if !ingested.rejected.is_empty() {
            warn!(
                document_ref = %document_ref,
                rejected = ingested.rejected.len(),
                valid = ingested.signals.len(),
                "Invalid signal input, routing to human review"
            );

            trace.push(DecisionStep::new(
                DecisionStage::Routing,
                "invalid_input",
                format!(
                    "{} signal(s) rejected at ingestion; not auto-classified, LOW",
                    ingested.rejected.len()
                ),
            ));

            // valid siblings stay on the record, but never decide the type
            let classification = CombinedClassification {
                document_type: DocumentType::Unknown,
                combined_confidence: 0.0,
                tier: ConfidenceTier::Low,
                requires_human_review: true,
                agreement: reconcile(&ingested.signals).agreement,
                signals_used: ingested.signals,
                verification_applied: false,
                verification_delta: 0.0,
            };

            return Decision {
                document_ref: document_ref.to_string(),
                classification,
                reasoning_trace: trace,
                rejected_signals: ingested.rejected,
            };
        }

        let (classification, steps) = self.evaluate(&ingested.signals);
        trace.extend(steps);

        Decision {
            document_ref: document_ref.to_string(),
            classification,
            reasoning_trace: trace,
            rejected_signals: Vec::new(),
        }
    }

    /// Same as [`decide`](Self::decide) for signals that are already typed
    pub fn decide_signals(
        &self,
        document_ref: &str,
        signals: &[ClassificationSignal],
    ) -> Decision {
        let raw: Vec<RawSignal> = signals
            .iter()
            .map(|s| RawSignal::new(s.source(), s.label().as_str(), s.confidence()))
            .collect();

        self.decide(document_ref, &raw)
    }

    /// Reconcile, route and verify, without the ingestion boundary.
    ///
    /// Expects at most one signal per source; extras are ignored.
    pub fn evaluate(
        &self,
        signals: &[ClassificationSignal],
    ) -> (CombinedClassification, Vec<DecisionStep>) {
        let mut trace = Vec::with_capacity(3);

        // === RECONCILE ===
        let reconciliation = reconcile(signals);
        trace.push(DecisionStep::new(
            DecisionStage::Reconciliation,
            reconciliation.rule,
            reconciliation.detail,
        ));

        debug!(
            document_type = %reconciliation.document_type,
            combined_confidence = reconciliation.combined_confidence,
            agreement = %reconciliation.agreement,
            "Signals reconciled"
        );

        // === ROUTE ===
        let routing = route(
            &self.registry,
            reconciliation.document_type,
            reconciliation.combined_confidence,
        );
        trace.push(DecisionStep::new(
            DecisionStage::Routing,
            routing.rule,
            routing.detail,
        ));

        let mut signals_used: Vec<ClassificationSignal> = Vec::with_capacity(2);
        for signal in signals {
            if !signals_used.iter().any(|s| s.source() == signal.source()) {
                signals_used.push(*signal);
            }
        }

        let provisional = CombinedClassification {
            document_type: routing.document_type,
            combined_confidence: reconciliation.combined_confidence,
            tier: routing.tier,
            requires_human_review: routing.requires_human_review,
            agreement: reconciliation.agreement,
            signals_used,
            verification_applied: false,
            verification_delta: 0.0,
        };

        // === VERIFY (MEDIUM only) ===
        let (classification, verification_step) = verify(provisional);
        trace.extend(verification_step);

        (classification, trace)
    }
}
