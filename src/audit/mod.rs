//! Audit recorder
//!
//! Stamps every decision into an immutable, hash-sealed record.
//! Corrections are new records linked to the one they supersede.

use crate::engine::Decision;
use crate::models::{
    Agreement, ClassificationSignal, CombinedClassification, ConfidenceTier, DecisionRecord,
    DecisionStage, DecisionStep, DocumentType, RejectedSignal,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Issues records with a strictly increasing sequence and
/// non-decreasing timestamps.
pub struct AuditRecorder {
    clock: Mutex<(u64, DateTime<Utc>)>,
}

impl AuditRecorder {
    pub fn new() -> Self {
        Self {
            clock: Mutex::new((0, DateTime::<Utc>::MIN_UTC)),
        }
    }

    fn tick(&self) -> (u64, DateTime<Utc>) {
        let mut clock = self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now().max(clock.1);
        clock.0 += 1;
        clock.1 = now;
        *clock
    }

    /// Seal what the engine decided
    pub fn record_decision(&self, decision: Decision) -> DecisionRecord {
        self.record(
            &decision.document_ref,
            decision.classification,
            decision.reasoning_trace,
            decision.rejected_signals,
        )
    }

    /// Seal a finished decision
    pub fn record(
        &self,
        document_ref: &str,
        classification: CombinedClassification,
        reasoning_trace: Vec<DecisionStep>,
        rejected_signals: Vec<RejectedSignal>,
    ) -> DecisionRecord {
        self.seal(document_ref, classification, reasoning_trace, rejected_signals, None)
    }

    /// Human-review correction of an earlier record.
    ///
    /// The reviewer's label is authoritative: HIGH tier, confidence 1.0,
    /// no further review. `previous` is left as it was.
    pub fn record_correction(
        &self,
        previous: &DecisionRecord,
        corrected_type: DocumentType,
        reviewer: &str,
    ) -> DecisionRecord {
        let classification = CombinedClassification {
            document_type: corrected_type,
            combined_confidence: 1.0,
            tier: ConfidenceTier::High,
            requires_human_review: false,
            agreement: previous.classification.agreement,
            signals_used: previous.classification.signals_used.clone(),
            verification_applied: false,
            verification_delta: 0.0,
        };

        let trace = vec![DecisionStep::new(
            DecisionStage::Review,
            "human_correction",
            format!(
                "{} corrected {} (record {}) to {}",
                reviewer, previous.classification.document_type, previous.record_id, corrected_type
            ),
        )];

        self.seal(
            &previous.document_ref,
            classification,
            trace,
            Vec::new(),
            Some(previous.record_id),
        )
    }

    fn seal(
        &self,
        document_ref: &str,
        classification: CombinedClassification,
        reasoning_trace: Vec<DecisionStep>,
        rejected_signals: Vec<RejectedSignal>,
        supersedes: Option<Uuid>,
    ) -> DecisionRecord {
        let (sequence, created_at) = self.tick();

        let mut record = DecisionRecord {
            record_id: Uuid::new_v4(),
            document_ref: document_ref.to_string(),
            sequence,
            created_at,
            classification,
            reasoning_trace,
            rejected_signals,
            supersedes,
            integrity_hash: String::new(),
        };
        record.integrity_hash = compute_record_hash(&record);

        info!(
            record_id = %record.record_id,
            document_ref = %record.document_ref,
            document_type = %record.classification.document_type,
            tier = %record.classification.tier,
            requires_human_review = record.classification.requires_human_review,
            supersedes = ?record.supersedes,
            "Decision recorded"
        );

        record
    }
}

impl Default for AuditRecorder {
    fn default() -> Self {
        Self::new()
    }
}

//
// ================= Integrity =================
//

/// Everything in a record except the hash itself
#[derive(Serialize)]
struct SealedContent<'a> {
    record_id: &'a Uuid,
    document_ref: &'a str,
    sequence: u64,
    created_at: &'a DateTime<Utc>,
    classification: &'a CombinedClassification,
    reasoning_trace: &'a [DecisionStep],
    rejected_signals: &'a [RejectedSignal],
    supersedes: &'a Option<Uuid>,
}

/// SHA256 over the record content, streamed straight into the hasher
pub fn compute_record_hash(record: &DecisionRecord) -> String {
    let content = SealedContent {
        record_id: &record.record_id,
        document_ref: &record.document_ref,
        sequence: record.sequence,
        created_at: &record.created_at,
        classification: &record.classification,
        reasoning_trace: &record.reasoning_trace,
        rejected_signals: &record.rejected_signals,
        supersedes: &record.supersedes,
    };

    let mut hasher = Sha256::new();
    if serde_json::to_writer(&mut HashWriter(&mut hasher), &content).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

//
// ================= Output Shape =================
//

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationView {
    pub document_type: DocumentType,
    pub confidence: f64,
    pub confidence_level: ConfidenceTier,
}

/// Result shape handed to validation / review collaborators
#[derive(Debug, Clone, Serialize)]
pub struct DecisionSummary<'a> {
    pub record_id: Uuid,
    pub document_ref: &'a str,
    pub classification: ClassificationView,
    pub requires_human_review: bool,
    pub agreement: Agreement,
    pub signals_used: &'a [ClassificationSignal],
    pub reasoning_trace: &'a [DecisionStep],
    pub supersedes: Option<Uuid>,
}

impl DecisionRecord {
    pub fn verify_integrity(&self) -> bool {
        !self.integrity_hash.is_empty() && compute_record_hash(self) == self.integrity_hash
    }

    pub fn summary(&self) -> DecisionSummary<'_> {
        DecisionSummary {
            record_id: self.record_id,
            document_ref: &self.document_ref,
            classification: ClassificationView {
                document_type: self.classification.document_type,
                confidence: self.classification.combined_confidence,
                confidence_level: self.classification.tier,
            },
            requires_human_review: self.classification.requires_human_review,
            agreement: self.classification.agreement,
            signals_used: &self.classification.signals_used,
            reasoning_trace: &self.reasoning_trace,
            supersedes: self.supersedes,
        }
    }
}
