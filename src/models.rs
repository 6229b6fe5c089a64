//! Core data models for the classification decision engine

use crate::error::ClassificationError;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// Closed set of document types the engine can decide on.
///
/// Every variant except `Unknown` must have an entry in the threshold registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    Receipt,
    BalanceSheet,
    IncomeStatement,
    CashFlowStatement,
    PurchaseOrder,
    CreditNote,
    StatementOfAccount,
    TaxForm,
    BankStatement,
    Unknown,
}

impl DocumentType {
    /// All variants, `Unknown` last
    pub const ALL: [DocumentType; 11] = [
        DocumentType::Invoice,
        DocumentType::Receipt,
        DocumentType::BalanceSheet,
        DocumentType::IncomeStatement,
        DocumentType::CashFlowStatement,
        DocumentType::PurchaseOrder,
        DocumentType::CreditNote,
        DocumentType::StatementOfAccount,
        DocumentType::TaxForm,
        DocumentType::BankStatement,
        DocumentType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Receipt => "receipt",
            DocumentType::BalanceSheet => "balance_sheet",
            DocumentType::IncomeStatement => "income_statement",
            DocumentType::CashFlowStatement => "cash_flow_statement",
            DocumentType::PurchaseOrder => "purchase_order",
            DocumentType::CreditNote => "credit_note",
            DocumentType::StatementOfAccount => "statement_of_account",
            DocumentType::TaxForm => "tax_form",
            DocumentType::BankStatement => "bank_statement",
            DocumentType::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != DocumentType::Unknown
    }

    /// Known types only
    pub fn known() -> impl Iterator<Item = DocumentType> {
        Self::ALL.into_iter().filter(DocumentType::is_known)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalSource {
    /// Pattern / entity extraction
    Ner,
    Llm,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Agreement {
    Agree,
    Disagree,
    Partial,
    SingleSource,
    NoSource,
}

//
// ================= Signals =================
//

/// One source's validated opinion about a document's type.
///
/// Only constructible through [`ClassificationSignal::new`], so the
/// confidence is always finite and within `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "SignalFields")]
pub struct ClassificationSignal {
    source: SignalSource,
    label: DocumentType,
    confidence: f64,
}

#[derive(Deserialize)]
struct SignalFields {
    source: SignalSource,
    label: DocumentType,
    confidence: f64,
}

impl TryFrom<SignalFields> for ClassificationSignal {
    type Error = ClassificationError;

    fn try_from(fields: SignalFields) -> Result<Self> {
        Self::new(fields.source, fields.label, fields.confidence)
    }
}

impl ClassificationSignal {
    pub fn new(source: SignalSource, label: DocumentType, confidence: f64) -> Result<Self> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(ClassificationError::invalid_signal(
                source,
                format!("confidence {} outside [0, 1]", confidence),
            ));
        }

        Ok(Self {
            source,
            label,
            confidence,
        })
    }

    pub fn source(&self) -> SignalSource {
        self.source
    }

    pub fn label(&self) -> DocumentType {
        self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Signal as delivered by the upstream collaborators, before normalization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawSignal {
    pub source: SignalSource,
    pub label: String,
    pub confidence: f64,
}

impl RawSignal {
    pub fn new(source: SignalSource, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            source,
            label: label.into(),
            confidence,
        }
    }
}

/// A raw signal that failed ingestion, kept verbatim for the audit trail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedSignal {
    pub signal: RawSignal,
    pub reason: String,
}

//
// ================= Classification =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombinedClassification {
    pub document_type: DocumentType,
    pub combined_confidence: f64,
    pub tier: ConfidenceTier,
    pub requires_human_review: bool,
    pub agreement: Agreement,
    pub signals_used: Vec<ClassificationSignal>,
    pub verification_applied: bool,
    pub verification_delta: f64,
}

//
// ================= Reasoning Trace =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStage {
    Ingestion,
    Reconciliation,
    Routing,
    Verification,
    Review,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionStep {
    pub stage: DecisionStage,
    /// Machine-readable name of the rule that fired
    pub rule: String,
    pub detail: String,
}

impl DecisionStep {
    pub fn new(stage: DecisionStage, rule: &str, detail: impl Into<String>) -> Self {
        Self {
            stage,
            rule: rule.to_string(),
            detail: detail.into(),
        }
    }
}

//
// ================= Decision Record =================
//

/// Persisted, immutable audit unit of one classification decision.
///
/// Corrections never edit a record; they produce a new one whose
/// `supersedes` points at the record being corrected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub record_id: Uuid,
    pub document_ref: String,
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub classification: CombinedClassification,
    pub reasoning_trace: Vec<DecisionStep>,
    #[serde(default)]
    pub rejected_signals: Vec<RejectedSignal>,
    #[serde(default)]
    pub supersedes: Option<Uuid>,
    pub integrity_hash: String,
}

//
// ================= Display =================
//

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalSource::Ner => "NER",
            SignalSource::Llm => "LLM",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfidenceTier::High => "HIGH",
            ConfidenceTier::Medium => "MEDIUM",
            ConfidenceTier::Low => "LOW",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Agreement::Agree => "AGREE",
            Agreement::Disagree => "DISAGREE",
            Agreement::Partial => "PARTIAL",
            Agreement::SingleSource => "SINGLE_SOURCE",
            Agreement::NoSource => "NO_SOURCE",
        };
        write!(f, "{}", s)
    }
}
