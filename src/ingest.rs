//! Signal ingestion
//!
//! Boundary between the upstream collaborators and the engine: raw label
//! strings become `DocumentType`s, confidences are range-checked, and
//! anything unmappable is rejected loudly instead of passed through.

use crate::error::ClassificationError;
use crate::models::{
    ClassificationSignal, DecisionStage, DecisionStep, DocumentType, RawSignal, RejectedSignal,
    SignalSource,
};
use tracing::{debug, warn};

/// Family emitted by the pattern extractor for any financial report
const FINANCIAL_REPORT_FAMILY: &[DocumentType] = &[
    DocumentType::BalanceSheet,
    DocumentType::IncomeStatement,
    DocumentType::CashFlowStatement,
];

/// What a raw label resolves to before the peer signal is considered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelResolution {
    Exact(DocumentType),
    /// Umbrella label; the first member is the fallback
    Family(&'static [DocumentType]),
}

/// Lowercase and drop separators so `"Balance Sheet"`, `"balance_sheet"`
/// and `"BalanceSheet"` compare equal.
fn normalize(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '&')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Map a label to a concrete type. Family labels are not concrete and return `None`.
pub fn parse_document_type(label: &str) -> Option<DocumentType> {
    match resolve_label(label)? {
        LabelResolution::Exact(t) => Some(t),
        LabelResolution::Family(_) => None,
    }
}

pub fn resolve_label(label: &str) -> Option<LabelResolution> {
    use DocumentType::*;

    let exact = match normalize(label).as_str() {
        "invoice" | "bill" | "salesinvoice" | "taxinvoice" => Invoice,
        "receipt" | "salesreceipt" | "paymentreceipt" => Receipt,
        "balancesheet" | "statementoffinancialposition" => BalanceSheet,
        "incomestatement" | "profitandloss" | "p&l" | "pnl" | "profitlossstatement" => {
            IncomeStatement
        }
        "cashflowstatement" | "cashflow" | "statementofcashflows" => CashFlowStatement,
        "purchaseorder" | "po" => PurchaseOrder,
        "creditnote" | "creditmemo" => CreditNote,
        "statementofaccount" | "accountstatement" | "customerstatement" => StatementOfAccount,
        "taxform" | "taxreturn" | "w2" | "w9" | "1099" => TaxForm,
        "bankstatement" => BankStatement,
        "unknown" | "other" | "unclassified" => Unknown,
        "financialreport" | "financialstatement" | "report" => {
            return Some(LabelResolution::Family(FINANCIAL_REPORT_FAMILY));
        }
        _ => return None,
    };

    Some(LabelResolution::Exact(exact))
}

/// Result of ingesting the raw signals of one document
#[derive(Debug, Clone, Default)]
pub struct IngestedSignals {
    /// Valid signals, NER before LLM
    pub signals: Vec<ClassificationSignal>,
    pub rejected: Vec<RejectedSignal>,
    pub steps: Vec<DecisionStep>,
}

impl IngestedSignals {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

struct Pending<'a> {
    raw: &'a RawSignal,
    resolution: LabelResolution,
}

/// Validate and normalize up to one signal per source.
///
/// Never fails as a whole: each bad signal lands in `rejected` with its reason.
pub fn ingest(raw_signals: &[RawSignal]) -> IngestedSignals {
    let mut out = IngestedSignals::default();
    let mut pending: Vec<Pending<'_>> = Vec::with_capacity(raw_signals.len());

    for raw in raw_signals {
        let check = if pending.iter().any(|p| p.raw.source == raw.source) {
            Err(ClassificationError::invalid_signal(
                raw.source,
                "more than one signal from this source",
            ))
        } else if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
            Err(ClassificationError::invalid_signal(
                raw.source,
                format!("confidence {} outside [0, 1]", raw.confidence),
            ))
        } else {
            resolve_label(&raw.label).ok_or_else(|| {
                ClassificationError::invalid_signal(
                    raw.source,
                    format!("unmapped label '{}'", raw.label),
                )
            })
        };

        match check {
            Ok(resolution) => pending.push(Pending { raw, resolution }),
            Err(e) => {
                warn!(source = %raw.source, label = %raw.label, error = %e, "Signal rejected");
                out.steps.push(DecisionStep::new(
                    DecisionStage::Ingestion,
                    "signal_rejected",
                    e.to_string(),
                ));
                out.rejected.push(RejectedSignal {
                    signal: raw.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    for (i, item) in pending.iter().enumerate() {
        let label = match item.resolution {
            LabelResolution::Exact(t) => t,
            LabelResolution::Family(members) => {
                let peer = pending
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .find_map(|(_, p)| match p.resolution {
                        LabelResolution::Exact(t) if members.contains(&t) => Some(t),
                        _ => None,
                    });
                let resolved = peer.unwrap_or(members[0]);

                out.steps.push(DecisionStep::new(
                    DecisionStage::Ingestion,
                    "family_label_resolved",
                    format!(
                        "{} label '{}' resolved to {}{}",
                        item.raw.source,
                        item.raw.label,
                        resolved,
                        if peer.is_some() { " by peer signal" } else { " by family default" }
                    ),
                ));
                resolved
            }
        };

        match ClassificationSignal::new(item.raw.source, label, item.raw.confidence) {
            Ok(signal) => out.signals.push(signal),
            // range already checked above
            Err(e) => out.rejected.push(RejectedSignal {
                signal: item.raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    out.signals.sort_by_key(|s| match s.source() {
        SignalSource::Ner => 0,
        SignalSource::Llm => 1,
    });

    debug!(
        accepted = out.signals.len(),
        rejected = out.rejected.len(),
        "Signals ingested"
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_spellings() {
        for label in ["BalanceSheet", "balance_sheet", "Balance Sheet", "balance-sheet"] {
            assert_eq!(parse_document_type(label), Some(DocumentType::BalanceSheet), "{}", label);
        }
        assert_eq!(parse_document_type("Invoice"), Some(DocumentType::Invoice));
        assert_eq!(parse_document_type("P&L"), Some(DocumentType::IncomeStatement));
        assert_eq!(parse_document_type("PO"), Some(DocumentType::PurchaseOrder));
        assert_eq!(parse_document_type("other"), Some(DocumentType::Unknown));
        assert_eq!(parse_document_type("financial_report"), None);
        assert_eq!(parse_document_type("napkin"), None);
    }

    #[test]
    fn test_family_resolves_to_peer_type() {
        let ingested = ingest(&[
            RawSignal::new(SignalSource::Ner, "financial_report", 0.65),
            RawSignal::new(SignalSource::Llm, "IncomeStatement", 0.68),
        ]);

        assert!(ingested.is_clean());
        assert_eq!(ingested.signals[0].label(), DocumentType::IncomeStatement);
        assert_eq!(ingested.signals[1].label(), DocumentType::IncomeStatement);
    }

    #[test]
    fn test_family_falls_back_without_matching_peer() {
        let ingested = ingest(&[
            RawSignal::new(SignalSource::Ner, "financial_report", 0.65),
            RawSignal::new(SignalSource::Llm, "Invoice", 0.68),
        ]);

        assert_eq!(ingested.signals[0].label(), DocumentType::BalanceSheet);
        assert_eq!(ingested.signals[1].label(), DocumentType::Invoice);
    }

    #[test]
    fn test_signals_ordered_ner_first() {
        let ingested = ingest(&[
            RawSignal::new(SignalSource::Llm, "receipt", 0.9),
            RawSignal::new(SignalSource::Ner, "receipt", 0.8),
        ]);

        assert_eq!(ingested.signals[0].source(), SignalSource::Ner);
        assert_eq!(ingested.signals[1].source(), SignalSource::Llm);
    }

    #[test]
    fn test_rejections() {
        let ingested = ingest(&[
            RawSignal::new(SignalSource::Ner, "napkin", 0.5),
            RawSignal::new(SignalSource::Llm, "invoice", 1.5),
        ]);

        assert!(ingested.signals.is_empty());
        assert_eq!(ingested.rejected.len(), 2);
        assert!(ingested.rejected[0].reason.contains("unmapped label"));
        assert!(ingested.rejected[1].reason.contains("outside [0, 1]"));
        assert_eq!(ingested.steps.len(), 2);
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let ingested = ingest(&[
            RawSignal::new(SignalSource::Llm, "invoice", 0.7),
            RawSignal::new(SignalSource::Llm, "receipt", 0.9),
        ]);

        assert_eq!(ingested.signals.len(), 1);
        assert_eq!(ingested.signals[0].label(), DocumentType::Invoice);
        assert_eq!(ingested.rejected.len(), 1);
        assert_eq!(ingested.rejected[0].signal.label, "receipt");
    }
}
