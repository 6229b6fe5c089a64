//! Tier router
//!
//! Maps (document type, combined confidence) to a confidence tier using
//! the per-type thresholds. Pure: no side effects, no external calls.

use crate::models::{ConfidenceTier, DocumentType};
use crate::reconciler::basis_points;
use crate::registry::ThresholdRegistry;
use std::cmp::Ordering;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct Routing {
    /// Type the decision carries forward; `Unknown` when it has no thresholds
    pub document_type: DocumentType,
    pub tier: ConfidenceTier,
    pub requires_human_review: bool,
    pub rule: &'static str,
    pub detail: String,
}

impl Routing {
    fn low(document_type: DocumentType, rule: &'static str, detail: String) -> Self {
        Self {
            document_type,
            tier: ConfidenceTier::Low,
            requires_human_review: true,
            rule,
            detail,
        }
    }
}

pub fn route(registry: &ThresholdRegistry, document_type: DocumentType, confidence: f64) -> Routing {
    if !document_type.is_known() {
        return Routing::low(
            DocumentType::Unknown,
            "unknown_type",
            format!("Unknown document type always routes LOW (confidence {:.2})", confidence),
        );
    }

    let entry = match registry.lookup(document_type) {
        Ok(entry) => entry,
        Err(e) => {
            warn!(document_type = %document_type, error = %e, "No thresholds, forcing LOW");
            return Routing::low(
                DocumentType::Unknown,
                "missing_threshold",
                format!("{}; treated as unknown, forced LOW", e),
            );
        }
    };

    // compared in basis points so 0.80 meets a 0.80 threshold
    let points = basis_points(confidence);

    if points >= basis_points(entry.high_threshold) {
        Routing {
            document_type,
            tier: ConfidenceTier::High,
            requires_human_review: false,
            rule: "high",
            detail: format!(
                "{} confidence {:.2} >= high threshold {:.2}",
                document_type, confidence, entry.high_threshold
            ),
        }
    } else if points >= basis_points(entry.medium_threshold) {
        Routing {
            document_type,
            tier: ConfidenceTier::Medium,
            requires_human_review: false,
            rule: "medium",
            detail: format!(
                "{} confidence {:.2} within [{:.2}, {:.2}), pending verification",
                document_type, confidence, entry.medium_threshold, entry.high_threshold
            ),
        }
    } else {
        Routing::low(
            document_type,
            "low",
            format!(
                "{} confidence {:.2} < medium threshold {:.2}",
                document_type, confidence, entry.medium_threshold
            ),
        )
    }
}

//
// ================= Tier Ordering =================
//

impl PartialOrd for ConfidenceTier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConfidenceTier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl ConfidenceTier {
    fn rank(&self) -> u8 {
        match self {
            ConfidenceTier::Low => 0,
            ConfidenceTier::Medium => 1,
            ConfidenceTier::High => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ThresholdRegistry {
        ThresholdRegistry::with_defaults().unwrap()
    }

    #[test]
    fn test_boundaries() {
        let r = registry();
        assert_eq!(route(&r, DocumentType::Invoice, 0.85).tier, ConfidenceTier::High);
        assert_eq!(route(&r, DocumentType::Invoice, 0.84).tier, ConfidenceTier::Medium);
        assert_eq!(route(&r, DocumentType::Invoice, 0.70).tier, ConfidenceTier::Medium);
        assert_eq!(route(&r, DocumentType::Invoice, 0.69).tier, ConfidenceTier::Low);
    }

    #[test]
    fn test_review_flag_only_on_low() {
        let r = registry();
        assert!(!route(&r, DocumentType::Receipt, 0.95).requires_human_review);
        assert!(!route(&r, DocumentType::Receipt, 0.75).requires_human_review);
        assert!(route(&r, DocumentType::Receipt, 0.30).requires_human_review);
    }

    #[test]
    fn test_thresholds_are_per_type() {
        let r = registry();
        // same confidence, different outcome
        assert_eq!(route(&r, DocumentType::TaxForm, 0.72).tier, ConfidenceTier::High);
        assert_eq!(route(&r, DocumentType::Invoice, 0.72).tier, ConfidenceTier::Medium);
        assert_eq!(route(&r, DocumentType::CreditNote, 0.65).tier, ConfidenceTier::Medium);
    }

    #[test]
    fn test_unknown_always_low() {
        let routing = route(&registry(), DocumentType::Unknown, 1.0);
        assert_eq!(routing.tier, ConfidenceTier::Low);
        assert!(routing.requires_human_review);
        assert_eq!(routing.rule, "unknown_type");
    }

    #[test]
    fn test_type_without_thresholds_becomes_unknown() {
        let registry = registry().without_entry(DocumentType::CashFlowStatement);
        let routing = route(&registry, DocumentType::CashFlowStatement, 0.99);

        assert_eq!(routing.document_type, DocumentType::Unknown);
        assert_eq!(routing.tier, ConfidenceTier::Low);
        assert!(routing.requires_human_review);
        assert_eq!(routing.rule, "missing_threshold");
    }

    #[test]
    fn test_confidence_exactly_on_each_threshold() {
        let r = registry();
        for entry in r.entries() {
            let high = route(&r, entry.document_type, entry.high_threshold);
            assert_eq!(high.tier, ConfidenceTier::High, "{:?}", entry);
            assert_eq!(high.document_type, entry.document_type);

            let medium = route(&r, entry.document_type, entry.medium_threshold);
            assert_eq!(medium.tier, ConfidenceTier::Medium, "{:?}", entry);

            // a hair under a threshold in f64 terms still counts as on it
            let nudged = entry.high_threshold - 1e-12;
            assert_eq!(route(&r, entry.document_type, nudged).tier, ConfidenceTier::High);
        }
    }

    #[test]
    fn test_tier_ordering() {
        assert!(ConfidenceTier::High > ConfidenceTier::Medium);
        assert!(ConfidenceTier::Medium > ConfidenceTier::Low);
    }
}
