//! Verification pass
//!
//! Second look at MEDIUM-tier decisions. Re-reads the agreement between
//! the signals already in hand; never calls out to another classifier.
//! Deterministic enforcement.

use crate::models::{Agreement, CombinedClassification, ConfidenceTier, DecisionStage, DecisionStep};
use crate::reconciler::AGREEMENT_BONUS;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerificationOutcome {
    Promoted,
    Demoted,
    Inconclusive,
}

impl VerificationOutcome {
    fn rule(&self) -> &'static str {
        match self {
            VerificationOutcome::Promoted => "verification_promoted",
            VerificationOutcome::Demoted => "verification_demoted",
            VerificationOutcome::Inconclusive => "verification_inconclusive",
        }
    }
}

/// Outcome for a MEDIUM decision with the given agreement
pub fn outcome_for(agreement: Agreement) -> VerificationOutcome {
    match agreement {
        Agreement::Agree => VerificationOutcome::Promoted,
        Agreement::Disagree => VerificationOutcome::Demoted,
        Agreement::Partial | Agreement::SingleSource | Agreement::NoSource => {
            VerificationOutcome::Inconclusive
        }
    }
}

/// Run the pass. Non-MEDIUM input is returned untouched with no trace step.
pub fn verify(
    mut classification: CombinedClassification,
) -> (CombinedClassification, Option<DecisionStep>) {
    if classification.tier != ConfidenceTier::Medium {
        return (classification, None);
    }

    let outcome = outcome_for(classification.agreement);
    classification.verification_applied = true;

    let detail = match outcome {
        VerificationOutcome::Promoted => {
            classification.tier = ConfidenceTier::High;
            classification.requires_human_review = false;
            classification.verification_delta = AGREEMENT_BONUS;
            "Corroborated signals at medium confidence; promoted to HIGH".to_string()
        }
        VerificationOutcome::Demoted => {
            classification.tier = ConfidenceTier::Low;
            classification.requires_human_review = true;
            classification.verification_delta = 0.0;
            "Genuine disagreement at medium confidence; demoted to LOW for human review"
                .to_string()
        }
        VerificationOutcome::Inconclusive => {
            classification.verification_delta = 0.0;
            match classification.agreement {
                Agreement::SingleSource => {
                    "Checked, inconclusive: unverifiable, single source; tier unchanged".to_string()
                }
                other => format!("Checked, inconclusive: agreement {}; tier unchanged", other),
            }
        }
    };

    debug!(
        document_type = %classification.document_type,
        agreement = %classification.agreement,
        outcome = ?outcome,
        tier = %classification.tier,
        "Verification completed"
    );

    let step = DecisionStep::new(DecisionStage::Verification, outcome.rule(), detail);
    (classification, Some(step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;

    fn medium(agreement: Agreement) -> CombinedClassification {
        CombinedClassification {
            document_type: DocumentType::Invoice,
            combined_confidence: 0.75,
            tier: ConfidenceTier::Medium,
            requires_human_review: false,
            agreement,
            signals_used: vec![],
            verification_applied: false,
            verification_delta: 0.0,
        }
    }

    #[test]
    fn test_agree_promotes() {
        let (c, step) = verify(medium(Agreement::Agree));
        assert_eq!(c.tier, ConfidenceTier::High);
        assert!(!c.requires_human_review);
        assert!(c.verification_applied);
        assert_eq!(c.verification_delta, AGREEMENT_BONUS);
        // bonus is already in the combined score
        assert_eq!(c.combined_confidence, 0.75);
        assert_eq!(step.unwrap().rule, "verification_promoted");
    }

    #[test]
    fn test_disagree_demotes() {
        let (c, _) = verify(medium(Agreement::Disagree));
        assert_eq!(c.tier, ConfidenceTier::Low);
        assert!(c.requires_human_review);
        assert!(c.verification_applied);
    }

    #[test]
    fn test_partial_and_single_source_inconclusive() {
        for agreement in [Agreement::Partial, Agreement::SingleSource] {
            let (c, step) = verify(medium(agreement));
            assert_eq!(c.tier, ConfidenceTier::Medium);
            assert!(!c.requires_human_review);
            assert!(c.verification_applied);
            assert_eq!(c.verification_delta, 0.0);
            assert_eq!(step.unwrap().rule, "verification_inconclusive");
        }

        let (_, step) = verify(medium(Agreement::SingleSource));
        assert!(step.unwrap().detail.contains("unverifiable, single source"));
    }

    #[test]
    fn test_skips_non_medium() {
        let mut high = medium(Agreement::Disagree);
        high.tier = ConfidenceTier::High;
        let (c, step) = verify(high.clone());
        assert_eq!(c, high);
        assert!(step.is_none());
    }

    #[test]
    fn test_idempotent() {
        for agreement in [
            Agreement::Agree,
            Agreement::Disagree,
            Agreement::Partial,
            Agreement::SingleSource,
        ] {
            let (once, _) = verify(medium(agreement));
            let (twice, _) = verify(once.clone());
            assert_eq!(once.tier, twice.tier);
            assert_eq!(once.requires_human_review, twice.requires_human_review);

            let (again, _) = verify(medium(agreement));
            assert_eq!(once, again);
        }
    }
}
