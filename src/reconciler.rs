//! Signal reconciler
//!
//! Merges the NER and LLM opinions into one provisional label and
//! combined confidence. Rules are evaluated in a fixed order and the
//! function is pure: same signals in, same triple out.

use crate::models::{Agreement, ClassificationSignal, DocumentType, SignalSource};

/// Added when both sources name the same type
pub const AGREEMENT_BONUS: f64 = 0.05;

/// Confidence gap above which the stronger signal wins outright
pub const DISAGREEMENT_MARGIN: f64 = 0.25;

/// Subtracted from the winning confidence under PARTIAL agreement
pub const DISAGREEMENT_PENALTY: f64 = 0.05;

/// Steps per unit of confidence: comparisons and derived values are
/// fixed-point at four decimals.
const CONFIDENCE_SCALE: f64 = 10_000.0;

/// Confidence in basis points
pub fn basis_points(confidence: f64) -> i64 {
    (confidence * CONFIDENCE_SCALE).round() as i64
}

/// Snap to the nearest basis point, so `0.85 - 0.05` is exactly `0.80`
pub fn quantize(confidence: f64) -> f64 {
    basis_points(confidence) as f64 / CONFIDENCE_SCALE
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub document_type: DocumentType,
    pub combined_confidence: f64,
    pub agreement: Agreement,
    /// Name of the rule that produced this result
    pub rule: &'static str,
    pub detail: String,
}

fn by_source(signals: &[ClassificationSignal], source: SignalSource) -> Option<&ClassificationSignal> {
    signals.iter().find(|s| s.source() == source)
}

/// Reconcile zero, one or two signals (at most one per source).
pub fn reconcile(signals: &[ClassificationSignal]) -> Reconciliation {
    let ner = by_source(signals, SignalSource::Ner);
    let llm = by_source(signals, SignalSource::Llm);

    match (ner, llm) {
        (None, None) => Reconciliation {
            document_type: DocumentType::Unknown,
            combined_confidence: 0.0,
            agreement: Agreement::NoSource,
            rule: "no_source",
            detail: "No classification signals available".to_string(),
        },

        (Some(only), None) | (None, Some(only)) => Reconciliation {
            document_type: only.label(),
            combined_confidence: only.confidence(),
            agreement: Agreement::SingleSource,
            rule: "single_source",
            detail: format!(
                "Only {} signal present: {} @ {:.2}",
                only.source(),
                only.label(),
                only.confidence()
            ),
        },

        (Some(ner), Some(llm)) if ner.label() == llm.label() => {
            let combined = quantize((ner.confidence().max(llm.confidence()) + AGREEMENT_BONUS).min(1.0));
            Reconciliation {
                document_type: llm.label(),
                combined_confidence: combined,
                agreement: Agreement::Agree,
                rule: "agree",
                detail: format!(
                    "NER and LLM agree on {} ({:.2} / {:.2}), corroboration bonus {:+.2} -> {:.2}",
                    llm.label(),
                    ner.confidence(),
                    llm.confidence(),
                    AGREEMENT_BONUS,
                    combined
                ),
            }
        }

        (Some(ner), Some(llm))
            if (basis_points(ner.confidence()) - basis_points(llm.confidence())).abs()
                > basis_points(DISAGREEMENT_MARGIN) =>
        {
            let (winner, loser) = if ner.confidence() > llm.confidence() {
                (ner, llm)
            } else {
                (llm, ner)
            };
            let combined = quantize((winner.confidence() - DISAGREEMENT_PENALTY).max(0.0));

            Reconciliation {
                document_type: winner.label(),
                combined_confidence: combined,
                agreement: Agreement::Partial,
                rule: "partial",
                detail: format!(
                    "{} {} @ {:.2} outweighs {} {} @ {:.2} by more than {:.2}, penalty {:.2} -> {:.2}",
                    winner.source(),
                    winner.label(),
                    winner.confidence(),
                    loser.source(),
                    loser.label(),
                    loser.confidence(),
                    DISAGREEMENT_MARGIN,
                    DISAGREEMENT_PENALTY,
                    combined
                ),
            }
        }

        (Some(ner), Some(llm)) => {
            // ambiguous: LLM label, pessimistic confidence
            let combined = ner.confidence().min(llm.confidence());
            Reconciliation {
                document_type: llm.label(),
                combined_confidence: combined,
                agreement: Agreement::Disagree,
                rule: "disagree",
                detail: format!(
                    "NER {} @ {:.2} vs LLM {} @ {:.2} within margin {:.2}; taking LLM label at {:.2}",
                    ner.label(),
                    ner.confidence(),
                    llm.label(),
                    llm.confidence(),
                    DISAGREEMENT_MARGIN,
                    combined
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ner(label: DocumentType, confidence: f64) -> ClassificationSignal {
        ClassificationSignal::new(SignalSource::Ner, label, confidence).unwrap()
    }

    fn llm(label: DocumentType, confidence: f64) -> ClassificationSignal {
        ClassificationSignal::new(SignalSource::Llm, label, confidence).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_no_signals() {
        let r = reconcile(&[]);
        assert_eq!(r.document_type, DocumentType::Unknown);
        assert_eq!(r.combined_confidence, 0.0);
        assert_eq!(r.agreement, Agreement::NoSource);
    }

    #[test]
    fn test_single_source() {
        let r = reconcile(&[llm(DocumentType::PurchaseOrder, 0.78)]);
        assert_eq!(r.document_type, DocumentType::PurchaseOrder);
        assert_eq!(r.combined_confidence, 0.78);
        assert_eq!(r.agreement, Agreement::SingleSource);
    }

    #[test]
    fn test_agree_adds_bonus_and_caps() {
        let r = reconcile(&[ner(DocumentType::Invoice, 0.80), llm(DocumentType::Invoice, 0.82)]);
        assert_eq!(r.agreement, Agreement::Agree);
        assert!(approx(r.combined_confidence, 0.87));

        let capped = reconcile(&[ner(DocumentType::Invoice, 0.99), llm(DocumentType::Invoice, 0.97)]);
        assert_eq!(capped.combined_confidence, 1.0);
    }

    #[test]
    fn test_partial_takes_stronger_label() {
        let r = reconcile(&[ner(DocumentType::BankStatement, 0.60), llm(DocumentType::TaxForm, 0.90)]);
        assert_eq!(r.agreement, Agreement::Partial);
        assert_eq!(r.document_type, DocumentType::TaxForm);
        assert!(approx(r.combined_confidence, 0.85));

        let ner_wins = reconcile(&[ner(DocumentType::Receipt, 0.95), llm(DocumentType::Invoice, 0.40)]);
        assert_eq!(ner_wins.document_type, DocumentType::Receipt);
        assert!(approx(ner_wins.combined_confidence, 0.90));
    }

    #[test]
    fn test_disagree_is_pessimistic() {
        let r = reconcile(&[ner(DocumentType::Invoice, 0.55), llm(DocumentType::Receipt, 0.58)]);
        assert_eq!(r.agreement, Agreement::Disagree);
        assert_eq!(r.document_type, DocumentType::Receipt);
        assert_eq!(r.combined_confidence, 0.55);
    }

    #[test]
    fn test_gap_of_exactly_margin_is_disagreement() {
        let r = reconcile(&[ner(DocumentType::Invoice, 0.42), llm(DocumentType::TaxForm, 0.67)]);
        assert_eq!(r.agreement, Agreement::Disagree);
        assert_eq!(r.document_type, DocumentType::TaxForm);
        assert_eq!(r.combined_confidence, 0.42);

        // every two-decimal pair exactly 0.25 apart, and one step wider
        for i in 0..=74 {
            let low = i as f64 / 100.0;
            let at_margin = (i + 25) as f64 / 100.0;
            let beyond = (i + 26) as f64 / 100.0;

            let r = reconcile(&[ner(DocumentType::Invoice, low), llm(DocumentType::Receipt, at_margin)]);
            assert_eq!(r.agreement, Agreement::Disagree, "{} vs {}", low, at_margin);

            let r = reconcile(&[ner(DocumentType::Invoice, beyond), llm(DocumentType::Receipt, low)]);
            assert_eq!(r.agreement, Agreement::Partial, "{} vs {}", beyond, low);
        }
    }

    #[test]
    fn test_derived_confidence_lands_on_decimal() {
        let r = reconcile(&[ner(DocumentType::Invoice, 0.30), llm(DocumentType::BalanceSheet, 0.85)]);
        assert_eq!(r.agreement, Agreement::Partial);
        assert_eq!(r.combined_confidence, 0.80);

        let r = reconcile(&[ner(DocumentType::Receipt, 0.65), llm(DocumentType::Receipt, 0.65)]);
        assert_eq!(r.combined_confidence, 0.70);

        for i in 5..=100 {
            let winner = i as f64 / 100.0;
            let r = reconcile(&[ner(DocumentType::Unknown, 0.0), llm(DocumentType::Receipt, winner)]);
            if winner > DISAGREEMENT_MARGIN {
                assert_eq!(r.combined_confidence, (i - 5) as f64 / 100.0);
            }
        }
    }

    #[test]
    fn test_input_order_irrelevant() {
        let a = reconcile(&[ner(DocumentType::Invoice, 0.55), llm(DocumentType::Receipt, 0.58)]);
        let b = reconcile(&[llm(DocumentType::Receipt, 0.58), ner(DocumentType::Invoice, 0.55)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_monotonic_under_agree_and_partial() {
        let steps: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();

        // AGREE: raise either side
        for &fixed in &steps {
            let mut last = f64::MIN;
            for &x in &steps {
                let r = reconcile(&[ner(DocumentType::Receipt, x), llm(DocumentType::Receipt, fixed)]);
                assert!(r.combined_confidence >= last);
                last = r.combined_confidence;
            }
        }

        // PARTIAL: raise the winner while the gap stays above the margin
        let mut last = f64::MIN;
        for &x in steps.iter().filter(|&&x| x > 0.2 + DISAGREEMENT_MARGIN + 1e-9) {
            let r = reconcile(&[ner(DocumentType::Receipt, 0.2), llm(DocumentType::Invoice, x)]);
            assert_eq!(r.agreement, Agreement::Partial);
            assert!(r.combined_confidence >= last);
            last = r.combined_confidence;
        }
    }
}
