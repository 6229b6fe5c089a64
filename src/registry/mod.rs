//! Threshold registry
//!
//! Per-document-type acceptance thresholds. Built once at startup,
//! validated, then only ever read.

use crate::error::ClassificationError;
use crate::ingest::parse_document_type;
use crate::models::DocumentType;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Default high threshold for a type with no built-in entry
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Default medium threshold for a type with no built-in entry
pub const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 0.70;

/// Built-in table: (type, high, medium)
const DEFAULT_THRESHOLDS: &[(DocumentType, f64, f64)] = &[
    (DocumentType::Invoice, 0.85, 0.70),
    (DocumentType::Receipt, 0.85, 0.70),
    (DocumentType::BankStatement, 0.85, 0.70),
    (DocumentType::PurchaseOrder, 0.85, 0.70),
    (DocumentType::CreditNote, 0.75, 0.60),
    // report-like
    (DocumentType::BalanceSheet, 0.80, 0.70),
    (DocumentType::IncomeStatement, 0.80, 0.70),
    (DocumentType::CashFlowStatement, 0.80, 0.70),
    // tax / statement
    (DocumentType::TaxForm, 0.70, 0.55),
    (DocumentType::StatementOfAccount, 0.70, 0.55),
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThresholdEntry {
    pub document_type: DocumentType,
    pub high_threshold: f64,
    pub medium_threshold: f64,
}

impl ThresholdEntry {
    fn validate(&self) -> Result<()> {
        let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);

        if !in_range(self.high_threshold)
            || !in_range(self.medium_threshold)
            || self.high_threshold <= self.medium_threshold
        {
            return Err(ClassificationError::InvalidThreshold {
                document_type: self.document_type,
                high: self.high_threshold,
                medium: self.medium_threshold,
            });
        }

        Ok(())
    }
}

/// One entry of an override file; omitted fields keep the type's built-in value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdOverride {
    pub high_threshold: Option<f64>,
    pub medium_threshold: Option<f64>,
}

/// Read-only mapping from document type to thresholds
#[derive(Debug, Clone)]
pub struct ThresholdRegistry {
    entries: BTreeMap<DocumentType, ThresholdEntry>,
}

impl ThresholdRegistry {
    /// Validate and freeze a table. Every known type must be present
    /// and `Unknown` must not be.
    pub fn from_entries(entries: impl IntoIterator<Item = ThresholdEntry>) -> Result<Self> {
        let mut table = BTreeMap::new();

        for entry in entries {
            if !entry.document_type.is_known() {
                return Err(ClassificationError::Config(
                    "the unknown document type cannot carry thresholds".to_string(),
                ));
            }
            entry.validate()?;
            table.insert(entry.document_type, entry);
        }

        if let Some(missing) = DocumentType::known().find(|t| !table.contains_key(t)) {
            return Err(ClassificationError::MissingThreshold(missing));
        }

        Ok(Self { entries: table })
    }

    /// Built-in table
    pub fn with_defaults() -> Result<Self> {
        Self::from_entries(DEFAULT_THRESHOLDS.iter().map(|&(document_type, high, medium)| {
            ThresholdEntry {
                document_type,
                high_threshold: high,
                medium_threshold: medium,
            }
        }))
    }

    /// Built-in table with overrides merged on top.
    ///
    /// Keys are any label spelling the ingestion boundary accepts
    /// for a concrete type (`"invoice"`, `"Balance Sheet"`, ...).
    pub fn with_overrides(overrides: &BTreeMap<String, ThresholdOverride>) -> Result<Self> {
        let mut table: BTreeMap<DocumentType, ThresholdEntry> = Self::with_defaults()?.entries;

        for (key, patch) in overrides {
            let document_type = parse_document_type(key)
                .filter(DocumentType::is_known)
                .ok_or_else(|| {
                    ClassificationError::Config(format!("unknown document type in thresholds: {}", key))
                })?;

            let (base_high, base_medium) = table
                .get(&document_type)
                .map(|e| (e.high_threshold, e.medium_threshold))
                .unwrap_or((HIGH_CONFIDENCE_THRESHOLD, MEDIUM_CONFIDENCE_THRESHOLD));

            let entry = ThresholdEntry {
                document_type,
                high_threshold: patch.high_threshold.unwrap_or(base_high),
                medium_threshold: patch.medium_threshold.unwrap_or(base_medium),
            };

            if patch.high_threshold.is_none() || patch.medium_threshold.is_none() {
                debug!(
                    document_type = %document_type,
                    high_threshold = entry.high_threshold,
                    medium_threshold = entry.medium_threshold,
                    "Partial threshold override, omitted field kept from built-in table"
                );
            }
            table.insert(document_type, entry);
        }

        let registry = Self::from_entries(table.into_values())?;

        info!(
            overrides = overrides.len(),
            types = registry.entries.len(),
            "Threshold registry loaded"
        );

        Ok(registry)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let overrides: BTreeMap<String, ThresholdOverride> = serde_json::from_str(json)?;
        Self::with_overrides(&overrides)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    pub fn lookup(&self, document_type: DocumentType) -> Result<&ThresholdEntry> {
        self.entries
            .get(&document_type)
            .ok_or_else(|| ClassificationError::UnknownDocumentType(document_type.to_string()))
    }

    pub fn all_types(&self) -> BTreeSet<DocumentType> {
        self.entries.keys().copied().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ThresholdEntry> {
        self.entries.values()
    }

    /// A deliberately incomplete registry, for exercising the missing-entry path
    #[cfg(test)]
    pub(crate) fn without_entry(mut self, document_type: DocumentType) -> Self {
        self.entries.remove(&document_type);
        self
    }
}
