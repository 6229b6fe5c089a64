//! Financial Document Classifier
//!
//! Decision engine that turns two noisy classification signals into one
//! auditable document-type decision:
//! - Reconciles a pattern/entity (NER) label with an LLM label
//! - Routes the combined confidence through per-type thresholds
//! - Re-checks medium-confidence decisions against signal agreement
//! - Seals every decision into an immutable, hash-verified record
//!
//! DECISION FLOW:
//! INGEST → RECONCILE → ROUTE → VERIFY? → RECORD

pub mod api;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod models;
pub mod reconciler;
pub mod registry;
pub mod review;
pub mod router;
pub mod service;
pub mod store;
pub mod verification;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use audit::AuditRecorder;
pub use engine::{ClassificationEngine, Decision};
pub use registry::{ThresholdEntry, ThresholdRegistry};
