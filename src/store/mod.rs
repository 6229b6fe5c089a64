//! Decision persistence layer
//!
//! Stores sealed decision records. Records are append-only: a correction
//! is a new record, never an overwrite.
//! Currently in-memory; a database-backed store implements the same trait.

use crate::error::ClassificationError;
use crate::models::DecisionRecord;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Trait for decision persistence
#[async_trait::async_trait]
pub trait DecisionStore: Send + Sync {
    async fn persist(&self, record: &DecisionRecord) -> Result<()>;
    async fn get(&self, record_id: Uuid) -> Result<Option<DecisionRecord>>;
    /// All records for a document, oldest first
    async fn list_for_document(&self, document_ref: &str) -> Result<Vec<DecisionRecord>>;
}

/// Walk `supersedes` links from `record_id` back to the original decision.
/// Newest first.
pub async fn history(store: &dyn DecisionStore, record_id: Uuid) -> Result<Vec<DecisionRecord>> {
    let mut chain = Vec::new();
    let mut next = Some(record_id);

    while let Some(id) = next {
        let record = store
            .get(id)
            .await?
            .ok_or(ClassificationError::RecordNotFound(id))?;

        if chain.iter().any(|r: &DecisionRecord| r.record_id == record.record_id) {
            return Err(ClassificationError::Persistence(format!(
                "cycle in correction chain at {}",
                id
            )));
        }

        next = record.supersedes;
        chain.push(record);
    }

    Ok(chain)
}

/// In-memory decision store for development
pub struct InMemoryDecisionStore {
    records: Arc<RwLock<HashMap<Uuid, DecisionRecord>>>,
    by_document: Arc<RwLock<HashMap<String, Vec<Uuid>>>>, // document_ref → record ids
}

impl InMemoryDecisionStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            by_document: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryDecisionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DecisionStore for InMemoryDecisionStore {

    async fn persist(&self, record: &DecisionRecord) -> Result<()> {

        {
            let mut records = self.records.write().await;
            if records.contains_key(&record.record_id) {
                return Err(ClassificationError::Persistence(format!(
                    "record {} already stored; records are immutable",
                    record.record_id
                )));
            }
            records.insert(record.record_id, record.clone());
        }

        let mut by_document = self.by_document.write().await;
        by_document
            .entry(record.document_ref.clone())
            .or_insert_with(Vec::new)
            .push(record.record_id);

        Ok(())
    }

    async fn get(&self, record_id: Uuid) -> Result<Option<DecisionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&record_id).cloned())
    }

    async fn list_for_document(&self, document_ref: &str) -> Result<Vec<DecisionRecord>> {

        let ids = {
            let by_document = self.by_document.read().await;
            by_document.get(document_ref).cloned().unwrap_or_default()
        };

        let records = self.records.read().await;

        let mut items: Vec<DecisionRecord> = ids
            .iter()
            .filter_map(|id| records.get(id).cloned())
            .collect();

        items.sort_by_key(|r| r.sequence);

        Ok(items)
    }
}
