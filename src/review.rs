//! Human-review hand-off
//!
//! The engine only flags `requires_human_review`; ordering, assignment and
//! storage of review work belong to whatever sits behind [`ReviewQueue`].

use crate::models::{DecisionRecord, DocumentType};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewTicket {
    pub ticket_id: Uuid,
    pub record_id: Uuid,
    pub document_ref: String,
    pub suggested_type: DocumentType,
    pub confidence: f64,
    /// Last reasoning step, i.e. why the decision ended up here
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl ReviewTicket {
    pub fn for_record(record: &DecisionRecord) -> Self {
        let reason = record
            .reasoning_trace
            .last()
            .map(|step| step.detail.clone())
            .unwrap_or_else(|| "flagged for review".to_string());

        Self {
            ticket_id: Uuid::new_v4(),
            record_id: record.record_id,
            document_ref: record.document_ref.clone(),
            suggested_type: record.classification.document_type,
            confidence: record.classification.combined_confidence,
            reason,
            created_at: Utc::now(),
        }
    }
}

#[async_trait::async_trait]
pub trait ReviewQueue: Send + Sync {
    async fn enqueue(&self, ticket: ReviewTicket) -> Result<()>;
    /// Tickets waiting for a reviewer, oldest first
    async fn pending(&self) -> Result<Vec<ReviewTicket>>;
    /// Close every ticket raised for `record_id`; returns how many were open
    async fn resolve(&self, record_id: Uuid) -> Result<usize>;
}

/// FIFO queue for development
pub struct InMemoryReviewQueue {
    tickets: Mutex<VecDeque<ReviewTicket>>,
}

impl InMemoryReviewQueue {
    pub fn new() -> Self {
        Self {
            tickets: Mutex::new(VecDeque::new()),
        }
    }

    /// Hand the oldest ticket to a reviewer
    pub async fn take_next(&self) -> Option<ReviewTicket> {
        self.tickets.lock().await.pop_front()
    }
}

impl Default for InMemoryReviewQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReviewQueue for InMemoryReviewQueue {
    async fn enqueue(&self, ticket: ReviewTicket) -> Result<()> {
        self.tickets.lock().await.push_back(ticket);
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<ReviewTicket>> {
        Ok(self.tickets.lock().await.iter().cloned().collect())
    }

    async fn resolve(&self, record_id: Uuid) -> Result<usize> {
        let mut tickets = self.tickets.lock().await;
        let before = tickets.len();
        tickets.retain(|t| t.record_id != record_id);
        Ok(before - tickets.len())
    }
}
