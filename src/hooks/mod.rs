//! Allowance and intent confirmation requests
//!
//! The SDK asks for user confirmation twice during a bridge: once for token
//! allowances and once for the intent (route and fees). Instead of mutating UI
//! state from inside a callback, the SDK side parks a request here and awaits
//! the decision; the UI drains `pending()` and answers through `resolve_*`.

use crate::error::{BridgeCoreError, BridgeResult};
use crate::sdk::IntentPreview;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, info};
use uuid::Uuid;

/// An allowance the SDK needs before it can pull funds from a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowanceSource {
    pub chain_id: u64,
    pub token: String,
    pub min_allowance: String,
    pub current_allowance: String,
}

/// Allowance amount chosen for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllowanceChoice {
    Min,
    Max,
    Exact(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "allowances", rename_all = "lowercase")]
pub enum AllowanceDecision {
    /// One choice per requested source, in request order
    Allow(Vec<AllowanceChoice>),
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentDecision {
    Allow,
    Deny,
    /// Ask the SDK for a fresh quote; the request is re-issued
    Refresh,
}

impl IntentDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentDecision::Allow => "allow",
            IntentDecision::Deny => "deny",
            IntentDecision::Refresh => "refresh",
        }
    }
}

/// Serializable view of a parked request
#[derive(Debug, Clone, Serialize)]
pub struct PendingConfirmation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: ConfirmationPayload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConfirmationPayload {
    Allowance { sources: Vec<AllowanceSource> },
    Intent { intent: IntentPreview },
}

enum Responder {
    Allowance(oneshot::Sender<AllowanceDecision>),
    Intent(oneshot::Sender<IntentDecision>),
}

struct Entry {
    view: PendingConfirmation,
    responder: Responder,
}

/// Queue of confirmation requests awaiting a user decision
pub struct ConfirmationQueue {
    pending: Mutex<VecDeque<Entry>>,
    notify: Notify,
}

impl ConfirmationQueue {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Park an allowance request and wait for the decision.
    ///
    /// A request that is dropped without an answer counts as a denial.
    pub async fn request_allowance(&self, sources: Vec<AllowanceSource>) -> AllowanceDecision {
        let (tx, rx) = oneshot::channel();
        let id = self
            .push(
                ConfirmationPayload::Allowance { sources },
                Responder::Allowance(tx),
            )
            .await;

        info!("Allowance confirmation {} requested", id);
        rx.await.unwrap_or(AllowanceDecision::Deny)
    }

    /// Park an intent request and wait for the decision
    pub async fn request_intent(&self, intent: IntentPreview) -> IntentDecision {
        let (tx, rx) = oneshot::channel();
        let id = self
            .push(ConfirmationPayload::Intent { intent }, Responder::Intent(tx))
            .await;

        info!("Intent confirmation {} requested", id);
        rx.await.unwrap_or(IntentDecision::Deny)
    }

    async fn push(&self, payload: ConfirmationPayload, responder: Responder) -> Uuid {
        let id = Uuid::new_v4();
        let entry = Entry {
            view: PendingConfirmation {
                id,
                created_at: Utc::now(),
                payload,
            },
            responder,
        };

        self.pending.lock().await.push_back(entry);
        self.notify.notify_waiters();
        id
    }

    /// Requests still waiting for an answer, oldest first
    pub async fn pending(&self) -> Vec<PendingConfirmation> {
        self.pending
            .lock()
            .await
            .iter()
            .map(|e| e.view.clone())
            .collect()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Wait until at least one request is pending
    pub async fn wait_for_request(&self) {
        loop {
            let notified = self.notify.notified();
            if !self.pending.lock().await.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Answer an allowance request
    pub async fn resolve_allowance(&self, id: Uuid, decision: AllowanceDecision) -> BridgeResult<()> {
        let mut pending = self.pending.lock().await;
        let index = pending
            .iter()
            .position(|e| e.view.id == id)
            .ok_or(BridgeCoreError::ConfirmationNotFound { id })?;

        let expected = match &pending[index].view.payload {
            ConfirmationPayload::Allowance { sources } => sources.len(),
            ConfirmationPayload::Intent { .. } => {
                return Err(BridgeCoreError::ConfirmationMismatch {
                    id,
                    expected: "allowance",
                })
            }
        };

        if let AllowanceDecision::Allow(choices) = &decision {
            if choices.len() != expected {
                return Err(BridgeCoreError::InvalidDecision(format!(
                    "expected {} allowance choices, got {}",
                    expected,
                    choices.len()
                )));
            }
        }

        let entry = pending.remove(index).ok_or(BridgeCoreError::ConfirmationNotFound { id })?;
        drop(pending);

        let label = match decision {
            AllowanceDecision::Allow(_) => "allow",
            AllowanceDecision::Deny => "deny",
        };
        crate::metrics::record_confirmation("allowance", label);

        if let Responder::Allowance(tx) = entry.responder {
            if tx.send(decision).is_err() {
                debug!("Allowance confirmation {} answered after requester left", id);
            }
        }
        Ok(())
    }

    /// Answer an intent request
    pub async fn resolve_intent(&self, id: Uuid, decision: IntentDecision) -> BridgeResult<()> {
        let mut pending = self.pending.lock().await;
        let index = pending
            .iter()
            .position(|e| e.view.id == id)
            .ok_or(BridgeCoreError::ConfirmationNotFound { id })?;

        if !matches!(pending[index].view.payload, ConfirmationPayload::Intent { .. }) {
            return Err(BridgeCoreError::ConfirmationMismatch {
                id,
                expected: "intent",
            });
        }

        let entry = pending.remove(index).ok_or(BridgeCoreError::ConfirmationNotFound { id })?;
        drop(pending);

        crate::metrics::record_confirmation("intent", decision.as_str());

        if let Responder::Intent(tx) = entry.responder {
            if tx.send(decision).is_err() {
                debug!("Intent confirmation {} answered after requester left", id);
            }
        }
        Ok(())
    }

    /// Deny every pending request; returns how many were denied
    pub async fn clear(&self) -> usize {
        let drained: Vec<Entry> = self.pending.lock().await.drain(..).collect();
        let count = drained.len();

        for entry in drained {
            match entry.responder {
                Responder::Allowance(tx) => {
                    let _ = tx.send(AllowanceDecision::Deny);
                }
                Responder::Intent(tx) => {
                    let _ = tx.send(IntentDecision::Deny);
                }
            }
        }

        if count > 0 {
            info!("Denied {} pending confirmations", count);
        }
        count
    }
}

impl Default for ConfirmationQueue {
    fn default() -> Self {
        Self::new()
    }
}
