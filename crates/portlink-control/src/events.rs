//! Lifecycle events handed to the downstream worker
//!
//! The worker opens and closes the actual network tunnels; the broker only
//! tells it which ports belong to which session. The JSON shape here is a
//! wire contract the worker depends on, so the field names are fixed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kafka topic lifecycle events are published to, keyed by connection id.
pub const LIFECYCLE_TOPIC: &str = "connection";

/// `start` or `stop`, serialized lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Stop,
}

/// One lifecycle notification for the downstream worker.
///
/// Serializes to `{"type":...,"externalPort":...,"internalPort":...,"sessionId":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub external_port: u16,
    pub internal_port: u16,
    pub session_id: String,
}

impl LifecycleEvent {
    pub fn start(external_port: u16, internal_port: u16, session_id: String) -> Self {
        Self {
            kind: EventKind::Start,
            external_port,
            internal_port,
            session_id,
        }
    }

    pub fn stop(external_port: u16, internal_port: u16, session_id: String) -> Self {
        Self {
            kind: EventKind::Stop,
            external_port,
            internal_port,
            session_id,
        }
    }

    /// Message key: the connection id, so per-connection ordering holds.
    pub fn key(&self) -> &str {
        &self.session_id
    }
}

/// Delivery to the message broker failed.
#[derive(Debug, Error)]
#[error("failed to publish lifecycle event: {reason}")]
pub struct PublishError {
    reason: String,
}

impl PublishError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// At-least-once, ordered-per-key producer for lifecycle events.
///
/// Retry and consumer-side behavior belong to the messaging system; the
/// lifecycle manager only needs a single `publish` seam it can be handed
/// behind an `Arc<dyn EventPublisher>`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError>;
}
