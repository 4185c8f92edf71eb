//! Trace task payloads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::clients::TraceClient;

/// Which event a task forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceTaskKind {
    Moderation,
    Message,
    Workflow,
    Conversation,
}

impl TraceTaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Moderation => "moderation",
            Self::Message => "message",
            Self::Workflow => "workflow",
            Self::Conversation => "conversation",
        }
    }
}

/// Wall-clock window around a measured call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimerWindow {
    pub fn elapsed_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }
}

/// Provider-neutral body of a trace event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    pub inputs: Value,
    pub outputs: Value,
    pub timer: TimerWindow,
    #[serde(default)]
    pub metadata: Value,
}

/// One event to forward to a resolved trace client.
///
/// Owned by the queue after submission; the submitter keeps no handle.
#[derive(Debug, Clone)]
pub struct TraceTask {
    pub id: Uuid,
    pub kind: TraceTaskKind,
    /// Correlation id (message id).
    pub message_id: String,
    pub client: Arc<dyn TraceClient>,
    pub event: TraceEvent,
    pub created_at: DateTime<Utc>,
}

impl TraceTask {
    pub fn new(
        kind: TraceTaskKind,
        message_id: impl Into<String>,
        client: Arc<dyn TraceClient>,
        event: TraceEvent,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message_id: message_id.into(),
            client,
            event,
            created_at: Utc::now(),
        }
    }
}
