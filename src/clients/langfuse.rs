//! Langfuse ingestion client.
//!
//! Posts a `span-create` event to `{host}/api/public/ingestion` with HTTP
//! basic auth (`public_key:secret_key`). The message id is used as the
//! trace id so every span of one message lands on the same trace.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{TraceClient, check_response};
use crate::error::{Result, TraceError};
use crate::observability::RedactedString;
use crate::providers::{LangfuseConfig, TracingProvider};
use crate::queue::TraceTask;

pub struct LangfuseClient {
    public_key: RedactedString,
    secret_key: RedactedString,
    host: String,
    http: reqwest::Client,
}

impl LangfuseClient {
    pub fn new(config: LangfuseConfig, http: reqwest::Client) -> Self {
        Self {
            public_key: RedactedString::new(config.public_key),
            secret_key: RedactedString::new(config.secret_key),
            host: config.host.trim_end_matches('/').to_owned(),
            http,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Ingestion batch for one task.
    pub fn build_batch(task: &TraceTask) -> Value {
        let event = &task.event;
        json!({
            "batch": [{
                "id": Uuid::new_v4().to_string(),
                "type": "span-create",
                "timestamp": task.created_at.to_rfc3339(),
                "body": {
                    "id": task.id.to_string(),
                    "traceId": task.message_id,
                    "name": event.name,
                    "startTime": event.timer.start.to_rfc3339(),
                    "endTime": event.timer.end.to_rfc3339(),
                    "input": event.inputs,
                    "output": event.outputs,
                    "metadata": event.metadata,
                }
            }]
        })
    }
}

impl fmt::Debug for LangfuseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LangfuseClient")
            .field("public_key", &self.public_key)
            .field("secret_key", &self.secret_key)
            .field("host", &self.host)
            .finish()
    }
}

#[async_trait]
impl TraceClient for LangfuseClient {
    fn provider(&self) -> TracingProvider {
        TracingProvider::Langfuse
    }

    async fn send(&self, task: &TraceTask) -> Result<()> {
        let url = format!("{}/api/public/ingestion", self.host);
        let response = self
            .http
            .post(&url)
            .basic_auth(self.public_key.expose(), Some(self.secret_key.expose()))
            .json(&Self::build_batch(task))
            .send()
            .await
            .map_err(|e| TraceError::Client(format!("langfuse request failed: {e}")))?;
        check_response(TracingProvider::Langfuse, response).await
    }
}
