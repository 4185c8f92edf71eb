//! LangSmith run client.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{TraceClient, check_response};
use crate::error::{Result, TraceError};
use crate::observability::RedactedString;
use crate::providers::{LangSmithConfig, TracingProvider};
use crate::queue::{TraceTask, TraceTaskKind};

pub struct LangSmithClient {
    api_key: RedactedString,
    project: String,
    endpoint: String,
    http: reqwest::Client,
}

impl LangSmithClient {
    pub fn new(config: LangSmithConfig, http: reqwest::Client) -> Self {
        Self {
            api_key: RedactedString::new(config.api_key),
            project: config.project,
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
            http,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Completed run for one task, posted to `{endpoint}/runs`.
    pub fn build_run(&self, task: &TraceTask) -> Value {
        let event = &task.event;
        let run_type = match task.kind {
            TraceTaskKind::Moderation => "tool",
            TraceTaskKind::Message => "llm",
            TraceTaskKind::Workflow | TraceTaskKind::Conversation => "chain",
        };
        json!({
            "id": task.id.to_string(),
            "name": event.name,
            "run_type": run_type,
            "inputs": event.inputs,
            "outputs": event.outputs,
            "start_time": event.timer.start.to_rfc3339(),
            "end_time": event.timer.end.to_rfc3339(),
            "session_name": self.project,
            "extra": { "metadata": event.metadata },
            "tags": [task.kind.as_str()],
            "reference_example_id": Value::Null,
        })
    }
}

impl fmt::Debug for LangSmithClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LangSmithClient")
            .field("api_key", &self.api_key)
            .field("project", &self.project)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
impl TraceClient for LangSmithClient {
    fn provider(&self) -> TracingProvider {
        TracingProvider::LangSmith
    }

    async fn send(&self, task: &TraceTask) -> Result<()> {
        let url = format!("{}/runs", self.endpoint);
        let response = self
            .http
            .post(&url)
            .header("x-api-key", self.api_key.expose())
            .json(&self.build_run(task))
            .send()
            .await
            .map_err(|e| TraceError::Client(format!("langsmith request failed: {e}")))?;
        check_response(TracingProvider::LangSmith, response).await
    }
}
