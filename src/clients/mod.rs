//! Trace provider clients.
//!
//! Each client is an opaque sink built from decrypted credentials. The queue
//! worker hands it one [`TraceTask`] at a time; the client turns it into the
//! provider's ingestion format and posts it.

mod langfuse;
mod langsmith;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, TraceError};
use crate::providers::{TracingCredentials, TracingProvider};
use crate::queue::TraceTask;

pub use langfuse::LangfuseClient;
pub use langsmith::LangSmithClient;

/// Accepts trace tasks for one provider instance.
#[async_trait]
pub trait TraceClient: Send + Sync + fmt::Debug {
    fn provider(&self) -> TracingProvider;

    /// Deliver one task.
    ///
    /// # Errors
    ///
    /// Returns `TraceError::Client` on transport or non-2xx failure.
    async fn send(&self, task: &TraceTask) -> Result<()>;
}

/// HTTP settings shared by every client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Build the client for `credentials.provider()` from plaintext credentials.
///
/// # Errors
///
/// Returns `TraceError::Client` if the HTTP client cannot be constructed.
pub fn build_client(
    credentials: &TracingCredentials,
    options: &ClientOptions,
) -> Result<Arc<dyn TraceClient>> {
    let http = reqwest::Client::builder()
        .timeout(options.request_timeout)
        .build()
        .map_err(|e| TraceError::Client(format!("failed to build HTTP client: {e}")))?;

    let provider = credentials.provider();
    let shape_error = || TraceError::Validation {
        provider: provider.to_string(),
        problems: vec!["decrypted credentials do not match the provider schema".into()],
    };

    match provider {
        TracingProvider::Langfuse => {
            let cfg = credentials.as_langfuse().ok_or_else(shape_error)?;
            Ok(Arc::new(LangfuseClient::new(cfg, http)))
        }
        TracingProvider::LangSmith => {
            let cfg = credentials.as_langsmith().ok_or_else(shape_error)?;
            Ok(Arc::new(LangSmithClient::new(cfg, http)))
        }
    }
}

/// Map a non-success response to `TraceError::Client`.
async fn check_response(provider: TracingProvider, response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(TraceError::Client(format!(
        "{provider} ingestion HTTP {}: {}",
        status.as_u16(),
        body.chars().take(200).collect::<String>()
    )))
}
