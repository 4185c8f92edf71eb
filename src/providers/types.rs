//! Provider tags and typed credential shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TraceError;

/// Supported tracing providers.
///
/// Wire tags match what is stored in the `tracing_provider` column:
/// `langfuse` and `langSmith`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TracingProvider {
    #[serde(rename = "langfuse")]
    Langfuse,
    #[serde(rename = "langSmith", alias = "langsmith")]
    LangSmith,
}

impl TracingProvider {
    pub const ALL: [TracingProvider; 2] = [TracingProvider::Langfuse, TracingProvider::LangSmith];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Langfuse => "langfuse",
            Self::LangSmith => "langSmith",
        }
    }
}

impl fmt::Display for TracingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TracingProvider {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "langfuse" => Ok(Self::Langfuse),
            "langSmith" | "langsmith" => Ok(Self::LangSmith),
            other => Err(TraceError::UnsupportedProvider(other.to_owned())),
        }
    }
}

/// Langfuse credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LangfuseConfig {
    pub public_key: String,
    pub secret_key: String,
    pub host: String,
}

/// LangSmith credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LangSmithConfig {
    pub api_key: String,
    pub project: String,
    pub endpoint: String,
}

impl fmt::Debug for LangfuseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LangfuseConfig")
            .field("public_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .field("host", &self.host)
            .finish()
    }
}

impl fmt::Debug for LangSmithConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LangSmithConfig")
            .field("api_key", &"[REDACTED]")
            .field("project", &self.project)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
