//! Trace config sources, tried in order.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, TraceError};
use crate::store::{AppDirectory, AppModelConfigRow};

/// The `trace_config` object that governs one application right now.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EffectiveTraceConfig {
    pub tracing_provider: Option<String>,
    pub enabled: bool,
}

impl EffectiveTraceConfig {
    /// Read `{"tracing_provider": ..., "enabled": ...}`.
    ///
    /// A missing or non-object value is a disabled config; `enabled` must be
    /// literally `true` to count.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(obj) = value.and_then(Value::as_object) else {
            return Self::default();
        };
        Self {
            tracing_provider: obj
                .get("tracing_provider")
                .and_then(Value::as_str)
                .map(str::to_owned),
            enabled: obj.get("enabled").and_then(Value::as_bool).unwrap_or(false),
        }
    }
}

/// One place a trace config may come from.
pub trait TraceConfigSource: Send + Sync {
    /// Logged as the winning source.
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the source is not available and the next one should
    /// be tried. `Ok(Some(_))` ends the search, even for a disabled config.
    fn load(&self, app_id: &str) -> Result<Option<EffectiveTraceConfig>>;
}

/// Explicit configuration supplied with the request (a conversation's model
/// config or its inline override).
pub struct OverrideSource {
    trace_config: Option<Value>,
}

impl OverrideSource {
    pub fn new(trace_config: Option<Value>) -> Self {
        Self { trace_config }
    }

    pub fn from_model_config(row: &AppModelConfigRow) -> Self {
        Self::new(row.trace_config.clone())
    }

    /// Inline model config stored on a conversation.
    pub fn from_override_configs(overrides: &Value) -> Self {
        Self::new(overrides.get("trace_config").cloned())
    }
}

impl TraceConfigSource for OverrideSource {
    fn name(&self) -> &'static str {
        "override"
    }

    fn load(&self, _app_id: &str) -> Result<Option<EffectiveTraceConfig>> {
        Ok(Some(EffectiveTraceConfig::from_value(
            self.trace_config.as_ref(),
        )))
    }
}

/// A workflow's feature map; the trace config sits under `trace_config`.
pub struct WorkflowSource {
    features: Value,
}

impl WorkflowSource {
    pub fn new(features: Value) -> Self {
        Self { features }
    }

    /// Parse the workflow's serialized `features` column.
    ///
    /// # Errors
    ///
    /// Returns `TraceError::Validation` if `features` is not JSON.
    pub fn from_json(features: &str) -> Result<Self> {
        let features = serde_json::from_str(features).map_err(|e| TraceError::Validation {
            provider: "workflow".into(),
            problems: vec![format!("workflow features are not valid JSON: {e}")],
        })?;
        Ok(Self::new(features))
    }
}

impl TraceConfigSource for WorkflowSource {
    fn name(&self) -> &'static str {
        "workflow"
    }

    fn load(&self, _app_id: &str) -> Result<Option<EffectiveTraceConfig>> {
        Ok(Some(EffectiveTraceConfig::from_value(
            self.features.get("trace_config"),
        )))
    }
}

/// The application's most recently updated model configuration.
pub struct LatestModelConfigSource {
    apps: Arc<dyn AppDirectory>,
}

impl LatestModelConfigSource {
    pub fn new(apps: Arc<dyn AppDirectory>) -> Self {
        Self { apps }
    }
}

impl TraceConfigSource for LatestModelConfigSource {
    fn name(&self) -> &'static str {
        "app_model_config"
    }

    /// Fails with `AmbiguousConfig` when the rows sharing the newest
    /// `updated_at` disagree on the trace config.
    fn load(&self, app_id: &str) -> Result<Option<EffectiveTraceConfig>> {
        let rows = self.apps.newest_app_model_configs(app_id)?;
        let Some(newest) = rows.first() else {
            return Ok(None);
        };
        let effective = EffectiveTraceConfig::from_value(newest.trace_config.as_ref());

        let conflicting = rows
            .iter()
            .skip(1)
            .find(|row| EffectiveTraceConfig::from_value(row.trace_config.as_ref()) != effective);
        if let Some(other) = conflicting {
            return Err(TraceError::AmbiguousConfig(format!(
                "app '{app_id}' has model configs '{}' and '{}' updated at {} with different trace configs",
                newest.id, other.id, newest.updated_at
            )));
        }
        Ok(Some(effective))
    }
}

/// Ordered list of sources; the first available one wins.
#[derive(Default)]
pub struct TraceConfigChain {
    sources: Vec<Box<dyn TraceConfigSource>>,
}

impl TraceConfigChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_source(mut self, source: impl TraceConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Consult sources in order and return the first available config with
    /// the name of the source it came from.
    ///
    /// # Errors
    ///
    /// `ConfigNotFound` when no source is available; source errors propagate.
    pub fn effective_config(&self, app_id: &str) -> Result<(&'static str, EffectiveTraceConfig)> {
        for source in &self.sources {
            if let Some(config) = source.load(app_id)? {
                return Ok((source.name(), config));
            }
        }
        Err(TraceError::ConfigNotFound(app_id.to_owned()))
    }
}
