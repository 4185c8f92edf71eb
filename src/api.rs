//! Request/response shapes for the trace-config HTTP resource.
//!
//! Routing lives outside this crate. [`TraceConfigApi`] maps the four verbs
//! of `/apps/{app_id}/trace-config` onto the [`ConfigStore`] and returns the
//! JSON bodies the console expects; [`error_body`] turns a [`TraceError`]
//! into a status code and body.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Result, TraceError};
use crate::providers::TracingProvider;
use crate::store::ConfigStore;

/// Query string of `GET` and `DELETE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceConfigQuery {
    pub tracing_provider: String,
}

/// JSON body of `POST` and `PUT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfigRequest {
    pub tracing_provider: String,
    pub tracing_config: Map<String, Value>,
}

#[derive(Clone)]
pub struct TraceConfigApi {
    store: ConfigStore,
}

impl TraceConfigApi {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    /// `GET`: the config with secrets masked.
    pub fn get(&self, app_id: &str, query: &TraceConfigQuery) -> Result<Value> {
        let provider: TracingProvider = query.tracing_provider.parse()?;
        let view = self.store.get(app_id, provider)?;
        Ok(json!({
            "app_id": view.app_id,
            "tracing_provider": view.tracing_provider,
            "tracing_config": view.tracing_config,
            "created_at": view.created_at,
            "updated_at": view.updated_at,
        }))
    }

    /// `POST`: create.
    pub fn post(&self, app_id: &str, request: &TraceConfigRequest) -> Result<Value> {
        let provider: TracingProvider = request.tracing_provider.parse()?;
        self.store.create(app_id, provider, &request.tracing_config)?;
        Ok(success())
    }

    /// `PUT`: replace.
    pub fn put(&self, app_id: &str, request: &TraceConfigRequest) -> Result<Value> {
        let provider: TracingProvider = request.tracing_provider.parse()?;
        self.store.update(app_id, provider, &request.tracing_config)?;
        Ok(success())
    }

    /// `DELETE`: remove; a missing record is `NotFound`.
    pub fn delete(&self, app_id: &str, query: &TraceConfigQuery) -> Result<Value> {
        let provider: TracingProvider = query.tracing_provider.parse()?;
        if !self.store.delete(app_id, provider)? {
            return Err(TraceError::NotFound(format!(
                "tracing config for app '{app_id}' and provider '{provider}' does not exist"
            )));
        }
        Ok(success())
    }
}

fn success() -> Value {
    json!({ "result": "success" })
}

/// Status code and JSON body for a failed call.
pub fn error_body(error: &TraceError) -> (u16, Value) {
    (
        error.status_code(),
        json!({
            "code": error.code(),
            "message": error.to_string(),
            "status": error.status_code(),
        }),
    )
}
