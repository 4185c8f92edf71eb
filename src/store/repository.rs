//! Persistence collaborators consumed by the config store and resolver.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::providers::TracingProvider;

/// One persisted tracing config. Secret fields of `tracing_config` hold
/// ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceConfigRecord {
    pub app_id: String,
    pub tracing_provider: TracingProvider,
    pub tracing_config: Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A model configuration row of an application.
#[derive(Debug, Clone, PartialEq)]
pub struct AppModelConfigRow {
    pub id: String,
    pub app_id: String,
    /// `{"tracing_provider": ..., "enabled": ...}` or absent.
    pub trace_config: Option<Value>,
    pub updated_at: i64,
}

/// The conversation a message belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRow {
    pub id: String,
    pub app_id: String,
    pub app_model_config_id: Option<String>,
    /// Model configuration stored inline on the conversation.
    pub override_model_configs: Option<Value>,
}

/// Record store keyed by (application, provider).
///
/// `insert` must enforce uniqueness so concurrent creates for the same key
/// produce exactly one winner; the loser gets `TraceError::AlreadyExists`.
pub trait TraceConfigRepository: Send + Sync {
    fn find(&self, app_id: &str, provider: TracingProvider) -> Result<Option<TraceConfigRecord>>;

    fn insert(&self, record: &TraceConfigRecord) -> Result<()>;

    /// Overwrite `tracing_config`. Returns the updated record, or `None` if
    /// no record exists.
    fn update_config(
        &self,
        app_id: &str,
        provider: TracingProvider,
        tracing_config: &Value,
        updated_at: i64,
    ) -> Result<Option<TraceConfigRecord>>;

    /// Returns `false` if nothing was deleted.
    fn delete(&self, app_id: &str, provider: TracingProvider) -> Result<bool>;
}

/// Read access to applications and their model configuration chain.
pub trait AppDirectory: Send + Sync {
    /// Tenant owning `app_id`, if the application exists.
    fn tenant_id(&self, app_id: &str) -> Result<Option<String>>;

    /// Every model configuration of `app_id` sharing the newest `updated_at`,
    /// ordered by id. Empty when the application has none.
    fn newest_app_model_configs(&self, app_id: &str) -> Result<Vec<AppModelConfigRow>>;

    fn app_model_config(&self, id: &str) -> Result<Option<AppModelConfigRow>>;

    /// Conversation of `message_id`, if the message exists.
    fn conversation_for_message(&self, message_id: &str) -> Result<Option<ConversationRow>>;
}
