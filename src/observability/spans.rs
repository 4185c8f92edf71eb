//! Span names and field keys.
//!
//! ```text
//! opstrace.config_store      (get / create / update / delete)
//! opstrace.moderation.check
//!   └─> opstrace.resolve
//! opstrace.trace.deliver     (on the queue worker)
//! ```

/// Config store CRUD operation.
pub const SPAN_CONFIG_STORE: &str = "opstrace.config_store";

/// Trace client resolution for one application.
pub const SPAN_RESOLVE: &str = "opstrace.resolve";

/// One input moderation check.
pub const SPAN_MODERATION_CHECK: &str = "opstrace.moderation.check";

/// Delivery of a trace task by the queue worker.
pub const SPAN_TRACE_DELIVER: &str = "opstrace.trace.deliver";

// Field keys
pub const FIELD_APP_ID: &str = "app_id";
pub const FIELD_PROVIDER: &str = "provider";
pub const FIELD_MESSAGE_ID: &str = "message_id";
pub const FIELD_TASK_ID: &str = "task_id";
pub const FIELD_TASK_KIND: &str = "task_kind";
/// Which config source won resolution ("override", "workflow", "app_model_config").
pub const FIELD_SOURCE: &str = "source";

/// Create a config store span.
///
/// ```rust,ignore
/// let span = config_store_span!("create", app_id, provider);
/// let _enter = span.enter();
/// ```
#[macro_export]
macro_rules! config_store_span {
    ($operation:expr, $app_id:expr, $provider:expr) => {
        tracing::info_span!(
            $crate::observability::SPAN_CONFIG_STORE,
            operation = $operation,
            { $crate::observability::FIELD_APP_ID } = %$app_id,
            { $crate::observability::FIELD_PROVIDER } = %$provider,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_names_share_prefix() {
        for name in [
            SPAN_CONFIG_STORE,
            SPAN_RESOLVE,
            SPAN_MODERATION_CHECK,
            SPAN_TRACE_DELIVER,
        ] {
            assert!(name.starts_with("opstrace."), "{name}");
        }
    }

    #[test]
    fn config_store_span_macro_builds() {
        let span = config_store_span!("get", "app-1", "langfuse");
        let _enter = span.enter();
    }
}
