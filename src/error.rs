//! Error types for the tracing configuration core.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`TraceError::code()`].

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// A config for this (application, provider) pair already exists.
    pub const CONFIG_EXISTS: &str = "TRACE_CONFIG_EXISTS";

    /// No config for this (application, provider) pair.
    pub const CONFIG_NOT_EXIST: &str = "TRACE_CONFIG_NOT_EXIST";

    /// Credential map does not match the provider schema.
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";

    /// Unknown tracing provider tag.
    pub const UNSUPPORTED_PROVIDER: &str = "UNSUPPORTED_PROVIDER";

    /// Tenant key missing or ciphertext unreadable.
    pub const CRYPTO_FAILED: &str = "CRYPTO_FAILED";

    /// No trace configuration source was available.
    pub const TRACE_CONFIG_NOT_FOUND: &str = "TRACE_CONFIG_NOT_FOUND";

    /// Several candidate trace configurations with no way to pick one.
    pub const TRACE_CONFIG_AMBIGUOUS: &str = "TRACE_CONFIG_AMBIGUOUS";

    /// Persistence layer failure.
    pub const STORAGE_FAILED: &str = "STORAGE_FAILED";

    /// Task queue rejected a trace task.
    pub const QUEUE_REJECTED: &str = "QUEUE_REJECTED";

    /// Trace client failed to deliver an event.
    pub const CLIENT_FAILED: &str = "CLIENT_FAILED";

    /// Invalid service configuration file.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Input rejected by the sensitive-content policy.
    pub const MODERATION_BLOCKED: &str = "MODERATION_BLOCKED";

    /// The moderation engine itself failed.
    pub const MODERATION_ENGINE_FAILED: &str = "MODERATION_ENGINE_FAILED";
}

/// Errors produced by the config store, resolver and dispatch path.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Create on an existing (application, provider) pair.
    #[error("[{}] tracing config already exists for app '{app_id}' and provider '{provider}'", error_codes::CONFIG_EXISTS)]
    AlreadyExists { app_id: String, provider: String },

    /// Read/update on a missing record, or an unknown application.
    #[error("[{}] {}", error_codes::CONFIG_NOT_EXIST, .0)]
    NotFound(String),

    /// Credential map failed schema validation.
    #[error("[{}] invalid {provider} config: {}", error_codes::VALIDATION_FAILED, .problems.join("; "))]
    Validation {
        provider: String,
        problems: Vec<String>,
    },

    /// Provider tag outside the registry.
    #[error("[{}] unsupported tracing provider '{}'", error_codes::UNSUPPORTED_PROVIDER, .0)]
    UnsupportedProvider(String),

    /// Tenant key resolution or AEAD failure.
    #[error("[{}] {}", error_codes::CRYPTO_FAILED, .0)]
    Crypto(String),

    /// Resolution found no configuration source at all.
    #[error("[{}] trace config not found for app '{}'", error_codes::TRACE_CONFIG_NOT_FOUND, .0)]
    ConfigNotFound(String),

    /// Latest model configurations disagree on the trace config.
    #[error("[{}] {}", error_codes::TRACE_CONFIG_AMBIGUOUS, .0)]
    AmbiguousConfig(String),

    /// SQLite or other persistence failure.
    #[error("[{}] {}", error_codes::STORAGE_FAILED, .0)]
    Storage(String),

    /// Queue full or closed.
    #[error("[{}] {}", error_codes::QUEUE_REJECTED, .0)]
    Queue(String),

    /// Trace provider HTTP failure.
    #[error("[{}] {}", error_codes::CLIENT_FAILED, .0)]
    Client(String),

    /// Service configuration file problem.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),
}

impl TraceError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => error_codes::CONFIG_EXISTS,
            Self::NotFound(_) => error_codes::CONFIG_NOT_EXIST,
            Self::Validation { .. } => error_codes::VALIDATION_FAILED,
            Self::UnsupportedProvider(_) => error_codes::UNSUPPORTED_PROVIDER,
            Self::Crypto(_) => error_codes::CRYPTO_FAILED,
            Self::ConfigNotFound(_) => error_codes::TRACE_CONFIG_NOT_FOUND,
            Self::AmbiguousConfig(_) => error_codes::TRACE_CONFIG_AMBIGUOUS,
            Self::Storage(_) => error_codes::STORAGE_FAILED,
            Self::Queue(_) => error_codes::QUEUE_REJECTED,
            Self::Client(_) => error_codes::CLIENT_FAILED,
            Self::Config(_) => error_codes::CONFIG_INVALID,
        }
    }

    /// HTTP status the API layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AlreadyExists { .. } => 409,
            Self::NotFound(_) | Self::ConfigNotFound(_) => 404,
            Self::Validation { .. } | Self::UnsupportedProvider(_) => 400,
            Self::AmbiguousConfig(_) => 409,
            Self::Queue(_) => 503,
            Self::Client(_) => 502,
            Self::Crypto(_) | Self::Storage(_) | Self::Config(_) => 500,
        }
    }

    /// Returns true if the caller can fix this by changing the request.
    ///
    /// Crypto and storage failures point at infrastructure, not input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists { .. }
                | Self::NotFound(_)
                | Self::Validation { .. }
                | Self::UnsupportedProvider(_)
        )
    }
}

/// Outcome of an input moderation check that stops the request.
///
/// `Blocked` is policy working as intended; the caller answers with the
/// preset response instead of treating it as a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModerationError {
    #[error("[{}] {}", error_codes::MODERATION_BLOCKED, .0)]
    Blocked(String),

    #[error("[{}] {}", error_codes::MODERATION_ENGINE_FAILED, .0)]
    Engine(String),
}

impl ModerationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Blocked(_) => error_codes::MODERATION_BLOCKED,
            Self::Engine(_) => error_codes::MODERATION_ENGINE_FAILED,
        }
    }

    /// Preset response to show the end user, if the request was blocked.
    pub fn preset_response(&self) -> Option<&str> {
        match self {
            Self::Blocked(response) => Some(response),
            Self::Engine(_) => None,
        }
    }
}

impl From<rusqlite::Error> for TraceError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = TraceError::UnsupportedProvider("datadog".into());
        let msg = err.to_string();
        assert!(msg.starts_with("[UNSUPPORTED_PROVIDER]"));
        assert!(msg.contains("datadog"));
    }

    #[test]
    fn validation_lists_every_problem() {
        let err = TraceError::Validation {
            provider: "langfuse".into(),
            problems: vec!["missing field 'host'".into(), "unexpected field 'x'".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("missing field 'host'"));
        assert!(msg.contains("unexpected field 'x'"));
    }

    #[test]
    fn conflicts_are_user_errors() {
        let exists = TraceError::AlreadyExists {
            app_id: "app".into(),
            provider: "langfuse".into(),
        };
        assert!(exists.is_user_error());
        assert_eq!(exists.status_code(), 409);
        assert!(TraceError::NotFound("x".into()).is_user_error());
    }

    #[test]
    fn crypto_is_not_a_user_error() {
        let err = TraceError::Crypto("tenant key missing".into());
        assert!(!err.is_user_error());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.code(), "CRYPTO_FAILED");
    }

    #[test]
    fn blocked_carries_preset_response() {
        let err = ModerationError::Blocked("Sorry, blocked".into());
        assert_eq!(err.preset_response(), Some("Sorry, blocked"));
        assert_eq!(err.code(), error_codes::MODERATION_BLOCKED);
        assert_eq!(ModerationError::Engine("down".into()).preset_response(), None);
    }

    #[test]
    fn sqlite_errors_map_to_storage() {
        let err: TraceError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(err.code(), error_codes::STORAGE_FAILED);
    }
}
