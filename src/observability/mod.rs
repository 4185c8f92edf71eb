//! Logging conventions for opstrace.
//!
//! Span and field names live in [`spans`] so store, resolver and dispatch
//! logs line up under the same keys. [`RedactedString`] keeps decrypted
//! credentials out of `Debug`/`Display` output.

pub mod redact;
pub mod spans;

pub use redact::RedactedString;
pub use spans::{
    FIELD_APP_ID, FIELD_MESSAGE_ID, FIELD_PROVIDER, FIELD_SOURCE, FIELD_TASK_ID, FIELD_TASK_KIND,
    SPAN_CONFIG_STORE, SPAN_MODERATION_CHECK, SPAN_RESOLVE, SPAN_TRACE_DELIVER,
};
