//! Credential handles for client structs.
//!
//! ```rust
//! use opstrace::observability::RedactedString;
//!
//! let key = RedactedString::new("sk-lf-1234567890");
//! assert_eq!(format!("{key}"), "sk-lf-************90");
//! assert_eq!(key.expose(), "sk-lf-1234567890");
//! ```

use std::fmt;

use crate::credentials::obfuscate;

/// Decrypted credential held by a trace client.
///
/// Formats as the same masked form the config API returns, so a client
/// handle can be logged or `{:?}`-printed freely.
#[derive(Clone, PartialEq, Eq)]
pub struct RedactedString(String);

impl RedactedString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Plaintext, for request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RedactedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&obfuscate(&self.0))
    }
}

impl fmt::Debug for RedactedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RedactedString")
            .field(&obfuscate(&self.0))
            .finish()
    }
}
