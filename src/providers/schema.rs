//! Provider credential schemas.
//!
//! One [`ProviderSchema`] per provider declares the credential field names
//! and which of them are secret. Everything that encrypts, decrypts or masks
//! credentials goes through [`TracingCredentials::map_secrets`], which only
//! ever looks at the schema, so adding a provider means adding one entry to
//! [`SCHEMAS`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::{Map, Value};

use super::types::{LangSmithConfig, LangfuseConfig, TracingProvider};
use crate::credentials::is_masked;
use crate::error::{Result, TraceError};

/// One credential field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub secret: bool,
}

/// Credential shape of one provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderSchema {
    pub provider: TracingProvider,
    pub fields: &'static [FieldSpec],
}

impl ProviderSchema {
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn secret_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.secret).map(|f| f.name)
    }

    pub fn is_secret(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.secret && f.name == name)
    }
}

const LANGFUSE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "public_key",
        secret: true,
    },
    FieldSpec {
        name: "secret_key",
        secret: true,
    },
    FieldSpec {
        name: "host",
        secret: false,
    },
];

const LANGSMITH_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "api_key",
        secret: true,
    },
    FieldSpec {
        name: "project",
        secret: false,
    },
    FieldSpec {
        name: "endpoint",
        secret: false,
    },
];

/// The registry.
pub static SCHEMAS: &[ProviderSchema] = &[
    ProviderSchema {
        provider: TracingProvider::Langfuse,
        fields: LANGFUSE_FIELDS,
    },
    ProviderSchema {
        provider: TracingProvider::LangSmith,
        fields: LANGSMITH_FIELDS,
    },
];

/// Look up the schema of `provider`.
pub fn schema_for(provider: TracingProvider) -> &'static ProviderSchema {
    SCHEMAS
        .iter()
        .find(|s| s.provider == provider)
        .unwrap_or_else(|| unreachable!("every TracingProvider has a schema entry"))
}

/// Field names that must be encrypted at rest and masked on read.
pub fn secret_field_names(provider: TracingProvider) -> BTreeSet<&'static str> {
    schema_for(provider).secret_fields().collect()
}

/// Validate `raw` against the schema of `provider`.
///
/// `raw` must contain exactly the declared fields, all strings. Secret fields
/// must be non-empty and must not be a masked value echoed back from a read.
///
/// # Errors
///
/// Returns `TraceError::Validation` listing every problem found.
pub fn normalize(provider: TracingProvider, raw: &Map<String, Value>) -> Result<TracingCredentials> {
    let schema = schema_for(provider);
    let mut problems = Vec::new();
    let mut fields = BTreeMap::new();

    for spec in schema.fields {
        match raw.get(spec.name) {
            None => problems.push(format!("missing field '{}'", spec.name)),
            Some(Value::String(s)) => {
                if spec.secret && s.is_empty() {
                    problems.push(format!("field '{}' must not be empty", spec.name));
                } else if spec.secret && is_masked(s) {
                    problems.push(format!(
                        "field '{}' holds a masked value, not a credential",
                        spec.name
                    ));
                } else {
                    fields.insert(spec.name.to_owned(), s.clone());
                }
            }
            Some(_) => problems.push(format!("field '{}' must be a string", spec.name)),
        }
    }

    let mut extra: Vec<&String> = raw
        .keys()
        .filter(|k| !schema.field_names().any(|n| n == k.as_str()))
        .collect();
    extra.sort();
    for key in extra {
        problems.push(format!("unexpected field '{key}'"));
    }

    if !problems.is_empty() {
        return Err(TraceError::Validation {
            provider: provider.to_string(),
            problems,
        });
    }
    Ok(TracingCredentials { provider, fields })
}

/// Schema-checked credential map for one provider.
///
/// Values are either all plaintext, all ciphertext, or all masked in their
/// secret fields, depending on where in the store pipeline the value sits.
#[derive(Clone, PartialEq, Eq)]
pub struct TracingCredentials {
    provider: TracingProvider,
    fields: BTreeMap<String, String>,
}

impl TracingCredentials {
    pub fn provider(&self) -> TracingProvider {
        self.provider
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Apply `f` to every secret field, leaving other fields untouched.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `f`.
    pub fn map_secrets<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<String>,
    {
        let schema = schema_for(self.provider);
        let mut fields = BTreeMap::new();
        for (name, value) in &self.fields {
            let mapped = if schema.is_secret(name) {
                f(value)?
            } else {
                value.clone()
            };
            fields.insert(name.clone(), mapped);
        }
        Ok(Self {
            provider: self.provider,
            fields,
        })
    }

    /// Rebuild from a persisted JSON object without re-running the secret
    /// checks (stored secret fields hold ciphertext).
    ///
    /// # Errors
    ///
    /// Returns `TraceError::Validation` when the stored shape does not match.
    pub fn from_stored(provider: TracingProvider, value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| TraceError::Validation {
            provider: provider.to_string(),
            problems: vec!["stored config is not a JSON object".into()],
        })?;
        let schema = schema_for(provider);
        let mut problems = Vec::new();
        let mut fields = BTreeMap::new();
        for name in schema.field_names() {
            match obj.get(name).and_then(Value::as_str) {
                Some(s) => {
                    fields.insert(name.to_owned(), s.to_owned());
                }
                None => problems.push(format!("stored field '{name}' missing or not a string")),
            }
        }
        if !problems.is_empty() {
            return Err(TraceError::Validation {
                provider: provider.to_string(),
                problems,
            });
        }
        Ok(Self { provider, fields })
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }

    /// Typed Langfuse view; `None` for other providers.
    pub fn as_langfuse(&self) -> Option<LangfuseConfig> {
        if self.provider != TracingProvider::Langfuse {
            return None;
        }
        Some(LangfuseConfig {
            public_key: self.get("public_key")?.to_owned(),
            secret_key: self.get("secret_key")?.to_owned(),
            host: self.get("host")?.to_owned(),
        })
    }

    /// Typed LangSmith view; `None` for other providers.
    pub fn as_langsmith(&self) -> Option<LangSmithConfig> {
        if self.provider != TracingProvider::LangSmith {
            return None;
        }
        Some(LangSmithConfig {
            api_key: self.get("api_key")?.to_owned(),
            project: self.get("project")?.to_owned(),
            endpoint: self.get("endpoint")?.to_owned(),
        })
    }
}

impl fmt::Debug for TracingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = schema_for(self.provider);
        let mut map = f.debug_map();
        for (name, value) in &self.fields {
            if schema.is_secret(name) {
                map.entry(name, &"[REDACTED]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}
