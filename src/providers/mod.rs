//! Provider config schema registry.
//!
//! Maps a [`TracingProvider`] to its credential shape and validates raw
//! JSON configuration into [`TracingCredentials`].

mod schema;
mod types;

pub use schema::{
    FieldSpec, ProviderSchema, SCHEMAS, TracingCredentials, normalize, schema_for,
    secret_field_names,
};
pub use types::{LangSmithConfig, LangfuseConfig, TracingProvider};
