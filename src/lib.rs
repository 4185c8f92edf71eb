//! Opstrace: tracing-provider configuration with tenant-scoped credentials.
//!
//! Applications attach an external tracing provider (Langfuse, LangSmith)
//! whose credentials are encrypted at rest with a per-tenant key. Moderation
//! checks forward their verdicts to the active provider through a
//! fire-and-forget queue.
//!
//! # Architecture
//!
//! - **Config store**: CRUD over one config per (application, provider),
//!   validated against the provider schema registry
//! - **Credential cipher**: XChaCha20-Poly1305 with BLAKE3-derived tenant keys
//! - **Resolver**: picks the governing trace config from a chain of sources
//!   and builds a live client
//! - **Queue**: bounded tokio channel drained by a delivery worker
//! - **Moderation**: runs the input policy and dispatches its trace

pub mod api;
pub mod clients;
pub mod config;
pub mod credentials;
pub mod error;
pub mod moderation;
pub mod observability;
pub mod providers;
pub mod queue;
pub mod resolver;
pub mod store;

pub use config::OpsTraceConfig;
pub use error::{ModerationError, Result, TraceError};
pub use moderation::InputModeration;
pub use providers::TracingProvider;
pub use queue::{TraceQueue, TraceQueueManager};
pub use resolver::TraceInstanceResolver;
pub use store::ConfigStore;
