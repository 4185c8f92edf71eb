//! Config store: one tracing config per (application, provider).
//!
//! Orchestrates the schema registry and the credential cipher so that
//! secrets are encrypted at rest and masked on every read that leaves the
//! crate. The only plaintext read path is [`ConfigStore::get_decrypted`],
//! used by the resolver to drive a real trace client.

pub mod repository;
mod schema;
pub mod sqlite;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config_store_span;
use crate::credentials::{CredentialCipher, obfuscate};
use crate::error::{Result, TraceError};
use crate::providers::{TracingCredentials, TracingProvider, normalize};

pub use repository::{
    AppDirectory, AppModelConfigRow, ConversationRow, TraceConfigRecord, TraceConfigRepository,
};
pub use sqlite::SqliteRepository;

/// Read view of a stored config with every secret field masked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObfuscatedConfig {
    pub app_id: String,
    pub tracing_provider: TracingProvider,
    pub tracing_config: Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// CRUD over tracing provider configs.
#[derive(Clone)]
pub struct ConfigStore {
    records: Arc<dyn TraceConfigRepository>,
    apps: Arc<dyn AppDirectory>,
    cipher: CredentialCipher,
}

impl ConfigStore {
    pub fn new(
        records: Arc<dyn TraceConfigRepository>,
        apps: Arc<dyn AppDirectory>,
        cipher: CredentialCipher,
    ) -> Self {
        Self {
            records,
            apps,
            cipher,
        }
    }

    /// Load a config with secrets decrypted and then masked.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no record (or no such application), `Crypto`
    /// if the stored secrets cannot be decrypted.
    pub fn get(&self, app_id: &str, provider: TracingProvider) -> Result<ObfuscatedConfig> {
        let span = config_store_span!("get", app_id, provider);
        let _enter = span.enter();

        let record = self.find_record(app_id, provider)?;
        let tenant_id = self.tenant_of(app_id)?;
        let plain = self.decrypt_credentials(&tenant_id, &record)?;
        let masked = plain.map_secrets(|secret| Ok(obfuscate(secret)))?;

        debug!("returning obfuscated tracing config");
        Ok(ObfuscatedConfig {
            app_id: record.app_id,
            tracing_provider: record.tracing_provider,
            tracing_config: masked.to_json(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Validate, encrypt and persist a new config.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if a record exists for the key, `Validation` for a bad
    /// credential map, `NotFound` for an unknown application, `Crypto` when
    /// the tenant key is unavailable.
    pub fn create(
        &self,
        app_id: &str,
        provider: TracingProvider,
        raw_config: &Map<String, Value>,
    ) -> Result<TraceConfigRecord> {
        let span = config_store_span!("create", app_id, provider);
        let _enter = span.enter();

        if self.records.find(app_id, provider)?.is_some() {
            return Err(TraceError::AlreadyExists {
                app_id: app_id.to_owned(),
                provider: provider.to_string(),
            });
        }

        let tenant_id = self.tenant_of(app_id)?;
        let sealed = self.seal(&tenant_id, provider, raw_config)?;
        let now = chrono::Utc::now().timestamp();
        let record = TraceConfigRecord {
            app_id: app_id.to_owned(),
            tracing_provider: provider,
            tracing_config: sealed.to_json(),
            created_at: now,
            updated_at: now,
        };
        // Uniqueness is enforced again by the repository, which decides races.
        self.records.insert(&record)?;

        info!("tracing config created");
        Ok(record)
    }

    /// Validate, encrypt and overwrite an existing config.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no record, otherwise as [`create`](Self::create).
    pub fn update(
        &self,
        app_id: &str,
        provider: TracingProvider,
        raw_config: &Map<String, Value>,
    ) -> Result<TraceConfigRecord> {
        let span = config_store_span!("update", app_id, provider);
        let _enter = span.enter();

        self.find_record(app_id, provider)?;
        let tenant_id = self.tenant_of(app_id)?;
        let sealed = self.seal(&tenant_id, provider, raw_config)?;
        let now = chrono::Utc::now().timestamp();

        let record = self
            .records
            .update_config(app_id, provider, &sealed.to_json(), now)?
            .ok_or_else(|| not_found(app_id, provider))?;

        info!("tracing config updated");
        Ok(record)
    }

    /// Remove a config. Returns `false` if there was none.
    pub fn delete(&self, app_id: &str, provider: TracingProvider) -> Result<bool> {
        let span = config_store_span!("delete", app_id, provider);
        let _enter = span.enter();

        let deleted = self.records.delete(app_id, provider)?;
        if deleted {
            info!("tracing config deleted");
        } else {
            debug!("no tracing config to delete");
        }
        Ok(deleted)
    }

    /// Plaintext credentials for driving a trace client, or `None` if no
    /// record exists.
    ///
    /// # Errors
    ///
    /// `Crypto` on decryption failure, `NotFound` for an unknown application.
    pub fn get_decrypted(
        &self,
        app_id: &str,
        provider: TracingProvider,
    ) -> Result<Option<TracingCredentials>> {
        let Some(record) = self.records.find(app_id, provider)? else {
            return Ok(None);
        };
        let tenant_id = self.tenant_of(app_id)?;
        self.decrypt_credentials(&tenant_id, &record).map(Some)
    }

    fn seal(
        &self,
        tenant_id: &str,
        provider: TracingProvider,
        raw_config: &Map<String, Value>,
    ) -> Result<TracingCredentials> {
        let plain = normalize(provider, raw_config)?;
        plain.map_secrets(|secret| self.cipher.encrypt(tenant_id, secret))
    }

    fn decrypt_credentials(
        &self,
        tenant_id: &str,
        record: &TraceConfigRecord,
    ) -> Result<TracingCredentials> {
        let stored =
            TracingCredentials::from_stored(record.tracing_provider, &record.tracing_config)?;
        stored.map_secrets(|sealed| self.cipher.decrypt(tenant_id, sealed))
    }

    fn find_record(&self, app_id: &str, provider: TracingProvider) -> Result<TraceConfigRecord> {
        self.records
            .find(app_id, provider)?
            .ok_or_else(|| not_found(app_id, provider))
    }

    fn tenant_of(&self, app_id: &str) -> Result<String> {
        self.apps
            .tenant_id(app_id)?
            .ok_or_else(|| TraceError::NotFound(format!("app '{app_id}' not found")))
    }
}

fn not_found(app_id: &str, provider: TracingProvider) -> TraceError {
    TraceError::NotFound(format!(
        "tracing config for app '{app_id}' and provider '{provider}' does not exist"
    ))
}
