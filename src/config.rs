//! Service configuration.
//!
//! Loaded from a TOML file; every section has defaults so an empty file
//! (or no file at all) yields a usable config.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, TraceError};

/// Root configuration for the opstrace service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsTraceConfig {
    /// Where tracing configs are persisted.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Tenant key derivation settings.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Trace task queue sizing.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Outbound trace client settings.
    #[serde(default)]
    pub clients: ClientConfig,

    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for OpsTraceConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            crypto: CryptoConfig::default(),
            queue: QueueConfig::default(),
            clients: ClientConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Environment variable holding the base64-encoded master secret.
    #[serde(default = "default_master_key_env")]
    pub master_key_env: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            master_key_env: default_master_key_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Bounded channel capacity. Submissions beyond this are rejected.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Maximum trace deliveries running at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("opstrace")
        .join("opstrace.db")
}

fn default_master_key_env() -> String {
    "OPSTRACE_MASTER_KEY".to_owned()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_in_flight() -> usize {
    8
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_log_filter() -> String {
    "opstrace=info".to_owned()
}

impl OpsTraceConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    ///
    /// # Errors
    /// Returns `TraceError::Config` on read, parse, or validation failure.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file absent, using defaults");
            return Ok(Self::default());
        }
        let config = read_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns `TraceError::Config` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.queue.capacity == 0 {
            return Err(TraceError::Config("queue.capacity must be > 0".into()));
        }
        if self.queue.max_in_flight == 0 {
            return Err(TraceError::Config("queue.max_in_flight must be > 0".into()));
        }
        if self.clients.request_timeout_secs == 0 {
            return Err(TraceError::Config(
                "clients.request_timeout_secs must be > 0".into(),
            ));
        }
        if self.crypto.master_key_env.trim().is_empty() {
            return Err(TraceError::Config("crypto.master_key_env is empty".into()));
        }
        Ok(())
    }

    /// Trace client settings derived from `[clients]`.
    pub fn client_options(&self) -> crate::clients::ClientOptions {
        crate::clients::ClientOptions {
            request_timeout: std::time::Duration::from_secs(self.clients.request_timeout_secs),
        }
    }

    /// Default config file location (`<config dir>/opstrace/config.toml`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("opstrace")
            .join("config.toml")
    }

    /// Read the master secret from the configured environment variable.
    ///
    /// # Errors
    /// Returns `TraceError::Crypto` if the variable is unset or not base64.
    pub fn master_secret(&self) -> Result<Vec<u8>> {
        use base64::Engine;

        let raw = std::env::var(&self.crypto.master_key_env).map_err(|_| {
            TraceError::Crypto(format!(
                "master key variable '{}' is not set",
                self.crypto.master_key_env
            ))
        })?;
        base64::engine::general_purpose::STANDARD
            .decode(raw.trim())
            .map_err(|e| TraceError::Crypto(format!("master key is not valid base64: {e}")))
    }
}

/// Read a config file from disk and deserialize it.
///
/// # Errors
/// Returns `TraceError::Config` if the file cannot be read or parsed.
pub fn read_config(path: &Path) -> Result<OpsTraceConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TraceError::Config(format!(
            "failed to read config file '{}': {e}",
            path.display()
        ))
    })?;
    toml::from_str(&contents).map_err(|e| {
        TraceError::Config(format!(
            "failed to parse config file '{}': {e}",
            path.display()
        ))
    })
}

/// Write a config file atomically (temp file → fsync → rename).
///
/// # Errors
/// Returns `TraceError::Config` on serialization, write, or rename failure.
pub fn write_config_atomic(path: &Path, config: &OpsTraceConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| TraceError::Config(format!("failed to serialize config: {e}")))?;
    let tmp_path = path.with_extension("toml.tmp");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            TraceError::Config(format!(
                "failed to create config directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
        TraceError::Config(format!(
            "failed to create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;
    file.write_all(toml_str.as_bytes())
        .map_err(|e| TraceError::Config(format!("failed to write temp file: {e}")))?;
    file.sync_all()
        .map_err(|e| TraceError::Config(format!("failed to sync temp file: {e}")))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        TraceError::Config(format!(
            "failed to rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_dir() -> tempfile::TempDir {
        match tempfile::tempdir() {
            Ok(d) => d,
            Err(_) => unreachable!("tempdir creation should not fail"),
        }
    }

    #[test]
    fn empty_file_yields_defaults() {
        let parsed: std::result::Result<OpsTraceConfig, _> = toml::from_str("");
        assert!(parsed.is_ok());
        let config = parsed.unwrap_or_default();
        assert_eq!(config.queue.capacity, 1024);
        assert_eq!(config.queue.max_in_flight, 8);
        assert_eq!(config.clients.request_timeout_secs, 10);
        assert_eq!(config.crypto.master_key_env, "OPSTRACE_MASTER_KEY");
        assert_eq!(config.log_filter, "opstrace=info");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let parsed: std::result::Result<OpsTraceConfig, _> =
            toml::from_str("[queue]\ncapacity = 16\n");
        let config = parsed.unwrap_or_default();
        assert_eq!(config.queue.capacity, 16);
        assert_eq!(config.queue.max_in_flight, 8);
    }

    #[test]
    fn write_then_load_round_trip() {
        let dir = make_test_dir();
        let path = dir.path().join("opstrace.toml");
        let mut config = OpsTraceConfig::default();
        config.storage.database_path = dir.path().join("db.sqlite");
        config.queue.capacity = 4;

        assert!(write_config_atomic(&path, &config).is_ok());
        let loaded = OpsTraceConfig::load_or_default(&path);
        assert!(loaded.is_ok());
        let loaded = loaded.unwrap_or_default();
        assert_eq!(loaded.queue.capacity, 4);
        assert_eq!(loaded.storage.database_path, dir.path().join("db.sqlite"));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = make_test_dir();
        let loaded = OpsTraceConfig::load_or_default(&dir.path().join("nope.toml"));
        assert!(loaded.is_ok());
    }

    #[test]
    fn default_impl_matches_serde_defaults() {
        let config = OpsTraceConfig::default();
        assert_eq!(config.log_filter, "opstrace=info");
        assert!(config.validate().is_ok());
        assert_eq!(config.client_options().request_timeout.as_secs(), 10);
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut config = OpsTraceConfig::default();
        config.queue.capacity = 0;
        assert!(matches!(config.validate(), Err(TraceError::Config(_))));
    }

    #[test]
    fn garbage_file_is_config_error() {
        let dir = make_test_dir();
        let path = dir.path().join("bad.toml");
        let _ = std::fs::write(&path, "queue = [[[");
        assert!(matches!(read_config(&path), Err(TraceError::Config(_))));
    }

    #[test]
    fn master_secret_missing_env_is_crypto_error() {
        let mut config = OpsTraceConfig::default();
        config.crypto.master_key_env = "OPSTRACE_TEST_UNSET_MASTER_KEY_VAR".into();
        assert!(matches!(config.master_secret(), Err(TraceError::Crypto(_))));
    }
}
