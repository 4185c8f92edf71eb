//! Tenant key resolution.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, TraceError};

/// BLAKE3 derive-key context for the master secret.
const MASTER_KEY_CONTEXT: &str = "opstrace 2024-06 tenant credential master key";

/// 256-bit symmetric key scoped to one tenant.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantKey([u8; 32]);

impl TenantKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantKey([REDACTED])")
    }
}

/// Resolves a tenant's encryption key on demand.
///
/// Injected into [`CredentialCipher`](super::CredentialCipher) so key
/// rotation and test substitution don't touch the cipher.
pub trait TenantKeyService: Send + Sync {
    /// # Errors
    ///
    /// Returns `TraceError::Crypto` if no key can be produced for `tenant_id`.
    fn tenant_key(&self, tenant_id: &str) -> Result<TenantKey>;
}

/// Derives every tenant key from one master secret.
///
/// `key = BLAKE3-keyed(master, tenant_id)` where `master` is itself derived
/// from the configured secret, so the same tenant always gets the same key.
pub struct DerivedTenantKeys {
    master: [u8; 32],
}

impl DerivedTenantKeys {
    /// # Errors
    ///
    /// Returns `TraceError::Crypto` if `secret` is shorter than 16 bytes.
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.len() < 16 {
            return Err(TraceError::Crypto(format!(
                "master secret too short: {} bytes, need at least 16",
                secret.len()
            )));
        }
        Ok(Self {
            master: blake3::derive_key(MASTER_KEY_CONTEXT, secret),
        })
    }
}

impl TenantKeyService for DerivedTenantKeys {
    fn tenant_key(&self, tenant_id: &str) -> Result<TenantKey> {
        if tenant_id.is_empty() {
            return Err(TraceError::Crypto("empty tenant id".into()));
        }
        let hash = blake3::keyed_hash(&self.master, tenant_id.as_bytes());
        Ok(TenantKey(*hash.as_bytes()))
    }
}

/// Fixed tenant → key map. Unknown tenants fail.
#[derive(Default)]
pub struct StaticTenantKeys {
    keys: HashMap<String, TenantKey>,
}

impl StaticTenantKeys {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_key(mut self, tenant_id: impl Into<String>, key: TenantKey) -> Self {
        self.keys.insert(tenant_id.into(), key);
        self
    }
}

impl TenantKeyService for StaticTenantKeys {
    fn tenant_key(&self, tenant_id: &str) -> Result<TenantKey> {
        self.keys
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| TraceError::Crypto(format!("no key for tenant '{tenant_id}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derived() -> DerivedTenantKeys {
        match DerivedTenantKeys::new(b"0123456789abcdef-master") {
            Ok(k) => k,
            Err(_) => unreachable!("secret is long enough"),
        }
    }

    #[test]
    fn derivation_is_deterministic_per_tenant() {
        let keys = derived();
        let a1 = keys.tenant_key("tenant-a").ok();
        let a2 = keys.tenant_key("tenant-a").ok();
        let b = keys.tenant_key("tenant-b").ok();
        assert!(a1.is_some());
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn different_master_different_key() {
        let other = DerivedTenantKeys::new(b"another-master-secret!!").ok();
        assert!(other.is_some());
        let k1 = derived().tenant_key("t").ok();
        let k2 = other.and_then(|o| o.tenant_key("t").ok());
        assert_ne!(k1, k2);
    }

    #[test]
    fn short_master_rejected() {
        assert!(matches!(
            DerivedTenantKeys::new(b"short"),
            Err(TraceError::Crypto(_))
        ));
    }

    #[test]
    fn empty_tenant_rejected() {
        assert!(derived().tenant_key("").is_err());
    }

    #[test]
    fn static_keys_unknown_tenant_is_crypto_error() {
        let keys = StaticTenantKeys::new().with_key("t1", TenantKey::from_bytes([7; 32]));
        assert!(keys.tenant_key("t1").is_ok());
        assert!(matches!(keys.tenant_key("t2"), Err(TraceError::Crypto(_))));
    }

    #[test]
    fn tenant_key_debug_is_redacted() {
        let key = TenantKey::from_bytes([1; 32]);
        assert_eq!(format!("{key:?}"), "TenantKey([REDACTED])");
    }
}
