//! Tenant-scoped credential encryption.
//!
//! Ciphertext format: `v1:<base64(nonce || aead-ciphertext)>`, with a
//! 24-byte XChaCha20-Poly1305 nonce and the tenant id bound as associated
//! data.

use std::sync::Arc;

use base64::Engine;
use chacha20poly1305::XChaCha20Poly1305;
use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use rand::RngCore;

use super::keys::TenantKeyService;
use crate::error::{Result, TraceError};

const CIPHERTEXT_PREFIX: &str = "v1:";
const NONCE_LEN: usize = 24;

/// Encrypts and decrypts credential fields with a per-tenant key.
///
/// Holds no state besides the injected key service; cloning is cheap.
#[derive(Clone)]
pub struct CredentialCipher {
    keys: Arc<dyn TenantKeyService>,
}

impl CredentialCipher {
    pub fn new(keys: Arc<dyn TenantKeyService>) -> Self {
        Self { keys }
    }

    /// Encrypt `plaintext` for `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns `TraceError::Crypto` if the tenant key cannot be resolved.
    pub fn encrypt(&self, tenant_id: &str, plaintext: &str) -> Result<String> {
        let key = self.keys.tenant_key(tenant_id)?;
        let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(
                GenericArray::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: tenant_id.as_bytes(),
                },
            )
            .map_err(|e| TraceError::Crypto(format!("encryption failed: {e}")))?;

        let mut data = nonce.to_vec();
        data.extend_from_slice(&sealed);
        Ok(format!(
            "{CIPHERTEXT_PREFIX}{}",
            base64::engine::general_purpose::STANDARD.encode(data)
        ))
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt) for the same tenant.
    ///
    /// # Errors
    ///
    /// Returns `TraceError::Crypto` on a malformed, corrupt, or foreign-tenant
    /// ciphertext, or when the tenant key cannot be resolved.
    pub fn decrypt(&self, tenant_id: &str, ciphertext: &str) -> Result<String> {
        let encoded = ciphertext
            .strip_prefix(CIPHERTEXT_PREFIX)
            .ok_or_else(|| TraceError::Crypto("unrecognised ciphertext format".into()))?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| TraceError::Crypto(format!("invalid base64 ciphertext: {e}")))?;
        if data.len() <= NONCE_LEN {
            return Err(TraceError::Crypto("ciphertext too short".into()));
        }

        let key = self.keys.tenant_key(tenant_id)?;
        let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));
        let (nonce, sealed) = data.split_at(NONCE_LEN);

        let plain = cipher
            .decrypt(
                GenericArray::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: tenant_id.as_bytes(),
                },
            )
            .map_err(|_| {
                TraceError::Crypto(format!(
                    "ciphertext could not be decrypted for tenant '{tenant_id}'"
                ))
            })?;

        String::from_utf8(plain)
            .map_err(|_| TraceError::Crypto("decrypted credential is not UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::keys::{DerivedTenantKeys, StaticTenantKeys, TenantKey};

    fn cipher() -> CredentialCipher {
        let keys = match DerivedTenantKeys::new(b"test-master-secret-0001") {
            Ok(k) => k,
            Err(_) => unreachable!("secret is long enough"),
        };
        CredentialCipher::new(Arc::new(keys))
    }

    #[test]
    fn round_trip() {
        let c = cipher();
        let sealed = c.encrypt("tenant-1", "sk-lf-secret-value").unwrap_or_default();
        assert!(sealed.starts_with("v1:"));
        assert!(!sealed.contains("sk-lf-secret-value"));
        assert_eq!(
            c.decrypt("tenant-1", &sealed).ok().as_deref(),
            Some("sk-lf-secret-value")
        );
    }

    #[test]
    fn round_trip_empty_and_unicode() {
        let c = cipher();
        for value in ["", "ключ-🔑-鍵"] {
            let sealed = c.encrypt("t", value).unwrap_or_default();
            assert_eq!(c.decrypt("t", &sealed).ok().as_deref(), Some(value));
        }
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let c = cipher();
        let a = c.encrypt("t", "same").unwrap_or_default();
        let b = c.encrypt("t", "same").unwrap_or_default();
        assert_ne!(a, b);
    }

    #[test]
    fn foreign_tenant_cannot_decrypt() {
        let c = cipher();
        let sealed = c.encrypt("tenant-a", "secret").unwrap_or_default();
        assert!(matches!(
            c.decrypt("tenant-b", &sealed),
            Err(TraceError::Crypto(_))
        ));
    }

    #[test]
    fn tampered_ciphertext_rejected() {
        let c = cipher();
        let sealed = c.encrypt("t", "secret").unwrap_or_default();
        let mut data = base64::engine::general_purpose::STANDARD
            .decode(sealed.trim_start_matches(CIPHERTEXT_PREFIX))
            .unwrap_or_default();
        if let Some(last) = data.last_mut() {
            *last ^= 0x01;
        }
        let tampered = format!(
            "v1:{}",
            base64::engine::general_purpose::STANDARD.encode(data)
        );
        assert!(matches!(
            c.decrypt("t", &tampered),
            Err(TraceError::Crypto(_))
        ));
    }

    #[test]
    fn malformed_inputs_rejected() {
        let c = cipher();
        for bad in ["plain-text", "v1:!!!not-base64", "v1:AAAA"] {
            assert!(
                matches!(c.decrypt("t", bad), Err(TraceError::Crypto(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn missing_tenant_key_fails_encrypt() {
        let keys = StaticTenantKeys::new().with_key("known", TenantKey::from_bytes([3; 32]));
        let c = CredentialCipher::new(Arc::new(keys));
        assert!(c.encrypt("known", "x").is_ok());
        assert!(matches!(
            c.encrypt("unknown", "x"),
            Err(TraceError::Crypto(_))
        ));
    }
}
