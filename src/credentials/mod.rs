//! Tenant-scoped credential protection.
//!
//! - [`CredentialCipher`]: encrypt/decrypt a credential field with the key
//!   of the owning tenant.
//! - [`TenantKeyService`]: injected key source ([`DerivedTenantKeys`] in
//!   production, [`StaticTenantKeys`] for fixed maps).
//! - [`obfuscate`]: lossy masking for API responses.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use opstrace::credentials::{CredentialCipher, DerivedTenantKeys, obfuscate};
//!
//! # fn example() -> opstrace::Result<()> {
//! let keys = DerivedTenantKeys::new(b"a-master-secret-of-some-length")?;
//! let cipher = CredentialCipher::new(Arc::new(keys));
//!
//! let sealed = cipher.encrypt("tenant-1", "sk-lf-...")?;
//! let plain = cipher.decrypt("tenant-1", &sealed)?;
//! println!("{}", obfuscate(&plain));
//! # Ok(())
//! # }
//! ```

mod cipher;
mod keys;
mod obfuscate;

pub use cipher::CredentialCipher;
pub use keys::{DerivedTenantKeys, StaticTenantKeys, TenantKey, TenantKeyService};
pub use obfuscate::{MASK_CHAR, is_masked, obfuscate};
