//! Password-based key derivation (PBKDF2-HMAC-SHA256).
//!
//! Salt and iteration count are constants, so a password maps to the same
//! wrapping key on every machine and nothing per-identity is stored.

use std::fmt;

use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{MendError, Result};

/// Fixed KDF salt.
pub const KDF_SALT: [u8; 16] = *b"mend/kdf/salt/v1";

/// PBKDF2 iteration count.
pub const KDF_ITERATIONS: u32 = 65_536;

/// Derived key length; the wrapping cipher is AES-256.
pub const KEY_LENGTH: usize = 32;

/// The key that wraps the private key and the pass-check. Zeroized on drop.
pub struct DerivedKey(Zeroizing<[u8; KEY_LENGTH]>);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Derive the wrapping key for `password`.
///
/// ```
/// use mend_core::crypto::derive_key;
///
/// let key = derive_key("correct horse").unwrap();
/// assert_eq!(key.as_bytes().len(), 32);
/// ```
pub fn derive_key(password: &str) -> Result<DerivedKey> {
    derive_key_with_salt(password, &KDF_SALT)
}

/// Derive with an explicit salt of at least 16 bytes.
pub fn derive_key_with_salt(password: &str, salt: &[u8]) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(MendError::InvalidInput("Password cannot be empty".to_string()));
    }
    if salt.len() < KDF_SALT.len() {
        return Err(MendError::InvalidInput(format!(
            "KDF salt must be at least {} bytes",
            KDF_SALT.len()
        )));
    }

    let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut *key);
    Ok(DerivedKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_password_same_key() {
        let a = derive_key("hunter2").unwrap();
        let b = derive_key("hunter2").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_inputs_change_the_key() {
        let base = derive_key("hunter2").unwrap();
        assert_ne!(base.as_bytes(), derive_key("hunter3").unwrap().as_bytes());

        let salted = derive_key_with_salt("hunter2", b"another-salt-0123").unwrap();
        assert_ne!(base.as_bytes(), salted.as_bytes());
    }

    #[test]
    fn test_rejects_empty_password_and_short_salt() {
        assert!(matches!(derive_key(""), Err(MendError::InvalidInput(_))));
        let err = derive_key_with_salt("hunter2", b"salt").unwrap_err();
        assert!(err.to_string().contains("at least 16 bytes"));
    }

    #[test]
    fn test_debug_hides_key() {
        let key = derive_key("hunter2").unwrap();
        let shown = format!("{:?}", key);
        assert_eq!(shown, "DerivedKey([REDACTED])");
        assert!(!shown.contains(&hex::encode(&key.as_bytes()[..4])));
    }
}
