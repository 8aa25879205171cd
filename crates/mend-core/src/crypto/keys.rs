//! RSA key pairs, their binary encodings, and password wrapping.
//!
//! Private keys encode as PKCS#8 DER and public keys as SubjectPublicKeyInfo
//! DER. At rest the private key exists only wrapped under a key derived
//! from the user's password (see [`super::kdf`]).

use std::fmt;

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::kdf::derive_key;
use super::symmetric::{decrypt_with_key, encrypt_with_key, BLOCK_SIZE};
use super::AsymmetricScheme;
use crate::error::{MendError, Result};

/// Recommended modulus size for new identities.
pub const RECOMMENDED_MODULUS_BITS: usize = 4096;

/// Modulus size used when the recommended size is rejected.
pub const FALLBACK_MODULUS_BITS: usize = 2048;

/// Smallest modulus the backend accepts.
pub const MIN_MODULUS_BITS: usize = 1024;

/// Largest modulus the backend accepts.
pub const MAX_MODULUS_BITS: usize = 8192;

/// Known plaintext wrapped next to the private key to validate passwords.
pub const PASS_CHECK_TEXT: &str = "MEND pass-check: this text verifies the password";

/// An RSA public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: RsaPublicKey,
}

impl PublicKey {
    /// Parse SubjectPublicKeyInfo DER.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        RsaPublicKey::from_public_key_der(bytes)
            .map(|inner| Self { inner })
            .map_err(|e| MendError::InvalidKeyEncoding(format!("public key: {}", e)))
    }

    /// Encode as SubjectPublicKeyInfo DER.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| MendError::InvalidKeyEncoding(format!("public key: {}", e)))
    }

    pub fn modulus_bits(&self) -> usize {
        self.inner.size() * 8
    }

    /// Encrypt a short message (a session key or an extension tag).
    pub fn encrypt(&self, scheme: AsymmetricScheme, message: &[u8]) -> Result<Vec<u8>> {
        let result = match scheme {
            AsymmetricScheme::OaepSha256 => {
                self.inner.encrypt(&mut OsRng, Oaep::new::<Sha256>(), message)
            }
            AsymmetricScheme::Pkcs1v15 => self.inner.encrypt(&mut OsRng, Pkcs1v15Encrypt, message),
        };
        result.map_err(|e| MendError::InvalidInput(format!("Asymmetric encryption failed: {}", e)))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("modulus_bits", &self.modulus_bits())
            .finish()
    }
}

/// An RSA private key. The backend zeroizes it on drop.
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl PrivateKey {
    /// Parse PKCS#8 DER.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        RsaPrivateKey::from_pkcs8_der(bytes)
            .map(|inner| Self { inner })
            .map_err(|e| MendError::InvalidKeyEncoding(format!("private key: {}", e)))
    }

    /// Encode as PKCS#8 DER. The caller owns the zeroizing buffer.
    pub fn to_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.inner
            .to_pkcs8_der()
            .map(|doc| Zeroizing::new(doc.as_bytes().to_vec()))
            .map_err(|e| MendError::InvalidKeyEncoding(format!("private key: {}", e)))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: RsaPublicKey::from(&self.inner),
        }
    }

    /// Decrypt a short message. Every failure is `DecryptionFailed`.
    pub fn decrypt(
        &self,
        scheme: AsymmetricScheme,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        let result = match scheme {
            AsymmetricScheme::OaepSha256 => self.inner.decrypt(Oaep::new::<Sha256>(), ciphertext),
            AsymmetricScheme::Pkcs1v15 => self.inner.decrypt(Pkcs1v15Encrypt, ciphertext),
        };
        result
            .map(Zeroizing::new)
            .map_err(|_| MendError::DecryptionFailed)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// A matched public/private key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

/// Password-protected key material, produced once at setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKeyMaterial {
    pub wrapped_private_key: Vec<u8>,
    pub public_key: Vec<u8>,
    pub wrapped_pass_check: Vec<u8>,
}

/// `UnsupportedKeySize` unless `bits` is a multiple of 8 within the accepted range.
pub fn check_modulus_bits(bits: usize) -> Result<()> {
    if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&bits) || bits % 8 != 0 {
        return Err(MendError::UnsupportedKeySize { bits });
    }
    Ok(())
}

/// Generate a fresh key pair.
///
/// # Errors
///
/// `UnsupportedKeySize` if the size is outside what the backend accepts.
pub fn generate_key_pair(modulus_bits: usize) -> Result<KeyPair> {
    check_modulus_bits(modulus_bits)?;

    debug!(modulus_bits, "generating RSA key pair");
    let private = RsaPrivateKey::new(&mut OsRng, modulus_bits)
        .map_err(|_| MendError::UnsupportedKeySize { bits: modulus_bits })?;
    let public = RsaPublicKey::from(&private);

    Ok(KeyPair {
        public: PublicKey { inner: public },
        private: PrivateKey { inner: private },
    })
}

/// Generate at the requested size, retrying at [`FALLBACK_MODULUS_BITS`] if refused.
pub fn generate_key_pair_with_fallback(modulus_bits: usize) -> Result<KeyPair> {
    match generate_key_pair(modulus_bits) {
        Err(MendError::UnsupportedKeySize { bits }) if bits != FALLBACK_MODULUS_BITS => {
            warn!(
                requested = bits,
                fallback = FALLBACK_MODULUS_BITS,
                "key size rejected, falling back"
            );
            generate_key_pair(FALLBACK_MODULUS_BITS)
        }
        other => other,
    }
}

/// Parse externally supplied key material and check that the halves match.
pub fn decode_key_pair(private_key_der: &[u8], public_key_der: &[u8]) -> Result<KeyPair> {
    let private = PrivateKey::from_der(private_key_der)?;
    let public = PublicKey::from_der(public_key_der)?;

    if private.public_key() != public {
        return Err(MendError::InvalidKeyEncoding(
            "public key does not belong to private key".to_string(),
        ));
    }

    Ok(KeyPair { public, private })
}

/// Wrap the private key and the pass-check text under a password-derived key.
pub fn wrap_private_key(
    password: &str,
    pass_check_text: &str,
    key_pair: &KeyPair,
) -> Result<WrappedKeyMaterial> {
    let derived = derive_key(password)?;
    let private_der = key_pair.private.to_der()?;

    Ok(WrappedKeyMaterial {
        wrapped_private_key: encrypt_with_key(derived.as_bytes(), &private_der)?,
        public_key: key_pair.public.to_der()?,
        wrapped_pass_check: encrypt_with_key(derived.as_bytes(), pass_check_text.as_bytes())?,
    })
}

/// Check a password against the wrapped pass-check.
///
/// A wrong password, the empty one included, yields `Ok(false)`. Only ciphertext that cannot be a
/// CBC message at all (empty or not block aligned) is an error.
pub fn check_password(
    password: &str,
    pass_check_text: &str,
    wrapped_pass_check: &[u8],
) -> Result<bool> {
    if wrapped_pass_check.is_empty() || wrapped_pass_check.len() % BLOCK_SIZE != 0 {
        return Err(MendError::InvalidInput(
            "Wrapped pass-check is not valid ciphertext".to_string(),
        ));
    }
    if password.is_empty() {
        return Ok(false);
    }

    let derived = derive_key(password)?;
    match decrypt_with_key(derived.as_bytes(), wrapped_pass_check) {
        Ok(plaintext) => Ok(constant_time_eq(&plaintext, pass_check_text.as_bytes())),
        // Bad padding under the wrong key.
        Err(MendError::DecryptionFailed) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Recover the private key's PKCS#8 bytes. The buffer zeroizes on drop.
pub fn unwrap_private_key(
    password: &str,
    wrapped_private_key: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let derived = derive_key(password)?;
    decrypt_with_key(derived.as_bytes(), wrapped_private_key)
}

/// Byte equality without an early exit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
