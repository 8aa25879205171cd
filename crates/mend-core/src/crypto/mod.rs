//! Cryptographic primitives for Mend.
//!
//! This module provides the building blocks the envelope engine composes:
//! - **RSA** (`rsa` crate): asymmetric key pairs, PKCS#8 / SPKI encodings
//! - **AES-CBC** (`aes` + `cbc`): symmetric encryption under a fixed IV
//! - **PBKDF2-HMAC-SHA256**: password-derived key that wraps the private key
//!
//! ## Security Model
//!
//! - Every record and every encrypted file gets a fresh [`SessionKey`]
//! - The CBC IV is a public constant; confidentiality rests on key freshness
//! - `SessionKey` is consumed by the one encryption that uses it
//! - Key material is zeroized from memory on drop
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of log files, encrypted files or the settings file
//! - Offline brute-force of the password (iterated KDF)
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Access to an unlocked session (working key files are plaintext)

pub mod kdf;
pub mod keys;
pub mod symmetric;

use std::fmt;
use std::str::FromStr;

use crate::error::{MendError, Result};

pub use kdf::{derive_key, DerivedKey};
pub use keys::{
    check_modulus_bits, check_password, decode_key_pair, generate_key_pair,
    generate_key_pair_with_fallback, unwrap_private_key, wrap_private_key, KeyPair, PrivateKey,
    PublicKey, WrappedKeyMaterial, FALLBACK_MODULUS_BITS, PASS_CHECK_TEXT,
    RECOMMENDED_MODULUS_BITS,
};
pub use symmetric::{SessionKey, SymmetricKeySize, FIXED_IV};

/// Padding scheme used for the asymmetric layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsymmetricScheme {
    /// RSA-OAEP with SHA-256
    #[default]
    OaepSha256,
    /// RSA PKCS#1 v1.5 encryption padding
    Pkcs1v15,
}

impl AsymmetricScheme {
    /// Settings identifier for this scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            AsymmetricScheme::OaepSha256 => "oaep-sha256",
            AsymmetricScheme::Pkcs1v15 => "pkcs1v15",
        }
    }
}

impl fmt::Display for AsymmetricScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AsymmetricScheme {
    type Err = MendError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "oaep-sha256" | "oaep" => Ok(AsymmetricScheme::OaepSha256),
            "pkcs1v15" | "pkcs1" => Ok(AsymmetricScheme::Pkcs1v15),
            other => Err(MendError::InvalidInput(format!(
                "Unknown asymmetric scheme: {}",
                other
            ))),
        }
    }
}

/// The algorithm choices an identity encrypts with.
///
/// Decryption does not need the symmetric size: it is recovered from the
/// length of the unwrapped session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CipherSuite {
    pub asymmetric: AsymmetricScheme,
    pub symmetric: SymmetricKeySize,
}

impl CipherSuite {
    pub fn new(asymmetric: AsymmetricScheme, symmetric: SymmetricKeySize) -> Self {
        Self {
            asymmetric,
            symmetric,
        }
    }
}
