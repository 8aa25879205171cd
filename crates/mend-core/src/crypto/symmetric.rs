//! AES-CBC with a fixed IV, whole-buffer and streaming.
//!
//! The IV is a public constant. Safety depends entirely on never encrypting
//! two messages under the same key, which [`SessionKey`] enforces by being
//! consumed by the encryption that uses it.

use std::fmt;

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{MendError, Result};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Fixed, publicly known CBC initialization vector.
pub const FIXED_IV: [u8; BLOCK_SIZE] = *b"MEND-fixed-iv-01";

/// AES key size for session keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymmetricKeySize {
    Aes128,
    Aes192,
    #[default]
    Aes256,
}

impl SymmetricKeySize {
    /// Key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            SymmetricKeySize::Aes128 => 16,
            SymmetricKeySize::Aes192 => 24,
            SymmetricKeySize::Aes256 => 32,
        }
    }

    pub fn bits(&self) -> usize {
        self.key_len() * 8
    }

    pub fn from_bits(bits: usize) -> Result<Self> {
        match bits {
            128 => Ok(SymmetricKeySize::Aes128),
            192 => Ok(SymmetricKeySize::Aes192),
            256 => Ok(SymmetricKeySize::Aes256),
            other => Err(MendError::InvalidInput(format!(
                "Unsupported symmetric key size: {} bits",
                other
            ))),
        }
    }

    fn from_key_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(SymmetricKeySize::Aes128),
            24 => Some(SymmetricKeySize::Aes192),
            32 => Some(SymmetricKeySize::Aes256),
            _ => None,
        }
    }
}

/// A single-use symmetric key.
///
/// Not `Clone`. Every encrypting method takes `self`, so a key can protect
/// exactly one record or one file.
pub struct SessionKey {
    size: SymmetricKeySize,
    bytes: Zeroizing<Vec<u8>>,
}

impl SessionKey {
    /// Generate a fresh key from the OS RNG.
    pub fn generate(size: SymmetricKeySize) -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; size.key_len()]);
        OsRng.fill_bytes(&mut bytes);
        Self { size, bytes }
    }

    /// Rebuild a key recovered from an encrypted record header.
    ///
    /// A length that matches no AES variant means the header was not
    /// produced by us (or with this private key).
    pub fn from_unwrapped(bytes: Zeroizing<Vec<u8>>) -> Result<Self> {
        let size = SymmetricKeySize::from_key_len(bytes.len()).ok_or(MendError::DecryptionFailed)?;
        Ok(Self { size, bytes })
    }

    pub fn size(&self) -> SymmetricKeySize {
        self.size
    }

    /// Raw key bytes, for wrapping under the recipient's public key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encrypt a whole buffer, consuming the key.
    pub fn encrypt(self, plaintext: &[u8]) -> Vec<u8> {
        self.into_stream_encryptor().finish_with(plaintext)
    }

    /// Decrypt a whole buffer.
    pub fn decrypt(self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let mut decryptor = self.into_stream_decryptor();
        let mut plaintext = Zeroizing::new(decryptor.update(ciphertext));
        plaintext.extend_from_slice(&decryptor.finish()?);
        Ok(plaintext)
    }

    /// Turn the key into an incremental encryptor, consuming it.
    pub fn into_stream_encryptor(self) -> StreamEncryptor {
        StreamEncryptor {
            inner: CbcEncryptor::new(self.size, &self.bytes),
            pending: Vec::with_capacity(BLOCK_SIZE),
        }
    }

    pub fn into_stream_decryptor(self) -> StreamDecryptor {
        StreamDecryptor {
            inner: CbcDecryptor::new(self.size, &self.bytes),
            pending: Vec::with_capacity(BLOCK_SIZE * 2),
        }
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("size", &self.size)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Encrypt with a caller-held key (the password-derived wrapping key).
pub(crate) fn encrypt_with_key(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let size = SymmetricKeySize::from_key_len(key.len())
        .ok_or_else(|| MendError::InvalidInput("Invalid AES key length".to_string()))?;
    Ok(CbcEncryptor::new(size, key).finish(plaintext))
}

/// Decrypt with a caller-held key.
pub(crate) fn decrypt_with_key(key: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let size = SymmetricKeySize::from_key_len(key.len())
        .ok_or_else(|| MendError::InvalidInput("Invalid AES key length".to_string()))?;
    CbcDecryptor::new(size, key)
        .finish(ciphertext)
        .map(Zeroizing::new)
}

/// Incremental AES-CBC encryptor.
///
/// Input is buffered only up to one partial block; padding is applied by
/// [`StreamEncryptor::finish`].
pub struct StreamEncryptor {
    inner: CbcEncryptor,
    pending: Vec<u8>,
}

impl StreamEncryptor {
    /// Feed plaintext, returning every complete ciphertext block available.
    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(input);
        let full = self.pending.len() - self.pending.len() % BLOCK_SIZE;
        let mut blocks: Vec<u8> = self.pending.drain(..full).collect();
        self.inner.encrypt_blocks(&mut blocks);
        blocks
    }

    /// Pad and encrypt the remaining partial block.
    pub fn finish(self) -> Vec<u8> {
        self.inner.finish(&self.pending)
    }

    fn finish_with(mut self, input: &[u8]) -> Vec<u8> {
        let mut out = self.update(input);
        out.extend_from_slice(&self.finish());
        out
    }
}

/// Incremental AES-CBC decryptor.
///
/// Holds back the final block until [`StreamDecryptor::finish`] so the
/// padding can be verified.
pub struct StreamDecryptor {
    inner: CbcDecryptor,
    pending: Vec<u8>,
}

impl StreamDecryptor {
    /// Feed ciphertext, returning plaintext for all but the last block seen.
    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(input);
        let len = self.pending.len();
        let keep = match len % BLOCK_SIZE {
            0 => BLOCK_SIZE.min(len),
            partial => partial,
        };
        let mut blocks: Vec<u8> = self.pending.drain(..len - keep).collect();
        self.inner.decrypt_blocks(&mut blocks);
        blocks
    }

    /// Decrypt and unpad the final block.
    pub fn finish(self) -> Result<Vec<u8>> {
        self.inner.finish(&self.pending)
    }
}

enum CbcEncryptor {
    Aes128(cbc::Encryptor<Aes128>),
    Aes192(cbc::Encryptor<Aes192>),
    Aes256(cbc::Encryptor<Aes256>),
}

impl CbcEncryptor {
    // Key length is guaranteed by `SymmetricKeySize`, so construction cannot fail.
    fn new(size: SymmetricKeySize, key: &[u8]) -> Self {
        let iv = GenericArray::from_slice(&FIXED_IV);
        match size {
            SymmetricKeySize::Aes128 => {
                CbcEncryptor::Aes128(cbc::Encryptor::new(GenericArray::from_slice(key), iv))
            }
            SymmetricKeySize::Aes192 => {
                CbcEncryptor::Aes192(cbc::Encryptor::new(GenericArray::from_slice(key), iv))
            }
            SymmetricKeySize::Aes256 => {
                CbcEncryptor::Aes256(cbc::Encryptor::new(GenericArray::from_slice(key), iv))
            }
        }
    }

    fn encrypt_blocks(&mut self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(chunk);
            match self {
                CbcEncryptor::Aes128(enc) => enc.encrypt_block_mut(block),
                CbcEncryptor::Aes192(enc) => enc.encrypt_block_mut(block),
                CbcEncryptor::Aes256(enc) => enc.encrypt_block_mut(block),
            }
        }
    }

    fn finish(self, tail: &[u8]) -> Vec<u8> {
        match self {
            CbcEncryptor::Aes128(enc) => enc.encrypt_padded_vec_mut::<Pkcs7>(tail),
            CbcEncryptor::Aes192(enc) => enc.encrypt_padded_vec_mut::<Pkcs7>(tail),
            CbcEncryptor::Aes256(enc) => enc.encrypt_padded_vec_mut::<Pkcs7>(tail),
        }
    }
}

enum CbcDecryptor {
    Aes128(cbc::Decryptor<Aes128>),
    Aes192(cbc::Decryptor<Aes192>),
    Aes256(cbc::Decryptor<Aes256>),
}

impl CbcDecryptor {
    fn new(size: SymmetricKeySize, key: &[u8]) -> Self {
        let iv = GenericArray::from_slice(&FIXED_IV);
        match size {
            SymmetricKeySize::Aes128 => {
                CbcDecryptor::Aes128(cbc::Decryptor::new(GenericArray::from_slice(key), iv))
            }
            SymmetricKeySize::Aes192 => {
                CbcDecryptor::Aes192(cbc::Decryptor::new(GenericArray::from_slice(key), iv))
            }
            SymmetricKeySize::Aes256 => {
                CbcDecryptor::Aes256(cbc::Decryptor::new(GenericArray::from_slice(key), iv))
            }
        }
    }

    fn decrypt_blocks(&mut self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(chunk);
            match self {
                CbcDecryptor::Aes128(dec) => dec.decrypt_block_mut(block),
                CbcDecryptor::Aes192(dec) => dec.decrypt_block_mut(block),
                CbcDecryptor::Aes256(dec) => dec.decrypt_block_mut(block),
            }
        }
    }

    fn finish(self, tail: &[u8]) -> Result<Vec<u8>> {
        let result = match self {
            CbcDecryptor::Aes128(dec) => dec.decrypt_padded_vec_mut::<Pkcs7>(tail),
            CbcDecryptor::Aes192(dec) => dec.decrypt_padded_vec_mut::<Pkcs7>(tail),
            CbcDecryptor::Aes256(dec) => dec.decrypt_padded_vec_mut::<Pkcs7>(tail),
        };
        result.map_err(|_| MendError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_pair_of(size: SymmetricKeySize) -> (SessionKey, SessionKey) {
        let key = SessionKey::generate(size);
        let copy = SessionKey::from_unwrapped(Zeroizing::new(key.as_bytes().to_vec())).unwrap();
        (key, copy)
    }

    #[test]
    fn test_buffer_round_trip_all_sizes() {
        for size in [
            SymmetricKeySize::Aes128,
            SymmetricKeySize::Aes192,
            SymmetricKeySize::Aes256,
        ] {
            let (enc, dec) = key_pair_of(size);
            let ciphertext = enc.encrypt(b"journal entry");
            assert_eq!(ciphertext.len() % BLOCK_SIZE, 0);
            assert_eq!(dec.decrypt(&ciphertext).unwrap().as_slice(), b"journal entry");
        }
    }

    #[test]
    fn test_empty_plaintext_is_one_padding_block() {
        let (enc, dec) = key_pair_of(SymmetricKeySize::Aes256);
        let ciphertext = enc.encrypt(b"");
        assert_eq!(ciphertext.len(), BLOCK_SIZE);
        assert!(dec.decrypt(&ciphertext).unwrap().is_empty());
    }

    #[test]
    fn test_streaming_matches_buffer() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let (enc, dec) = key_pair_of(SymmetricKeySize::Aes128);
        let whole = SessionKey::from_unwrapped(Zeroizing::new(enc.as_bytes().to_vec()))
            .unwrap()
            .encrypt(&data);

        let mut streamer = enc.into_stream_encryptor();
        let mut streamed = Vec::new();
        for piece in data.chunks(7) {
            streamed.extend(streamer.update(piece));
        }
        streamed.extend(streamer.finish());
        assert_eq!(streamed, whole);

        let mut decryptor = dec.into_stream_decryptor();
        let mut plaintext = Vec::new();
        for piece in streamed.chunks(33) {
            plaintext.extend(decryptor.update(piece));
        }
        plaintext.extend(decryptor.finish().unwrap());
        assert_eq!(plaintext, data);
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let (enc, dec) = key_pair_of(SymmetricKeySize::Aes256);
        let ciphertext = enc.encrypt(b"0123456789abcdef0123");
        let result = dec.decrypt(&ciphertext[..ciphertext.len() - 3]);
        assert!(matches!(result, Err(MendError::DecryptionFailed)));
    }

    #[test]
    fn test_fixed_iv_same_key_same_ciphertext() {
        let (first, second) = key_pair_of(SymmetricKeySize::Aes256);
        assert_eq!(first.encrypt(b"same"), second.encrypt(b"same"));
    }

    #[test]
    fn test_invalid_unwrapped_length_rejected() {
        let result = SessionKey::from_unwrapped(Zeroizing::new(vec![0u8; 20]));
        assert!(matches!(result, Err(MendError::DecryptionFailed)));
    }

    #[test]
    fn test_session_key_debug_redacts() {
        let key = SessionKey::generate(SymmetricKeySize::Aes256);
        let debug_output = format!("{:?}", key);
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains(&hex::encode(&key.as_bytes()[..4])));
    }

    #[test]
    fn test_key_size_bits() {
        assert_eq!(SymmetricKeySize::from_bits(192).unwrap().key_len(), 24);
        assert!(SymmetricKeySize::from_bits(512).is_err());
    }
}
