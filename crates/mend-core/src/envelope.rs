//! Hybrid (RSA + AES) envelope encryption.
//!
//! Log entries are small and go through the whole-buffer path, producing one
//! [`Record`]. Files may be arbitrarily large and go through the streaming
//! path, which never holds more than one chunk of plaintext or ciphertext.
//!
//! Envelope file layout:
//!
//! ```text
//! u32be lc1 | encrypted_key[lc1] | u32be lc2 | encrypted_extension[lc2] | ciphertext... EOF
//! ```

use std::io::{Read, Write};

use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::symmetric::StreamDecryptor;
use crate::crypto::{CipherSuite, PrivateKey, PublicKey, SessionKey};
use crate::error::{MendError, Result};
use crate::log::codec::{read_full, write_field, LogReader};
use crate::log::Record;

/// Streaming chunk size.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Longest extension tag an envelope file may carry.
pub const MAX_EXTENSION_LEN: usize = 32;

/// Request/response envelope operations under one cipher suite.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCipher {
    suite: CipherSuite,
}

impl EnvelopeCipher {
    pub fn new(suite: CipherSuite) -> Self {
        Self { suite }
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Encrypt a bounded buffer into one record under a fresh session key.
    pub fn encrypt_buffer(&self, public_key: &PublicKey, plaintext: &[u8]) -> Result<Record> {
        let session = SessionKey::generate(self.suite.symmetric);
        let encrypted_key = public_key.encrypt(self.suite.asymmetric, session.as_bytes())?;
        let ciphertext = session.encrypt(plaintext);

        debug!(
            key_len = encrypted_key.len(),
            ciphertext_len = ciphertext.len(),
            "encrypted record"
        );
        Ok(Record::new(encrypted_key, ciphertext))
    }

    /// Decrypt one record.
    ///
    /// Wrong key, corruption and bad padding all surface as `DecryptionFailed`.
    pub fn decrypt_buffer(
        &self,
        private_key: &PrivateKey,
        record: &Record,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let session = self.unwrap_session(private_key, &record.encrypted_key)?;
        session.decrypt(&record.ciphertext)
    }

    /// Encrypt an unbounded stream, writing an envelope file to `output`.
    ///
    /// Returns the number of plaintext bytes consumed.
    pub fn encrypt_stream<R: Read, W: Write>(
        &self,
        public_key: &PublicKey,
        extension: &str,
        mut input: R,
        mut output: W,
    ) -> Result<u64> {
        if extension.len() > MAX_EXTENSION_LEN {
            return Err(MendError::InvalidInput(format!(
                "Extension tag longer than {} bytes",
                MAX_EXTENSION_LEN
            )));
        }

        let session = SessionKey::generate(self.suite.symmetric);
        let encrypted_key = public_key.encrypt(self.suite.asymmetric, session.as_bytes())?;
        let encrypted_extension = public_key.encrypt(self.suite.asymmetric, extension.as_bytes())?;
        write_field(&mut output, &encrypted_key)?;
        write_field(&mut output, &encrypted_extension)?;

        let mut encryptor = session.into_stream_encryptor();
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let read = read_full(&mut input, &mut chunk)?;
            if read == 0 {
                break;
            }
            total += read as u64;
            output.write_all(&encryptor.update(&chunk[..read]))?;
        }
        output.write_all(&encryptor.finish())?;
        output.flush()?;

        debug!(plaintext_len = total, "encrypted stream");
        Ok(total)
    }

    /// Parse an envelope header, recovering the extension tag.
    ///
    /// The returned reader streams the remaining payload on demand.
    pub fn open_stream<R: Read>(
        &self,
        private_key: &PrivateKey,
        input: R,
    ) -> Result<EnvelopeReader<R>> {
        let mut header = LogReader::new(input);
        if !header.has_next()? {
            return Err(MendError::malformed("missing envelope header"));
        }
        let fields = header.read_next()?;
        let input = header.into_inner();

        let session = self.unwrap_session(private_key, &fields.encrypted_key)?;
        let extension_bytes = private_key.decrypt(self.suite.asymmetric, &fields.ciphertext)?;
        let extension = String::from_utf8(extension_bytes.to_vec())
            .map_err(|_| MendError::DecryptionFailed)?;

        Ok(EnvelopeReader {
            input,
            extension,
            decryptor: session.into_stream_decryptor(),
        })
    }

    /// Decrypt an envelope file from `input` into `output`, returning its extension tag.
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        private_key: &PrivateKey,
        input: R,
        output: W,
    ) -> Result<String> {
        let reader = self.open_stream(private_key, input)?;
        let extension = reader.extension().to_string();
        reader.decrypt_to(output)?;
        Ok(extension)
    }

    fn unwrap_session(&self, private_key: &PrivateKey, encrypted_key: &[u8]) -> Result<SessionKey> {
        let key_bytes = private_key.decrypt(self.suite.asymmetric, encrypted_key)?;
        SessionKey::from_unwrapped(key_bytes)
    }
}

/// An envelope file whose header has been parsed.
pub struct EnvelopeReader<R> {
    input: R,
    extension: String,
    decryptor: StreamDecryptor,
}

impl<R: Read> EnvelopeReader<R> {
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Stream the decrypted payload into `output`; returns plaintext bytes written.
    pub fn decrypt_to<W: Write>(mut self, mut output: W) -> Result<u64> {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let read = read_full(&mut self.input, &mut chunk)?;
            if read == 0 {
                break;
            }
            let plaintext = Zeroizing::new(self.decryptor.update(&chunk[..read]));
            total += plaintext.len() as u64;
            output.write_all(&plaintext)?;
        }
        let tail = Zeroizing::new(self.decryptor.finish()?);
        total += tail.len() as u64;
        output.write_all(&tail)?;
        output.flush()?;

        debug!(plaintext_len = total, "decrypted stream");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_key_pair, AsymmetricScheme, KeyPair, SymmetricKeySize};
    use std::io::Cursor;
    use std::sync::OnceLock;

    fn test_pair() -> &'static KeyPair {
        static PAIR: OnceLock<KeyPair> = OnceLock::new();
        PAIR.get_or_init(|| generate_key_pair(1024).unwrap())
    }

    #[test]
    fn test_buffer_round_trip() {
        let cipher = EnvelopeCipher::default();
        let pair = test_pair();
        let record = cipher.encrypt_buffer(&pair.public, b"hello").unwrap();
        let plaintext = cipher.decrypt_buffer(&pair.private, &record).unwrap();
        assert_eq!(plaintext.as_slice(), b"hello");
    }

    #[test]
    fn test_each_record_gets_a_fresh_key() {
        let cipher = EnvelopeCipher::default();
        let pair = test_pair();
        let first = cipher.encrypt_buffer(&pair.public, b"same").unwrap();
        let second = cipher.encrypt_buffer(&pair.public, b"same").unwrap();
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_pkcs1_aes128_suite_round_trip() {
        let cipher = EnvelopeCipher::new(CipherSuite::new(
            AsymmetricScheme::Pkcs1v15,
            SymmetricKeySize::Aes128,
        ));
        let pair = test_pair();
        let record = cipher.encrypt_buffer(&pair.public, b"short").unwrap();
        assert_eq!(record.ciphertext.len(), 16);
        assert_eq!(
            cipher.decrypt_buffer(&pair.private, &record).unwrap().as_slice(),
            b"short"
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher = EnvelopeCipher::default();
        let record = cipher.encrypt_buffer(&test_pair().public, b"secret").unwrap();
        let other = generate_key_pair(1024).unwrap();
        assert!(matches!(
            cipher.decrypt_buffer(&other.private, &record),
            Err(MendError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_corrupted_ciphertext_fails() {
        let cipher = EnvelopeCipher::default();
        let mut record = cipher.encrypt_buffer(&test_pair().public, b"secret").unwrap();
        record.ciphertext.pop();
        assert!(matches!(
            cipher.decrypt_buffer(&test_pair().private, &record),
            Err(MendError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_stream_round_trip_sizes() {
        let cipher = EnvelopeCipher::default();
        let pair = test_pair();
        for size in [0usize, 1, 15, 16, CHUNK_SIZE, 3 * CHUNK_SIZE + 5] {
            let data: Vec<u8> = (0..size).map(|i| (i % 253) as u8).collect();
            let mut envelope = Vec::new();
            let consumed = cipher
                .encrypt_stream(&pair.public, "txt", Cursor::new(&data), &mut envelope)
                .unwrap();
            assert_eq!(consumed, size as u64);

            let mut restored = Vec::new();
            let ext = cipher
                .decrypt_stream(&pair.private, Cursor::new(&envelope), &mut restored)
                .unwrap();
            assert_eq!(ext, "txt");
            assert_eq!(restored, data);
        }
    }

    #[test]
    fn test_open_stream_exposes_extension_first() {
        let cipher = EnvelopeCipher::default();
        let pair = test_pair();
        let mut envelope = Vec::new();
        cipher
            .encrypt_stream(&pair.public, "pdf", Cursor::new(b"%PDF"), &mut envelope)
            .unwrap();

        let reader = cipher.open_stream(&pair.private, Cursor::new(envelope)).unwrap();
        assert_eq!(reader.extension(), "pdf");
        let mut out = Vec::new();
        assert_eq!(reader.decrypt_to(&mut out).unwrap(), 4);
        assert_eq!(out, b"%PDF");
    }

    #[test]
    fn test_truncated_stream_payload_fails() {
        let cipher = EnvelopeCipher::default();
        let pair = test_pair();
        let mut envelope = Vec::new();
        cipher
            .encrypt_stream(&pair.public, "", Cursor::new(vec![7u8; 100]), &mut envelope)
            .unwrap();
        envelope.truncate(envelope.len() - 5);

        let result = cipher.decrypt_stream(&pair.private, Cursor::new(envelope), Vec::new());
        assert!(matches!(result, Err(MendError::DecryptionFailed)));
    }

    #[test]
    fn test_empty_envelope_is_malformed() {
        let cipher = EnvelopeCipher::default();
        let result =
            cipher.decrypt_stream(&test_pair().private, Cursor::new(Vec::new()), Vec::new());
        assert!(matches!(result, Err(MendError::MalformedLog(_))));
    }

    #[test]
    fn test_long_extension_rejected() {
        let cipher = EnvelopeCipher::default();
        let ext = "x".repeat(MAX_EXTENSION_LEN + 1);
        let result = cipher.encrypt_stream(&test_pair().public, &ext, Cursor::new(b""), Vec::new());
        assert!(matches!(result, Err(MendError::InvalidInput(_))));
    }
}
