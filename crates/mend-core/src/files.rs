//! Whole-file encryption to and from envelope files.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::context::MendContext;
use crate::crypto::PrivateKey;
use crate::envelope::EnvelopeCipher;
use crate::error::{MendError, Result};
use crate::fs::write_atomically;

/// Extension given to envelope files.
pub const ENVELOPE_EXTENSION: &str = "mend";

/// Encrypt `source` into `out_dir/<stem>.mend`.
///
/// The source extension travels inside the envelope so decryption can
/// restore it.
pub fn encrypt_file(ctx: &MendContext, source: &Path, out_dir: &Path) -> Result<PathBuf> {
    let public_key = ctx.public_key()?;
    let stem = file_stem(source)?;
    let extension = source
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();

    fs::create_dir_all(out_dir)?;
    let destination = out_dir.join(format!("{}.{}", stem, ENVELOPE_EXTENSION));
    let input = BufReader::new(File::open(source)?);
    let cipher = ctx.cipher();

    let bytes = write_atomically(&destination, |writer| {
        cipher.encrypt_stream(public_key, &extension, input, writer)
    })?;

    info!(
        source = %source.display(),
        destination = %destination.display(),
        bytes,
        "encrypted file"
    );
    Ok(destination)
}

/// Decrypt an envelope file into `out_dir/<stem>.<tag>`.
///
/// An empty tag yields `out_dir/<stem>`.
pub fn decrypt_file(
    cipher: EnvelopeCipher,
    private_key: &PrivateKey,
    source: &Path,
    out_dir: &Path,
) -> Result<PathBuf> {
    let stem = file_stem(source)?;
    let reader = cipher.open_stream(private_key, BufReader::new(File::open(source)?))?;

    let extension = reader.extension();
    if extension.contains(['/', '\\']) || extension == ".." {
        return Err(MendError::malformed("extension tag is not a plain name"));
    }
    let name = if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    };

    fs::create_dir_all(out_dir)?;
    let destination = out_dir.join(name);
    let bytes = write_atomically(&destination, |writer| reader.decrypt_to(writer))?;

    info!(
        source = %source.display(),
        destination = %destination.display(),
        bytes,
        "decrypted file"
    );
    Ok(destination)
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| MendError::InvalidInput(format!("Not a file path: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_key_pair, CipherSuite, KeyPair};
    use std::sync::OnceLock;
    use tempfile::tempdir;

    fn test_pair() -> &'static KeyPair {
        static PAIR: OnceLock<KeyPair> = OnceLock::new();
        PAIR.get_or_init(|| generate_key_pair(1024).unwrap())
    }

    fn context(work_dir: &Path) -> MendContext {
        MendContext::new(
            CipherSuite::default(),
            Some(test_pair().public.clone()),
            work_dir.to_path_buf(),
        )
    }

    #[test]
    fn test_file_round_trip_restores_extension() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("notes.txt");
        fs::write(&source, b"remember the milk").unwrap();
        let ctx = context(dir.path());

        let encrypted = encrypt_file(&ctx, &source, &dir.path().join("enc")).unwrap();
        assert_eq!(encrypted, dir.path().join("enc").join("notes.mend"));
        assert_ne!(fs::read(&encrypted).unwrap(), b"remember the milk");

        let decrypted =
            decrypt_file(ctx.cipher(), &test_pair().private, &encrypted, &dir.path().join("dec"))
                .unwrap();
        assert_eq!(decrypted, dir.path().join("dec").join("notes.txt"));
        assert_eq!(fs::read(&decrypted).unwrap(), b"remember the milk");
    }

    #[test]
    fn test_file_without_extension() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("README");
        fs::write(&source, b"plain").unwrap();
        let ctx = context(dir.path());

        let encrypted = encrypt_file(&ctx, &source, &dir.path().join("enc")).unwrap();
        let decrypted =
            decrypt_file(ctx.cipher(), &test_pair().private, &encrypted, &dir.path().join("dec"))
                .unwrap();
        assert_eq!(decrypted, dir.path().join("dec").join("README"));
    }

    #[test]
    fn test_encrypt_needs_public_key() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"x").unwrap();
        let ctx = MendContext::new(CipherSuite::default(), None, dir.path().to_path_buf());

        assert!(matches!(
            encrypt_file(&ctx, &source, dir.path()),
            Err(MendError::MissingPublicKey)
        ));
    }

    #[test]
    fn test_failed_decrypt_leaves_no_output() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, vec![1u8; 1000]).unwrap();
        let ctx = context(dir.path());
        let encrypted = encrypt_file(&ctx, &source, &dir.path().join("enc")).unwrap();

        let mut bytes = fs::read(&encrypted).unwrap();
        bytes.truncate(bytes.len() - 3);
        fs::write(&encrypted, bytes).unwrap();

        let out_dir = dir.path().join("dec");
        let result = decrypt_file(ctx.cipher(), &test_pair().private, &encrypted, &out_dir);
        assert!(matches!(result, Err(MendError::DecryptionFailed)));
        assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 0);
    }
}
