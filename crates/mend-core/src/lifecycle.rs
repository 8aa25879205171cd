//! Setup, unlock and lock of the private key.
//!
//! States:
//! - `Locked`: no plaintext private key exists in the working directory
//! - `Unlocked`: the private and public key files exist there
//!
//! Unlock validates the password against the wrapped pass-check before the
//! private key is touched. Lock hands each working file to the configured
//! [`SecureDelete`] and then verifies it is gone.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::context::store_suite;
use crate::crypto::{
    check_password, decode_key_pair, generate_key_pair_with_fallback, unwrap_private_key,
    wrap_private_key, CipherSuite, KeyPair, PrivateKey, WrappedKeyMaterial, PASS_CHECK_TEXT,
};
use crate::error::{MendError, Result};
use crate::settings::{store_wrapped_material, SettingKey, SettingsStore};
use crate::shred::SecureDelete;

/// File name of the working private key (PKCS#8 DER).
pub const PRIVATE_KEY_FILE: &str = "private.der";

/// File name of the working public key (SPKI DER).
pub const PUBLIC_KEY_FILE: &str = "public.der";

/// Whether working key material is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

/// Generate a key pair, wrap it under `password`, and persist everything.
///
/// Falls back to the smaller modulus if `modulus_bits` is refused.
pub fn setup(
    store: &mut dyn SettingsStore,
    password: &str,
    suite: CipherSuite,
    modulus_bits: usize,
) -> Result<WrappedKeyMaterial> {
    let key_pair = generate_key_pair_with_fallback(modulus_bits)?;
    persist_identity(store, password, suite, &key_pair)
}

/// Adopt an externally generated key pair, wrapping it like `setup` does.
pub fn import_key_pair(
    store: &mut dyn SettingsStore,
    password: &str,
    suite: CipherSuite,
    private_key_der: &[u8],
    public_key_der: &[u8],
) -> Result<WrappedKeyMaterial> {
    let key_pair = decode_key_pair(private_key_der, public_key_der)?;
    persist_identity(store, password, suite, &key_pair)
}

fn persist_identity(
    store: &mut dyn SettingsStore,
    password: &str,
    suite: CipherSuite,
    key_pair: &KeyPair,
) -> Result<WrappedKeyMaterial> {
    let material = wrap_private_key(password, PASS_CHECK_TEXT, key_pair)?;
    store_wrapped_material(store, &material)?;
    store_suite(store, suite)?;
    store.set_value(
        SettingKey::ModulusBits,
        &key_pair.public.modulus_bits().to_string(),
    )?;

    info!(
        modulus_bits = key_pair.public.modulus_bits(),
        scheme = %suite.asymmetric,
        "identity stored"
    );
    Ok(material)
}

/// Owns the working key files.
pub struct KeyLifecycle<D> {
    work_dir: PathBuf,
    deleter: D,
}

impl<D: SecureDelete> KeyLifecycle<D> {
    pub fn new(work_dir: impl Into<PathBuf>, deleter: D) -> Self {
        Self {
            work_dir: work_dir.into(),
            deleter,
        }
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.work_dir.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.work_dir.join(PUBLIC_KEY_FILE)
    }

    pub fn state(&self) -> LockState {
        if self.private_key_path().exists() {
            LockState::Unlocked
        } else {
            LockState::Locked
        }
    }

    /// Validate `password` and materialize the key pair in the working directory.
    ///
    /// A wrong password leaves the state unchanged and returns
    /// `IncorrectPassword`. Stale working files are securely deleted before
    /// the fresh ones are written.
    pub fn unlock(&self, material: &WrappedKeyMaterial, password: &str) -> Result<()> {
        if !check_password(password, PASS_CHECK_TEXT, &material.wrapped_pass_check)? {
            info!("unlock rejected: incorrect password");
            return Err(MendError::IncorrectPassword);
        }

        if self.working_files().iter().any(|path| path.exists()) {
            warn!(work_dir = %self.work_dir.display(), "replacing stale working key material");
            self.destroy_working_files()?;
        }

        let private_der = unwrap_private_key(password, &material.wrapped_private_key)?;
        // Refuse to write something that will not load later.
        PrivateKey::from_der(&private_der)?;

        create_private_dir(&self.work_dir)?;
        write_private_file(&self.private_key_path(), &private_der)?;
        write_private_file(&self.public_key_path(), &material.public_key)?;

        info!(work_dir = %self.work_dir.display(), "unlocked");
        Ok(())
    }

    /// Securely delete the working key files. Idempotent.
    ///
    /// Succeeds only if none of the files exist afterwards.
    pub fn lock(&self) -> Result<()> {
        self.destroy_working_files()?;
        info!(work_dir = %self.work_dir.display(), "locked");
        Ok(())
    }

    /// Load the unlocked private key; `Locked` if there is none.
    pub fn load_private_key(&self) -> Result<PrivateKey> {
        let path = self.private_key_path();
        if !path.exists() {
            return Err(MendError::Locked);
        }
        let der = Zeroizing::new(fs::read(&path)?);
        PrivateKey::from_der(&der)
    }

    fn working_files(&self) -> [PathBuf; 2] {
        [self.private_key_path(), self.public_key_path()]
    }

    fn destroy_working_files(&self) -> Result<()> {
        let files = self.working_files();
        for path in files.iter().filter(|path| path.exists()) {
            if let Err(err) = self.deleter.secure_delete(path) {
                warn!(path = %path.display(), error = %err, "secure delete reported failure");
            }
        }
        match files.into_iter().find(|path| path.exists()) {
            Some(path) => Err(MendError::KeyMaterialRemains(path)),
            None => Ok(()),
        }
    }
}

fn create_private_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

fn write_private_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
