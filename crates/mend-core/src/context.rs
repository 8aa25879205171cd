//! Explicit identity and configuration passed to the engine.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::crypto::{AsymmetricScheme, CipherSuite, PublicKey, SymmetricKeySize};
use crate::envelope::EnvelopeCipher;
use crate::error::{MendError, Result};
use crate::settings::{get_bytes, SettingKey, SettingsStore};

/// The active identity: algorithm choices, public key, and the directory
/// holding working key material while unlocked.
#[derive(Debug, Clone)]
pub struct MendContext {
    suite: CipherSuite,
    public_key: Option<PublicKey>,
    work_dir: PathBuf,
}

impl MendContext {
    pub fn new(suite: CipherSuite, public_key: Option<PublicKey>, work_dir: PathBuf) -> Self {
        Self {
            suite,
            public_key,
            work_dir,
        }
    }

    /// Build a context from stored settings.
    ///
    /// A missing public key is not an error here; it surfaces as
    /// `MissingPublicKey` on the first encrypt.
    pub fn from_settings(store: &dyn SettingsStore) -> Result<Self> {
        let suite = suite_from_settings(store)?;
        let public_key = get_bytes(store, SettingKey::PublicKey)?
            .map(|der| PublicKey::from_der(&der))
            .transpose()?;
        let work_dir = PathBuf::from(store.require(SettingKey::WorkDir)?);

        debug!(
            scheme = %suite.asymmetric,
            symmetric_bits = suite.symmetric.bits(),
            has_public_key = public_key.is_some(),
            "loaded context"
        );
        Ok(Self::new(suite, public_key, work_dir))
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    pub fn cipher(&self) -> EnvelopeCipher {
        EnvelopeCipher::new(self.suite)
    }

    pub fn public_key(&self) -> Result<&PublicKey> {
        self.public_key.as_ref().ok_or(MendError::MissingPublicKey)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

/// Read the cipher suite, defaulting any unset part.
pub fn suite_from_settings(store: &dyn SettingsStore) -> Result<CipherSuite> {
    let asymmetric = match store.get_value(SettingKey::AsymmetricScheme) {
        Some(value) if !value.trim().is_empty() => value.parse::<AsymmetricScheme>()?,
        _ => AsymmetricScheme::default(),
    };
    let symmetric = match store.get_value(SettingKey::SymmetricKeyBits) {
        Some(value) if !value.trim().is_empty() => {
            let bits = value.trim().parse::<usize>().map_err(|_| {
                MendError::InvalidInput(format!("symmetric_key_bits is not a number: {}", value))
            })?;
            SymmetricKeySize::from_bits(bits)?
        }
        _ => SymmetricKeySize::default(),
    };
    Ok(CipherSuite::new(asymmetric, symmetric))
}

/// Persist the cipher suite.
pub fn store_suite(store: &mut dyn SettingsStore, suite: CipherSuite) -> Result<()> {
    store.set_value(SettingKey::AsymmetricScheme, suite.asymmetric.as_str())?;
    store.set_value(SettingKey::SymmetricKeyBits, &suite.symmetric.bits().to_string())?;
    Ok(())
}
