//! Key/value settings persistence.
//!
//! The engine reads everything it needs (key material, algorithm choices,
//! directories) through [`SettingsStore`]. The CLI backs it with a TOML file;
//! tests use [`MemorySettings`].

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::crypto::WrappedKeyMaterial;
use crate::error::{MendError, Result};

/// Every setting name the engine reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettingKey {
    PublicKey,
    WrappedPrivateKey,
    WrappedPassCheck,
    AsymmetricScheme,
    SymmetricKeyBits,
    ModulusBits,
    LogDir,
    EncDir,
    DecDir,
    WorkDir,
    CurrentLog,
    ShredCommand,
}

impl SettingKey {
    pub const ALL: [SettingKey; 12] = [
        SettingKey::PublicKey,
        SettingKey::WrappedPrivateKey,
        SettingKey::WrappedPassCheck,
        SettingKey::AsymmetricScheme,
        SettingKey::SymmetricKeyBits,
        SettingKey::ModulusBits,
        SettingKey::LogDir,
        SettingKey::EncDir,
        SettingKey::DecDir,
        SettingKey::WorkDir,
        SettingKey::CurrentLog,
        SettingKey::ShredCommand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::PublicKey => "public_key",
            SettingKey::WrappedPrivateKey => "wrapped_private_key",
            SettingKey::WrappedPassCheck => "wrapped_pass_check",
            SettingKey::AsymmetricScheme => "asymmetric_scheme",
            SettingKey::SymmetricKeyBits => "symmetric_key_bits",
            SettingKey::ModulusBits => "modulus_bits",
            SettingKey::LogDir => "log_dir",
            SettingKey::EncDir => "enc_dir",
            SettingKey::DecDir => "dec_dir",
            SettingKey::WorkDir => "work_dir",
            SettingKey::CurrentLog => "current_log",
            SettingKey::ShredCommand => "shred_command",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        SettingKey::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value persistence collaborator.
pub trait SettingsStore {
    fn get_value(&self, key: SettingKey) -> Option<String>;

    fn set_value(&mut self, key: SettingKey, value: &str) -> Result<()>;

    /// Get a value or fail with `MissingSetting`.
    fn require(&self, key: SettingKey) -> Result<String> {
        self.get_value(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| MendError::MissingSetting(key.to_string()))
    }
}

/// In-memory store, used by tests and as a scratch store.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: BTreeMap<SettingKey, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get_value(&self, key: SettingKey) -> Option<String> {
        self.values.get(&key).cloned()
    }

    fn set_value(&mut self, key: SettingKey, value: &str) -> Result<()> {
        self.values.insert(key, value.to_string());
        Ok(())
    }
}

/// Read a base64-encoded binary setting.
pub fn get_bytes(store: &dyn SettingsStore, key: SettingKey) -> Result<Option<Vec<u8>>> {
    match store.get_value(key).filter(|value| !value.trim().is_empty()) {
        Some(value) => STANDARD
            .decode(value.trim())
            .map(Some)
            .map_err(|e| MendError::InvalidInput(format!("Setting {} is not base64: {}", key, e))),
        None => Ok(None),
    }
}

/// Store a binary setting as base64.
pub fn set_bytes(store: &mut dyn SettingsStore, key: SettingKey, bytes: &[u8]) -> Result<()> {
    store.set_value(key, &STANDARD.encode(bytes))
}

/// Persist wrapped key material.
pub fn store_wrapped_material(
    store: &mut dyn SettingsStore,
    material: &WrappedKeyMaterial,
) -> Result<()> {
    set_bytes(store, SettingKey::PublicKey, &material.public_key)?;
    set_bytes(store, SettingKey::WrappedPrivateKey, &material.wrapped_private_key)?;
    set_bytes(store, SettingKey::WrappedPassCheck, &material.wrapped_pass_check)?;
    Ok(())
}

/// Load wrapped key material; `MissingSetting` if setup never ran.
pub fn load_wrapped_material(store: &dyn SettingsStore) -> Result<WrappedKeyMaterial> {
    let required = |key: SettingKey| {
        get_bytes(store, key)?.ok_or_else(|| MendError::MissingSetting(key.to_string()))
    };
    Ok(WrappedKeyMaterial {
        wrapped_private_key: required(SettingKey::WrappedPrivateKey)?,
        public_key: required(SettingKey::PublicKey)?,
        wrapped_pass_check: required(SettingKey::WrappedPassCheck)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_round_trip() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(SettingKey::parse("nope"), None);
    }

    #[test]
    fn test_require_treats_blank_as_missing() {
        let mut store = MemorySettings::new();
        store.set_value(SettingKey::LogDir, "  ").unwrap();
        assert!(matches!(
            store.require(SettingKey::LogDir),
            Err(MendError::MissingSetting(name)) if name == "log_dir"
        ));
    }

    #[test]
    fn test_bytes_are_base64() {
        let mut store = MemorySettings::new();
        set_bytes(&mut store, SettingKey::PublicKey, &[0xde, 0xad, 0xbe, 0xef]).unwrap();
        assert_eq!(store.get_value(SettingKey::PublicKey).unwrap(), "3q2+7w==");
        assert_eq!(
            get_bytes(&store, SettingKey::PublicKey).unwrap().unwrap(),
            vec![0xde, 0xad, 0xbe, 0xef]
        );
    }

    #[test]
    fn test_bad_base64_rejected() {
        let mut store = MemorySettings::new();
        store.set_value(SettingKey::PublicKey, "***").unwrap();
        assert!(get_bytes(&store, SettingKey::PublicKey).is_err());
    }

    #[test]
    fn test_wrapped_material_round_trip() {
        let material = WrappedKeyMaterial {
            wrapped_private_key: vec![1, 2, 3],
            public_key: vec![4, 5],
            wrapped_pass_check: vec![6],
        };
        let mut store = MemorySettings::new();
        store_wrapped_material(&mut store, &material).unwrap();
        assert_eq!(load_wrapped_material(&store).unwrap(), material);
    }

    #[test]
    fn test_missing_material_is_missing_setting() {
        let store = MemorySettings::new();
        assert!(matches!(
            load_wrapped_material(&store),
            Err(MendError::MissingSetting(_))
        ));
    }
}
