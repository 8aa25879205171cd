use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use mend_core::{MendError, SettingKey, SettingsStore};

use crate::security::write_private;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MendConfig {
    #[serde(default)]
    pub identity: IdentitySection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub security: SecuritySection,
}

/// Key material (base64) and algorithm choices.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IdentitySection {
    pub public_key: Option<String>,
    pub wrapped_private_key: Option<String>,
    pub wrapped_pass_check: Option<String>,
    pub asymmetric_scheme: Option<String>,
    pub symmetric_key_bits: Option<String>,
    pub modulus_bits: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PathsSection {
    pub log_dir: Option<String>,
    pub enc_dir: Option<String>,
    pub dec_dir: Option<String>,
    pub work_dir: Option<String>,
    pub current_log: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SecuritySection {
    /// Secure-delete template, e.g. `shred -u <filename>`
    pub shred_command: Option<String>,
}

impl MendConfig {
    /// A config whose directories live under `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        let dir = |name: &str| Some(data_dir.join(name).to_string_lossy().to_string());
        Self {
            identity: IdentitySection::default(),
            paths: PathsSection {
                log_dir: dir("logs"),
                enc_dir: dir("encrypted"),
                dec_dir: dir("decrypted"),
                work_dir: dir("work"),
                current_log: None,
            },
            security: SecuritySection::default(),
        }
    }

    fn slot(&self, key: SettingKey) -> &Option<String> {
        match key {
            SettingKey::PublicKey => &self.identity.public_key,
            SettingKey::WrappedPrivateKey => &self.identity.wrapped_private_key,
            SettingKey::WrappedPassCheck => &self.identity.wrapped_pass_check,
            SettingKey::AsymmetricScheme => &self.identity.asymmetric_scheme,
            SettingKey::SymmetricKeyBits => &self.identity.symmetric_key_bits,
            SettingKey::ModulusBits => &self.identity.modulus_bits,
            SettingKey::LogDir => &self.paths.log_dir,
            SettingKey::EncDir => &self.paths.enc_dir,
            SettingKey::DecDir => &self.paths.dec_dir,
            SettingKey::WorkDir => &self.paths.work_dir,
            SettingKey::CurrentLog => &self.paths.current_log,
            SettingKey::ShredCommand => &self.security.shred_command,
        }
    }

    fn slot_mut(&mut self, key: SettingKey) -> &mut Option<String> {
        match key {
            SettingKey::PublicKey => &mut self.identity.public_key,
            SettingKey::WrappedPrivateKey => &mut self.identity.wrapped_private_key,
            SettingKey::WrappedPassCheck => &mut self.identity.wrapped_pass_check,
            SettingKey::AsymmetricScheme => &mut self.identity.asymmetric_scheme,
            SettingKey::SymmetricKeyBits => &mut self.identity.symmetric_key_bits,
            SettingKey::ModulusBits => &mut self.identity.modulus_bits,
            SettingKey::LogDir => &mut self.paths.log_dir,
            SettingKey::EncDir => &mut self.paths.enc_dir,
            SettingKey::DecDir => &mut self.paths.dec_dir,
            SettingKey::WorkDir => &mut self.paths.work_dir,
            SettingKey::CurrentLog => &mut self.paths.current_log,
            SettingKey::ShredCommand => &mut self.security.shred_command,
        }
    }
}

impl SettingsStore for MendConfig {
    fn get_value(&self, key: SettingKey) -> Option<String> {
        self.slot(key).clone()
    }

    fn set_value(&mut self, key: SettingKey, value: &str) -> mend_core::Result<()> {
        if value.contains('\0') {
            return Err(MendError::InvalidInput(format!("{} contains a NUL byte", key)));
        }
        *self.slot_mut(key) = Some(value.to_string());
        Ok(())
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn read_config(path: &Path) -> anyhow::Result<MendConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

/// Write the config owner-only; it holds the wrapped private key.
pub fn write_config(path: &Path, config: &MendConfig) -> anyhow::Result<()> {
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    write_private(path, contents.as_bytes())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("mend"));
        }
    }
    Ok(home_dir()?.join(".config").join("mend"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("mend"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("mend"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_every_key_has_a_slot() {
        let mut config = MendConfig::default();
        for key in SettingKey::ALL {
            config.set_value(key, key.as_str()).unwrap();
        }
        for key in SettingKey::ALL {
            assert_eq!(config.get_value(key).as_deref(), Some(key.as_str()));
        }
    }

    #[test]
    fn test_config_round_trip_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mend").join("config.toml");
        let mut config = MendConfig::with_data_dir(dir.path());
        config
            .set_value(SettingKey::ShredCommand, "shred -u <filename>")
            .unwrap();

        write_config(&path, &config).unwrap();
        let loaded = read_config(&path).unwrap();

        assert_eq!(
            loaded.get_value(SettingKey::ShredCommand).as_deref(),
            Some("shred -u <filename>")
        );
        assert_eq!(
            loaded.get_value(SettingKey::LogDir),
            Some(dir.path().join("logs").to_string_lossy().to_string())
        );
        assert_eq!(loaded.get_value(SettingKey::PublicKey), None);
    }

    #[test]
    fn test_sections_are_optional() {
        let config: MendConfig = toml::from_str("[paths]\nlog_dir = \"/tmp/l\"\n").unwrap();
        assert_eq!(config.get_value(SettingKey::LogDir).as_deref(), Some("/tmp/l"));
        assert_eq!(config.get_value(SettingKey::ShredCommand), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        write_config(&path, &MendConfig::default()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
