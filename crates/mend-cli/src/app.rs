//! Application context for the Mend CLI.
//!
//! Bundles the parsed arguments with config resolution so handlers do not
//! thread paths and flags through every call.

use std::cell::OnceCell;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use mend_core::shred::{self, SecureDelete};
use mend_core::{KeyLifecycle, MendContext, SettingKey, SettingsStore};

use crate::cli::Cli;
use crate::config::{default_config_path, read_config, write_config, MendConfig};
use crate::constants::DEFAULT_LOG_NAME;
use crate::errors::CliError;
use crate::helpers::resolve_log;

/// The lifecycle type the CLI drives.
pub type Lifecycle = KeyLifecycle<Box<dyn SecureDelete>>;

pub struct AppContext<'a> {
    cli: &'a Cli,
    config_path: OnceCell<PathBuf>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config_path: OnceCell::new(),
        }
    }

    /// Check if quiet mode is enabled.
    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// Whether prompts can be shown.
    pub fn interactive(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    pub fn config_path(&self) -> anyhow::Result<&Path> {
        if let Some(path) = self.config_path.get() {
            return Ok(path);
        }
        let path = match &self.cli.config {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        Ok(self.config_path.get_or_init(|| path))
    }

    /// Load the config; `NotFound` if `mend init` never ran.
    pub fn load_config(&self) -> anyhow::Result<MendConfig> {
        let path = self.config_path()?;
        if !path.exists() {
            return Err(CliError::not_found(
                format!("No mend config found at {}", path.display()),
                "Hint: Run `mend init` to create one.",
            )
            .into());
        }
        read_config(path)
    }

    pub fn save_config(&self, config: &MendConfig) -> anyhow::Result<()> {
        write_config(self.config_path()?, config)
    }

    pub fn lifecycle(&self, config: &MendConfig) -> anyhow::Result<Lifecycle> {
        let work_dir = config.require(SettingKey::WorkDir)?;
        let deleter = shred::from_template(config.get_value(SettingKey::ShredCommand).as_deref())?;
        Ok(KeyLifecycle::new(work_dir, deleter))
    }

    pub fn mend_context(&self, config: &MendConfig) -> anyhow::Result<MendContext> {
        Ok(MendContext::from_settings(config)?)
    }

    /// A configured directory.
    pub fn dir(&self, config: &MendConfig, key: SettingKey) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::from(config.require(key)?))
    }

    pub fn current_log_name(&self, config: &MendConfig) -> String {
        config
            .get_value(SettingKey::CurrentLog)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_NAME.to_string())
    }

    /// The log named by `value`, or the current log.
    pub fn log_path(&self, config: &MendConfig, value: Option<&str>) -> anyhow::Result<PathBuf> {
        let log_dir = self.dir(config, SettingKey::LogDir)?;
        match value {
            Some(value) => resolve_log(&log_dir, value),
            None => resolve_log(&log_dir, &self.current_log_name(config)),
        }
    }

    /// Like `log_path`, but the log must already exist.
    pub fn existing_log_path(
        &self,
        config: &MendConfig,
        value: Option<&str>,
    ) -> anyhow::Result<PathBuf> {
        let path = self.log_path(config, value)?;
        if !path.is_file() {
            return Err(CliError::not_found(
                format!("No log at {}", path.display()),
                "Hint: Run `mend logs` to see available logs.",
            )
            .into());
        }
        Ok(path)
    }

    /// Print unless quiet.
    pub fn say(&self, message: impl std::fmt::Display) {
        if !self.quiet() {
            println!("{}", message);
        }
    }
}
