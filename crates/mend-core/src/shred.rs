//! Secure deletion of working key material.
//!
//! Erasure itself is delegated to a user-configured command (for example
//! `shred -u <filename>`). The lifecycle only invokes it and then checks
//! that the file is gone.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{MendError, Result};

/// Placeholder substituted with the target path.
pub const FILENAME_PLACEHOLDER: &str = "<filename>";

/// Something that can securely delete a file.
pub trait SecureDelete {
    fn secure_delete(&self, path: &Path) -> Result<()>;
}

impl<T: SecureDelete + ?Sized> SecureDelete for Box<T> {
    fn secure_delete(&self, path: &Path) -> Result<()> {
        (**self).secure_delete(path)
    }
}

/// The configured command, or [`OverwriteDelete`] when `template` is unset.
pub fn from_template(template: Option<&str>) -> Result<Box<dyn SecureDelete>> {
    match template.map(str::trim).filter(|t| !t.is_empty()) {
        Some(template) => Ok(Box::new(ShredCommand::new(template)?)),
        None => Ok(Box::new(OverwriteDelete)),
    }
}

/// Runs an external command template per file.
#[derive(Debug, Clone)]
pub struct ShredCommand {
    template: String,
}

impl ShredCommand {
    /// Build from a template; it must mention [`FILENAME_PLACEHOLDER`].
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if template.split_whitespace().next().is_none() {
            return Err(MendError::InvalidInput("Shred command is empty".to_string()));
        }
        if !template.contains(FILENAME_PLACEHOLDER) {
            return Err(MendError::InvalidInput(format!(
                "Shred command must contain {}",
                FILENAME_PLACEHOLDER
            )));
        }
        Ok(Self { template })
    }

    /// The argv for deleting `path`.
    pub fn argv(&self, path: &Path) -> Vec<String> {
        let target = path.to_string_lossy();
        self.template
            .split_whitespace()
            .map(|part| part.replace(FILENAME_PLACEHOLDER, &target))
            .collect()
    }
}

impl SecureDelete for ShredCommand {
    fn secure_delete(&self, path: &Path) -> Result<()> {
        let argv = self.argv(path);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| MendError::InvalidInput("Shred command is empty".to_string()))?;

        let output = Command::new(program).args(args).output()?;
        debug!(
            program = %program,
            status = %output.status,
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "ran shred command"
        );

        if !output.status.success() {
            return Err(MendError::Io {
                source: io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} exited with {}", program, output.status),
                ),
            });
        }
        Ok(())
    }
}

/// Overwrite with zeros, then unlink. Used when no command is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverwriteDelete;

impl SecureDelete for OverwriteDelete {
    fn secure_delete(&self, path: &Path) -> Result<()> {
        let len = fs::metadata(path)?.len();
        {
            let mut file = OpenOptions::new().write(true).open(path)?;
            let zeros = [0u8; 4096];
            let mut remaining = len;
            while remaining > 0 {
                let n = remaining.min(zeros.len() as u64) as usize;
                file.write_all(&zeros[..n])?;
                remaining -= n as u64;
            }
            file.sync_all()?;
        }
        fs::remove_file(path)?;
        debug!(path = %path.display(), bytes = len, "overwrote and removed file");
        Ok(())
    }
}
