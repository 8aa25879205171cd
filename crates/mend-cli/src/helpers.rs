//! Input helper functions for the CLI.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use dialoguer::Password;
use zeroize::Zeroizing;

use crate::constants::{LOG_EXTENSION, PASSWORD_ENV};
use crate::errors::CliError;

fn password_from_env() -> Option<Zeroizing<String>> {
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(Zeroizing::new)
}

/// True when a password can only come from the environment.
pub fn password_is_from_env() -> bool {
    password_from_env().is_some()
}

pub fn prompt_password(interactive: bool) -> anyhow::Result<Zeroizing<String>> {
    if let Some(value) = password_from_env() {
        return Ok(value);
    }
    if !interactive {
        return Err(CliError::invalid_input(format!(
            "No password available; set {} or run in a terminal",
            PASSWORD_ENV
        ))
        .into());
    }
    Password::new()
        .with_prompt("Password")
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

pub fn prompt_init_password() -> anyhow::Result<Zeroizing<String>> {
    if let Some(value) = password_from_env() {
        return Ok(value);
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::invalid_input(format!(
            "No password available; set {} or run in a terminal",
            PASSWORD_ENV
        ))
        .into());
    }
    Password::new()
        .with_prompt("Choose a password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// Entry text from `--body`, or from stdin when it is not a terminal.
pub fn read_entry_body(body: Option<&str>) -> anyhow::Result<String> {
    if let Some(value) = body {
        if value.trim().is_empty() {
            return Err(CliError::invalid_input("--body cannot be empty").into());
        }
        return Ok(value.to_string());
    }

    if io::stdin().is_terminal() {
        return Err(CliError::invalid_input(
            "No entry text; use --body or pipe content via stdin",
        )
        .into());
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to read stdin: {}", e))?;
    let trimmed = buffer.trim_end().to_string();
    if trimmed.is_empty() {
        return Err(CliError::invalid_input("No input provided on stdin").into());
    }
    Ok(trimmed)
}

/// Check a log name: no separators, not hidden, not empty.
pub fn validate_log_name(name: &str) -> anyhow::Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name.chars().all(|c| !c.is_control());
    if !valid {
        return Err(CliError::invalid_input(format!("Invalid log name: {:?}", name)).into());
    }
    Ok(())
}

/// Resolve a log argument: an existing path is used as is, anything else is
/// a log name inside `log_dir`.
pub fn resolve_log(log_dir: &Path, value: &str) -> anyhow::Result<PathBuf> {
    let as_path = Path::new(value);
    if as_path.is_file() {
        return Ok(as_path.to_path_buf());
    }
    let name = value
        .strip_suffix(&format!(".{}", LOG_EXTENSION))
        .unwrap_or(value);
    validate_log_name(name)?;
    Ok(log_dir.join(format!("{}.{}", name, LOG_EXTENSION)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_log_names() {
        assert!(validate_log_name("journal").is_ok());
        assert!(validate_log_name("work-2024").is_ok());
        assert!(validate_log_name("").is_err());
        assert!(validate_log_name(".hidden").is_err());
        assert!(validate_log_name("a/b").is_err());
    }

    #[test]
    fn test_resolve_log_by_name_and_path() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        assert_eq!(
            resolve_log(&log_dir, "work").unwrap(),
            log_dir.join("work.log")
        );
        assert_eq!(
            resolve_log(&log_dir, "work.log").unwrap(),
            log_dir.join("work.log")
        );

        let external = dir.path().join("other.bin");
        std::fs::write(&external, b"").unwrap();
        assert_eq!(
            resolve_log(&log_dir, &external.to_string_lossy()).unwrap(),
            external
        );
    }

    #[test]
    fn test_body_flag_wins() {
        assert_eq!(read_entry_body(Some("hello")).unwrap(), "hello");
        assert!(read_entry_body(Some("  ")).is_err());
    }
}
