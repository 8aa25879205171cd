//! Errors that decide the process exit code.
//!
//! Handlers return `anyhow::Result`. At the top, [`exit_with`] looks for a
//! [`CliError`] or a core [`MendError`] in the chain and exits with the
//! matching code; anything else exits with 1.

use std::fmt;

use mend_core::MendError;

use crate::constants::exit_codes;

/// What went wrong, as far as the exit code is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Config, log, file or key material is missing
    NotFound,
    /// Bad arguments or unusable input
    InvalidInput,
    /// Wrong password
    AuthFailed,
    /// Stored data is malformed or does not decrypt
    Integrity,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::NotFound => exit_codes::NOT_FOUND,
            ErrorKind::InvalidInput => exit_codes::INVALID_INPUT,
            ErrorKind::AuthFailed => exit_codes::AUTH_FAILED,
            ErrorKind::Integrity => exit_codes::INTEGRITY_FAILED,
        }
    }
}

/// A user-facing failure with an optional hint line.
#[derive(Debug)]
pub struct CliError {
    kind: ErrorKind,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
        }
    }

    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message).with_hint(hint)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthFailed, message)
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Integrity, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    /// Report on stderr and terminate.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        std::process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n{}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for CliError {}

impl From<MendError> for CliError {
    fn from(err: MendError) -> Self {
        match err {
            MendError::IncorrectPassword => CliError::auth_failed("Incorrect password."),
            MendError::Locked => CliError::not_found(
                "No working key material; mend is locked.",
                "Hint: Run `mend unlock` first.",
            ),
            MendError::MissingPublicKey | MendError::MissingSetting(_) => CliError::not_found(
                err.to_string(),
                "Hint: Run `mend init` to create an identity.",
            ),
            MendError::InvalidInput(message) => CliError::invalid_input(message),
            MendError::UnsupportedKeySize { .. } | MendError::InvalidKeyEncoding(_) => {
                CliError::invalid_input(err.to_string())
            }
            other => CliError::integrity(other.to_string()),
        }
    }
}

/// Print `err` and exit with the code its kind maps to.
pub fn exit_with(err: anyhow::Error) -> ! {
    let err = match err.downcast::<CliError>() {
        Ok(cli_err) => cli_err.exit(),
        Err(err) => err,
    };
    match err.downcast::<MendError>() {
        Ok(MendError::Io { source }) => {
            eprintln!("Error: {}", source);
            std::process::exit(1)
        }
        Ok(core_err) => CliError::from(core_err).exit(),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(1)
        }
    }
}
