//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// Resource not found (config, log, file).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input or arguments.
    pub const INVALID_INPUT: i32 = 4;

    /// Authentication failed (wrong password, too many attempts).
    pub const AUTH_FAILED: i32 = 5;

    /// Integrity failure (malformed log, undecryptable data).
    pub const INTEGRITY_FAILED: i32 = 6;
}

/// Environment variable holding the password for non-interactive use.
pub const PASSWORD_ENV: &str = "MEND_PASSWORD";

/// Environment variable holding the log filter.
pub const LOG_FILTER_ENV: &str = "MEND_LOG";

/// Log used when none has been selected.
pub const DEFAULT_LOG_NAME: &str = "journal";

/// File extension of log files.
pub const LOG_EXTENSION: &str = "log";

/// Password attempts allowed at an interactive prompt.
pub const MAX_PASSWORD_ATTEMPTS: u32 = 3;
