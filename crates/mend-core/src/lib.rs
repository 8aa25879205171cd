//! # Mend Core
//!
//! Core library for Mend - an encrypted, append-only personal log with
//! hybrid file encryption.
//!
//! This crate provides the cryptographic engine, the log wire format and the
//! key lifecycle, independent of the CLI interface.
//!
//! ## Architecture
//!
//! - **crypto**: RSA key pairs, AES session keys, password wrapping
//! - **envelope**: hybrid encryption of buffers and streams
//! - **log**: record framing, entry headers, chronological merge
//! - **files**: whole-file encryption to envelope files
//! - **lifecycle**: setup, unlock and lock of the private key
//! - **settings**: the key/value store the engine is configured through
//! - **shred**: secure deletion of working key material

pub mod context;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod files;
pub mod fs;
pub mod lifecycle;
pub mod log;
pub mod settings;
pub mod shred;

pub use context::MendContext;
pub use envelope::EnvelopeCipher;
pub use error::{MendError, Result};
pub use lifecycle::{KeyLifecycle, LockState};
pub use settings::{SettingKey, SettingsStore};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
