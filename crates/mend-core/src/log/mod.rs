//! The append-only encrypted log.
//!
//! - **codec**: record framing and the incremental reader
//! - **entry**: the timestamp header convention for entry text
//! - **merge**: chronological merge of two logs without re-encryption

pub mod codec;
pub mod entry;
pub mod merge;

use std::fs::{self, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::Path;

use tracing::debug;
use zeroize::Zeroizing;

use crate::context::MendContext;
use crate::crypto::PrivateKey;
use crate::envelope::EnvelopeCipher;
use crate::error::Result;

pub use codec::{LogReader, Record};
pub use entry::{entry_body, entry_timestamp, stamp_entry, stamp_entry_now};
pub use merge::{merge_log_files, precedes, MergeEngine, MergeState, MergeSummary, Stamp};

/// Stamp `text`, encrypt it, and append the record to the log at `path`.
///
/// The log file and its parent directory are created if missing. Only the
/// public key is needed; appending works while locked.
pub fn append_entry(ctx: &MendContext, path: &Path, text: &str) -> Result<Record> {
    let stamped = stamp_entry_now(text);
    let record = ctx.cipher().encrypt_buffer(ctx.public_key()?, stamped.as_bytes())?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = record.concatenate()?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // One write per record so a crash leaves at most one partial record.
    file.write_all(&bytes)?;
    file.sync_all()?;

    debug!(path = %path.display(), record_len = bytes.len(), "appended entry");
    Ok(record)
}

/// Iterator over the decrypted entries of a log.
pub struct LogEntries<'a, R> {
    reader: LogReader<R>,
    cipher: EnvelopeCipher,
    private_key: &'a PrivateKey,
}

impl<'a, R: Read> LogEntries<'a, R> {
    pub fn new(input: R, cipher: EnvelopeCipher, private_key: &'a PrivateKey) -> Self {
        Self {
            reader: LogReader::new(input),
            cipher,
            private_key,
        }
    }
}

impl<R: Read> Iterator for LogEntries<'_, R> {
    type Item = Result<Zeroizing<Vec<u8>>>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.reader.next()?;
        Some(record.and_then(|record| self.cipher.decrypt_buffer(self.private_key, &record)))
    }
}

/// Decrypt every entry of the log at `path` as text.
pub fn read_log(
    cipher: EnvelopeCipher,
    private_key: &PrivateKey,
    path: &Path,
) -> Result<Vec<String>> {
    let input = BufReader::new(fs::File::open(path)?);
    LogEntries::new(input, cipher, private_key)
        .map(|entry| entry.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
        .collect()
}
