//! Chronological merge of two encrypted logs.
//!
//! Records are decrypted only to read their leading timestamp. What gets
//! written is the original record, byte for byte; nothing is re-encrypted.
//!
//! Ordering follows `precedes(X, Y)`:
//!
//! | Y (second)  | X (first) | result  |
//! |-------------|-----------|---------|
//! | absent      | any       | true    |
//! | dateless    | any       | false   |
//! | dated       | dateless  | true    |
//! | dated       | dated     | X < Y   |
//!
//! The order is asymmetric: a dateless record on the second side always
//! wins, while a dateless record on the first side only beats a dated one.
//! Merging the same pair twice duplicates entries; there is no dedup.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info};

use super::codec::{LogReader, Record};
use super::entry::entry_timestamp;
use crate::crypto::PrivateKey;
use crate::envelope::EnvelopeCipher;
use crate::error::Result;
use crate::fs::write_atomically;

/// Progress of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    BothOpen,
    FirstExhausted,
    SecondExhausted,
    Done,
}

impl MergeState {
    fn of(first_open: bool, second_open: bool) -> Self {
        match (first_open, second_open) {
            (true, true) => MergeState::BothOpen,
            (false, true) => MergeState::FirstExhausted,
            (true, false) => MergeState::SecondExhausted,
            (false, false) => MergeState::Done,
        }
    }
}

/// Ordering key recovered from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    Dated(DateTime<FixedOffset>),
    Dateless,
}

/// Whether `x` is emitted before `y` (see the module table).
pub fn precedes(x: &Stamp, y: Option<&Stamp>) -> bool {
    match (x, y) {
        (_, None) => true,
        (_, Some(Stamp::Dateless)) => false,
        (Stamp::Dateless, Some(Stamp::Dated(_))) => true,
        (Stamp::Dated(a), Some(Stamp::Dated(b))) => a < b,
    }
}

/// How many records came from each input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub from_first: usize,
    pub from_second: usize,
}

impl MergeSummary {
    pub fn total(&self) -> usize {
        self.from_first + self.from_second
    }
}

struct Pending {
    record: Record,
    stamp: Stamp,
}

struct Side<R> {
    reader: LogReader<R>,
    current: Option<Pending>,
}

impl<R: Read> Side<R> {
    fn open(input: R, engine: &MergeEngine<'_>) -> Result<Self> {
        let mut side = Self {
            reader: LogReader::new(input),
            current: None,
        };
        side.advance(engine)?;
        Ok(side)
    }

    fn is_open(&self) -> bool {
        self.current.is_some()
    }

    fn stamp(&self) -> Option<&Stamp> {
        self.current.as_ref().map(|pending| &pending.stamp)
    }

    fn advance(&mut self, engine: &MergeEngine<'_>) -> Result<()> {
        self.current = if self.reader.has_next()? {
            let record = self.reader.read_next()?;
            let stamp = engine.stamp_of(&record)?;
            Some(Pending { record, stamp })
        } else {
            None
        };
        Ok(())
    }

    /// Write the current record unchanged and move on.
    fn emit<W: Write>(&mut self, output: &mut W, engine: &MergeEngine<'_>) -> Result<()> {
        if let Some(pending) = self.current.take() {
            pending.record.write_to(output)?;
        }
        self.advance(engine)
    }
}

/// Merges two logs encrypted to the same identity.
pub struct MergeEngine<'a> {
    cipher: EnvelopeCipher,
    private_key: &'a PrivateKey,
}

impl<'a> MergeEngine<'a> {
    pub fn new(cipher: EnvelopeCipher, private_key: &'a PrivateKey) -> Self {
        Self {
            cipher,
            private_key,
        }
    }

    /// Merge `first` and `second` into `output`.
    ///
    /// The first malformed or undecryptable record aborts the merge. Bytes
    /// already written to `output` are then not a valid result; callers
    /// should write to a temporary file (see [`merge_log_files`]).
    pub fn merge<A, B, W>(&self, first: A, second: B, mut output: W) -> Result<MergeSummary>
    where
        A: Read,
        B: Read,
        W: Write,
    {
        let mut first = Side::open(first, self)?;
        let mut second = Side::open(second, self)?;
        let mut summary = MergeSummary::default();

        loop {
            let state = MergeState::of(first.is_open(), second.is_open());
            if state == MergeState::Done {
                break;
            }

            let take_first = match first.stamp() {
                Some(stamp) => precedes(stamp, second.stamp()),
                None => false,
            };

            if take_first {
                first.emit(&mut output, self)?;
                summary.from_first += 1;
            } else {
                second.emit(&mut output, self)?;
                summary.from_second += 1;
            }
            debug!(?state, took_first = take_first, "merge step");
        }

        output.flush()?;
        Ok(summary)
    }

    fn stamp_of(&self, record: &Record) -> Result<Stamp> {
        let plaintext = self.cipher.decrypt_buffer(self.private_key, record)?;
        let text = String::from_utf8_lossy(&plaintext);
        Ok(match entry_timestamp(&text) {
            Some(timestamp) => Stamp::Dated(timestamp),
            None => Stamp::Dateless,
        })
    }
}

/// Merge two log files into `destination` via a temporary file.
///
/// `destination` is replaced only after the merge completes, so it may be
/// one of the inputs.
pub fn merge_log_files(
    engine: &MergeEngine<'_>,
    first: &Path,
    second: &Path,
    destination: &Path,
) -> Result<MergeSummary> {
    let first_reader = BufReader::new(File::open(first)?);
    let second_reader = BufReader::new(File::open(second)?);

    let summary = write_atomically(destination, |writer| {
        engine.merge(first_reader, second_reader, writer)
    })?;

    info!(
        first = %first.display(),
        second = %second.display(),
        destination = %destination.display(),
        records = summary.total(),
        "merged logs"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(second: u32) -> Stamp {
        Stamp::Dated(
            FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2024, 1, 1, 0, 0, second)
                .unwrap(),
        )
    }

    #[test]
    fn test_precedes_absent_second() {
        assert!(precedes(&at(9), None));
        assert!(precedes(&Stamp::Dateless, None));
    }

    #[test]
    fn test_precedes_dateless_second_always_wins() {
        assert!(!precedes(&at(1), Some(&Stamp::Dateless)));
        assert!(!precedes(&Stamp::Dateless, Some(&Stamp::Dateless)));
    }

    #[test]
    fn test_precedes_dateless_first_beats_dated_second() {
        assert!(precedes(&Stamp::Dateless, Some(&at(1))));
    }

    #[test]
    fn test_precedes_dated_pair_strict() {
        assert!(precedes(&at(1), Some(&at(2))));
        assert!(!precedes(&at(2), Some(&at(1))));
        // Ties go to the second log.
        assert!(!precedes(&at(2), Some(&at(2))));
    }

    #[test]
    fn test_state_of() {
        assert_eq!(MergeState::of(true, true), MergeState::BothOpen);
        assert_eq!(MergeState::of(false, true), MergeState::FirstExhausted);
        assert_eq!(MergeState::of(true, false), MergeState::SecondExhausted);
        assert_eq!(MergeState::of(false, false), MergeState::Done);
    }
}
