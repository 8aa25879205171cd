//! Length-prefixed record framing.
//!
//! Wire form of one record:
//!
//! ```text
//! u32be lc1 | encrypted_key[lc1] | u32be lc2 | ciphertext[lc2]
//! ```
//!
//! A log is zero or more records back to back, with no header, footer or
//! count. Any short read at a framing boundary is `MalformedLog`.

use std::io::{self, Read, Write};

use tracing::trace;

use crate::error::{MendError, Result};

/// Size of a length code in bytes.
pub const LENGTH_CODE_SIZE: usize = 4;

/// One encrypted unit: a wrapped session key and the payload it protects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub encrypted_key: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl Record {
    pub fn new(encrypted_key: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self {
            encrypted_key,
            ciphertext,
        }
    }

    /// Length of the record on the wire.
    pub fn encoded_len(&self) -> usize {
        2 * LENGTH_CODE_SIZE + self.encrypted_key.len() + self.ciphertext.len()
    }

    /// Serialize to the exact four-part wire form.
    ///
    /// Fields longer than `u32::MAX` cannot be framed; [`Record::write_to`]
    /// reports that case as an error.
    pub fn concatenate(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Write the wire form to `out`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        write_field(out, &self.encrypted_key)?;
        write_field(out, &self.ciphertext)?;
        Ok(())
    }
}

/// Write one length-prefixed field.
pub(crate) fn write_field<W: Write>(out: &mut W, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        MendError::InvalidInput(format!("Field too large to frame: {} bytes", bytes.len()))
    })?;
    out.write_all(&len.to_be_bytes())?;
    out.write_all(bytes)?;
    Ok(())
}

/// Incremental record reader over a byte stream.
///
/// `has_next` peeks the next length code and caches it; `read_next`
/// consumes the rest of the record. The reader also iterates records,
/// stopping after the first error.
pub struct LogReader<R> {
    inner: R,
    pending_lc1: Option<u32>,
    offset: u64,
    failed: bool,
}

impl<R: Read> LogReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending_lc1: None,
            offset: 0,
            failed: false,
        }
    }

    /// Bytes consumed from the underlying stream so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Recover the underlying stream, positioned after the last record read.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Whether another record follows.
    ///
    /// `Ok(false)` only on a clean end of stream. One to three bytes of a
    /// length code is a truncated log.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.pending_lc1.is_some() {
            return Ok(true);
        }

        let mut code = [0u8; LENGTH_CODE_SIZE];
        let read = read_full(&mut self.inner, &mut code)?;
        match read {
            0 => Ok(false),
            LENGTH_CODE_SIZE => {
                self.offset += LENGTH_CODE_SIZE as u64;
                self.pending_lc1 = Some(u32::from_be_bytes(code));
                Ok(true)
            }
            partial => Err(MendError::malformed(format!(
                "truncated length code at offset {} ({} of {} bytes)",
                self.offset, partial, LENGTH_CODE_SIZE
            ))),
        }
    }

    /// Read the record whose first length code `has_next` confirmed.
    pub fn read_next(&mut self) -> Result<Record> {
        if !self.has_next()? {
            return Err(MendError::malformed(format!(
                "no record at offset {}",
                self.offset
            )));
        }
        let lc1 = self.pending_lc1.take().unwrap_or_default();
        let start = self.offset - LENGTH_CODE_SIZE as u64;

        let encrypted_key = self.read_exact_field(lc1, "encrypted key")?;

        let mut code = [0u8; LENGTH_CODE_SIZE];
        let read = read_full(&mut self.inner, &mut code)?;
        if read != LENGTH_CODE_SIZE {
            return Err(MendError::malformed(format!(
                "truncated payload length code at offset {} ({} of {} bytes)",
                self.offset, read, LENGTH_CODE_SIZE
            )));
        }
        self.offset += LENGTH_CODE_SIZE as u64;
        let lc2 = u32::from_be_bytes(code);

        let ciphertext = self.read_exact_field(lc2, "ciphertext")?;

        trace!(offset = start, lc1, lc2, "read record");
        Ok(Record {
            encrypted_key,
            ciphertext,
        })
    }

    fn read_exact_field(&mut self, len: u32, what: &str) -> Result<Vec<u8>> {
        // Grow with the data actually present; never trust `len` for allocation.
        let mut field = Vec::new();
        Read::by_ref(&mut self.inner)
            .take(u64::from(len))
            .read_to_end(&mut field)?;
        self.offset += field.len() as u64;

        if field.len() != len as usize {
            return Err(MendError::malformed(format!(
                "truncated {}: expected {} bytes, found {}",
                what,
                len,
                field.len()
            )));
        }
        Ok(field)
    }
}

impl<R: Read> Iterator for LogReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = match self.has_next() {
            Ok(false) => return None,
            Ok(true) => self.read_next(),
            Err(err) => Err(err),
        };
        self.failed = result.is_err();
        Some(result)
    }
}

/// Fill `buf` unless the stream ends first; returns bytes read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn sample() -> Record {
        Record::new(vec![0xAA; 5], vec![0x11, 0x22, 0x33])
    }

    #[test]
    fn test_concatenate_wire_form() {
        let bytes = sample().concatenate().unwrap();
        assert_eq!(
            hex::encode(&bytes),
            "00000005aaaaaaaaaa00000003112233"
        );
        assert_eq!(bytes.len(), sample().encoded_len());
    }

    #[test]
    fn test_empty_log_has_no_records() {
        let mut reader = LogReader::new(Cursor::new(Vec::new()));
        assert!(!reader.has_next().unwrap());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_reads_consecutive_records() {
        let second = Record::new(vec![1], Vec::new());
        let mut log = sample().concatenate().unwrap();
        log.extend(second.concatenate().unwrap());

        let records: Vec<Record> = LogReader::new(Cursor::new(log))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records, vec![sample(), second]);
    }

    #[test]
    fn test_has_next_is_idempotent() {
        let mut reader = LogReader::new(Cursor::new(sample().concatenate().unwrap()));
        assert!(reader.has_next().unwrap());
        assert!(reader.has_next().unwrap());
        assert_eq!(reader.read_next().unwrap(), sample());
        assert!(!reader.has_next().unwrap());
    }

    #[test]
    fn test_tolerates_partial_reads() {
        let log = sample().concatenate().unwrap();
        let mut reader = LogReader::new(Trickle {
            data: &log,
            step: 1,
        });
        assert_eq!(reader.read_next().unwrap(), sample());
        assert!(!reader.has_next().unwrap());
        assert_eq!(reader.offset(), log.len() as u64);
    }

    #[test]
    fn test_every_truncation_is_malformed() {
        let log = sample().concatenate().unwrap();
        for cut in 1..log.len() {
            let mut reader = LogReader::new(Cursor::new(log[..cut].to_vec()));
            let result = reader.has_next().and_then(|_| reader.read_next());
            assert!(
                matches!(result, Err(MendError::MalformedLog(_))),
                "cut at {} was accepted",
                cut
            );
        }
    }

    #[test]
    fn test_truncated_length_code_on_has_next() {
        let mut reader = LogReader::new(Cursor::new(vec![0, 0]));
        let err = reader.has_next().unwrap_err();
        assert!(err.to_string().contains("truncated length code"));
    }

    #[test]
    fn test_huge_length_code_does_not_allocate() {
        let mut log = u32::MAX.to_be_bytes().to_vec();
        log.extend_from_slice(b"tiny");
        let mut reader = LogReader::new(Cursor::new(log));
        assert!(matches!(
            reader.read_next(),
            Err(MendError::MalformedLog(_))
        ));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut log = sample().concatenate().unwrap();
        log.extend_from_slice(&[0, 0, 0]);
        let mut reader = LogReader::new(Cursor::new(log));
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }
}
