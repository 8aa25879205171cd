//! Staged writes: output goes to a sibling temp file and is renamed over
//! the destination only once it is complete.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::Result;

/// Move `staged` over `destination`, replacing it.
///
/// Where rename refuses to overwrite (Windows), the destination is removed
/// and the rename retried once. On final failure `staged` is removed.
pub fn replace_file(staged: &Path, destination: &Path) -> io::Result<()> {
    let first = match fs::rename(staged, destination) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };

    let _ = fs::remove_file(destination);
    if let Err(second) = fs::rename(staged, destination) {
        let _ = fs::remove_file(staged);
        return Err(io::Error::new(
            second.kind(),
            format!(
                "cannot move {} into place ({}; retry: {})",
                staged.display(),
                first,
                second
            ),
        ));
    }
    Ok(())
}

/// A hidden sibling of `destination` to stage output in.
///
/// Same directory, so the final rename never crosses filesystems.
pub fn temp_path_for(destination: &Path) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mend".to_string());
    destination.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), stamp))
}

/// Write `destination` through a temporary file and rename it into place.
///
/// The destination is only replaced if `write` succeeds; otherwise the
/// temporary file is removed and the error returned.
pub fn write_atomically<T, F>(destination: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T>,
{
    let staged = temp_path_for(destination);
    let value = match stage(&staged, write) {
        Ok(value) => value,
        Err(err) => {
            let _ = fs::remove_file(&staged);
            debug!(path = %staged.display(), "discarded staged output");
            return Err(err);
        }
    };
    replace_file(&staged, destination)?;
    Ok(value)
}

fn stage<T, F>(staged: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T>,
{
    let mut writer = BufWriter::new(File::create(staged)?);
    let value = write(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(value)
}
