/*!
# IO utilities

Line-oriented, append-only text logs shared by workers, and atomic file writing.

The pipeline state lives on the filesystem only: logs double as skip markers,
so they are written in a way that leaves either the full line or nothing.
!*/
mod registry;

pub use registry::{append_line, read_lines, Registry};

use std::io::Write;
use std::path::Path;

use crate::error::Error;

/// Write `content` to `dst` through a temporary sibling file, then rename it into place.
///
/// Readers (and the skip checks that rely on the file existing) never see a partial file.
pub fn write_atomic(dst: &Path, content: &[u8]) -> Result<(), Error> {
    let parent = dst
        .parent()
        .ok_or_else(|| Error::Custom(format!("{:?} has no parent directory", dst)))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(dst).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
