//! Append-only line logs.
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use crate::error::Error;

/// Append a single line to the file at `path`, creating it if needed.
///
/// The line is written in a single `write_all` call on an `O_APPEND` handle,
/// so concurrent appenders don't interleave within a line.
pub fn append_line(path: &Path, line: &str) -> Result<(), Error> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(format!("{}\n", line).as_bytes())?;
    Ok(())
}

/// Read the non-empty, trimmed lines of `path`. A missing file is an empty set.
pub fn read_lines(path: &Path) -> Result<HashSet<String>, Error> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.into()),
    };

    let mut lines = HashSet::new();
    for line in BufReader::new(f).lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            lines.insert(line.to_string());
        }
    }
    Ok(lines)
}

/// Append-only registry of keys (failed conversions, completed archives...).
///
/// Keeps an in-memory view of the keys so that a key is never written twice
/// by this process, even when workers race on it.
pub struct Registry {
    path: PathBuf,
    keys: Mutex<HashSet<String>>,
}

impl Registry {
    /// Open the registry at `path`, loading already recorded keys.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let keys = read_lines(path)?;
        debug!("registry {:?}: {} keys", path, keys.len());
        Ok(Self {
            path: path.to_path_buf(),
            keys: Mutex::new(keys),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys
            .lock()
            .expect("Problem locking registry")
            .contains(key)
    }

    /// Record `key`. Returns `false` if it was already present.
    pub fn record(&self, key: &str) -> Result<bool, Error> {
        let mut keys = self.keys.lock().expect("Problem locking registry");
        if keys.contains(key) {
            return Ok(false);
        }
        append_line(&self.path, key)?;
        keys.insert(key.to_string());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().expect("Problem locking registry").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.txt");

        let registry = Registry::open(&path).unwrap();
        assert!(registry.is_empty());
        assert!(registry.record("1009.1724").unwrap());
        assert!(!registry.record("1009.1724").unwrap());
        assert!(registry.record("1009.0001").unwrap());

        // reopening sees previous keys
        let registry = Registry::open(&path).unwrap();
        assert!(registry.contains("1009.1724"));
        assert!(!registry.record("1009.1724").unwrap());

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1009.1724\n1009.0001\n");
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_lines(&dir.path().join("nope.txt")).unwrap().is_empty());
    }
}
