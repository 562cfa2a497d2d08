//! Secondary archive store.
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::{debug, info};

use super::s3::part_path;
use crate::error::Error;

/// A store holding copies of downloaded archives, looked up by file name
/// before downloading from the bucket again.
pub trait Mirror: Send + Sync {
    fn contains(&self, name: &str) -> bool;

    /// Copy `name` to `dst`.
    fn fetch(&self, name: &str, dst: &Path) -> Result<(), Error>;

    /// Upload the file at `path`, under its file name.
    fn store(&self, path: &Path) -> Result<(), Error>;
}

/// A directory used as a mirror (typically a folder synced with a cloud drive).
///
/// The directory is listed once on opening.
pub struct DirMirror {
    root: PathBuf,
    files: RwLock<HashSet<String>>,
}

/// Copy `src` to `dst` through `<dst>.part`.
fn copy_atomic(src: &Path, dst: &Path) -> Result<u64, Error> {
    let part = part_path(dst);
    let written = match std::fs::copy(src, &part) {
        Ok(written) => written,
        Err(e) => {
            let _ = std::fs::remove_file(&part);
            return Err(e.into());
        }
    };
    std::fs::rename(&part, dst)?;
    Ok(written)
}

impl DirMirror {
    pub fn open(root: &Path) -> Result<Self, Error> {
        std::fs::create_dir_all(root)?;
        let files: HashSet<String> = std::fs::read_dir(root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.ends_with(".part"))
            .collect();

        info!("mirror {:?}: {} files", root, files.len());
        Ok(Self {
            root: root.to_path_buf(),
            files: RwLock::new(files),
        })
    }

    pub fn len(&self) -> usize {
        self.files.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Mirror for DirMirror {
    fn contains(&self, name: &str) -> bool {
        self.files.read().unwrap().contains(name)
    }

    fn fetch(&self, name: &str, dst: &Path) -> Result<(), Error> {
        let src = self.root.join(name);
        let written = copy_atomic(&src, dst)?;
        debug!("fetched {} from mirror ({} bytes)", name, written);
        Ok(())
    }

    fn store(&self, path: &Path) -> Result<(), Error> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Custom(format!("invalid file name: {:?}", path)))?;
        copy_atomic(path, &self.root.join(name))?;
        self.files.write().unwrap().insert(name.to_string());
        info!("stored {} in mirror", name);
        Ok(())
    }
}
