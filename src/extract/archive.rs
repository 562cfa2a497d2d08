//! Accepted submissions extraction from a bulk source archive.
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::ops::AddAssign;
use std::path::Path;

use log::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::config::Layout;
use crate::error::Error;
use crate::extract::member::{is_tar_header, Member};
use crate::identifiers::{submission_id, IdentifierSet};
use crate::io::Registry;

/// Counters of an archive extraction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Submissions extracted into their own directory.
    pub accepted: usize,
    /// Accepted submissions whose bundle could not be decoded.
    pub failed: usize,
    /// PDF-only submissions (no source available).
    pub pdf_only: usize,
    /// Accepted submissions skipped because their XML output already exists.
    pub already_converted: usize,
}

impl AddAssign for ExtractionSummary {
    fn add_assign(&mut self, other: Self) {
        self.accepted += other.accepted;
        self.failed += other.failed;
        self.pdf_only += other.pdf_only;
        self.already_converted += other.already_converted;
    }
}

/// Extracts the accepted submissions of an archive into `latex/<archive-id>/<submission-id>/`.
pub struct Extractor<'a> {
    layout: &'a Layout,
    identifiers: &'a IdentifierSet,
    cancel: CancelToken,
}

impl<'a> Extractor<'a> {
    pub fn new(layout: &'a Layout, identifiers: &'a IdentifierSet) -> Self {
        Self {
            layout,
            identifiers,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Check that the file at `path` starts with a valid tar header.
    pub fn is_archive(path: &Path) -> Result<bool, Error> {
        let mut block = Vec::with_capacity(512);
        File::open(path)?.take(512).read_to_end(&mut block)?;
        Ok(is_tar_header(&block))
    }

    /// Extract the accepted submissions of the archive at `archive_path`.
    ///
    /// If the file is not a tar archive, nothing is created and an empty summary is returned.
    /// A member that fails to decode is logged and counted, and extraction goes on with the next one.
    pub fn extract(&self, archive_path: &Path) -> Result<ExtractionSummary, Error> {
        if !Self::is_archive(archive_path)? {
            error!("can't extract {:?}: not a tar archive", archive_path);
            return Ok(ExtractionSummary::default());
        }

        let archive_id = archive_id(archive_path)?;
        let dst = self.layout.archive_dir(&archive_id);
        std::fs::create_dir_all(&dst)?;
        std::fs::create_dir_all(self.layout.logs_dir())?;

        // bundles are unpacked here first, then moved in place once complete.
        // Removed when dropped, whatever the outcome.
        let scratch = tempfile::Builder::new()
            .prefix(".scratch")
            .tempdir_in(&dst)?;

        let pdf_submissions = Registry::open(&self.layout.pdf_submissions())?;
        let mut manifest = File::create(self.layout.archive_manifest(&archive_id))?;
        writeln!(manifest, "TARFILE: {}", file_name(archive_path))?;

        info!("extracting {:?}", archive_path);
        let mut archive = tar::Archive::new(BufReader::new(File::open(archive_path)?));
        let mut summary = ExtractionSummary::default();

        for entry in archive.entries()? {
            self.cancel.check()?;

            // a broken outer entry means we lost track of the stream
            let mut entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!("{:?}: unreadable member, stopping: {}", archive_path, e);
                    summary.failed += 1;
                    break;
                }
            };

            if entry.header().entry_type().is_dir() {
                continue;
            }

            let name = match entry.path() {
                Ok(p) => p.to_string_lossy().into_owned(),
                Err(e) => {
                    warn!("{:?}: member with invalid path: {}", archive_path, e);
                    continue;
                }
            };
            let id = submission_id(&name).to_string();

            if name.ends_with(".pdf") {
                pdf_submissions.record(&id)?;
                summary.pdf_only += 1;
                continue;
            }

            if !name.ends_with(".gz") || !self.identifiers.contains(&id) {
                continue;
            }

            writeln!(manifest, "{}", id)?;

            if self.layout.xml_path(&id).is_file() {
                debug!("{} already converted, not extracting", id);
                summary.already_converted += 1;
                continue;
            }

            match Self::extract_member(&mut entry, &id, scratch.path(), &dst) {
                Ok(files) => {
                    debug!("{}: extracted {} files", id, files);
                    summary.accepted += 1;
                }
                Err(e) => {
                    error!("{}: could not extract submission: {}", id, e);
                    summary.failed += 1;
                }
            }
        }

        if let Err(e) = scratch.close() {
            warn!("could not remove scratch directory: {}", e);
        }

        info!(
            "{}: {} submissions extracted, {} failed, {} already converted, {} pdf only",
            archive_id,
            summary.accepted,
            summary.failed,
            summary.already_converted,
            summary.pdf_only
        );
        Ok(summary)
    }

    /// Decode a single bundle into `scratch/<id>` and move it to `dst/<id>`.
    fn extract_member<R: Read>(
        entry: &mut R,
        id: &str,
        scratch: &Path,
        dst: &Path,
    ) -> Result<usize, Error> {
        let mut raw = Vec::new();
        entry.read_to_end(&mut raw)?;

        let member = Member::classify(&raw);
        if let Member::BareGzip(_) = member {
            debug!("{}: bare gzip, writing a single source file", id);
        }

        let staging = scratch.join(id);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir(&staging)?;

        let files = match member.unpack(id, &staging) {
            Ok(files) => files,
            Err(e) => {
                let _ = std::fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        let target = dst.join(id);
        if target.exists() {
            std::fs::remove_dir_all(&target)?;
        }
        std::fs::rename(&staging, &target)?;

        Ok(files)
    }
}

/// Archive identifier: the file name without its extension.
pub fn archive_id(archive_path: &Path) -> Result<String, Error> {
    archive_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Custom(format!("no archive id in {:?}", archive_path)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}
