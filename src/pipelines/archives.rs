//! Bucket-wide processing of bulk source archives.
//!
//! Each archive is a unit of work, run end-to-end by a single worker of the pool:
//!
//! 1. skip it if its key is in the completed registry,
//! 1. claim it by creating `latex/<archive-id>` (exclusive creation, so two workers can't both succeed),
//! 1. fetch it from the mirror if present there, download it from the bucket otherwise,
//! 1. extract the accepted submissions, select their preprints and convert them sequentially,
//! 1. store the archive in the mirror if it came from the bucket,
//! 1. remove the local archive (and the extracted sources, unless they are kept),
//! 1. record the key in the completed registry.
//!
//! On failure or interrupt, the claim and the local archive are removed so that the archive
//! is processed again on the next run. Converted outputs are kept.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::convert::ConversionStats;
use crate::error::Error;
use crate::extract::{archive_id, ExtractionSummary, Extractor};
use crate::pipelines::context::Context;
use crate::pipelines::pipeline::{thread_pool, Pipeline};
use crate::preprint;
use crate::storage::s3::part_path;
use crate::storage::ObjectEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Processed {
        extraction: ExtractionSummary,
        conversions: ConversionStats,
    },
    /// Already in the completed registry.
    Completed,
    /// The extraction directory exists: another worker (or a previous run) owns the archive.
    Claimed,
    /// Not in the bucket.
    Missing,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveStats {
    pub processed: usize,
    pub completed: usize,
    pub claimed: usize,
    pub missing: usize,
    pub failed: usize,
    pub extraction: ExtractionSummary,
    pub conversions: ConversionStats,
}

impl ArchiveStats {
    fn add(&mut self, outcome: ArchiveOutcome) {
        match outcome {
            ArchiveOutcome::Processed {
                extraction,
                conversions,
            } => {
                self.processed += 1;
                self.extraction += extraction;
                self.conversions = std::mem::take(&mut self.conversions).merge(conversions);
            }
            ArchiveOutcome::Completed => self.completed += 1,
            ArchiveOutcome::Claimed => self.claimed += 1,
            ArchiveOutcome::Missing => self.missing += 1,
        }
    }
}

pub struct ArchivePipeline<'a> {
    context: &'a Context,
    prefix: String,
    workers: Option<usize>,
}

/// Atomically claim an archive by creating its extraction directory.
/// Returns `false` if the directory already exists.
fn claim(dir: &Path) -> Result<bool, Error> {
    if let Some(parent) = dir.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::create_dir(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl<'a> ArchivePipeline<'a> {
    pub fn new(context: &'a Context, prefix: &str, workers: Option<usize>) -> Self {
        Self {
            context,
            prefix: prefix.to_string(),
            workers,
        }
    }

    fn archive_path(&self, entry: &ObjectEntry) -> PathBuf {
        self.context.layout.downloads_dir().join(entry.file_name())
    }

    /// Process a single archive, see the module documentation.
    ///
    /// Archives missing from the bucket are an outcome, other failures are errors
    /// after which the archive is left unclaimed.
    pub fn process(&self, entry: &ObjectEntry) -> Result<ArchiveOutcome, Error> {
        let ctx = self.context;
        ctx.cancel.check()?;

        if ctx.completed.contains(&entry.key) {
            debug!("{} already processed", entry.key);
            return Ok(ArchiveOutcome::Completed);
        }

        let id = archive_id(Path::new(entry.file_name()))?;
        let dir = ctx.layout.archive_dir(&id);
        if !claim(&dir)? {
            info!("{} is already claimed ({:?} exists)", entry.key, dir);
            return Ok(ArchiveOutcome::Claimed);
        }

        let archive_path = self.archive_path(entry);
        match self.process_claimed(entry, &archive_path, &dir) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.release(&archive_path, &dir);
                match e {
                    Error::MissingInBucket(key) => {
                        error!("{} does not exist in bucket", key);
                        Ok(ArchiveOutcome::Missing)
                    }
                    e => Err(e),
                }
            }
        }
    }

    /// Get the archive locally. Returns `true` if it was downloaded from the bucket.
    fn fetch(&self, entry: &ObjectEntry, archive_path: &Path) -> Result<bool, Error> {
        let ctx = self.context;
        std::fs::create_dir_all(ctx.layout.downloads_dir())?;
        let name = entry.file_name();

        if let Some(mirror) = &ctx.mirror {
            if mirror.contains(name) {
                info!("fetching {} from mirror", name);
                mirror.fetch(name, archive_path)?;
                return Ok(false);
            }
        }

        let s3 = ctx
            .s3
            .as_ref()
            .ok_or_else(|| Error::Config(format!("{} is not mirrored and no bucket is configured", name)))?;
        info!("downloading {}", entry.key);
        s3.download(&entry.key, archive_path)?;
        Ok(true)
    }

    fn process_claimed(
        &self,
        entry: &ObjectEntry,
        archive_path: &Path,
        dir: &Path,
    ) -> Result<ArchiveOutcome, Error> {
        let ctx = self.context;
        let from_bucket = self.fetch(entry, archive_path)?;

        if !Extractor::is_archive(archive_path)? {
            return Err(Error::NotAnArchive(archive_path.to_path_buf()));
        }

        let extraction = Extractor::new(&ctx.layout, &ctx.identifiers)
            .with_cancel(ctx.cancel.clone())
            .extract(archive_path)?;

        // extraction is complete before any conversion starts
        let scan = preprint::scan(dir)?;
        let conversions = ctx.converter.convert_all(&scan.preprints)?;

        if from_bucket {
            if let Some(mirror) = &ctx.mirror {
                if let Err(e) = mirror.store(archive_path) {
                    error!("could not store {:?} in mirror: {}", archive_path, e);
                }
            }
        }

        std::fs::remove_file(archive_path)?;
        if !ctx.keep_sources {
            std::fs::remove_dir_all(dir)?;
        }
        ctx.completed.record(&entry.key)?;

        info!(
            "{}: {} converted, {} timed out, {} failed, {} skipped",
            entry.key,
            conversions.succeeded,
            conversions.timed_out,
            conversions.failed,
            conversions.skipped
        );
        Ok(ArchiveOutcome::Processed {
            extraction,
            conversions,
        })
    }

    /// Remove in-flight artifacts of an archive: local copy, partial download and extraction directory.
    fn release(&self, archive_path: &Path, dir: &Path) {
        warn!("releasing {:?}", dir);
        for path in [archive_path.to_path_buf(), part_path(archive_path)] {
            if path.is_file() {
                if let Err(e) = std::fs::remove_file(&path) {
                    error!("could not remove {:?}: {}", path, e);
                }
            }
        }
        if dir.is_dir() {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                error!("could not remove {:?}: {}", dir, e);
            }
        }
    }
}

impl<'a> Pipeline<ArchiveStats> for ArchivePipeline<'a> {
    fn run(&self) -> Result<ArchiveStats, Error> {
        let s3 = self
            .context
            .s3
            .as_ref()
            .ok_or_else(|| Error::Config("no bucket configured".to_string()))?;
        let pool = thread_pool(self.workers)?;
        let mut stats = ArchiveStats::default();

        for page in s3.pages(&self.prefix) {
            let entries = page?;
            self.context.cancel.check()?;
            info!("processing a page of {} archives", entries.len());

            let results: Vec<(ObjectEntry, Result<ArchiveOutcome, Error>)> = pool.install(|| {
                entries
                    .into_par_iter()
                    .map(|entry| {
                        let result = self.process(&entry);
                        (entry, result)
                    })
                    .collect()
            });

            let mut interrupted = false;
            for (entry, result) in results {
                match result {
                    Ok(outcome) => stats.add(outcome),
                    Err(Error::Interrupted) => interrupted = true,
                    Err(e) => {
                        error!("{}: {}", entry.key, e);
                        stats.failed += 1;
                    }
                }
            }
            if interrupted {
                return Err(Error::Interrupted);
            }
        }

        info!(
            "archives: {} processed, {} already completed, {} claimed elsewhere, {} missing, {} failed",
            stats.processed, stats.completed, stats.claimed, stats.missing, stats.failed
        );
        Ok(stats)
    }
}
