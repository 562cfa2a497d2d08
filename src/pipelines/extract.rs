//! Extraction of local archives, without conversion.
use std::path::{Path, PathBuf};

use log::{error, info};
use rayon::prelude::*;

use crate::error::Error;
use crate::extract::{archive_id, ExtractionSummary, Extractor};
use crate::pipelines::context::Context;
use crate::pipelines::pipeline::{thread_pool, Pipeline};
use crate::preprint;

pub struct ExtractPipeline<'a> {
    context: &'a Context,
    archives: Vec<PathBuf>,
    workers: Option<usize>,
}

impl<'a> ExtractPipeline<'a> {
    pub fn new(context: &'a Context, archives: Vec<PathBuf>, workers: Option<usize>) -> Self {
        Self {
            context,
            archives,
            workers,
        }
    }

    fn extract(&self, archive: &Path) -> Result<ExtractionSummary, Error> {
        self.context.cancel.check()?;
        let ctx = self.context;
        let summary = Extractor::new(&ctx.layout, &ctx.identifiers)
            .with_cancel(ctx.cancel.clone())
            .extract(archive)?;

        let dir = ctx.layout.archive_dir(&archive_id(archive)?);
        if dir.is_dir() {
            // logs submission statistics
            preprint::scan(&dir)?;
        }
        Ok(summary)
    }
}

impl<'a> Pipeline<ExtractionSummary> for ExtractPipeline<'a> {
    fn run(&self) -> Result<ExtractionSummary, Error> {
        let pool = thread_pool(self.workers)?;
        let results: Vec<Result<ExtractionSummary, Error>> =
            pool.install(|| self.archives.par_iter().map(|a| self.extract(a)).collect());

        let mut total = ExtractionSummary::default();
        let mut interrupted = false;
        for (archive, result) in self.archives.iter().zip(results) {
            match result {
                Ok(summary) => total += summary,
                Err(Error::Interrupted) => interrupted = true,
                Err(e) => error!("{:?}: {}", archive, e),
            }
        }
        if interrupted {
            return Err(Error::Interrupted);
        }

        info!(
            "{} archives: {} submissions extracted, {} failed, {} already converted, {} pdf only",
            self.archives.len(),
            total.accepted,
            total.failed,
            total.already_converted,
            total.pdf_only
        );
        Ok(total)
    }
}
