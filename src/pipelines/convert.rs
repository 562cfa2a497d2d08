//! Conversion of already extracted sources.
//!
//! Unlike [super::ArchivePipeline], preprints are dispatched individually on the pool,
//! which is useful to resume conversions over extraction directories kept with `--keep-sources`.
use std::path::PathBuf;

use log::{error, info};
use rayon::prelude::*;

use crate::convert::{ConversionOutcome, ConversionStats};
use crate::error::Error;
use crate::pipelines::context::Context;
use crate::pipelines::pipeline::{thread_pool, Pipeline};
use crate::preprint::{self, Preprint};

pub struct ConvertPipeline<'a> {
    context: &'a Context,
    dirs: Vec<PathBuf>,
    workers: Option<usize>,
}

impl<'a> ConvertPipeline<'a> {
    /// Convert preprints of the extraction directories `dirs`,
    /// or of every extraction directory of the layout if empty.
    pub fn new(context: &'a Context, dirs: Vec<PathBuf>, workers: Option<usize>) -> Self {
        Self {
            context,
            dirs,
            workers,
        }
    }

    fn extraction_dirs(&self) -> Result<Vec<PathBuf>, Error> {
        if !self.dirs.is_empty() {
            return Ok(self.dirs.clone());
        }
        let latex = self.context.layout.latex_dir();
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&latex)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn preprints(&self) -> Result<Vec<Preprint>, Error> {
        let mut preprints = Vec::new();
        for dir in self.extraction_dirs()? {
            preprints.extend(preprint::scan(&dir)?.preprints);
        }
        Ok(preprints)
    }
}

impl<'a> Pipeline<ConversionStats> for ConvertPipeline<'a> {
    fn run(&self) -> Result<ConversionStats, Error> {
        let converter = &self.context.converter;
        let preprints = self.preprints()?;
        let (todo, done): (Vec<&Preprint>, Vec<&Preprint>) = preprints
            .iter()
            .partition(|p| converter.needs_conversion(p));
        info!(
            "{} preprints to convert, {} already attempted",
            todo.len(),
            done.len()
        );

        let pool = thread_pool(self.workers)?;
        let results: Vec<Result<_, Error>> = pool.install(|| {
            todo.par_iter()
                .map(|preprint| -> Result<ConversionOutcome, Error> {
                    self.context.cancel.check()?;
                    converter.convert(preprint)
                })
                .collect()
        });

        let mut stats = ConversionStats {
            skipped: done.len(),
            ..Default::default()
        };
        let mut interrupted = false;
        for (preprint, result) in todo.iter().zip(results) {
            match result {
                Ok(outcome) => stats.add(outcome),
                Err(Error::Interrupted) => interrupted = true,
                Err(e) => {
                    error!("{}: {}", preprint.submission_id, e);
                    stats.failed += 1;
                }
            }
        }
        if interrupted {
            return Err(Error::Interrupted);
        }

        info!(
            "{} converted, {} timed out, {} failed, {} skipped",
            stats.succeeded, stats.timed_out, stats.failed, stats.skipped
        );
        Ok(stats)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::config::{Config, Layout};
    use crate::identifiers::IdentifierSet;

    fn context(root: &std::path::Path) -> Context {
        let mut config = Config::default();
        // fails on submissions named 1009.0003
        config.convert.program = "sh".to_string();
        config.convert.args = vec![
            "-c".to_string(),
            "case \"$1\" in *1009.0003*) exit 1;; esac; cp \"$1\" \"${0#--dest=}\"".to_string(),
        ];
        config.convert.timeout_secs = 10;
        Context::new(
            &config,
            Layout::new(root),
            IdentifierSet::default(),
            CancelToken::new(),
        )
        .unwrap()
    }

    fn submission(ctx: &Context, archive: &str, id: &str) {
        let dir = ctx.layout.archive_dir(archive).join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("ms.tex"), "\\documentclass{article}").unwrap();
    }

    #[test]
    fn convert_extracted() {
        let root = tempfile::tempdir().unwrap();
        let ctx = context(root.path());
        submission(&ctx, "arXiv_src_1009_001", "1009.0001");
        submission(&ctx, "arXiv_src_1009_001", "1009.0002");
        submission(&ctx, "arXiv_src_1009_002", "1009.0003");

        let stats = ConvertPipeline::new(&ctx, vec![], Some(2)).run().unwrap();
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert!(ctx.layout.xml_path("1009.0001").is_file());
        assert!(ctx.layout.xml_path("1009.0002").is_file());

        // every preprint has been attempted
        let stats = ConvertPipeline::new(&ctx, vec![], Some(2)).run().unwrap();
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.succeeded + stats.failed, 0);
    }

    #[test]
    fn selected_dirs() {
        let root = tempfile::tempdir().unwrap();
        let ctx = context(root.path());
        submission(&ctx, "arXiv_src_1009_001", "1009.0001");
        submission(&ctx, "arXiv_src_1009_002", "1009.0002");

        let dirs = vec![ctx.layout.archive_dir("arXiv_src_1009_002")];
        let stats = ConvertPipeline::new(&ctx, dirs, Some(1)).run().unwrap();
        assert_eq!(stats.succeeded, 1);
        assert!(!ctx.layout.xml_path("1009.0001").exists());
    }

    #[test]
    fn interrupted() {
        let root = tempfile::tempdir().unwrap();
        let ctx = context(root.path());
        submission(&ctx, "arXiv_src_1009_001", "1009.0001");
        ctx.cancel.cancel();

        let result = ConvertPipeline::new(&ctx, vec![], Some(1)).run();
        assert!(matches!(result, Err(Error::Interrupted)));
        assert!(ctx.converter.needs_conversion(&Preprint {
            submission_id: "1009.0001".to_string(),
            path: PathBuf::new(),
        }));
    }
}
