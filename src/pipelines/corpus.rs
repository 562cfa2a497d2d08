//! Corpus building over the converted XML directory.
use std::path::PathBuf;

use crate::cancel::CancelToken;
use crate::config::Layout;
use crate::corpus::{Cleaner, CorpusBuilder, CorpusStats};
use crate::error::Error;
use crate::pipelines::pipeline::{thread_pool, Pipeline};

pub struct CorpusPipeline {
    layout: Layout,
    stopwords: Option<PathBuf>,
    flat: bool,
    abstracts: bool,
    workers: Option<usize>,
    cancel: CancelToken,
}

impl CorpusPipeline {
    pub fn new(layout: Layout, cancel: CancelToken) -> Self {
        Self {
            layout,
            stopwords: None,
            flat: false,
            abstracts: false,
            workers: None,
            cancel,
        }
    }

    /// Remove the stopwords listed in the JSON array at `path`.
    pub fn with_stopwords(mut self, path: Option<PathBuf>) -> Self {
        self.stopwords = path;
        self
    }

    /// Also append documents to the flat corpus.
    pub fn with_flat(mut self, flat: bool) -> Self {
        self.flat = flat;
        self
    }

    /// Also collect cleaned abstracts.
    pub fn with_abstracts(mut self, abstracts: bool) -> Self {
        self.abstracts = abstracts;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }
}

impl Pipeline<CorpusStats> for CorpusPipeline {
    fn run(&self) -> Result<CorpusStats, Error> {
        let cleaner = match &self.stopwords {
            Some(path) => Cleaner::from_stopwords_file(path)?,
            None => Cleaner::new(),
        };

        let mut builder = CorpusBuilder::new(&self.layout, cleaner)?.with_cancel(self.cancel.clone());
        if self.flat {
            builder = builder.with_flat_corpus(&self.layout.flat_corpus())?;
        }
        if self.abstracts {
            builder = builder.with_abstracts(&self.layout.abstracts_corpus())?;
        }

        let pool = thread_pool(self.workers)?;
        pool.install(|| builder.build(&self.layout.xml_dir()))
    }
}
