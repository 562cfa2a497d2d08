//! # arxiv-corpus
//!
//! Builds a plain-text corpus out of the arXiv bulk source archives.
//!
//! ## Getting started
//!
//! ```sh
//! arxiv-corpus 0.1.0
//! arXiv sources to plain-text corpus pipeline.
//!
//! USAGE:
//!     arxiv-corpus <SUBCOMMAND>
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!
//! SUBCOMMANDS:
//!     convert     Convert already extracted preprints
//!     corpus      Build the corpus from converted articles
//!     extract     Extract accepted submissions of local archives
//!     help        Prints this message or the help of the given subcommand(s)
//!     list        List the source archives of the bucket
//!     metadata    Harvest or update the metadata table
//!     run         Download, extract and convert every source archive
//! ```
//!
//! A typical session harvests the metadata, then runs the archives pipeline
//! (which can be interrupted with Ctrl-C and resumed), then builds the corpus:
//!
//! ```sh
//! RUST_LOG=info arxiv-corpus metadata
//! RUST_LOG=info arxiv-corpus run -j 8
//! RUST_LOG=info arxiv-corpus corpus --flat --abstracts
//! ```
use structopt::StructOpt;

use arxiv_corpus::cancel::CancelToken;
use arxiv_corpus::config::{Config, Layout};
use arxiv_corpus::error::Error;
use arxiv_corpus::identifiers::IdentifierSet;
use arxiv_corpus::metadata::Harvester;
use arxiv_corpus::pipelines::{
    ArchivePipeline, Context, ConvertPipeline, CorpusPipeline, ExtractPipeline, Pipeline,
};
use arxiv_corpus::storage::S3Client;

#[macro_use]
extern crate log;

mod cli;

/// Load the configuration, applying the `--root` override.
fn config(common: &cli::Common) -> Result<(Config, Layout), Error> {
    let mut config = Config::load(common.config.as_deref())?;
    if let Some(root) = &common.root {
        config.paths.root = root.clone();
    }
    let layout = Layout::new(&config.paths.root);
    Ok((config, layout))
}

fn identifiers(
    config: &Config,
    layout: &Layout,
    selection: &cli::Selection,
) -> Result<IdentifierSet, Error> {
    let ids = match &selection.ids {
        Some(path) => IdentifierSet::from_lines(path)?,
        None => IdentifierSet::from_csv(
            &layout.resolve(&config.metadata.path),
            selection.category.as_deref(),
        )?,
    };
    if ids.is_empty() {
        warn!("no accepted identifiers, nothing will be extracted");
    }
    Ok(ids)
}

fn run(opt: cli::ArxivCorpus, cancel: CancelToken) -> Result<(), Error> {
    match opt {
        cli::ArxivCorpus::Metadata(m) => {
            let (config, layout) = config(&m.common)?;
            let path = layout.resolve(&config.metadata.path);
            let harvester = Harvester::new(&config.metadata, cancel)?;
            let added = harvester.update(&path)?;
            info!("{} new records in {:?}", added, path);
        }

        cli::ArxivCorpus::List(l) => {
            let (config, _) = config(&l.common)?;
            let prefix = l.prefix.unwrap_or_else(|| config.s3.prefix.clone());
            let s3 = S3Client::new(&config.s3.clone().with_env_credentials(), cancel)?;
            for page in s3.pages(&prefix) {
                for entry in page? {
                    println!("{}\t{}", entry.key, entry.size);
                }
            }
        }

        cli::ArxivCorpus::Run(r) => {
            let (config, layout) = config(&r.common)?;
            let ids = identifiers(&config, &layout, &r.selection)?;
            let prefix = r.prefix.unwrap_or_else(|| config.s3.prefix.clone());
            let context =
                Context::from_config(&config, layout, ids, cancel)?.keep_sources(r.keep_sources);
            let stats = ArchivePipeline::new(&context, &prefix, r.workers).run()?;
            debug!("{:#?}", stats);
        }

        cli::ArxivCorpus::Extract(e) => {
            let (config, layout) = config(&e.common)?;
            let ids = identifiers(&config, &layout, &e.selection)?;
            let context = Context::new(&config, layout, ids, cancel)?;
            ExtractPipeline::new(&context, e.archives, e.workers).run()?;
        }

        cli::ArxivCorpus::Convert(c) => {
            let (config, layout) = config(&c.common)?;
            let context = Context::new(&config, layout, IdentifierSet::default(), cancel)?;
            ConvertPipeline::new(&context, c.dirs, c.workers).run()?;
        }

        cli::ArxivCorpus::Corpus(c) => {
            let (_, layout) = config(&c.common)?;
            CorpusPipeline::new(layout, cancel)
                .with_stopwords(c.stopwords)
                .with_flat(c.flat)
                .with_abstracts(c.abstracts)
                .with_workers(c.workers)
                .run()?;
        }
    };
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let opt = cli::ArxivCorpus::from_args();
    debug!("cli args\n{:#?}", opt);

    // workers poll the token between items, and while waiting on the conversion tool
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cleaning up in-flight work");
            handler.cancel();
        }
    });

    let result = tokio::task::spawn_blocking(move || run(opt, cancel))
        .await
        .map_err(|e| Error::Custom(format!("pipeline task failed: {}", e)))?;

    match result {
        Err(Error::Interrupted) => {
            error!("interrupted, completed work is kept and will be skipped on the next run");
            std::process::exit(130);
        }
        other => other,
    }
}
