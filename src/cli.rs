//! Command line arguments and parameters management/parsing.
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "arxiv-corpus",
    about = "arXiv sources to plain-text corpus pipeline."
)]
/// Holds every command that is callable by the `arxiv-corpus` command.
pub enum ArxivCorpus {
    #[structopt(about = "Harvest or update the metadata table")]
    Metadata(Metadata),
    #[structopt(about = "List the source archives of the bucket")]
    List(List),
    #[structopt(about = "Download, extract and convert every source archive")]
    Run(Run),
    #[structopt(about = "Extract accepted submissions of local archives")]
    Extract(Extract),
    #[structopt(about = "Convert already extracted preprints")]
    Convert(Convert),
    #[structopt(about = "Build the corpus from converted articles")]
    Corpus(Corpus),
}

/// Options shared by every command.
#[derive(Debug, StructOpt)]
pub struct Common {
    #[structopt(
        long = "config",
        parse(from_os_str),
        help = "TOML configuration file. Defaults to arxiv-corpus.toml if present."
    )]
    pub config: Option<PathBuf>,
    #[structopt(
        long = "root",
        parse(from_os_str),
        help = "root of the working tree, overrides [paths] root"
    )]
    pub root: Option<PathBuf>,
}

/// Source of the accepted identifiers.
#[derive(Debug, StructOpt)]
pub struct Selection {
    #[structopt(
        long = "category",
        help = "only accept submissions of this category (e.g. astro-ph.GA)"
    )]
    pub category: Option<String>,
    #[structopt(
        long = "ids",
        parse(from_os_str),
        help = "newline-separated list of accepted identifiers, instead of the metadata table"
    )]
    pub ids: Option<PathBuf>,
}

#[derive(Debug, StructOpt)]
pub struct Metadata {
    #[structopt(flatten)]
    pub common: Common,
}

#[derive(Debug, StructOpt)]
pub struct List {
    #[structopt(flatten)]
    pub common: Common,
    #[structopt(long = "prefix", help = "key prefix, overrides [s3] prefix")]
    pub prefix: Option<String>,
}

#[derive(Debug, StructOpt)]
/// Run command and parameters.
///
/// ```sh
/// arxiv-corpus-run 0.1.0
/// Download, extract and convert every source archive
///
/// USAGE:
///     arxiv-corpus run [FLAGS] [OPTIONS]
///
/// FLAGS:
///         --keep-sources    keep extracted sources once an archive is processed
///
/// OPTIONS:
///     -j, --workers <workers>    number of workers. Defaults to the number of processors.
///         --prefix <prefix>      key prefix, overrides [s3] prefix
/// ```
pub struct Run {
    #[structopt(flatten)]
    pub common: Common,
    #[structopt(flatten)]
    pub selection: Selection,
    #[structopt(
        short = "j",
        long = "workers",
        help = "number of workers. Defaults to the number of processors."
    )]
    pub workers: Option<usize>,
    #[structopt(long = "prefix", help = "key prefix, overrides [s3] prefix")]
    pub prefix: Option<String>,
    #[structopt(
        long = "keep-sources",
        help = "keep extracted sources once an archive is processed"
    )]
    pub keep_sources: bool,
}

#[derive(Debug, StructOpt)]
pub struct Extract {
    #[structopt(flatten)]
    pub common: Common,
    #[structopt(flatten)]
    pub selection: Selection,
    #[structopt(short = "j", long = "workers", help = "number of workers")]
    pub workers: Option<usize>,
    #[structopt(parse(from_os_str), required = true, help = "source archives")]
    pub archives: Vec<PathBuf>,
}

#[derive(Debug, StructOpt)]
pub struct Convert {
    #[structopt(flatten)]
    pub common: Common,
    #[structopt(short = "j", long = "workers", help = "number of workers")]
    pub workers: Option<usize>,
    #[structopt(
        parse(from_os_str),
        help = "extraction directories (latex/<archive-id>). Defaults to every one of them."
    )]
    pub dirs: Vec<PathBuf>,
}

#[derive(Debug, StructOpt)]
pub struct Corpus {
    #[structopt(flatten)]
    pub common: Common,
    #[structopt(short = "j", long = "workers", help = "number of workers")]
    pub workers: Option<usize>,
    #[structopt(
        long = "stopwords",
        parse(from_os_str),
        help = "JSON array of stopwords to remove"
    )]
    pub stopwords: Option<PathBuf>,
    #[structopt(long = "flat", help = "also write every document to corpus.txt")]
    pub flat: bool,
    #[structopt(long = "abstracts", help = "also write cleaned abstracts to abstracts.txt")]
    pub abstracts: bool,
}
