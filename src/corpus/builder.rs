//! Corpus building from the converted XML directory.
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, error, info, warn};
use rayon::prelude::*;

use super::cleaner::Cleaner;
use super::parser::{parse_article, CitationStats};
use crate::cancel::CancelToken;
use crate::config::Layout;
use crate::error::Error;
use crate::identifiers::submission_id;
use crate::io::write_atomic;

/// What happened to a single converted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOutcome {
    Built(CitationStats),
    /// A corpus document already exists.
    Skipped,
    /// No `document` element, or nothing left after cleaning.
    Discarded,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CorpusStats {
    pub built: usize,
    pub skipped: usize,
    pub discarded: usize,
    pub failed: usize,
    pub citations: CitationStats,
}

impl AddAssign for CorpusStats {
    fn add_assign(&mut self, other: Self) {
        self.built += other.built;
        self.skipped += other.skipped;
        self.discarded += other.discarded;
        self.failed += other.failed;
        self.citations += other.citations;
    }
}

impl From<DocumentOutcome> for CorpusStats {
    fn from(outcome: DocumentOutcome) -> Self {
        match outcome {
            DocumentOutcome::Built(citations) => CorpusStats {
                built: 1,
                citations,
                ..Default::default()
            },
            DocumentOutcome::Skipped => CorpusStats {
                skipped: 1,
                ..Default::default()
            },
            DocumentOutcome::Discarded => CorpusStats {
                discarded: 1,
                ..Default::default()
            },
        }
    }
}

/// Builds `corpus/<id>.txt` (one line of cleaned tokens) for each converted document.
///
/// Optionally appends the same line to a flat corpus file, and the cleaned abstracts
/// to an abstracts file. Those shared files are only written for newly built documents,
/// so feeding the same document twice is a no-op.
pub struct CorpusBuilder {
    layout: Layout,
    cleaner: Cleaner,
    flat: Option<Mutex<File>>,
    abstracts: Option<Mutex<File>>,
    cancel: CancelToken,
}

fn open_append(path: &Path) -> Result<Mutex<File>, Error> {
    let f = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Mutex::new(f))
}

impl CorpusBuilder {
    pub fn new(layout: &Layout, cleaner: Cleaner) -> Result<Self, Error> {
        std::fs::create_dir_all(layout.corpus_dir())?;
        Ok(Self {
            layout: layout.clone(),
            cleaner,
            flat: None,
            abstracts: None,
            cancel: CancelToken::new(),
        })
    }

    /// Also append documents to the flat corpus at `path`.
    pub fn with_flat_corpus(mut self, path: &Path) -> Result<Self, Error> {
        self.flat = Some(open_append(path)?);
        Ok(self)
    }

    /// Also append cleaned abstracts to `path`.
    pub fn with_abstracts(mut self, path: &Path) -> Result<Self, Error> {
        self.abstracts = Some(open_append(path)?);
        Ok(self)
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build the corpus document of the converted file at `xml_path`.
    pub fn add(&self, xml_path: &Path) -> Result<DocumentOutcome, Error> {
        let name = xml_path.to_string_lossy();
        let id = submission_id(&name);
        let dst = self.layout.corpus_path(id);
        if dst.is_file() {
            debug!("{}: already in corpus", id);
            return Ok(DocumentOutcome::Skipped);
        }

        let content = std::fs::read(xml_path)?;
        let content = String::from_utf8_lossy(&content);
        let article = match parse_article(&content)? {
            Some(article) => article,
            None => {
                warn!("{:?}: no document element", xml_path);
                return Ok(DocumentOutcome::Discarded);
            }
        };

        let text = self.cleaner.clean(&article.text);
        if text.is_empty() {
            warn!("{:?}: no text", xml_path);
            return Ok(DocumentOutcome::Discarded);
        }

        write_atomic(&dst, format!("{}\n", text).as_bytes())?;

        if let Some(flat) = &self.flat {
            let mut f = flat.lock().unwrap();
            f.write_all(format!("{}\n", text).as_bytes())?;
        }

        if let (Some(abstracts), Some(abstract_text)) = (&self.abstracts, &article.abstract_text) {
            let abstract_text = self.cleaner.clean(abstract_text);
            if !abstract_text.is_empty() {
                let mut f = abstracts.lock().unwrap();
                f.write_all(format!("{}\n", abstract_text).as_bytes())?;
            }
        }

        debug!("{}: {:?}", id, article.citations);
        Ok(DocumentOutcome::Built(article.citations))
    }

    /// Converted files of `xml_dir`, sorted.
    pub fn xml_files(xml_dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let dir = xml_dir
            .to_str()
            .ok_or_else(|| Error::Custom(format!("invalid path: {:?}", xml_dir)))?;
        let pattern = format!("{}/*.xml", glob::Pattern::escape(dir));
        let mut files = glob::glob(&pattern)?.collect::<Result<Vec<_>, _>>()?;
        files.sort();
        Ok(files)
    }

    /// Build the corpus from every converted file of `xml_dir`, in parallel on the current rayon pool.
    ///
    /// Per-document failures are logged and counted, an interrupt stops the build.
    pub fn build(&self, xml_dir: &Path) -> Result<CorpusStats, Error> {
        let files = Self::xml_files(xml_dir)?;
        info!("building corpus from {} files in {:?}", files.len(), xml_dir);

        let stats = files
            .par_iter()
            .map(|path| -> Result<CorpusStats, Error> {
                self.cancel.check()?;
                match self.add(path) {
                    Ok(outcome) => Ok(CorpusStats::from(outcome)),
                    Err(e) => {
                        error!("{:?}: {}", path, e);
                        Ok(CorpusStats {
                            failed: 1,
                            ..Default::default()
                        })
                    }
                }
            })
            .try_reduce(CorpusStats::default, |mut a, b| {
                a += b;
                Ok(a)
            })?;

        if let Some(flat) = &self.flat {
            flat.lock().unwrap().flush()?;
        }
        if let Some(abstracts) = &self.abstracts {
            abstracts.lock().unwrap().flush()?;
        }

        info!(
            "corpus: {} built, {} skipped, {} discarded, {} failed",
            stats.built, stats.skipped, stats.discarded, stats.failed
        );
        info!(
            "citations: {} parenthetical, {} in-text, {} unresolved",
            stats.citations.parenthetical, stats.citations.intext, stats.citations.unresolved
        );
        Ok(stats)
    }
}
