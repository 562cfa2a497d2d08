/*! Accepted submission identifiers.

arXiv identifiers come in two flavours:
- old style, `astro-ph/0001001`, stored in archives as `astro-ph0001001.gz`,
- new style, `1009.1724`, stored in archives as `1009.1724.gz`.

Both are normalized by removing the `/`, which is the form archive members carry.
!*/
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::error::Error;

/// Immutable set of accepted submission identifiers.
///
/// Membership is exact: `0001001` is not accepted because `astro-ph0001001` is.
#[derive(Debug, Clone, Default)]
pub struct IdentifierSet {
    ids: HashSet<String>,
}

/// Subset of the metadata table columns needed to build the set.
#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    filename_parsed: Option<String>,
    #[serde(default)]
    categories: Option<String>,
}

impl IdentifierSet {
    /// Load identifiers from the metadata table.
    ///
    /// Uses `filename_parsed` when present, and falls back on `filename` with `/` removed.
    /// If `category` is provided, only rows listing it in `categories` are kept.
    pub fn from_csv(path: &Path, category: Option<&str>) -> Result<Self, Error> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut ids = HashSet::new();

        for row in reader.deserialize::<IdRow>() {
            let row = row?;

            if let Some(category) = category {
                let matches = row
                    .categories
                    .as_deref()
                    .map(|c| c.split_whitespace().any(|c| c == category))
                    .unwrap_or(false);
                if !matches {
                    continue;
                }
            }

            let id = row
                .filename_parsed
                .filter(|id| !id.is_empty())
                .or_else(|| row.filename.map(|f| normalize(&f)));

            if let Some(id) = id {
                ids.insert(id);
            }
        }

        info!("loaded {} identifiers from {:?}", ids.len(), path);
        Ok(Self { ids })
    }

    /// Load identifiers from a newline-separated file. Blank lines are ignored.
    pub fn from_lines(path: &Path) -> Result<Self, Error> {
        let f = BufReader::new(File::open(path)?);
        let mut ids = HashSet::new();
        for line in f.lines() {
            let line = line?;
            let line = line.trim();
            if !line.is_empty() {
                ids.insert(normalize(line));
            }
        }
        debug!("loaded {} identifiers from {:?}", ids.len(), path);
        Ok(Self { ids })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IdentifierSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().map(|id| normalize(&id.into())).collect(),
        }
    }
}

/// Remove the `/` of old style identifiers.
pub fn normalize(id: &str) -> String {
    id.replace('/', "")
}

/// Derive the candidate submission identifier from an archive member name:
/// parent directories and the last extension are removed.
///
/// `1009/1009.1724.gz` gives `1009.1724`, `0001/astro-ph0001001.pdf` gives `astro-ph0001001`.
pub fn submission_id(member_name: &str) -> &str {
    let basename = member_name.rsplit('/').next().unwrap_or(member_name);
    match basename.rfind('.') {
        Some(0) | None => basename,
        Some(idx) => &basename[..idx],
    }
}
