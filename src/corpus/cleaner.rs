//! Tokenization and normalization of article text.
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use itertools::Itertools;
use log::info;

use super::parser::MATH_PLACEHOLDER;
use crate::error::Error;

pub const NUM_TOKEN: &str = "<num>";
pub const LATEX_TOKEN: &str = "<latex>";

/// Lowercases, splits on word characters, maps numbers and math placeholders
/// to fixed tokens and drops stopwords.
#[derive(Debug, Default, Clone)]
pub struct Cleaner {
    stopwords: HashSet<String>,
}

impl Cleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stopwords<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stopwords: stopwords
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Load stopwords from a JSON array of strings.
    pub fn from_stopwords_file(path: &Path) -> Result<Self, Error> {
        let f = File::open(path)?;
        let words: Vec<String> = serde_json::from_reader(BufReader::new(f))?;
        info!("loaded {} stopwords from {:?}", words.len(), path);
        Ok(Self::with_stopwords(words))
    }

    pub fn stopwords(&self) -> usize {
        self.stopwords.len()
    }

    /// Cleaned tokens of `text`, in order.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let text = text.to_lowercase();
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
            .filter(|t| !self.stopwords.contains(*t))
            .map(|t| {
                if t == MATH_PLACEHOLDER {
                    LATEX_TOKEN.to_string()
                } else if t.chars().all(char::is_numeric) {
                    NUM_TOKEN.to_string()
                } else {
                    t.to_string()
                }
            })
            .collect()
    }

    /// Cleaned tokens of `text` on a single line.
    pub fn clean(&self, text: &str) -> String {
        self.tokens(text).iter().join(" ")
    }
}
