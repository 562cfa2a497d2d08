//! Article text extraction from converted XML.
use std::collections::HashMap;
use std::ops::AddAssign;

use log::debug;

use crate::error::Error;
use crate::xml::{self, Element, Rewrite};

/// Stands in for every piece of math markup.
pub const MATH_PLACEHOLDER: &str = "latex_metatoken";

/// Elements that carry no prose, dropped along with their subtree.
const STRIPPED: [&str; 10] = [
    "title",
    "note",
    "tabular",
    "table",
    "caption",
    "toccaption",
    "figure",
    "tags",
    "tag",
    "ERROR",
];

const CITEP: &str = "ltx_citemacro_citep";
const CITET: &str = "ltx_citemacro_citet";
const CITE: &str = "ltx_citemacro_cite";

/// Citation counters of a document (or of the whole corpus, see [AddAssign]).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CitationStats {
    /// Parenthetical citations, removed from the text.
    pub parenthetical: usize,
    /// In-text citations, replaced by their author/year label.
    pub intext: usize,
    /// Citations whose bibliography entry couldn't be found, removed from the text.
    pub unresolved: usize,
}

impl AddAssign for CitationStats {
    fn add_assign(&mut self, other: Self) {
        self.parenthetical += other.parenthetical;
        self.intext += other.intext;
        self.unresolved += other.unresolved;
    }
}

/// Raw (uncleaned) text of an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub text: String,
    pub abstract_text: Option<String>,
    pub citations: CitationStats,
}

/// Bibliography labels, keyed by `bibitem@key`.
/// A `None` label is an entry without a rendered reference number/label.
type Bibliography = HashMap<String, Option<String>>;

fn bibliography(document: &Element) -> Bibliography {
    document
        .find_all(|e| e.is("bibitem"))
        .into_iter()
        .filter_map(|item| {
            let key = item.attr("key")?.to_string();
            let label = item
                .find(|e| e.attr("role") == Some("refnum"))
                .map(|e| e.text().trim().to_string())
                .filter(|l| !l.is_empty());
            Some((key, label))
        })
        .collect()
}

/// Labels like `[12]` or `3` denote numeric citation styles, where the citation isn't part of the sentence.
fn is_numeric_label(label: &str) -> bool {
    let inner = label.trim_matches(|c: char| "[]() ".contains(c));
    !inner.is_empty()
        && inner
            .chars()
            .all(|c| c.is_ascii_digit() || c == ',' || c == '-' || c.is_whitespace())
}

/// Resolve every key of `bibrefs` (comma separated) to a label.
fn resolve<'a>(bibrefs: &str, bib: &'a Bibliography) -> Option<Vec<&'a str>> {
    bibrefs
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|key| bib.get(key).and_then(|l| l.as_deref()))
        .collect::<Option<Vec<_>>>()
        .filter(|labels| !labels.is_empty())
}

/// Decide the fate of a citation element and count it.
fn citation(cite: &Element, bib: &Bibliography, stats: &mut CitationStats) -> Rewrite {
    if cite.has_class(CITEP) {
        stats.parenthetical += 1;
        return Rewrite::Remove;
    }

    if !(cite.has_class(CITET) || cite.has_class(CITE)) {
        return Rewrite::Remove;
    }

    let bibrefs = cite
        .find(|e| e.is("bibref"))
        .and_then(|e| e.attr("bibrefs"));

    match bibrefs.and_then(|refs| resolve(refs, bib)) {
        Some(labels) if labels.iter().all(|l| is_numeric_label(l)) => {
            stats.parenthetical += 1;
            Rewrite::Remove
        }
        Some(labels) => {
            stats.intext += 1;
            Rewrite::Replace(labels.join("; "))
        }
        None => {
            debug!("unresolved citation {:?}", bibrefs);
            stats.unresolved += 1;
            Rewrite::Remove
        }
    }
}

fn strip(e: &Element) -> Rewrite {
    if e.is("Math") {
        Rewrite::Replace(format!(" {} ", MATH_PLACEHOLDER))
    } else if STRIPPED.contains(&e.name.as_str()) {
        Rewrite::Remove
    } else {
        Rewrite::Keep
    }
}

/// Extract the prose of a converted article.
///
/// Returns `None` when the XML has no `document` element (the conversion produced nothing usable).
///
/// Text is taken from the outermost sections, or from the paragraphs if there is none.
/// Citations are resolved first, then non-prose elements are stripped and math is replaced
/// by [MATH_PLACEHOLDER].
pub fn parse_article(content: &str) -> Result<Option<Article>, Error> {
    let root = xml::parse(content)?;
    let document = if root.is("document") {
        &root
    } else {
        match root.find_by_name("document") {
            Some(d) => d,
            None => return Ok(None),
        }
    };

    let bib = bibliography(document);
    let mut citations = CitationStats::default();

    let mut blocks = document.outermost("section");
    if blocks.is_empty() {
        blocks = document.outermost("para");
    }

    let mut text = String::new();
    for block in blocks {
        let mut block = block.clone();
        block.rewrite(&mut |e: &Element| {
            if e.is("cite") {
                citation(e, &bib, &mut citations)
            } else {
                Rewrite::Keep
            }
        });
        block.rewrite(&mut strip);
        text.push_str(&block.text());
        text.push('\n');
    }

    let abstract_text = document.child("abstract").map(|a| {
        let mut a = a.clone();
        a.rewrite(&mut |e: &Element| {
            if e.is("Math") {
                Rewrite::Remove
            } else {
                Rewrite::Keep
            }
        });
        a.text()
    });

    Ok(Some(Article {
        text,
        abstract_text,
        citations,
    }))
}
