/*! Preprint selection

A submission usually ships several `.tex` files (main document, included chapters,
style files...). The preprint is the one that can be compiled on its own.

Selection order:
1. the only `.tex` file of the submission,
2. a file named `ms.tex`,
3. a file named `main.tex`,
4. the first file (in listing order) declaring `\documentclass` or `\documentstyle`.

Submissions without any of those have no preprint and are reported as corrupt.
!*/
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::bytes::Regex;

use crate::error::Error;

const PREFERRED_NAMES: [&str; 2] = ["ms.tex", "main.tex"];

lazy_static! {
    static ref DOCUMENT_CLASS: Regex =
        Regex::new(r"^\s*\\document(?:class|style)(?:[^A-Za-z]|$)").unwrap();
    static ref VERBATIM_BEGIN: Regex =
        Regex::new(r"^\s*\\begin\{(verbatim|comment)\*?\}").unwrap();
    static ref VERBATIM_END: Regex = Regex::new(r"\\end\{(verbatim|comment)\*?\}").unwrap();
}

/// Pick the main document among `tex_files`, the `.tex` files of the submission at `submission_dir`.
///
/// Only reads file contents.
pub fn select_preprint(submission_dir: &Path, tex_files: &[PathBuf]) -> Option<PathBuf> {
    if tex_files.len() == 1 {
        return Some(tex_files[0].clone());
    }

    for name in PREFERRED_NAMES {
        if let Some(found) = tex_files
            .iter()
            .find(|p| p.file_name().map(|f| f == name).unwrap_or(false))
        {
            return Some(found.clone());
        }
    }

    for tex in tex_files {
        match read(tex) {
            Ok(content) if has_document_class(&content) => return Some(tex.clone()),
            Ok(_) => (),
            Err(e) => warn!("{:?}: could not read {:?}: {}", submission_dir, tex, e),
        }
    }

    None
}

fn read(path: &Path) -> Result<Vec<u8>, std::io::Error> {
    let mut content = Vec::new();
    File::open(path)?.read_to_end(&mut content)?;
    Ok(content)
}

/// Check for a `\documentclass`/`\documentstyle` control sequence at the start of a line.
///
/// Commented out lines (`%`) and lines inside `verbatim`/`comment` environments are ignored.
pub fn has_document_class(content: &[u8]) -> bool {
    let mut in_verbatim = false;
    for line in content.split(|b| *b == b'\n') {
        if in_verbatim {
            if VERBATIM_END.is_match(line) {
                in_verbatim = false;
            }
            continue;
        }
        if VERBATIM_BEGIN.is_match(line) {
            in_verbatim = !VERBATIM_END.is_match(line);
            continue;
        }
        if DOCUMENT_CLASS.is_match(line) {
            return true;
        }
    }
    false
}

/// A selected main document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprint {
    pub submission_id: String,
    pub path: PathBuf,
}

/// Preprints of an extraction directory, along with what couldn't be selected.
#[derive(Debug, Default)]
pub struct PreprintScan {
    pub preprints: Vec<Preprint>,
    /// Submissions without any `.tex` file.
    pub empty: Vec<String>,
    /// Submissions with `.tex` files but no main document.
    pub corrupt: Vec<String>,
    pub submissions: usize,
    pub tex_files: usize,
}

/// `.tex` files under `dir`, recursively, in listing order.
pub fn tex_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let dir = dir
        .to_str()
        .ok_or_else(|| Error::Custom(format!("invalid path: {:?}", dir)))?;
    let pattern = format!("{}/**/*.tex", glob::Pattern::escape(dir));
    let mut files = Vec::new();
    for path in glob::glob(&pattern)? {
        let path = path?;
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Scan the submission directories of an extraction directory (`latex/<archive-id>`)
/// and select a preprint for each of them.
pub fn scan(archive_dir: &Path) -> Result<PreprintScan, Error> {
    let mut submission_dirs: Vec<PathBuf> = std::fs::read_dir(archive_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            // skip leftover scratch directories
            path.file_name()
                .map(|f| !f.to_string_lossy().starts_with('.'))
                .unwrap_or(false)
        })
        .collect();
    submission_dirs.sort();

    let mut scan = PreprintScan {
        submissions: submission_dirs.len(),
        ..Default::default()
    };

    for dir in submission_dirs {
        let submission_id = match dir.file_name().and_then(|f| f.to_str()) {
            Some(id) => id.to_string(),
            None => continue,
        };

        let texs = tex_files(&dir)?;
        scan.tex_files += texs.len();

        if texs.is_empty() {
            debug!("{}: no tex file", submission_id);
            scan.empty.push(submission_id);
            continue;
        }

        match select_preprint(&dir, &texs) {
            Some(path) => scan.preprints.push(Preprint {
                submission_id,
                path,
            }),
            None => {
                debug!("{}: no main document", submission_id);
                scan.corrupt.push(submission_id);
            }
        }
    }

    info!(
        "{:?}: {} tex files, {} submissions, {} preprints, {} empty, {} potentially corrupt",
        archive_dir,
        scan.tex_files,
        scan.submissions,
        scan.preprints.len(),
        scan.empty.len(),
        scan.corrupt.len()
    );

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(files: &[(&str, &str)]) -> (tempfile::TempDir, Vec<PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (name, content) in files {
            let path = dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            paths.push(path);
        }
        (dir, paths)
    }

    fn selected_name(files: &[(&str, &str)]) -> Option<String> {
        let (dir, paths) = submission(files);
        select_preprint(dir.path(), &paths)
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
    }

    #[test]
    fn single_file() {
        assert_eq!(
            selected_name(&[("only.tex", "no class here")]),
            Some("only.tex".to_string())
        );
    }

    #[test]
    fn ms_over_others() {
        assert_eq!(
            selected_name(&[("a.tex", "\\documentclass{article}"), ("ms.tex", "")]),
            Some("ms.tex".to_string())
        );
    }

    #[test]
    fn main_over_others() {
        assert_eq!(
            selected_name(&[("a.tex", "\\documentclass{article}"), ("main.tex", "")]),
            Some("main.tex".to_string())
        );
    }

    #[test]
    fn ms_over_main() {
        assert_eq!(
            selected_name(&[("main.tex", ""), ("ms.tex", "")]),
            Some("ms.tex".to_string())
        );
    }

    #[test]
    fn document_class() {
        assert_eq!(
            selected_name(&[
                ("a.tex", "\\section{Intro}"),
                ("b.tex", "% header\n\\documentclass[12pt]{aastex}\n")
            ]),
            Some("b.tex".to_string())
        );
        assert_eq!(
            selected_name(&[("a.tex", "\\input{b}"), ("b.tex", "\\documentstyle{aa}")]),
            Some("b.tex".to_string())
        );
    }

    #[test]
    fn none_qualifies() {
        assert_eq!(
            selected_name(&[("a.tex", "\\section{A}"), ("b.tex", "\\section{B}")]),
            None
        );
        assert_eq!(selected_name(&[]), None);
    }

    #[test]
    fn document_class_detection() {
        assert!(has_document_class(b"\\documentclass{article}"));
        assert!(has_document_class(b"  \\documentclass[a4paper]{article}"));
        assert!(has_document_class(b"\\documentstyle[12pt]{article}"));
        assert!(has_document_class(b"\\documentclass"));

        // commented out
        assert!(!has_document_class(b"%\\documentclass{article}"));
        assert!(!has_document_class(b"  % \\documentclass{article}"));
        // not at the start of a line
        assert!(!has_document_class(b"see \\documentclass{article}"));
        // other control sequence
        assert!(!has_document_class(b"\\documentclassfoo{x}"));
        // inside verbatim
        assert!(!has_document_class(
            b"\\begin{verbatim}\n\\documentclass{article}\n\\end{verbatim}\n"
        ));
        assert!(has_document_class(
            b"\\begin{verbatim}\nx\n\\end{verbatim}\n\\documentclass{article}\n"
        ));
    }

    #[test]
    fn scan_archive_dir() {
        let archive = tempfile::tempdir().unwrap();
        let good = archive.path().join("1009.0001");
        let nested = archive.path().join("1009.0002").join("src");
        let empty = archive.path().join("1009.0003");
        let corrupt = archive.path().join("1009.0004");
        let scratch = archive.path().join(".scratch1234");
        for dir in [&good, &nested, &empty, &corrupt, &scratch] {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(good.join("paper.tex"), "\\documentclass{article}").unwrap();
        std::fs::write(nested.join("main.tex"), "").unwrap();
        std::fs::write(nested.join("fig.tex"), "").unwrap();
        std::fs::write(corrupt.join("a.tex"), "a").unwrap();
        std::fs::write(corrupt.join("b.tex"), "b").unwrap();
        std::fs::write(scratch.join("x.tex"), "\\documentclass{article}").unwrap();

        let scan = scan(archive.path()).unwrap();
        assert_eq!(scan.submissions, 4);
        assert_eq!(scan.tex_files, 5);
        assert_eq!(scan.empty, vec!["1009.0003".to_string()]);
        assert_eq!(scan.corrupt, vec!["1009.0004".to_string()]);
        assert_eq!(
            scan.preprints,
            vec![
                Preprint {
                    submission_id: "1009.0001".to_string(),
                    path: good.join("paper.tex"),
                },
                Preprint {
                    submission_id: "1009.0002".to_string(),
                    path: nested.join("main.tex"),
                },
            ]
        );
    }
}
