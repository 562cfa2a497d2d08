use std::io::Write;
use std::path::{Path, PathBuf};

use arxiv_corpus::cancel::CancelToken;
use arxiv_corpus::config::{Config, Layout};
use arxiv_corpus::extract::Extractor;
use arxiv_corpus::identifiers::IdentifierSet;
use arxiv_corpus::pipelines::{Context, ExtractPipeline, Pipeline};
use arxiv_corpus::preprint;
use flate2::write::GzEncoder;
use flate2::Compression;

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut e = GzEncoder::new(Vec::new(), Compression::default());
    e.write_all(data).unwrap();
    e.finish().unwrap()
}

fn tarball(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap()
}

/// A bulk archive holding every member shape.
fn write_archive(dir: &Path) -> PathBuf {
    let nested = gzip(&tarball(&[
        ("ms.tex", b"\\documentclass{aa}\n\\input{sections/intro}".to_vec()),
        ("sections/intro.tex", b"\\section{Introduction}".to_vec()),
        ("fig1.eps", b"%!PS".to_vec()),
    ]));
    let bare = gzip(b"\\documentclass{article}\n\\begin{document}\\end{document}");
    let archive = tarball(&[
        ("1009/1009.0001.gz", nested),
        ("1009/1009.0002.gz", bare.clone()),
        ("1009/1009.0003.gz", bare),
        ("1009/1009.0004.pdf", b"%PDF-1.4".to_vec()),
        ("1009/1009.0005.gz", b"definitely not gzip".to_vec()),
    ]);
    let path = dir.join("arXiv_src_1009_001.tar");
    std::fs::write(&path, archive).unwrap();
    path
}

fn accepted() -> IdentifierSet {
    vec!["1009.0001", "1009.0002", "1009.0004", "1009.0005"]
        .into_iter()
        .collect()
}

#[test_log::test]
fn extract_member_shapes() {
    let root = tempfile::tempdir().unwrap();
    let layout = Layout::new(root.path());
    let archive = write_archive(root.path());
    let ids = accepted();

    let summary = Extractor::new(&layout, &ids).extract(&archive).unwrap();
    assert_eq!(summary.accepted, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.pdf_only, 1);
    assert_eq!(summary.already_converted, 0);

    let dir = layout.archive_dir("arXiv_src_1009_001");
    assert!(dir.join("1009.0001/ms.tex").is_file());
    assert!(dir.join("1009.0001/sections/intro.tex").is_file());
    assert!(dir.join("1009.0002/1009.0002.tex").is_file());
    assert!(!dir.join("1009.0003").exists());
    assert!(!dir.join("1009.0005").exists());

    let manifest = std::fs::read_to_string(layout.archive_manifest("arXiv_src_1009_001")).unwrap();
    let lines: Vec<&str> = manifest.lines().collect();
    assert_eq!(lines[0], "TARFILE: arXiv_src_1009_001.tar");
    assert!(lines.contains(&"1009.0001"));
    assert!(lines.contains(&"1009.0002"));
    assert!(!lines.contains(&"1009.0003"));

    let pdfs = std::fs::read_to_string(layout.pdf_submissions()).unwrap();
    assert_eq!(pdfs.trim(), "1009.0004");

    let scan = preprint::scan(&dir).unwrap();
    assert_eq!(scan.submissions, 2);
    assert_eq!(scan.tex_files, 3);
    let selected: Vec<(&str, &str)> = scan
        .preprints
        .iter()
        .map(|p| {
            (
                p.submission_id.as_str(),
                p.path.file_name().unwrap().to_str().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        selected,
        vec![("1009.0001", "ms.tex"), ("1009.0002", "1009.0002.tex")]
    );
}

#[test_log::test]
fn converted_submissions_are_not_extracted() {
    let root = tempfile::tempdir().unwrap();
    let layout = Layout::new(root.path());
    let archive = write_archive(root.path());
    std::fs::create_dir_all(layout.xml_dir()).unwrap();
    std::fs::write(layout.xml_path("1009.0001"), "<document/>").unwrap();

    let ids = accepted();
    let summary = Extractor::new(&layout, &ids).extract(&archive).unwrap();
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.already_converted, 1);
    assert!(!layout.archive_dir("arXiv_src_1009_001").join("1009.0001").exists());
}

#[test_log::test]
fn reextraction_logs_pdf_submissions_once() {
    let root = tempfile::tempdir().unwrap();
    let layout = Layout::new(root.path());
    let archive = write_archive(root.path());
    let ids = accepted();

    for _ in 0..2 {
        let summary = Extractor::new(&layout, &ids).extract(&archive).unwrap();
        assert_eq!(summary.pdf_only, 1);
    }
    let pdfs = std::fs::read_to_string(layout.pdf_submissions()).unwrap();
    assert_eq!(pdfs.lines().collect::<Vec<_>>(), vec!["1009.0004"]);
}

#[test_log::test]
fn extract_pipeline() {
    let root = tempfile::tempdir().unwrap();
    let archives = tempfile::tempdir().unwrap();
    let archive = write_archive(archives.path());
    let bogus = archives.path().join("arXiv_src_1009_002.tar");
    std::fs::write(&bogus, "not a tarball").unwrap();

    let context = Context::new(
        &Config::default(),
        Layout::new(root.path()),
        accepted(),
        CancelToken::new(),
    )
    .unwrap();
    let summary = ExtractPipeline::new(&context, vec![archive, bogus], Some(2))
        .run()
        .unwrap();
    assert_eq!(summary.accepted, 2);
    assert_eq!(summary.pdf_only, 1);
    assert!(!context.layout.archive_dir("arXiv_src_1009_002").exists());
}
