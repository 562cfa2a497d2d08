//! Archive member shapes.
use std::io::{Cursor, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::debug;

use crate::error::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BLOCK_SIZE: usize = 512;
const CHECKSUM_FIELD: std::ops::Range<usize> = 148..156;

/// Content of a submission bundle, resolved by trial parsing.
///
/// arXiv bundles are usually gzipped tarballs, but single-file submissions are
/// stored as a bare gzipped `.tex` without any extension.
#[derive(Debug)]
pub enum Member {
    /// Decompressed tar stream.
    NestedTar(Vec<u8>),
    /// Decompressed single source file.
    BareGzip(Vec<u8>),
    /// Neither a gzip stream nor a tar stream.
    Unreadable(String),
}

impl Member {
    /// Classify the raw bytes of an archive member.
    pub fn classify(raw: &[u8]) -> Self {
        if raw.starts_with(&GZIP_MAGIC) {
            let mut data = Vec::new();
            if let Err(e) = MultiGzDecoder::new(raw).read_to_end(&mut data) {
                return Member::Unreadable(format!("invalid gzip stream: {}", e));
            }

            if is_tar_header(&data) {
                Member::NestedTar(data)
            } else {
                Member::BareGzip(data)
            }
        } else if is_tar_header(raw) {
            Member::NestedTar(raw.to_vec())
        } else {
            Member::Unreadable("neither a gzip nor a tar stream".to_string())
        }
    }

    /// Write the member content into `dst` (which must exist), naming a single
    /// source file `<submission_id>.tex`.
    ///
    /// Returns the number of files written.
    pub fn unpack(&self, submission_id: &str, dst: &Path) -> Result<usize, Error> {
        match self {
            Member::NestedTar(data) => unpack_tar(data, dst),
            Member::BareGzip(data) => {
                let path = dst.join(format!("{}.tex", submission_id));
                std::fs::write(path, data)?;
                Ok(1)
            }
            Member::Unreadable(reason) => Err(Error::Custom(reason.clone())),
        }
    }
}

/// Unpack every entry of a tar stream inside `dst`.
/// Entries pointing outside of `dst` are skipped by [tar::Entry::unpack_in].
fn unpack_tar(data: &[u8], dst: &Path) -> Result<usize, Error> {
    let mut archive = tar::Archive::new(Cursor::new(data));
    let mut files = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let is_file = entry.header().entry_type().is_file();
        if entry.unpack_in(dst)? {
            if is_file {
                files += 1;
            }
        } else {
            debug!("skipped entry {:?}: outside of destination", entry.path());
        }
    }
    Ok(files)
}

/// Check that `data` starts with a tar header block whose checksum is valid.
pub fn is_tar_header(data: &[u8]) -> bool {
    if data.len() < BLOCK_SIZE {
        return false;
    }
    let block = &data[..BLOCK_SIZE];
    if block.iter().all(|b| *b == 0) {
        return false;
    }

    let stored = match parse_octal(&block[CHECKSUM_FIELD]) {
        Some(v) => v,
        None => return false,
    };

    // checksum is computed with the checksum field filled with spaces
    let computed: u32 = block
        .iter()
        .enumerate()
        .map(|(idx, b)| {
            if CHECKSUM_FIELD.contains(&idx) {
                u32::from(b' ')
            } else {
                u32::from(*b)
            }
        })
        .sum();

    stored == computed
}

fn parse_octal(field: &[u8]) -> Option<u32> {
    let digits: Vec<u8> = field
        .iter()
        .skip_while(|b| **b == b' ')
        .take_while(|b| (b'0'..=b'7').contains(*b))
        .copied()
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits
        .iter()
        .try_fold(0u32, |acc, d| acc.checked_mul(8)?.checked_add(u32::from(d - b'0')))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn nested_tar() {
        let raw = gzip(&tarball(&[("ms.tex", "\\documentclass{article}")]));
        let member = Member::classify(&raw);
        assert!(matches!(member, Member::NestedTar(_)));

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(member.unpack("1009.1724", dir.path()).unwrap(), 1);
        assert!(dir.path().join("ms.tex").is_file());
    }

    #[test]
    fn bare_gzip() {
        let raw = gzip(b"\\documentclass{article}\n\\begin{document}hi\\end{document}");
        let member = Member::classify(&raw);
        assert!(matches!(member, Member::BareGzip(_)));

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(member.unpack("1009.1724", dir.path()).unwrap(), 1);
        let written = std::fs::read_to_string(dir.path().join("1009.1724.tex")).unwrap();
        assert!(written.starts_with("\\documentclass"));
    }

    #[test]
    fn unreadable() {
        // valid gzip header followed by a deflate block of reserved type
        let raw = [
            0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff,
        ];
        assert!(matches!(Member::classify(&raw), Member::Unreadable(_)));
        assert!(matches!(
            Member::classify(b"plain text"),
            Member::Unreadable(_)
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(Member::classify(b"plain text")
            .unpack("x", dir.path())
            .is_err());
    }

    #[test]
    fn tar_header_check() {
        let tar = tarball(&[("a.tex", "a")]);
        assert!(is_tar_header(&tar));

        let mut corrupted = tar.clone();
        corrupted[0] ^= 0xff;
        assert!(!is_tar_header(&corrupted));

        assert!(!is_tar_header(&[0u8; 1024]));
        assert!(!is_tar_header(b"short"));
    }
}
