/*! Configuration and on-disk layout.

Configuration is read from an optional TOML file where every field may be omitted,
command line flags then override what the file says.

```toml
[s3]
bucket = "arxiv"
region = "us-east-1"
prefix = "src/"
access_key = "..."
secret_key = "..."

[convert]
program = "latexmlc"
args = ["--timeout=240"]
timeout_secs = 300

[mirror]
path = "/mnt/drive/arxiv"
```
!*/
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_CONFIG_FILE: &str = "arxiv-corpus.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub convert: ConvertConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub prefix: String,
    pub extension: String,
    /// Overrides `https://<bucket>.s3.amazonaws.com`.
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "arxiv".to_string(),
            region: "us-east-1".to_string(),
            prefix: "src/".to_string(),
            extension: ".tar".to_string(),
            endpoint: None,
            access_key: None,
            secret_key: None,
        }
    }
}

impl S3Config {
    /// Fill missing credentials from `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`.
    pub fn with_env_credentials(mut self) -> Self {
        if self.access_key.is_none() {
            self.access_key = std::env::var("AWS_ACCESS_KEY_ID").ok();
        }
        if self.secret_key.is_none() {
            self.secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub endpoint: String,
    pub set: String,
    /// Metadata table, relative to the layout root when not absolute.
    pub path: PathBuf,
    pub page_delay_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://export.arxiv.org/oai2".to_string(),
            set: "physics:astro-ph".to_string(),
            path: PathBuf::from("arxiv_metadata_astroph.csv"),
            page_delay_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            program: "latexmlc".to_string(),
            args: vec!["--timeout=240".to_string()],
            timeout_secs: 300,
        }
    }
}

impl ConvertConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from `path`.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        debug!("loaded config from {:?}", path);
        Ok(config)
    }

    /// Load the provided file, or [DEFAULT_CONFIG_FILE] if present, or the defaults.
    ///
    /// An explicitly provided file that can't be read is an error,
    /// a missing default file is not.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(p) => Self::from_path(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_path(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Filesystem layout of the pipeline state.
///
/// ```text
/// <root>/src/<archive>.tar                downloaded archives
/// <root>/latex/<archive-id>/<id>/...      extracted sources
/// <root>/latex/<archive-id>.txt           archive manifest
/// <root>/xml/<id>.xml                     converted output
/// <root>/logs/<id>.txt                    conversion stderr, also a skip marker
/// <root>/logs/failed_conversions.txt      timeout registry
/// <root>/logs/pdf_submissions.txt         PDF-only submissions
/// <root>/logs/completed_archives.txt      fully processed archive keys
/// <root>/corpus/<id>.txt                  per-document tokens
/// <root>/corpus.txt                       flat corpus
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn latex_dir(&self) -> PathBuf {
        self.root.join("latex")
    }

    pub fn xml_dir(&self) -> PathBuf {
        self.root.join("xml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn corpus_dir(&self) -> PathBuf {
        self.root.join("corpus")
    }

    pub fn flat_corpus(&self) -> PathBuf {
        self.root.join("corpus.txt")
    }

    pub fn abstracts_corpus(&self) -> PathBuf {
        self.root.join("abstracts.txt")
    }

    /// Resolve a possibly relative path against the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn archive_dir(&self, archive_id: &str) -> PathBuf {
        self.latex_dir().join(archive_id)
    }

    pub fn archive_manifest(&self, archive_id: &str) -> PathBuf {
        self.latex_dir().join(format!("{}.txt", archive_id))
    }

    pub fn xml_path(&self, submission_id: &str) -> PathBuf {
        self.xml_dir().join(format!("{}.xml", submission_id))
    }

    pub fn conversion_log(&self, submission_id: &str) -> PathBuf {
        self.logs_dir().join(format!("{}.txt", submission_id))
    }

    pub fn failed_conversions(&self) -> PathBuf {
        self.logs_dir().join("failed_conversions.txt")
    }

    pub fn pdf_submissions(&self) -> PathBuf {
        self.logs_dir().join("pdf_submissions.txt")
    }

    pub fn completed_archives(&self) -> PathBuf {
        self.logs_dir().join("completed_archives.txt")
    }

    pub fn corpus_path(&self, submission_id: &str) -> PathBuf {
        self.corpus_dir().join(format!("{}.txt", submission_id))
    }

    /// Create every directory of the layout that does not exist yet.
    pub fn create_dirs(&self) -> Result<(), Error> {
        for dir in [
            self.downloads_dir(),
            self.latex_dir(),
            self.xml_dir(),
            self.logs_dir(),
            self.corpus_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config() {
        let config: Config = toml::from_str(
            r#"
            [s3]
            bucket = "mybucket"

            [convert]
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.s3.bucket, "mybucket");
        assert_eq!(config.s3.prefix, "src/");
        assert_eq!(config.convert.program, "latexmlc");
        assert_eq!(config.convert.timeout(), Duration::from_secs(10));
        assert!(config.mirror.path.is_none());
    }

    #[test]
    fn empty_config_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.s3.bucket, "arxiv");
        assert_eq!(config.metadata.set, "physics:astro-ph");
        assert_eq!(config.paths.root, PathBuf::from("."));
    }

    #[test]
    #[serial_test::serial]
    fn env_credentials() {
        std::env::set_var("AWS_ACCESS_KEY_ID", "env-key");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "env-secret");

        let config = S3Config {
            access_key: Some("file-key".to_string()),
            ..Default::default()
        }
        .with_env_credentials();
        assert_eq!(config.access_key.as_deref(), Some("file-key"));
        assert_eq!(config.secret_key.as_deref(), Some("env-secret"));

        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");
    }

    #[test]
    fn layout_paths() {
        let layout = Layout::new("/data");
        assert_eq!(
            layout.xml_path("1009.1724"),
            PathBuf::from("/data/xml/1009.1724.xml")
        );
        assert_eq!(
            layout.conversion_log("astro-ph0001001"),
            PathBuf::from("/data/logs/astro-ph0001001.txt")
        );
        assert_eq!(
            layout.archive_dir("arXiv_src_1009_002"),
            PathBuf::from("/data/latex/arXiv_src_1009_002")
        );
        assert_eq!(
            layout.resolve(Path::new("meta.csv")),
            PathBuf::from("/data/meta.csv")
        );
        assert_eq!(layout.resolve(Path::new("/m.csv")), PathBuf::from("/m.csv"));
    }
}
