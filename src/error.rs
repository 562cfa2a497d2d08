//! Error enum
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Http(reqwest::Error),
    /// Non-success HTTP answer that is not handled by a retry policy.
    Status {
        status: u16,
        url: String,
    },
    Csv(csv::Error),
    Xml(quick_xml::Error),
    Toml(toml::de::Error),
    Serde(serde_json::Error),
    Glob(glob::GlobError),
    GlobPattern(glob::PatternError),
    ThreadPool(rayon::ThreadPoolBuildError),
    /// The file fails the tar header check.
    NotAnArchive(PathBuf),
    /// The object store answered 404 for the key.
    MissingInBucket(String),
    /// Operator interrupt, raised after in-flight artifacts are cleaned up.
    Interrupted,
    Config(String),
    Custom(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::Http(e) => write!(f, "http error: {}", e),
            Error::Status { status, url } => write!(f, "HTTP {} for {}", status, url),
            Error::Csv(e) => write!(f, "csv error: {}", e),
            Error::Xml(e) => write!(f, "xml error: {}", e),
            Error::Toml(e) => write!(f, "config error: {}", e),
            Error::Serde(e) => write!(f, "json error: {}", e),
            Error::Glob(e) => write!(f, "glob error: {}", e),
            Error::GlobPattern(e) => write!(f, "glob pattern error: {}", e),
            Error::ThreadPool(e) => write!(f, "thread pool error: {}", e),
            Error::NotAnArchive(p) => write!(f, "{:?} is not a tar archive", p),
            Error::MissingInBucket(key) => write!(f, "{} does not exist in bucket", key),
            Error::Interrupted => write!(f, "interrupted"),
            Error::Config(s) => write!(f, "configuration error: {}", s),
            Error::Custom(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Error {
        Error::Http(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Error {
        Error::Csv(e)
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Error {
        Error::Xml(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Error {
        Error::Toml(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Serde(e)
    }
}

impl From<glob::GlobError> for Error {
    fn from(e: glob::GlobError) -> Error {
        Error::Glob(e)
    }
}

impl From<glob::PatternError> for Error {
    fn from(e: glob::PatternError) -> Error {
        Error::GlobPattern(e)
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Error {
        Error::ThreadPool(e)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}
