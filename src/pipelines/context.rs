//! Shared, read-only state of a pipeline run.
use log::info;

use crate::cancel::CancelToken;
use crate::config::{Config, Layout};
use crate::convert::Converter;
use crate::error::Error;
use crate::identifiers::IdentifierSet;
use crate::io::Registry;
use crate::storage::{DirMirror, Mirror, S3Client};

/// Everything workers need, built once before dispatching and shared by reference.
pub struct Context {
    pub layout: Layout,
    pub identifiers: IdentifierSet,
    pub converter: Converter,
    /// Keys of fully processed archives.
    pub completed: Registry,
    pub s3: Option<S3Client>,
    pub mirror: Option<Box<dyn Mirror>>,
    pub cancel: CancelToken,
    /// Keep extracted sources once an archive is processed.
    pub keep_sources: bool,
}

impl Context {
    /// Local-only context: no bucket, no mirror.
    pub fn new(
        config: &Config,
        layout: Layout,
        identifiers: IdentifierSet,
        cancel: CancelToken,
    ) -> Result<Self, Error> {
        layout.create_dirs()?;
        let converter = Converter::new(&config.convert, &layout, cancel.clone())?;
        let completed = Registry::open(&layout.completed_archives())?;
        info!(
            "{} accepted identifiers, {} completed archives",
            identifiers.len(),
            completed.len()
        );

        Ok(Self {
            layout,
            identifiers,
            converter,
            completed,
            s3: None,
            mirror: None,
            cancel,
            keep_sources: false,
        })
    }

    /// Full context: bucket client and, when configured, the directory mirror.
    pub fn from_config(
        config: &Config,
        layout: Layout,
        identifiers: IdentifierSet,
        cancel: CancelToken,
    ) -> Result<Self, Error> {
        let s3 = S3Client::new(&config.s3.clone().with_env_credentials(), cancel.clone())?;
        let mut context = Self::new(config, layout, identifiers, cancel)?.with_s3(s3);
        if let Some(path) = &config.mirror.path {
            let mirror = DirMirror::open(&context.layout.resolve(path))?;
            context = context.with_mirror(Box::new(mirror));
        }
        Ok(context)
    }

    pub fn with_s3(mut self, s3: S3Client) -> Self {
        self.s3 = Some(s3);
        self
    }

    pub fn with_mirror(mut self, mirror: Box<dyn Mirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn keep_sources(mut self, keep_sources: bool) -> Self {
        self.keep_sources = keep_sources;
        self
    }
}
