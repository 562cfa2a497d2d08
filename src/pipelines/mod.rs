//! Pipelines.
//!
//! Each subcommand of the binary is backed by a pipeline implementing the light [pipeline::Pipeline] trait.
//! Pipelines that touch sources share a [context::Context], built once before dispatching work on a
//! bounded [rayon] pool.
pub mod archives;
pub mod context;
pub mod convert;
pub mod corpus;
pub mod extract;
#[allow(clippy::module_inception)]
pub mod pipeline;

pub use archives::{ArchiveOutcome, ArchivePipeline, ArchiveStats};
pub use context::Context;
pub use convert::ConvertPipeline;
pub use corpus::CorpusPipeline;
pub use extract::ExtractPipeline;
pub use pipeline::Pipeline;
