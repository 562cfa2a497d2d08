//! Pipeline trait.
use crate::error::Error;

/// Implemented by each pipeline, generic over the return type
/// so that pipelines can report their counters.
pub trait Pipeline<T> {
    fn run(&self) -> Result<T, Error>;
}

/// Build the bounded worker pool of a pipeline: `workers` threads, or one per available processor.
pub fn thread_pool(workers: Option<usize>) -> Result<rayon::ThreadPool, Error> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = workers {
        builder = builder.num_threads(workers);
    }
    Ok(builder.build()?)
}
