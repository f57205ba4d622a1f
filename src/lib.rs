// Parallel read-ahead staging core for a disk-array parity scrubber.
//
// Higher layers (scrub, sync, check, fix — none of which live in this
// crate) need every data-disk and parity-disk buffer for a given stripe
// delivered together, while each disk reads fully in parallel. This crate
// is only the read-ahead pipeline that makes that possible: a fixed-depth
// ring of stripe slots, one reader thread per disk, and the scheduling
// state that keeps every disk busy without letting any of them race ahead
// of the slowest.

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{
    BlockPosition, DiskId, Pipeline, ReaderCallback, ReaderOutcome, Task, TaskState, WorkerInfo, WorkerKind,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
