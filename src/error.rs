use thiserror::Error;

/// Errors the pipeline itself can raise.
///
/// Everything that happens *inside* a reader callback (bad sector, short
/// read, a file that disappeared mid-scrub) is the callback's own business:
/// it is recorded in the task's opaque result payload and handed back to the
/// caller through `data_read`/`parity_read`, never turned into one of these.
/// This enum only covers failures the pipeline's own setup and teardown can
/// produce.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("buffer pool allocation failed: {0}")]
    BufferAlloc(String),

    #[error("failed to spawn reader worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("reader worker thread panicked during shutdown join")]
    ShutdownJoin,

    #[error("buffer self-test failed at slot {slot}, buffer {buffer}: expected {expected:#x}, found {found:#x}")]
    SelfTestFailed {
        slot: usize,
        buffer: usize,
        expected: u8,
        found: u8,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
