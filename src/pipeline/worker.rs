use crate::pipeline::task::{DiskId, Task, WorkerKind};
use std::thread::JoinHandle;

/// Static identity of one reader worker, handed to `ReaderCallback::read`
/// so the callback knows which disk (or parity) handle it owns without the
/// pipeline needing to understand handle tables itself.
#[derive(Debug, Clone, Copy)]
pub struct WorkerInfo {
    /// Global worker index: data workers occupy `[0, data_count)`, parity
    /// workers occupy `[data_count, reader_max)`.
    pub index: usize,
    pub kind: WorkerKind,
    /// Offset added to the worker's own index to find its buffer slot
    /// inside a slot's buffer vector (0 for data, `parity_count` for
    /// parity).
    pub buffer_skew: usize,
    pub disk: Option<DiskId>,
}

/// Callback the embedder supplies to actually perform one block read.
/// Both data and parity readers implement this trait; the pipeline treats
/// them identically apart from which worker-index range they're assigned.
///
/// `read` must fill `buffer` and `task`'s opaque `result` payload, and must
/// not touch `task.state`, `task.position`, `task.slot`, or
/// `task.buffer_index` — those are the pipeline's own bookkeeping.
pub trait ReaderCallback<T>: Send + Sync {
    fn read(&self, worker: &WorkerInfo, task: &mut Task<T>, buffer: &mut [u8]);
}

/// Narrow hook into an otherwise-opaque result payload: lets the pipeline
/// surface a read-level problem to operators (via a log event) without
/// having to understand what the payload actually contains.
///
/// The pipeline never acts on `is_error` beyond logging it; retry,
/// abort, or ignore decisions stay with whatever consumes `data_read`/
/// `parity_read`. Types with no error condition to report can just
/// `impl ReaderOutcome for Foo {}` and keep the default `false`.
pub trait ReaderOutcome {
    fn is_error(&self) -> bool {
        false
    }
}

impl<T, F> ReaderCallback<T> for F
where
    F: Fn(&WorkerInfo, &mut Task<T>, &mut [u8]) + Send + Sync,
{
    fn read(&self, worker: &WorkerInfo, task: &mut Task<T>, buffer: &mut [u8]) {
        self(worker, task, buffer)
    }
}

/// Owns the OS thread bound to one reader worker. The pipeline owns every
/// `WorkerHandle`; `stop` joins them all before releasing the buffer pool.
pub struct WorkerHandle {
    pub info: WorkerInfo,
    pub(crate) thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn new(info: WorkerInfo, thread: JoinHandle<()>) -> Self {
        Self {
            info,
            thread: Some(thread),
        }
    }
}
