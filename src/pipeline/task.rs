use std::fmt;

/// Index of a stripe in the array's logical block space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPosition(pub u64);

impl fmt::Display for BlockPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a data disk. Never constructed or interpreted by
/// the pipeline; it is whatever the embedder's handle table uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiskId(pub usize);

/// A task's lifecycle within one slot.
///
/// `Done` is never stored explicitly: a worker signals completion by
/// advancing its own `slot_index` (see `scheduler`), and the caller infers
/// "done" from that counter rather than from a field on the task itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Past the end of the scheduled range; the worker does nothing.
    Empty,
    /// Must be read by the worker.
    Ready,
}

/// Which side of the array a worker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Data,
    Parity,
}

/// One block read, belonging to one (slot, worker) pair.
///
/// `buffer` is a non-owning `(slot, buffer_index)` address into the pool
/// rather than a raw pointer: the reader callback resolves it through
/// `BufferPool::buffer_mut` for the duration of its call.
#[derive(Debug, Clone)]
pub struct Task<T> {
    pub state: TaskState,
    pub position: BlockPosition,
    pub slot: usize,
    pub buffer_index: usize,
    /// `Some` for data tasks, `None` for parity tasks: parity workers have
    /// no corresponding data-disk identity to report, and this expansion
    /// doesn't invent one (see DESIGN.md's open-question notes).
    pub disk: Option<DiskId>,
    /// Opaque result, filled in by the reader callback. The pipeline
    /// stores it and hands it back to the caller; it never inspects it.
    pub result: T,
}

impl<T> Task<T> {
    pub(crate) fn new(slot: usize, buffer_index: usize, disk: Option<DiskId>, result: T) -> Self {
        Self {
            state: TaskState::Empty,
            position: BlockPosition(0),
            slot,
            buffer_index,
            disk,
            result,
        }
    }
}
