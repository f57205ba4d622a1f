// # Read-Ahead Pipeline for Parity Scrubbing
//
// A fixed-depth ring of stripe slots, one OS thread per data/parity disk,
// and the producer/consumer coordination needed to keep every disk busy
// while presenting stripes to the caller in strict block-position order.
//
// ## Architecture
//
// ```text
// ┌──────────────────────────────────────────────────────────┐
// │                        Pipeline<T>                       │
// ├──────────────────────────────────────────────────────────┤
// │  Shared<T>: Mutex<State<T>> + Condvar read_done/read_sched│
// │    reader_index, block_next, ready_list, worker_slot[]    │
// │    tasks[worker][slot]                                    │
// ├──────────────────────────────────────────────────────────┤
// │  BufferPool: depth slots x (data + workspace + parity)    │
// │              block-sized buffers, allocated once          │
// ├──────────────────────────────────────────────────────────┤
// │  WorkerHandle x reader_max: one OS thread per disk handle │
// │     data workers  [0, data_count)                         │
// │     parity workers[data_count, reader_max)                │
// └──────────────────────────────────────────────────────────┘
// ```
//
// The caller drives `start` → repeated `read_next`/`data_read`/`parity_read`
// → `stop`. Workers never talk to the caller directly; all coordination is
// through the one mutex in `Shared`.

mod buffer_pool;
mod ready_list;
mod scheduler;
mod task;
mod worker;

pub use buffer_pool::BufferPool;
pub use scheduler::Pipeline;
pub use task::{BlockPosition, DiskId, Task, TaskState, WorkerKind};
pub use worker::{ReaderCallback, ReaderOutcome, WorkerInfo};
