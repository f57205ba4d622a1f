//! The mutex-protected state machine: slot scheduling, the two condition
//! variables, and the caller-facing `read_next`/`data_read`/`parity_read`
//! API. Everything that touches shared state funnels through one
//! `Mutex<State<T>>` — contention here is dominated by disk I/O, which runs
//! entirely outside the lock, not by the critical sections themselves.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::buffer_pool::BufferPool;
use crate::pipeline::ready_list::ReadyList;
use crate::pipeline::task::{BlockPosition, DiskId, Task, TaskState, WorkerKind};
use crate::pipeline::worker::{ReaderCallback, ReaderOutcome, WorkerHandle, WorkerInfo};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, instrument, warn};

struct State<T> {
    /// Slot currently being consumed by the caller (the ring's tail).
    reader_index: usize,
    block_start: u64,
    block_next: u64,
    block_max: u64,
    done: bool,
    ready_list: ReadyList,
    /// Last slot each worker has completed, monotonic modulo depth.
    worker_slot: Vec<usize>,
    /// `tasks[worker][slot]`.
    tasks: Vec<Vec<Task<T>>>,
    filter: Arc<dyn Fn(BlockPosition) -> bool + Send + Sync>,
}

struct Shared<T> {
    mutex: Mutex<State<T>>,
    read_done: Condvar,
    read_sched: Condvar,
}

/// The read-ahead pipeline: a fixed ring of `depth` stripe slots, one OS
/// thread per data/parity disk, and the scheduling state tying them
/// together.
pub struct Pipeline<T> {
    config: PipelineConfig,
    pool: Arc<BufferPool>,
    shared: Arc<Shared<T>>,
    data_reader: Arc<dyn ReaderCallback<T>>,
    parity_reader: Arc<dyn ReaderCallback<T>>,
    workers: Vec<WorkerHandle>,
}

impl<T> Pipeline<T>
where
    T: Default + Clone + Send + Sync + ReaderOutcome + 'static,
{
    /// Allocates the slot ring, the buffer pool, and the worker records
    /// (but does not yet spawn threads or accept a block range — that
    /// happens in `start`).
    pub fn init(
        config: PipelineConfig,
        data_reader: Arc<dyn ReaderCallback<T>>,
        parity_reader: Arc<dyn ReaderCallback<T>>,
    ) -> Result<Self> {
        config.validate()?;

        let pool = BufferPool::new(config.depth, config.buffers_per_slot(), config.block_size)?;
        if config.self_test {
            pool.self_test()?;
        }

        let reader_max = config.reader_max();
        let mut tasks = Vec::with_capacity(reader_max);
        for w in 0..reader_max {
            let info = worker_info(&config, w);
            let buffer_index = info.buffer_skew + info.index;
            let per_slot = (0..config.depth)
                .map(|slot| Task::new(slot, buffer_index, info.disk, T::default()))
                .collect();
            tasks.push(per_slot);
        }

        let state = State {
            reader_index: 0,
            block_start: 0,
            block_next: 0,
            block_max: 0,
            done: false,
            ready_list: ReadyList::new(reader_max),
            worker_slot: vec![0; reader_max],
            tasks,
            filter: Arc::new(|_| false),
        };

        Ok(Self {
            config,
            pool: Arc::new(pool),
            shared: Arc::new(Shared {
                mutex: Mutex::new(state),
                read_done: Condvar::new(),
                read_sched: Condvar::new(),
            }),
            data_reader,
            parity_reader,
            workers: Vec::new(),
        })
    }

    /// Begins read-ahead over `[block_start, block_max)`, filtered by
    /// `filter`. Spawns one thread per reader worker.
    #[instrument(skip(self, filter), fields(depth = self.config.depth, reader_max = self.config.reader_max()))]
    pub fn start(
        &mut self,
        block_start: u64,
        block_max: u64,
        filter: impl Fn(BlockPosition) -> bool + Send + Sync + 'static,
    ) -> Result<()> {
        let reader_max = self.config.reader_max();
        let depth = self.config.depth;

        {
            let mut state = self.shared.mutex.lock();
            state.block_start = block_start;
            state.block_max = block_max;
            state.block_next = block_start;
            state.done = false;
            state.filter = Arc::new(filter);
            state.reader_index = depth - 1;
            state.ready_list = ReadyList::new(reader_max);
            state.worker_slot = vec![0; reader_max];

            for slot in 0..depth - 1 {
                let blockcur = Self::position_next(&mut state);
                Self::schedule_slot(&mut state, slot, blockcur, reader_max);
            }
        }

        info!("starting pipeline over [{}, {})", block_start, block_max);

        for w in 0..reader_max {
            let info = worker_info(&self.config, w);
            let shared = Arc::clone(&self.shared);
            let pool = Arc::clone(&self.pool);
            let callback = match info.kind {
                WorkerKind::Data => Arc::clone(&self.data_reader),
                WorkerKind::Parity => Arc::clone(&self.parity_reader),
            };
            let thread = thread::Builder::new()
                .name(format!("reader-{}-{}", kind_label(info.kind), info.index))
                .spawn(move || worker_loop(shared, pool, info, callback, depth))?;
            self.workers.push(WorkerHandle::new(info, thread));
        }

        Ok(())
    }

    /// Advances the caller's view to the next stripe. Blocks only on lock
    /// contention, never on I/O: by the time a stripe is handed back here
    /// every worker has already finished it (§3 invariants).
    ///
    /// Returns the stripe's block position and the slot index its buffers
    /// live in; fetch individual buffers with `buffer`/`buffers`.
    #[instrument(skip(self))]
    pub fn read_next(&self) -> (BlockPosition, usize) {
        let reader_max = self.config.reader_max();
        let mut state = self.shared.mutex.lock();

        assert!(
            state.ready_list.is_drained(),
            "read_next called before all in-range completions of the current stripe were consumed"
        );

        let blockcur_schedule = Self::position_next(&mut state);

        let scheduled_slot = state.reader_index;
        Self::schedule_slot(&mut state, scheduled_slot, blockcur_schedule, reader_max);

        state.reader_index = (state.reader_index + 1) % self.config.depth;
        let slot = state.reader_index;
        let position = state.tasks[0][slot].position;
        state.ready_list.reset_full();

        debug!(position = position.0, slot, "stripe ready for consumption");

        drop(state);
        self.shared.read_sched.notify_all();

        (position, slot)
    }

    /// Blocks until some data-range worker has a completed task for the
    /// current stripe; returns it exactly once per worker per stripe,
    /// along with its `local_index` (worker index minus the data base).
    #[instrument(skip(self))]
    pub fn data_read(&self) -> (Task<T>, usize) {
        self.task_read(0, self.config.data_count)
    }

    /// Symmetric to `data_read`, for the parity worker range.
    #[instrument(skip(self))]
    pub fn parity_read(&self) -> (Task<T>, usize) {
        self.task_read(self.config.data_count, self.config.parity_count)
    }

    fn task_read(&self, base: usize, count: usize) -> (Task<T>, usize) {
        let mut state = self.shared.mutex.lock();
        loop {
            let reader_index = state.reader_index;
            let worker_slot = &state.worker_slot;
            let found = state
                .ready_list
                .take_ready(base, count, |i| worker_slot[i] != reader_index);

            if let Some(w) = found {
                let task = state.tasks[w][reader_index].clone();
                if task.result.is_error() {
                    warn!(worker = w, position = task.position.0, "reader callback reported an error result");
                }
                return (task, w - base);
            }

            self.shared.read_done.wait(&mut state);
        }
    }

    /// Shared (read-only) access to one buffer in the given slot. Sound to
    /// call for any slot `read_next` has already handed back, since every
    /// worker is guaranteed done with it by then.
    pub fn buffer(&self, slot: usize, buffer_index: usize) -> &[u8] {
        // Safety: `read_next` only returns a slot once every worker's
        // `worker_slot` has advanced past it, which happens-before this
        // call through the same mutex both sides synchronize on.
        unsafe { self.pool.buffer(slot, buffer_index) }
    }

    /// All buffers for one slot, in worker-index order.
    pub fn slot_buffers(&self, slot: usize) -> Vec<&[u8]> {
        (0..self.pool.buffers_per_slot())
            .map(|i| self.buffer(slot, i))
            .collect()
    }

    /// Signals shutdown and joins every reader worker thread. Idempotent:
    /// calling it again (or letting `Drop` call it) after an explicit
    /// `stop` is a no-op.
    #[instrument(skip(self))]
    pub fn stop(&mut self) -> Result<()> {
        {
            let mut state = self.shared.mutex.lock();
            state.done = true;
        }
        self.shared.read_sched.notify_all();

        for worker in &mut self.workers {
            if let Some(handle) = worker.thread.take() {
                handle.join().map_err(|_| PipelineError::ShutdownJoin)?;
            }
        }

        info!("pipeline stopped");
        Ok(())
    }

    /// Next block position to schedule, skipping positions the filter
    /// rejects.
    fn position_next(state: &mut MutexGuard<'_, State<T>>) -> u64 {
        while state.block_next < state.block_max && !(state.filter)(BlockPosition(state.block_next)) {
            state.block_next += 1;
        }
        let blockcur = state.block_next;
        state.block_next += 1;
        blockcur
    }

    /// Sets up the pending task for every worker at `slot`, for block
    /// position `blockcur`. A position past `block_max` yields `Empty`
    /// tasks (padding, never surfaced to the caller).
    fn schedule_slot(state: &mut MutexGuard<'_, State<T>>, slot: usize, blockcur: u64, reader_max: usize) {
        let ready = blockcur < state.block_max;
        for w in 0..reader_max {
            let task = &mut state.tasks[w][slot];
            task.state = if ready { TaskState::Ready } else { TaskState::Empty };
            task.position = BlockPosition(blockcur);
            task.result = T::default();
        }
    }
}

impl<T> Drop for Pipeline<T> {
    fn drop(&mut self) {
        let mut state = self.shared.mutex.lock();
        if state.done {
            return;
        }
        state.done = true;
        drop(state);
        self.shared.read_sched.notify_all();
        for worker in &mut self.workers {
            if let Some(handle) = worker.thread.take() {
                if handle.join().is_err() {
                    warn!("reader worker thread panicked while dropping the pipeline");
                }
            }
        }
    }
}

fn worker_info(config: &PipelineConfig, index: usize) -> WorkerInfo {
    if index < config.data_count {
        WorkerInfo {
            index,
            kind: WorkerKind::Data,
            buffer_skew: 0,
            disk: Some(DiskId(index)),
        }
    } else {
        WorkerInfo {
            index,
            kind: WorkerKind::Parity,
            buffer_skew: config.parity_count,
            disk: None,
        }
    }
}

fn kind_label(kind: WorkerKind) -> &'static str {
    match kind {
        WorkerKind::Data => "data",
        WorkerKind::Parity => "parity",
    }
}

/// One reader worker's whole lifetime: force-complete slot 0 to establish
/// the baseline, then alternate between catching up to the scheduled head
/// and running the callback outside the lock.
#[instrument(skip(shared, pool, callback), fields(worker = info.index, kind = kind_label(info.kind)))]
fn worker_loop<T>(
    shared: Arc<Shared<T>>,
    pool: Arc<BufferPool>,
    info: WorkerInfo,
    callback: Arc<dyn ReaderCallback<T>>,
    depth: usize,
) where
    T: Default + Send + 'static,
{
    let buffer_index = info.buffer_skew + info.index;

    execute_task(&shared, &pool, &info, &*callback, buffer_index, 0);

    loop {
        let next_slot = {
            let mut state = shared.mutex.lock();
            let mut scheduled = None;
            while scheduled.is_none() {
                if state.done {
                    return;
                }
                let next = (state.worker_slot[info.index] + 1) % depth;
                if next == state.reader_index {
                    shared.read_sched.wait(&mut state);
                    continue;
                }
                state.worker_slot[info.index] = next;
                shared.read_done.notify_one();
                scheduled = Some(next);
            }
            scheduled.unwrap()
        };
        execute_task(&shared, &pool, &info, &*callback, buffer_index, next_slot);
    }
}

fn execute_task<T>(
    shared: &Shared<T>,
    pool: &BufferPool,
    info: &WorkerInfo,
    callback: &dyn ReaderCallback<T>,
    buffer_index: usize,
    slot: usize,
) where
    T: Default,
{
    let mut task = {
        let mut state = shared.mutex.lock();
        std::mem::replace(
            &mut state.tasks[info.index][slot],
            Task::new(slot, buffer_index, info.disk, T::default()),
        )
    };

    if task.state == TaskState::Ready {
        // Safety: this worker is the only party with a live reference to
        // (slot, buffer_index) — the caller cannot reach this slot's
        // buffers until `reader_index` advances past it, which cannot
        // happen while this worker still owns it (the ring-full check in
        // `worker_loop` guarantees that).
        let buffer = unsafe { pool.buffer_mut(slot, buffer_index) };
        callback.read(info, &mut task, buffer);
    }

    let mut state = shared.mutex.lock();
    state.tasks[info.index][slot] = task;
}
