// Runnable demo: wires an in-memory "disk" simulation through the
// read-ahead pipeline and prints each stripe as it arrives, the way a
// subsystem demo for a background worker pool would.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use stripe_readahead::{BlockPosition, Pipeline, PipelineConfig, ReaderCallback, ReaderOutcome, Task, WorkerInfo};
use tracing::info;

/// Opaque per-task result the pipeline stores but never interprets.
#[derive(Debug, Clone, Default)]
struct BlockResult {
    bytes_read: usize,
    timestamp_mismatch: bool,
}

impl ReaderOutcome for BlockResult {
    fn is_error(&self) -> bool {
        self.timestamp_mismatch
    }
}

/// Simulated spinning disk: "reads" a block by filling the buffer with a
/// byte pattern derived from the block position, with a random latency
/// jitter per worker to demonstrate that `data_read` returns fast workers
/// before slow ones.
struct SimulatedDisk {
    max_latency_ms: u64,
}

impl ReaderCallback<BlockResult> for SimulatedDisk {
    fn read(&self, worker: &WorkerInfo, task: &mut Task<BlockResult>, buffer: &mut [u8]) {
        if self.max_latency_ms > 0 {
            let jitter = rand::rng().random_range(0..=self.max_latency_ms);
            std::thread::sleep(Duration::from_millis(jitter));
        }
        let pattern = (task.position.0 % 256) as u8;
        buffer.fill(pattern);
        task.result = BlockResult {
            bytes_read: buffer.len(),
            timestamp_mismatch: false,
        };
        info!(
            worker = worker.index,
            position = task.position.0,
            "simulated read complete"
        );
    }
}

fn main() -> stripe_readahead::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = PipelineConfig {
        depth: 4,
        block_size: 4096,
        data_count: 4,
        parity_count: 1,
        self_test: true,
    };

    let data_reader = Arc::new(SimulatedDisk { max_latency_ms: 5 });
    let parity_reader = Arc::new(SimulatedDisk { max_latency_ms: 0 });

    let mut pipeline: Pipeline<BlockResult> =
        Pipeline::init(config.clone(), data_reader, parity_reader)?;

    pipeline.start(0, 12, |pos: BlockPosition| pos.0 % 3 != 0)?;

    let expected_stripes = (0..12u64).filter(|i| i % 3 != 0).count();
    for _ in 0..expected_stripes {
        let (position, slot) = pipeline.read_next();
        println!("stripe {position} (slot {slot})");

        for _ in 0..config.data_count {
            let (task, local) = pipeline.data_read();
            println!("  data[{local}] -> {} bytes", task.result.bytes_read);
        }
        for _ in 0..config.parity_count {
            let (task, local) = pipeline.parity_read();
            println!("  parity[{local}] -> {} bytes", task.result.bytes_read);
        }
    }

    pipeline.stop()?;
    Ok(())
}
