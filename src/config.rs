use crate::error::{PipelineError, Result};

/// Pipeline configuration.
///
/// Constructed by the embedder before `Pipeline::init`. This crate never
/// reads a config file itself — parsing `scrub.toml` or equivalent, if the
/// embedding tool wants one, is the embedder's job.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Ring depth `D`: how many stripes may be scheduled ahead of the
    /// caller's consumption point.
    pub depth: usize,

    /// Size in bytes of a single block buffer.
    pub block_size: usize,

    /// Number of data disks (data workers).
    pub data_count: usize,

    /// Number of parity disks (parity workers).
    pub parity_count: usize,

    /// Run the startup RAM self-test over the buffer pool.
    pub self_test: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            depth: 8,
            block_size: 256 * 1024,
            data_count: 1,
            parity_count: 1,
            self_test: true,
        }
    }
}

impl PipelineConfig {
    /// Total number of reader workers (`data_count + parity_count`).
    pub fn reader_max(&self) -> usize {
        self.data_count + self.parity_count
    }

    /// Width of the per-slot buffer vector: data range, then a
    /// `parity_count`-wide computed-parity workspace reserved for the
    /// caller, then the actual parity range.
    pub fn buffers_per_slot(&self) -> usize {
        self.data_count + 2 * self.parity_count
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.depth < 2 {
            return Err(PipelineError::InvalidConfig(
                "depth must be at least 2".into(),
            ));
        }
        if self.block_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "block_size must be non-zero".into(),
            ));
        }
        if self.data_count == 0 && self.parity_count == 0 {
            return Err(PipelineError::InvalidConfig(
                "at least one data or parity reader is required".into(),
            ));
        }
        Ok(())
    }
}
