use std::time::Duration;

use clap::ValueEnum;

use crate::{
    error::{Error, Result},
    oracles::PROPER_NAME_TAG,
};

pub const SEQUENTIAL_BATCH_SIZE: usize = 1000;
pub const DISTRIBUTED_BATCH_SIZE: usize = 100;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_REDUCERS: usize = 4;
pub const DEFAULT_PARTITIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Single process, units processed in document order
    Sequential,
    /// Map, shuffle and reduce stages over a worker pool
    Distributed,
}

impl Mode {
    pub fn default_batch_size(self) -> usize {
        match self {
            Mode::Sequential => SEQUENTIAL_BATCH_SIZE,
            Mode::Distributed => DISTRIBUTED_BATCH_SIZE,
        }
    }
}

/// What to do when the oracle fails on one text unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FailurePolicy {
    /// Log the failure, drop the unit's names and keep going
    #[default]
    Skip,
    /// Stop the run and report what was aggregated so far
    Abort,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub name_tag: String,
    pub failure_policy: FailurePolicy,
    pub unit_timeout: Option<Duration>,
    pub workers: usize,
    pub reducers: usize,
    pub line_partitions: usize,
}

impl PipelineConfig {
    pub fn for_mode(mode: Mode) -> Self {
        Self {
            batch_size: mode.default_batch_size(),
            name_tag: PROPER_NAME_TAG.to_string(),
            failure_policy: FailurePolicy::default(),
            unit_timeout: None,
            workers: DEFAULT_WORKERS,
            reducers: DEFAULT_REDUCERS,
            line_partitions: DEFAULT_PARTITIONS,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_unit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.unit_timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize, reducers: usize, line_partitions: usize) -> Self {
        self.workers = workers;
        self.reducers = reducers;
        self.line_partitions = line_partitions;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidArgument(
                "batch size must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("workers", self.workers),
            ("reducers", self.reducers),
            ("partitions", self.line_partitions),
        ] {
            if value == 0 {
                return Err(Error::InvalidArgument(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_mode(Mode::Sequential)
    }
}
