//! Map, shuffle and reduce over a pool of workers.
//!
//! Each run builds its own [`ExecutionContext`] and tears it down when the
//! run ends, whatever the outcome.

mod coordinator;
mod worker_pool;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    common::{Input, MapReduce, Output},
    config::PipelineConfig,
    error::Result,
    extractor::Extractor,
    oracles::NameOracle,
};
use coordinator::Coordinator;
use worker_pool::WorkerPool;

pub struct ExecutionContext {
    pool: WorkerPool,
}

impl ExecutionContext {
    /// Spawns the worker pool once `config` is known to be usable.
    pub(crate) fn start(config: &PipelineConfig, extractor: Extractor) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.workers, extractor, config.batch_size, config.reducers);
        debug!(workers = ?pool.worker_ids().collect::<Vec<_>>(), "execution context started");
        Ok(Self { pool })
    }

    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }
}

pub struct ParallelMapReduce {
    config: PipelineConfig,
    extractor: Extractor,
}

#[async_trait]
impl MapReduce for ParallelMapReduce {
    fn new(config: PipelineConfig, oracle: Arc<dyn NameOracle>) -> Self {
        let extractor =
            Extractor::new(oracle, &config.name_tag).with_timeout(config.unit_timeout);
        Self { config, extractor }
    }

    async fn run(self, input: Input) -> Result<Output> {
        let context = ExecutionContext::start(&self.config, self.extractor.clone())?;
        info!(
            lines = input.len(),
            batch_size = self.config.batch_size,
            workers = self.config.workers,
            reducers = self.config.reducers,
            "distributed run"
        );
        let result = Coordinator::new(&context, &self.config).run(input).await;
        context.shutdown().await;
        result
    }
}
