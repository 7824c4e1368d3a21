use std::sync::Arc;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::{
    batcher,
    common::{Input, MapReduce, Output},
    config::{FailurePolicy, PipelineConfig},
    error::{Error, Result},
    extractor::Extractor,
    frequency::FrequencyTable,
    oracles::NameOracle,
};

pub struct SequentialMapReduce {
    config: PipelineConfig,
    extractor: Extractor,
}

impl SequentialMapReduce {
    fn progress_bar(units: usize) -> ProgressBar {
        let pb = ProgressBar::new(units as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("Processing text [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}

#[async_trait]
impl MapReduce for SequentialMapReduce {
    fn new(config: PipelineConfig, oracle: Arc<dyn NameOracle>) -> Self {
        let extractor =
            Extractor::new(oracle, &config.name_tag).with_timeout(config.unit_timeout);
        Self { config, extractor }
    }

    async fn run(self, input: Input) -> Result<Output> {
        let units = batcher::batches(input, self.config.batch_size)?;
        let total = units.size_hint().0;
        info!(units = total, batch_size = self.config.batch_size, "sequential run");

        let pb = Self::progress_bar(total);
        let mut table = FrequencyTable::new();
        let mut skipped = Vec::new();
        let mut processed = 0;

        for unit in units {
            match self.extractor.extract_async(&unit).await {
                Ok(names) => {
                    debug!(unit = unit.index, names = names.len(), "unit processed");
                    table.record_unit(unit.index, names);
                }
                Err(source) => match self.config.failure_policy {
                    FailurePolicy::Skip => {
                        warn!(unit = unit.index, error = %source, "skipping text unit");
                        skipped.push(unit.index);
                    }
                    FailurePolicy::Abort => {
                        pb.abandon();
                        return Err(Error::OracleFailure {
                            unit: unit.index,
                            source,
                            partial: Box::new(table),
                        });
                    }
                },
            }
            processed += 1;
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(Output {
            table,
            units: processed,
            skipped,
        })
    }
}
