use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::{
    common::{Input, LinePartition, Output, Task, TextUnit},
    config::{FailurePolicy, PipelineConfig},
    error::{Error, Result},
    frequency::FrequencyTable,
};

use super::{
    worker_pool::{BatchGroup, TaskOutput},
    ExecutionContext,
};

pub struct Coordinator<'a> {
    context: &'a ExecutionContext,
    config: &'a PipelineConfig,
}

impl<'a> Coordinator<'a> {
    pub fn new(context: &'a ExecutionContext, config: &'a PipelineConfig) -> Self {
        Self { context, config }
    }

    pub async fn run(&self, input: Input) -> Result<Output> {
        let units = self.group_into_units(input).await?;
        let unit_count = units.len();
        info!(units = unit_count, "batched lines into text units");

        let (buckets, skipped) = self.extract_names(units).await?;
        let table = self.reduce(buckets).await?;
        info!(names = table.len(), "reduce done");

        Ok(Output {
            table,
            units: unit_count,
            skipped,
        })
    }

    /// Keys every line by `index / batch_size` on the workers, then merges
    /// the per-partition groups into text units ordered by line index.
    async fn group_into_units(&self, input: Input) -> Result<Vec<TextUnit>> {
        let partitions = partition_lines(input, self.config.line_partitions);
        let n = partitions.len();
        for partition in partitions {
            self.context.pool.run_task(Task::Batch(partition)).await?;
        }

        let mut groups: BTreeMap<usize, BatchGroup> = BTreeMap::new();
        for output in self.context.pool.gather(n).await? {
            let partial = match output {
                TaskOutput::Batched(partial) => partial,
                other => return Err(unexpected("batch", &other)),
            };
            for (batch, members) in partial {
                groups.entry(batch).or_default().extend(members);
            }
        }

        Ok(groups
            .into_iter()
            .map(|(index, members)| text_unit(index, members))
            .collect())
    }

    /// Returns the per-reducer partial tables and the units skipped.
    async fn extract_names(
        &self,
        units: Vec<TextUnit>,
    ) -> Result<(Vec<Vec<FrequencyTable>>, Vec<usize>)> {
        let n = units.len();
        for unit in units {
            self.context.pool.run_task(Task::Extract(unit)).await?;
        }

        let mut buckets: Vec<Vec<FrequencyTable>> =
            (0..self.config.reducers).map(|_| Vec::new()).collect();
        let mut skipped = Vec::new();
        for _ in 0..n {
            let output = self.context.pool.next_output().await?;
            let (unit, result) = match output {
                TaskOutput::Extracted(unit, result) => (unit, result),
                other => return Err(unexpected("extract", &other)),
            };
            match result {
                Ok(parts) => {
                    for (bucket, part) in parts.into_iter().enumerate() {
                        if !part.is_empty() {
                            buckets[bucket].push(part);
                        }
                    }
                }
                Err(source) => match self.config.failure_policy {
                    FailurePolicy::Skip => {
                        warn!(unit, error = %source, "skipping text unit");
                        skipped.push(unit);
                    }
                    FailurePolicy::Abort => {
                        let partial: FrequencyTable = buckets.into_iter().flatten().collect();
                        warn!(unit, names = partial.len(), "aborting, keeping partial counts");
                        return Err(Error::OracleFailure {
                            unit,
                            source,
                            partial: Box::new(partial),
                        });
                    }
                },
            }
        }
        skipped.sort_unstable();
        Ok((buckets, skipped))
    }

    async fn reduce(&self, buckets: Vec<Vec<FrequencyTable>>) -> Result<FrequencyTable> {
        let jobs: Vec<(usize, Vec<FrequencyTable>)> = buckets
            .into_iter()
            .enumerate()
            .filter(|(_, partials)| !partials.is_empty())
            .collect();
        let n = jobs.len();
        for (bucket, partials) in jobs {
            self.context.pool.run_task(Task::Reduce(bucket, partials)).await?;
        }

        let mut table = FrequencyTable::new();
        for output in self.context.pool.gather(n).await? {
            let (bucket, reduced) = match output {
                TaskOutput::Reduced(bucket, reduced) => (bucket, reduced),
                other => return Err(unexpected("reduce", &other)),
            };
            debug!(bucket, names = reduced.len(), "bucket reduced");
            table.absorb(reduced);
        }
        Ok(table)
    }
}

/// Splits the document into at most `partitions` contiguous slices.
fn partition_lines(input: Input, partitions: usize) -> Vec<LinePartition> {
    let per_partition = input.len().div_ceil(partitions.max(1)).max(1);
    let mut lines = input.into_iter();
    let mut out = Vec::new();
    let mut first_index = 0;
    loop {
        let chunk: Vec<_> = lines.by_ref().take(per_partition).collect();
        if chunk.is_empty() {
            break;
        }
        let taken = chunk.len();
        out.push(LinePartition {
            first_index,
            lines: chunk,
        });
        first_index += taken;
    }
    out
}

fn text_unit(index: usize, mut members: BatchGroup) -> TextUnit {
    members.sort_unstable_by_key(|(line, _)| *line);
    let start = members.first().map_or(0, |(line, _)| *line);
    let end = members.last().map_or(start, |(line, _)| line + 1);
    TextUnit {
        index,
        lines: start..end,
        text: members.into_iter().map(|(_, line)| line).collect(),
    }
}

fn unexpected(stage: &str, output: &TaskOutput) -> Error {
    Error::Worker(format!("unexpected result in {stage} stage: {output:?}"))
}
