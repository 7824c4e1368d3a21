use std::collections::BTreeMap;

use async_channel::{Receiver, Sender};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
    batcher::batch_of,
    common::{Line, LinePartition, Task},
    error::{Error, OracleError, Result},
    extractor::Extractor,
    frequency::FrequencyTable,
};

/// Lines of one batch as seen by one partition, keyed by line index.
pub type BatchGroup = Vec<(usize, Line)>;

#[derive(Debug)]
pub enum TaskOutput {
    Batched(BTreeMap<usize, BatchGroup>),
    /// per-reducer slices of the unit's names
    Extracted(usize, std::result::Result<Vec<FrequencyTable>, OracleError>),
    Reduced(usize, FrequencyTable),
}

#[derive(Debug)]
pub struct Completed {
    pub worker: String,
    pub output: TaskOutput,
}

pub struct WorkerPool {
    pub workers: Vec<Worker>,
    sender: Sender<Task>,
    pending: Receiver<Task>,
    results: Receiver<Completed>,
}

#[derive(Clone)]
struct Settings {
    extractor: Extractor,
    batch_size: usize,
    reducers: usize,
}

impl WorkerPool {
    pub fn new(
        size: usize,
        extractor: Extractor,
        batch_size: usize,
        reducers: usize,
    ) -> WorkerPool {
        assert!(size > 0);

        let (sender, receiver) = async_channel::bounded(size);
        let (done, results) = async_channel::unbounded();
        let settings = Settings {
            extractor,
            batch_size,
            reducers,
        };
        let workers = (0..size)
            .map(|_| Worker::new(receiver.clone(), done.clone(), settings.clone()))
            .collect();

        WorkerPool {
            workers,
            sender,
            pending: receiver,
            results,
        }
    }

    pub async fn run_task(&self, task: Task) -> Result<()> {
        self.sender
            .send(task)
            .await
            .map_err(|_| Error::Worker("task queue closed".to_string()))
    }

    pub async fn next_output(&self) -> Result<TaskOutput> {
        let completed = self
            .results
            .recv()
            .await
            .map_err(|_| Error::Worker("all workers stopped".to_string()))?;
        trace!(worker = %completed.worker, "task completed");
        Ok(completed.output)
    }

    /// Waits for exactly `n` task results.
    pub async fn gather(&self, n: usize) -> Result<Vec<TaskOutput>> {
        let mut outputs = Vec::with_capacity(n);
        while outputs.len() < n {
            outputs.push(self.next_output().await?);
        }
        Ok(outputs)
    }

    pub fn worker_ids(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(|worker| worker.id.as_str())
    }

    /// Stops accepting work, drops queued tasks and joins every worker.
    pub async fn shutdown(self) {
        self.sender.close();
        let mut dropped = 0;
        while self.pending.try_recv().is_ok() {
            dropped += 1;
        }
        self.results.close();

        let handles = self.workers.into_iter().map(|worker| worker.thread);
        for joined in join_all(handles).await {
            if let Err(err) = joined {
                debug!("worker ended abnormally: {err}");
            }
        }
        debug!(dropped, "worker pool shut down");
    }
}

pub struct Worker {
    pub id: String,
    thread: JoinHandle<()>,
}

impl Worker {
    fn new(receiver: Receiver<Task>, done: Sender<Completed>, settings: Settings) -> Worker {
        let id = Uuid::new_v4().to_string();
        let id_clone = id.clone();
        let thread = tokio::spawn(async move {
            while let Ok(task) = receiver.recv().await {
                let output = settings.execute(task).await;
                let completed = Completed {
                    worker: id_clone.clone(),
                    output,
                };
                if done.send(completed).await.is_err() {
                    break;
                }
            }
            trace!(worker = %id_clone, "worker stopped");
        });

        Worker { id, thread }
    }
}

impl Settings {
    async fn execute(&self, task: Task) -> TaskOutput {
        match task {
            Task::Batch(partition) => TaskOutput::Batched(key_by_batch(partition, self.batch_size)),
            Task::Extract(unit) => {
                let result = self.extractor.extract_async(&unit).await.map(|names| {
                    FrequencyTable::from_unit(unit.index, names).split_by_key(self.reducers)
                });
                TaskOutput::Extracted(unit.index, result)
            }
            Task::Reduce(bucket, partials) => {
                TaskOutput::Reduced(bucket, partials.into_iter().collect())
            }
        }
    }
}

fn key_by_batch(partition: LinePartition, batch_size: usize) -> BTreeMap<usize, BatchGroup> {
    let mut groups: BTreeMap<usize, BatchGroup> = BTreeMap::new();
    for (offset, line) in partition.lines.into_iter().enumerate() {
        let index = partition.first_index + offset;
        groups
            .entry(batch_of(index, batch_size))
            .or_default()
            .push((index, line));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_lines_by_global_index() {
        let partition = LinePartition {
            first_index: 3,
            lines: vec!["d".into(), "e".into(), "f".into(), "g".into()],
        };
        let groups = key_by_batch(partition, 2);
        let keys: Vec<_> = groups.keys().copied().collect();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(groups[&1], vec![(3, "d".to_string())]);
        assert_eq!(groups[&2], vec![(4, "e".to_string()), (5, "f".to_string())]);
        assert_eq!(groups[&3], vec![(6, "g".to_string())]);
    }
}
