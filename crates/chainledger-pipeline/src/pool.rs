//! `DecodeWorkerPool`: N tokio workers draining a bounded job queue.
//!
//! Each worker owns a clone of the pipeline. A report reaches the
//! [`ResultStore`] only after the run finalized; failed and cancelled runs
//! publish nothing. Ordering across transactions is not preserved.

use alloy_primitives::B256;
use chainledger_core::{chain::ChainId, context::TrackedAccounts, error::PipelineError};
use futures::future::join_all;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::pipeline::TransactionDecodePipeline;
use crate::store::ResultStore;

/// One unit of work: decode `tx_hash` on `chain` for `tracked`.
#[derive(Debug, Clone)]
pub struct DecodeJob {
    pub tx_hash: B256,
    pub chain: ChainId,
    pub tracked: TrackedAccounts,
}

impl DecodeJob {
    pub fn new(tx_hash: B256, chain: ChainId, tracked: TrackedAccounts) -> Self {
        Self {
            tx_hash,
            chain,
            tracked,
        }
    }
}

/// Counters snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub published: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PoolStats {
        PoolStats {
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct DecodeWorkerPool {
    sender: mpsc::Sender<DecodeJob>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl DecodeWorkerPool {
    /// Spawn `workers` tasks (at least one) sharing a queue of `capacity` jobs.
    pub fn spawn(
        pipeline: TransactionDecodePipeline,
        store: Arc<dyn ResultStore>,
        workers: usize,
        capacity: usize,
        timeout: Option<Duration>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let workers = (0..workers.max(1))
            .map(|id| {
                let worker = Worker {
                    id,
                    pipeline: pipeline.clone(),
                    store: Arc::clone(&store),
                    receiver: Arc::clone(&receiver),
                    counters: Arc::clone(&counters),
                    timeout,
                };
                tokio::spawn(worker.run())
            })
            .collect::<Vec<_>>();

        info!(workers = workers.len(), capacity, "decode worker pool started");
        Self {
            sender,
            workers,
            counters,
        }
    }

    /// Queue a job, waiting while the queue is full.
    pub async fn submit(&self, job: DecodeJob) -> Result<(), PipelineError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| PipelineError::PoolClosed)
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Close the queue, let workers drain it, and wait for them.
    pub async fn shutdown(self) -> PoolStats {
        drop(self.sender);
        for joined in join_all(self.workers).await {
            if let Err(e) = joined {
                error!(error = %e, "decode worker panicked");
            }
        }
        let stats = self.counters.snapshot();
        info!(published = stats.published, failed = stats.failed, "decode worker pool stopped");
        stats
    }
}

struct Worker {
    id: usize,
    pipeline: TransactionDecodePipeline,
    store: Arc<dyn ResultStore>,
    receiver: Arc<Mutex<mpsc::Receiver<DecodeJob>>>,
    counters: Arc<Counters>,
    timeout: Option<Duration>,
}

impl Worker {
    async fn run(self) {
        loop {
            let job = { self.receiver.lock().await.recv().await };
            let Some(job) = job else {
                debug!(worker = self.id, "queue closed");
                return;
            };

            let outcome = match self.timeout {
                Some(t) => {
                    self.pipeline
                        .decode_with_timeout(job.tx_hash, &job.chain, &job.tracked, t)
                        .await
                }
                None => self.pipeline.decode(job.tx_hash, &job.chain, &job.tracked).await,
            };

            let published = match outcome {
                Ok(report) => self.store.publish(&job.chain.slug, report).await,
                Err(e) => Err(e),
            };
            match published {
                Ok(()) => {
                    self.counters.published.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(worker = self.id, tx = %job.tx_hash, chain = %job.chain, error = %e, "decode job failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Enricher;
    use crate::memory::{MemoryReceiptSource, StaticAssetResolver};
    use crate::store::MemoryResultStore;
    use crate::testing::{addr, FetchedBuilder, USDT, USER};
    use chainledger_core::chain::chains;
    use chainledger_evm::default_registry;
    use chainledger_registry::RegistrySet;

    fn hashes(n: u8) -> Vec<B256> {
        (1..=n).map(B256::repeat_byte).collect()
    }

    fn pool_fixture(hashes: &[B256]) -> (TransactionDecodePipeline, Arc<MemoryReceiptSource>) {
        let eth = chains::ethereum();
        let mut source = MemoryReceiptSource::new();
        for (i, hash) in hashes.iter().enumerate() {
            source = source.with_transaction(
                FetchedBuilder::new(USER)
                    .hash(*hash)
                    .gas(21_000, 1_000_000_000)
                    .transfer(USDT, addr(0x42), USER, 1_000 + i as u64)
                    .build(),
            );
        }
        let source = Arc::new(source);
        let registries = RegistrySet::new().with(&eth, default_registry(&eth).unwrap().freeze());
        let resolver = StaticAssetResolver::new().with_token(&eth, USDT, "USDT", 6);
        let pipeline =
            TransactionDecodePipeline::new(registries, source.clone(), Enricher::new(Arc::new(resolver)));
        (pipeline, source)
    }

    fn job(hash: B256) -> DecodeJob {
        let mut tracked = TrackedAccounts::new();
        tracked.insert(USER);
        DecodeJob::new(hash, chains::ethereum(), tracked)
    }

    #[tokio::test]
    async fn publishes_every_finalized_report() {
        let hashes = hashes(6);
        let (pipeline, _) = pool_fixture(&hashes);
        let store = Arc::new(MemoryResultStore::new());
        let pool = DecodeWorkerPool::spawn(pipeline, store.clone(), 3, 2, None);

        for hash in &hashes {
            pool.submit(job(*hash)).await.unwrap();
        }
        let stats = pool.shutdown().await;

        assert_eq!(stats, PoolStats { published: 6, failed: 0 });
        assert_eq!(store.len().await, 6);
        for hash in &hashes {
            let report = store.get("ethereum", *hash).await.unwrap().unwrap();
            assert_eq!(report.events().len(), 2);
        }
    }

    #[tokio::test]
    async fn failed_jobs_publish_nothing() {
        let (pipeline, source) = pool_fixture(&hashes(1));
        let store = Arc::new(MemoryResultStore::new());
        let pool = DecodeWorkerPool::spawn(pipeline, store.clone(), 2, 4, None);

        pool.submit(job(B256::repeat_byte(0xee))).await.unwrap();
        pool.submit(job(B256::repeat_byte(1))).await.unwrap();
        let stats = pool.shutdown().await;

        assert_eq!(stats, PoolStats { published: 1, failed: 1 });
        assert_eq!(store.len().await, 1);
        assert!(store
            .get("ethereum", B256::repeat_byte(0xee))
            .await
            .unwrap()
            .is_none());
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn republishing_replaces_the_report() {
        let hashes = hashes(1);
        let (pipeline, _) = pool_fixture(&hashes);
        let store = Arc::new(MemoryResultStore::new());
        let pool = DecodeWorkerPool::spawn(pipeline, store.clone(), 1, 1, None);
        pool.submit(job(hashes[0])).await.unwrap();
        pool.submit(job(hashes[0])).await.unwrap();
        assert_eq!(pool.shutdown().await.published, 2);
        assert_eq!(store.len().await, 1);
    }
}
