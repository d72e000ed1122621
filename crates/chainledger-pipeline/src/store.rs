//! Result store: where decode reports are published.

use alloy_primitives::B256;
use async_trait::async_trait;
use chainledger_core::{error::PipelineError, result::DecodeReport};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Destination for decode reports. Publishing a transaction again replaces
/// its previous report in full.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn publish(&self, chain: &str, report: DecodeReport) -> Result<(), PipelineError>;

    async fn get(&self, chain: &str, tx_hash: B256) -> Result<Option<DecodeReport>, PipelineError>;
}

/// `ResultStore` backed by a map; suitable for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    reports: RwLock<HashMap<(String, B256), DecodeReport>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn publish(&self, chain: &str, report: DecodeReport) -> Result<(), PipelineError> {
        let key = (chain.to_string(), report.result().tx_hash);
        self.reports.write().await.insert(key, report);
        Ok(())
    }

    async fn get(&self, chain: &str, tx_hash: B256) -> Result<Option<DecodeReport>, PipelineError> {
        Ok(self
            .reports
            .read()
            .await
            .get(&(chain.to_string(), tx_hash))
            .cloned())
    }
}
