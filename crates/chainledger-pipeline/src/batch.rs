//! Rayon-powered batch path for already-fetched transactions.
//!
//! Runs extraction and aggregation (dispatch through sequencing) in
//! parallel. Enrichment and notes are async and stay with the pipeline.

use chainledger_core::{
    chain::ChainId, context::TrackedAccounts, error::ExtractionError, source::FetchedTransaction,
};
use chainledger_evm::RawLogExtractor;
use chainledger_registry::DecoderRegistry;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::info;

use crate::aggregator::{AggregatedTransaction, EventAggregator};

pub struct BatchDecoder {
    registry: Arc<DecoderRegistry>,
    extractor: RawLogExtractor,
    aggregator: EventAggregator,
}

impl BatchDecoder {
    pub fn new(registry: Arc<DecoderRegistry>) -> Self {
        Self {
            registry,
            extractor: RawLogExtractor::new(),
            aggregator: EventAggregator::new(),
        }
    }

    /// Decode one transaction on the calling thread.
    pub fn decode_one(
        &self,
        fetched: &FetchedTransaction,
        chain: &ChainId,
        tracked: &TrackedAccounts,
    ) -> Result<AggregatedTransaction, ExtractionError> {
        let extracted = self.extractor.extract(fetched, chain)?;
        Ok(self.aggregator.aggregate(&self.registry, &extracted, tracked))
    }

    /// Decode `batch` in parallel. Output order matches input order; an
    /// extraction failure affects only its own slot.
    pub fn decode_all(
        &self,
        batch: &[FetchedTransaction],
        chain: &ChainId,
        tracked: &TrackedAccounts,
    ) -> Vec<Result<AggregatedTransaction, ExtractionError>> {
        let results: Vec<_> = batch
            .par_iter()
            .map(|fetched| self.decode_one(fetched, chain, tracked))
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(
            chain = %chain,
            transactions = batch.len(),
            failed,
            "batch decode complete"
        );
        results
    }
}
