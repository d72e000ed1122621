//! `TransactionDecodePipeline`: fetch → extract → aggregate → enrich → notes.
//!
//! One call decodes one transaction. The only suspension points are the
//! receipt fetch, asset resolution and price lookups; everything between
//! them is the synchronous [`EventAggregator`].

use alloy_primitives::B256;
use chainledger_core::{
    chain::ChainId,
    context::TrackedAccounts,
    error::{PipelineError, RegistryError},
    event::HistoryEvent,
    result::{DecodeReport, DecodedTransactionResult, PartialResult},
    source::{FetchedTransaction, ReceiptFetcher},
};
use chainledger_evm::RawLogExtractor;
use chainledger_observability::{redact_amount, LedgerMetrics};
use chainledger_registry::{DecoderRegistry, RegistrySet};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use crate::aggregator::{AggregatedTransaction, EventAggregator, Stage};
use crate::enrich::Enricher;
use crate::notes::NotesFormatter;
use crate::retry::RetryPolicy;

/// Decode pipeline. Cheap to clone; clones share the registries and
/// collaborators, which are read-only.
#[derive(Clone)]
pub struct TransactionDecodePipeline {
    registries: RegistrySet,
    fetcher: Arc<dyn ReceiptFetcher>,
    enricher: Enricher,
    notes: NotesFormatter,
    retry: RetryPolicy,
    extractor: RawLogExtractor,
    aggregator: EventAggregator,
    metrics: Option<LedgerMetrics>,
    anonymize_amounts: bool,
}

impl TransactionDecodePipeline {
    pub fn new(registries: RegistrySet, fetcher: Arc<dyn ReceiptFetcher>, enricher: Enricher) -> Self {
        Self {
            registries,
            fetcher,
            enricher,
            notes: NotesFormatter::default(),
            retry: RetryPolicy::default(),
            extractor: RawLogExtractor::new(),
            aggregator: EventAggregator::new(),
            metrics: None,
            anonymize_amounts: false,
        }
    }

    pub fn with_notes(mut self, notes: NotesFormatter) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: LedgerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Log amounts as `<redacted>`.
    pub fn anonymize_amounts(mut self, enabled: bool) -> Self {
        self.anonymize_amounts = enabled;
        self
    }

    pub fn registries(&self) -> &RegistrySet {
        &self.registries
    }

    /// Fetch and decode one transaction.
    pub async fn decode(
        &self,
        tx_hash: B256,
        chain: &ChainId,
        tracked: &TrackedAccounts,
    ) -> Result<DecodeReport, PipelineError> {
        let started = Instant::now();
        let registry = self.registries.get(chain)?;
        let fetched = self.fetch(tx_hash, chain).await?;
        debug!(tx = %tx_hash, chain = %chain, stage = %Stage::Fetched, logs = fetched.logs.len(), "receipt fetched");
        self.run(&registry, &fetched, chain, tracked, started).await
    }

    /// Decode an already-fetched transaction; the chain comes from its slug.
    pub async fn decode_fetched(
        &self,
        fetched: &FetchedTransaction,
        tracked: &TrackedAccounts,
    ) -> Result<DecodeReport, PipelineError> {
        let started = Instant::now();
        let chain = ChainId::from_slug(&fetched.chain).ok_or_else(|| RegistryError::UnknownChain {
            chain: fetched.chain.clone(),
        })?;
        let registry = self.registries.get(&chain)?;
        self.run(&registry, fetched, &chain, tracked, started).await
    }

    /// [`decode`](Self::decode) under a deadline. On expiry the run is
    /// dropped and nothing it produced is returned.
    pub async fn decode_with_timeout(
        &self,
        tx_hash: B256,
        chain: &ChainId,
        tracked: &TrackedAccounts,
        timeout: Duration,
    ) -> Result<DecodeReport, PipelineError> {
        match tokio::time::timeout(timeout, self.decode(tx_hash, chain, tracked)).await {
            Ok(result) => result,
            Err(_) => {
                let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(tx = %tx_hash, chain = %chain, ms, "decode cancelled");
                Err(PipelineError::Cancelled { tx_hash, ms })
            }
        }
    }

    async fn fetch(&self, tx_hash: B256, chain: &ChainId) -> Result<FetchedTransaction, PipelineError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let error = match self.fetcher.fetch_receipt(tx_hash, chain).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) => e,
            };
            let Some(delay) = self.retry.delay_for(&error, attempts) else {
                warn!(tx = %tx_hash, chain = %chain, attempts, error = %error, "fetch failed");
                return Err(PipelineError::Fetch {
                    attempts,
                    source: error,
                });
            };
            debug!(tx = %tx_hash, attempt = attempts, delay_ms = delay.as_millis() as u64, error = %error, "retrying fetch");
            if let Some(m) = &self.metrics {
                m.record_retry(&chain.slug);
            }
            tokio::time::sleep(delay).await;
        }
    }

    async fn run(
        &self,
        registry: &DecoderRegistry,
        fetched: &FetchedTransaction,
        chain: &ChainId,
        tracked: &TrackedAccounts,
        started: Instant,
    ) -> Result<DecodeReport, PipelineError> {
        let extracted = self.extractor.extract(fetched, chain)?;
        let AggregatedTransaction {
            meta,
            mut events,
            unclaimed,
            entry_errors,
            conflicts,
            entry_count,
        } = self.aggregator.aggregate(registry, &extracted, tracked);

        self.enricher.enrich(&mut events).await;
        debug!(tx = %meta.tx_hash, chain = %chain, stage = %Stage::Enriched, events = events.len(), "events enriched");

        let events: Vec<HistoryEvent> = events
            .into_iter()
            .enumerate()
            .map(|(i, mut event)| {
                event.notes = Some(self.notes.render(&event));
                HistoryEvent::freeze(event, i as u32)
            })
            .collect();

        for event in &events {
            debug!(
                tx = %meta.tx_hash,
                seq = event.sequence_index,
                event_type = %event.event_type,
                event_subtype = %event.event_subtype,
                amount = %redact_amount(event.amount, self.anonymize_amounts),
                "event finalized"
            );
        }

        let result = DecodedTransactionResult {
            tx_hash: meta.tx_hash,
            chain: chain.slug.clone(),
            events,
        };
        let complete = unclaimed.is_empty() && entry_errors.is_empty() && conflicts.is_empty();

        if let Some(m) = &self.metrics {
            m.record_transaction(&chain.slug, complete);
            for event in &result.events {
                let counterparty = event.counterparty.map_or("none", |c| c.as_str());
                m.record_event(&chain.slug, counterparty);
            }
            for error in &entry_errors {
                m.record_entry_error(&chain.slug, &error.decoder);
            }
            m.record_unclaimed(&chain.slug, unclaimed.len() as u64);
            m.record_latency(started.elapsed().as_secs_f64() * 1_000.0, &chain.slug);
        }

        info!(
            tx = %meta.tx_hash,
            chain = %chain,
            stage = %Stage::Finalized,
            entries = entry_count,
            events = result.events.len(),
            unclaimed = unclaimed.len(),
            errors = entry_errors.len(),
            complete,
            "transaction decoded"
        );

        Ok(if complete {
            DecodeReport::Complete(result)
        } else {
            DecodeReport::Partial(PartialResult {
                result,
                unclaimed,
                entry_errors,
                conflicts,
            })
        })
    }
}

impl std::fmt::Debug for TransactionDecodePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionDecodePipeline")
            .field("chains", &self.registries.chains())
            .field("retry", &self.retry)
            .field("prices", &self.enricher.prices_enabled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryReceiptSource, StaticAssetResolver, StaticPriceOracle};
    use crate::retry::RetryConfig;
    use crate::testing::{addr, tx_hash, FetchedBuilder, A_USDT, USDT, USER};
    use async_trait::async_trait;
    use alloy_primitives::U256;
    use chainledger_core::{
        asset::{AssetIdentity, AssetRef, Valuation},
        chain::chains,
        context::DecodeContext,
        decoder::{Capabilities, DecodeOutcome, Decoded, DecoderKind, ProtocolDecoder, Scope},
        entry::EntryIndex,
        error::{DecodeError, FetchError},
        event::CandidateEvent,
        taxonomy::{HistoryEventSubType, HistoryEventType},
    };
    use chainledger_evm::default_registry;
    use rust_decimal::Decimal;

    fn tracked() -> TrackedAccounts {
        let mut t = TrackedAccounts::new();
        t.insert(USER);
        t
    }

    fn registries() -> RegistrySet {
        let eth = chains::ethereum();
        RegistrySet::new().with(&eth, default_registry(&eth).unwrap().freeze())
    }

    fn supply_tx() -> FetchedTransaction {
        FetchedBuilder::new(USER)
            .gas(100_000, 100_000_000_000)
            .transfer(USDT, USER, A_USDT, 250_000_000)
            .aave_supply(USDT, USER, USER, 250_000_000)
            .build()
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
            jitter_fraction: 0.0,
        })
    }

    fn pipeline(source: Arc<MemoryReceiptSource>) -> TransactionDecodePipeline {
        let resolver = StaticAssetResolver::new().with_token(&chains::ethereum(), USDT, "USDT", 6);
        TransactionDecodePipeline::new(registries(), source, Enricher::new(Arc::new(resolver)))
            .with_retry(fast_retry(2))
    }

    #[tokio::test]
    async fn decodes_supply_with_notes() {
        let source = Arc::new(MemoryReceiptSource::new().with_transaction(supply_tx()));
        let report = pipeline(source)
            .decode(tx_hash(), &chains::ethereum(), &tracked())
            .await
            .unwrap();

        assert!(report.is_complete());
        let events = report.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence_index, 0);
        assert_eq!(events[0].notes, "Burned 0.01 ETH for gas");
        assert_eq!(events[1].sequence_index, 1);
        assert_eq!(events[1].event_type, HistoryEventType::Deposit);
        assert_eq!(events[1].notes, "Deposit 250 USDT into AAVE v3");
        assert_eq!(events[1].display_amount.as_deref(), Some("250"));
    }

    #[tokio::test]
    async fn decoding_twice_is_byte_identical() {
        let source = Arc::new(MemoryReceiptSource::new().with_transaction(supply_tx()));
        let p = pipeline(source);
        let eth = chains::ethereum();
        let a = p.decode(tx_hash(), &eth, &tracked()).await.unwrap();
        let b = p.decode(tx_hash(), &eth, &tracked()).await.unwrap();
        assert_eq!(a.result().to_json().unwrap(), b.result().to_json().unwrap());
    }

    #[tokio::test]
    async fn transient_fetch_errors_are_retried() {
        let source = Arc::new(MemoryReceiptSource::new().with_transaction(supply_tx()));
        source.fail_next(FetchError::Timeout { ms: 10 }).await;
        source
            .fail_next(FetchError::RateLimited {
                provider: "memory".into(),
            })
            .await;
        let report = pipeline(source.clone())
            .decode(tx_hash(), &chains::ethereum(), &tracked())
            .await;
        assert!(report.is_ok());
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let source = Arc::new(MemoryReceiptSource::new().with_transaction(supply_tx()));
        for _ in 0..3 {
            source.fail_next(FetchError::Transport("reset".into())).await;
        }
        let err = pipeline(source.clone())
            .decode(tx_hash(), &chains::ethereum(), &tracked())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { attempts: 3, .. }));
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn permanent_fetch_error_is_not_retried() {
        let source = Arc::new(MemoryReceiptSource::new());
        let err = pipeline(source.clone())
            .decode(tx_hash(), &chains::ethereum(), &tracked())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Fetch {
                attempts: 1,
                source: FetchError::NotFound { .. }
            }
        ));
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn unknown_chain_fails_before_fetch() {
        let source = Arc::new(MemoryReceiptSource::new());
        let err = pipeline(source.clone())
            .decode(tx_hash(), &chains::scroll(), &tracked())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Registry(RegistryError::UnknownChain { .. })));
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn malformed_receipt_is_fatal() {
        let mut tx = supply_tx();
        tx.logs[0].data = "0xzz".into();
        let err = pipeline(Arc::new(MemoryReceiptSource::new()))
            .decode_fetched(&tx, &tracked())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
    }

    #[tokio::test]
    async fn unknown_log_yields_partial_report() {
        let tx = FetchedBuilder::new(USER)
            .gas(21_000, 1_000_000_000)
            .log(addr(0x77), vec![B256::repeat_byte(0x12)], vec![])
            .build();
        let report = pipeline(Arc::new(MemoryReceiptSource::new()))
            .decode_fetched(&tx, &tracked())
            .await
            .unwrap();
        match report {
            DecodeReport::Partial(p) => {
                assert_eq!(p.unclaimed.len(), 1);
                assert!(p.entry_errors.is_empty());
                assert_eq!(p.result.events.len(), 1);
            }
            DecodeReport::Complete(_) => panic!("expected a partial report"),
        }
    }

    /// Claims every USDT log but only emits a deposit/fee pair.
    struct MislabeledDeposit;

    impl ProtocolDecoder for MislabeledDeposit {
        fn name(&self) -> &str {
            "mislabeled-deposit"
        }
        fn kind(&self) -> DecoderKind {
            DecoderKind::Specific
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::LOGS
        }
        fn scopes(&self) -> Vec<Scope> {
            vec![Scope::Address { address: USDT }]
        }
        fn decode(&self, entry: EntryIndex, ctx: &DecodeContext<'_>) -> Result<DecodeOutcome, DecodeError> {
            let event = CandidateEvent::new(
                ctx.meta,
                ctx.entries[entry.0].order_key(),
                HistoryEventType::Deposit,
                HistoryEventSubType::Fee,
                AssetRef::Token(USDT),
                U256::from(1u64),
                ctx.meta.sender,
            );
            Ok(Decoded::new().event(event).into())
        }
    }

    #[tokio::test]
    async fn entry_errors_alone_make_the_report_partial() {
        let eth = chains::ethereum();
        let mut registry = default_registry(&eth).unwrap();
        registry.register_decoder(Arc::new(MislabeledDeposit)).unwrap();
        let resolver = StaticAssetResolver::new().with_token(&eth, USDT, "USDT", 6);
        let pipeline = TransactionDecodePipeline::new(
            RegistrySet::new().with(&eth, registry.freeze()),
            Arc::new(MemoryReceiptSource::new()),
            Enricher::new(Arc::new(resolver)),
        );
        let tx = FetchedBuilder::new(USER)
            .transfer(USDT, addr(0x42), USER, 2_000_000)
            .build();
        let report = pipeline.decode_fetched(&tx, &tracked()).await.unwrap();
        match report {
            DecodeReport::Partial(p) => {
                assert!(p.unclaimed.is_empty());
                assert!(p.conflicts.is_empty());
                assert_eq!(p.entry_errors.len(), 1);
                assert_eq!(p.entry_errors[0].decoder, "mislabeled-deposit");
                assert_eq!(p.result.events.len(), 1);
                assert_eq!(p.result.events[0].event_type, HistoryEventType::Receive);
            }
            DecodeReport::Complete(_) => panic!("entry errors must make the report partial"),
        }
    }

    #[tokio::test]
    async fn unresolved_token_keeps_the_event() {
        let unknown = addr(0x55);
        let tx = FetchedBuilder::new(USER)
            .transfer(unknown, addr(0x42), USER, 1234)
            .build();
        let report = pipeline(Arc::new(MemoryReceiptSource::new()))
            .decode_fetched(&tx, &tracked())
            .await
            .unwrap();
        let event = &report.events()[0];
        assert_eq!(event.event_subtype, HistoryEventSubType::None);
        assert!(event.display_amount.is_none());
        assert_eq!(
            event.notes,
            format!(
                "Receive 1234 units of {} from {}",
                unknown.to_checksum(None),
                addr(0x42).to_checksum(None)
            )
        );
    }

    #[tokio::test]
    async fn prices_are_attached() {
        let eth = chains::ethereum();
        let resolver = StaticAssetResolver::new().with_token(&eth, USDT, "USDT", 6);
        let oracle = StaticPriceOracle::new()
            .with_price(AssetIdentity::native(&eth).identifier, Decimal::from(2_000))
            .with_price(AssetIdentity::erc20(&eth, USDT, "USDT", 6).identifier, Decimal::ONE);
        let enricher = Enricher::new(Arc::new(resolver)).with_oracle(Arc::new(oracle));
        let p = TransactionDecodePipeline::new(registries(), Arc::new(MemoryReceiptSource::new()), enricher);

        let report = p.decode_fetched(&supply_tx(), &tracked()).await.unwrap();
        let events = report.events();
        assert_eq!(events[0].valuation.value(), Some(Decimal::from(20)));
        assert!(matches!(events[1].valuation, Valuation::Priced { .. }));
        assert_eq!(events[1].valuation.value(), Some(Decimal::from(250)));
    }

    struct StalledFetcher;

    #[async_trait]
    impl ReceiptFetcher for StalledFetcher {
        async fn fetch_receipt(
            &self,
            _tx_hash: B256,
            _chain: &ChainId,
        ) -> Result<FetchedTransaction, FetchError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(FetchError::Timeout { ms: 5_000 })
        }
    }

    #[tokio::test]
    async fn timeout_cancels_the_run() {
        let resolver = StaticAssetResolver::new();
        let p = TransactionDecodePipeline::new(
            registries(),
            Arc::new(StalledFetcher),
            Enricher::new(Arc::new(resolver)),
        );
        let err = p
            .decode_with_timeout(tx_hash(), &chains::ethereum(), &tracked(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { ms: 20, .. }));
    }
}
