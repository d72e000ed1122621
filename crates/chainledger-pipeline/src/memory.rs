//! In-memory collaborators: receipt source, asset resolver, price oracle.
//!
//! Used by tests, demos, and benches in place of a node, a token list, and
//! a price feed.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use chainledger_core::{
    asset::AssetIdentity,
    chain::ChainId,
    error::{AssetResolutionError, FetchError, PriceUnavailableError},
    source::{AssetResolver, FetchedTransaction, PriceOracle, ReceiptFetcher},
};
use rust_decimal::Decimal;
use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicUsize, Ordering},
};
use tokio::sync::Mutex;

/// Receipt source over a fixed set of fetched transactions.
///
/// Failures queued with [`fail_next`](Self::fail_next) are returned, in
/// order, before any lookup happens.
#[derive(Debug, Default)]
pub struct MemoryReceiptSource {
    receipts: HashMap<(String, String), FetchedTransaction>,
    failures: Mutex<VecDeque<FetchError>>,
    fetches: AtomicUsize,
}

impl MemoryReceiptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction(mut self, tx: FetchedTransaction) -> Self {
        let key = (tx.chain.clone(), tx.tx_hash.to_lowercase());
        self.receipts.insert(key, tx);
        self
    }

    pub async fn fail_next(&self, error: FetchError) {
        self.failures.lock().await.push_back(error);
    }

    /// Number of fetch calls so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}

#[async_trait]
impl ReceiptFetcher for MemoryReceiptSource {
    async fn fetch_receipt(
        &self,
        tx_hash: B256,
        chain: &ChainId,
    ) -> Result<FetchedTransaction, FetchError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }
        self.receipts
            .get(&(chain.slug.clone(), format!("{tx_hash:#x}")))
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                tx_hash,
                chain: chain.slug.clone(),
            })
    }
}

/// Token table keyed by `(chain slug, contract)`.
#[derive(Debug, Default)]
pub struct StaticAssetResolver {
    tokens: HashMap<(String, Address), AssetIdentity>,
    lookups: AtomicUsize,
}

impl StaticAssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(
        mut self,
        chain: &ChainId,
        address: Address,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Self {
        let identity = AssetIdentity::erc20(chain, address, symbol, decimals);
        self.tokens.insert((chain.slug.clone(), address), identity);
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AssetResolver for StaticAssetResolver {
    async fn resolve_asset(
        &self,
        chain: &ChainId,
        address: Address,
    ) -> Result<AssetIdentity, AssetResolutionError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.tokens
            .get(&(chain.slug.clone(), address))
            .cloned()
            .ok_or_else(|| AssetResolutionError::UnknownAsset {
                chain: chain.slug.clone(),
                address,
            })
    }
}

/// Flat price table keyed by asset identifier; timestamps are ignored.
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    prices: HashMap<String, Decimal>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, identifier: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(identifier.into(), price);
        self
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn historical_price(
        &self,
        asset: &AssetIdentity,
        timestamp: i64,
    ) -> Result<Decimal, PriceUnavailableError> {
        self.prices
            .get(&asset.identifier)
            .copied()
            .ok_or_else(|| PriceUnavailableError {
                asset: asset.identifier.clone(),
                timestamp,
                reason: "not in price table".into(),
            })
    }
}
