//! Asset resolution and price attachment.

use alloy_primitives::Address;
use chainledger_core::{
    asset::{format_units, AssetIdentity, AssetRef, AssetState, Valuation},
    event::CandidateEvent,
    source::{AssetResolver, PriceOracle},
};
use rust_decimal::Decimal;
use std::{collections::HashMap, str::FromStr, sync::Arc};
use tracing::debug;

/// Resolves every event's asset and, when enabled, attaches a valuation.
///
/// Resolution and pricing failures never fail the transaction: the event
/// keeps its placeholder asset or an `Unavailable` valuation.
#[derive(Clone)]
pub struct Enricher {
    resolver: Arc<dyn AssetResolver>,
    oracle: Option<Arc<dyn PriceOracle>>,
    attach_prices: bool,
}

impl Enricher {
    pub fn new(resolver: Arc<dyn AssetResolver>) -> Self {
        Self {
            resolver,
            oracle: None,
            attach_prices: false,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn PriceOracle>) -> Self {
        self.oracle = Some(oracle);
        self.attach_prices = true;
        self
    }

    pub fn attach_prices(mut self, enabled: bool) -> Self {
        self.attach_prices = enabled;
        self
    }

    pub fn prices_enabled(&self) -> bool {
        self.attach_prices && self.oracle.is_some()
    }

    /// Resolve assets, then price. Each token is looked up at most once per call.
    pub async fn enrich(&self, events: &mut [CandidateEvent]) {
        let mut cache: HashMap<Address, Result<AssetIdentity, String>> = HashMap::new();

        for event in events.iter_mut() {
            let asset = event.asset.asset_ref();
            event.asset = match asset {
                AssetRef::Native => AssetState::Resolved {
                    asset,
                    identity: AssetIdentity::native(&event.chain),
                },
                AssetRef::Token(address) => {
                    if !cache.contains_key(&address) {
                        let resolved = self
                            .resolver
                            .resolve_asset(&event.chain, address)
                            .await
                            .map_err(|e| e.to_string());
                        if let Err(reason) = &resolved {
                            debug!(%address, chain = %event.chain, %reason, "asset unresolved");
                        }
                        cache.insert(address, resolved);
                    }
                    match cache.get(&address) {
                        Some(Ok(identity)) => AssetState::Resolved {
                            asset,
                            identity: identity.clone(),
                        },
                        Some(Err(reason)) => AssetState::Unresolved {
                            asset,
                            reason: reason.clone(),
                        },
                        None => AssetState::pending(asset),
                    }
                }
            };
        }

        if let (true, Some(oracle)) = (self.attach_prices, &self.oracle) {
            for event in events.iter_mut() {
                event.valuation = valuate(oracle.as_ref(), event).await;
            }
        }
    }
}

async fn valuate(oracle: &dyn PriceOracle, event: &CandidateEvent) -> Valuation {
    let Some(identity) = event.asset.identity() else {
        return Valuation::NotRequested;
    };
    if event.is_informational() {
        return Valuation::NotRequested;
    }
    let price = match oracle.historical_price(identity, event.timestamp).await {
        Ok(price) => price,
        Err(e) => {
            debug!(asset = %identity.identifier, error = %e, "price unavailable");
            return Valuation::Unavailable {
                reason: e.to_string(),
            };
        }
    };
    let units = format_units(event.amount, identity.decimals);
    let value = Decimal::from_str(&units)
        .ok()
        .and_then(|amount| amount.checked_mul(price));
    match value {
        Some(value) => Valuation::Priced { price, value },
        None => Valuation::Unavailable {
            reason: format!("amount {units} out of valuation range"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{StaticAssetResolver, StaticPriceOracle};
    use alloy_primitives::{B256, U256};
    use chainledger_core::{
        chain::chains,
        entry::{OrderKey, TransactionMeta},
        taxonomy::{HistoryEventSubType as S, HistoryEventType as T},
    };

    fn meta() -> TransactionMeta {
        TransactionMeta {
            tx_hash: B256::ZERO,
            chain: chains::ethereum(),
            timestamp: 1_700_000_000,
            sender: Address::repeat_byte(1),
            to: None,
            gas_used: 0,
            gas_price: 0,
            success: true,
        }
    }

    fn event(asset: AssetRef, amount: U256) -> CandidateEvent {
        CandidateEvent::new(&meta(), OrderKey::GAS, T::Spend, S::None, asset, amount, Address::repeat_byte(1))
    }

    fn usdt() -> Address {
        Address::repeat_byte(0xd1)
    }

    fn resolver() -> Arc<StaticAssetResolver> {
        Arc::new(StaticAssetResolver::new().with_token(&chains::ethereum(), usdt(), "USDT", 6))
    }

    #[tokio::test]
    async fn resolves_native_and_tokens_once() {
        let resolver = resolver();
        let enricher = Enricher::new(resolver.clone());
        let mut events = vec![
            event(AssetRef::Native, U256::from(1u64)),
            event(AssetRef::Token(usdt()), U256::from(5u64)),
            event(AssetRef::Token(usdt()), U256::from(6u64)),
            event(AssetRef::Token(Address::repeat_byte(0x77)), U256::from(7u64)),
        ];
        enricher.enrich(&mut events).await;

        assert_eq!(events[0].asset.identity().unwrap().symbol, "ETH");
        assert_eq!(events[1].asset.identity().unwrap().symbol, "USDT");
        assert!(events[2].asset.is_resolved());
        assert!(matches!(events[3].asset, AssetState::Unresolved { .. }));
        assert_eq!(resolver.lookup_count(), 2);
        assert!(events.iter().all(|e| e.valuation == Valuation::NotRequested));
    }

    #[tokio::test]
    async fn attaches_prices() {
        let eth = chains::ethereum();
        let oracle = StaticPriceOracle::new()
            .with_price(AssetIdentity::native(&eth).identifier, Decimal::from(3_000))
            .with_price(
                AssetIdentity::erc20(&eth, usdt(), "USDT", 6).identifier,
                Decimal::ONE,
            );
        let enricher = Enricher::new(resolver()).with_oracle(Arc::new(oracle));
        let mut events = vec![
            event(AssetRef::Native, U256::from(10_000_000_000_000_000u64)),
            event(AssetRef::Token(usdt()), U256::from(2_500_000u64)),
            event(AssetRef::Token(Address::repeat_byte(0x77)), U256::from(7u64)),
        ];
        enricher.enrich(&mut events).await;

        assert_eq!(events[0].valuation.value(), Some(Decimal::from(30)));
        assert_eq!(events[1].valuation.value(), Decimal::from_str("2.5").ok());
        assert_eq!(events[2].valuation, Valuation::NotRequested);
    }

    #[tokio::test]
    async fn missing_price_is_unavailable() {
        let enricher = Enricher::new(resolver()).with_oracle(Arc::new(StaticPriceOracle::new()));
        let mut events = vec![event(AssetRef::Token(usdt()), U256::from(1u64))];
        enricher.enrich(&mut events).await;
        assert!(matches!(events[0].valuation, Valuation::Unavailable { .. }));
    }

    #[tokio::test]
    async fn prices_can_be_disabled() {
        let enricher = Enricher::new(resolver())
            .with_oracle(Arc::new(StaticPriceOracle::new()))
            .attach_prices(false);
        assert!(!enricher.prices_enabled());
        let mut events = vec![event(AssetRef::Token(usdt()), U256::from(1u64))];
        enricher.enrich(&mut events).await;
        assert_eq!(events[0].valuation, Valuation::NotRequested);
    }

    #[tokio::test]
    async fn oversized_amount_is_unavailable() {
        let eth = chains::ethereum();
        let oracle = StaticPriceOracle::new()
            .with_price(AssetIdentity::native(&eth).identifier, Decimal::ONE);
        let enricher = Enricher::new(resolver()).with_oracle(Arc::new(oracle));
        let mut events = vec![event(AssetRef::Native, U256::MAX)];
        enricher.enrich(&mut events).await;
        assert!(matches!(events[0].valuation, Valuation::Unavailable { .. }));
    }
}
