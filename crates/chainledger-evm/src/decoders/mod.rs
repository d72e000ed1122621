//! The built-in decoder catalog.
//!
//! Generic decoders interpret plain value movements; protocol decoders
//! interpret their own contracts' logs and claim the transfers those logs
//! explain. [`default_registry`] wires the catalog for one chain.

pub mod aave_v3;
pub mod compound_v3;
pub mod erc20;
pub mod gas;
pub mod native;
pub mod safe;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use chainledger_core::{
    asset::AssetRef,
    chain::ChainId,
    context::DecodeContext,
    entry::EntryIndex,
    error::RegistryError,
    event::CandidateEvent,
    taxonomy::{HistoryEventSubType, HistoryEventType},
};
use chainledger_registry::DecoderRegistry;
use tracing::info;

pub use aave_v3::{AaveV3Decoder, AaveV3Deployment};
pub use compound_v3::{CometMarket, CompoundV3Decoder, CompoundV3Deployment};
pub use erc20::Erc20TransferDecoder;
pub use gas::GasFeeDecoder;
pub use native::NativeTransferDecoder;
pub use safe::SafeExecutionDecoder;

/// Build the plain event for a value movement as seen by the tracked side.
///
/// `None` when the amount is zero or neither side is tracked.
pub(crate) fn directional_event(
    ctx: &DecodeContext<'_>,
    entry: EntryIndex,
    asset: AssetRef,
    from: Address,
    to: Address,
    amount: U256,
) -> Option<CandidateEvent> {
    if amount.is_zero() {
        return None;
    }
    let from_tracked = from != Address::ZERO && ctx.is_tracked(&from);
    let to_tracked = to != Address::ZERO && ctx.is_tracked(&to);
    let (event_type, actor, other) = match (from_tracked, to_tracked) {
        (true, true) => (HistoryEventType::Transfer, from, to),
        (true, false) => (HistoryEventType::Spend, from, to),
        (false, true) => (HistoryEventType::Receive, to, from),
        (false, false) => return None,
    };
    let order_key = ctx.entry(entry)?.order_key();
    let event = CandidateEvent::new(
        ctx.meta,
        order_key,
        event_type,
        HistoryEventSubType::None,
        asset,
        amount,
        actor,
    );
    Some(if other == Address::ZERO {
        event
    } else {
        event.with_address(other)
    })
}

/// Registry with every built-in decoder available on `chain`.
///
/// Protocol decoders are registered first so they precede the generic
/// ones when claims are merged.
pub fn default_registry(chain: &ChainId) -> Result<DecoderRegistry, RegistryError> {
    let mut registry = DecoderRegistry::new();
    registry.register_decoder(Arc::new(GasFeeDecoder::new()))?;
    if let Some(aave) = AaveV3Decoder::for_chain(chain) {
        registry.register_decoder(Arc::new(aave))?;
    }
    if let Some(compound) = CompoundV3Decoder::for_chain(chain) {
        registry.register_decoder(Arc::new(compound))?;
    }
    registry.register_decoder(Arc::new(SafeExecutionDecoder::new()))?;
    registry.register_decoder(Arc::new(Erc20TransferDecoder::new()))?;
    registry.register_decoder(Arc::new(NativeTransferDecoder::new()))?;
    info!(chain = %chain, decoders = registry.len(), "built default decoder registry");
    Ok(registry)
}
