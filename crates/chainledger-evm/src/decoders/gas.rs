//! Native gas fee synthesis.

use alloy_primitives::Address;
use chainledger_core::{
    asset::AssetRef,
    context::DecodeContext,
    decoder::{Capabilities, DecodeOutcome, Decoded, DecoderKind, ProtocolDecoder, Scope},
    entry::OrderKey,
    error::DecodeError,
    event::CandidateEvent,
    taxonomy::{Counterparty, HistoryEventSubType, HistoryEventType},
};

/// Emits `SPEND/FEE` for the fee paid by a tracked sender. Runs once per
/// transaction and claims no entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct GasFeeDecoder;

impl GasFeeDecoder {
    pub const NAME: &'static str = "gas";

    pub fn new() -> Self {
        Self
    }
}

impl ProtocolDecoder for GasFeeDecoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> DecoderKind {
        DecoderKind::Specific
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TRANSACTION
    }

    fn counterparty(&self) -> Option<Counterparty> {
        Some(Counterparty::Gas)
    }

    fn scopes(&self) -> Vec<Scope> {
        vec![Scope::Global]
    }

    fn decode_transaction(&self, ctx: &DecodeContext<'_>) -> Result<DecodeOutcome, DecodeError> {
        let meta = ctx.meta;
        let fee = meta.fee();
        if fee.is_zero() || meta.sender == Address::ZERO || !ctx.is_tracked(&meta.sender) {
            return Ok(DecodeOutcome::NoMatch);
        }
        let event = CandidateEvent::new(
            meta,
            OrderKey::GAS,
            HistoryEventType::Spend,
            HistoryEventSubType::Fee,
            AssetRef::Native,
            fee,
            meta.sender,
        )
        .with_counterparty(Counterparty::Gas);
        Ok(Decoded::new().event(event).into())
    }
}
