//! Generic native-currency transfer decoder.

use chainledger_core::{
    asset::AssetRef,
    context::DecodeContext,
    decoder::{Capabilities, DecodeOutcome, Decoded, DecoderKind, ProtocolDecoder, Scope},
    entry::{EntryIndex, TxEntry},
    error::DecodeError,
};

use super::directional_event;

/// Interprets value movements taken from the call trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTransferDecoder;

impl NativeTransferDecoder {
    pub const NAME: &'static str = "native-transfer";

    pub fn new() -> Self {
        Self
    }
}

impl ProtocolDecoder for NativeTransferDecoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> DecoderKind {
        DecoderKind::Generic
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TRANSFERS
    }

    fn scopes(&self) -> Vec<Scope> {
        vec![Scope::Global]
    }

    fn decode(&self, entry: EntryIndex, ctx: &DecodeContext<'_>) -> Result<DecodeOutcome, DecodeError> {
        let Some(TxEntry::Native(transfer)) = ctx.entry(entry) else {
            return Ok(DecodeOutcome::NoMatch);
        };
        let mut decoded = Decoded::new().claim(entry);
        if let Some(event) = directional_event(
            ctx,
            entry,
            AssetRef::Native,
            transfer.from,
            transfer.to,
            transfer.amount,
        ) {
            decoded = decoded.event(event);
        }
        Ok(decoded.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::testing::TxBuilder;
    use alloy_primitives::Address;
    use chainledger_core::{entry::OrderGroup, taxonomy::HistoryEventType};

    #[test]
    fn incoming_internal_value_is_receive() {
        let alice = Address::repeat_byte(0xa1);
        let contract = Address::repeat_byte(0xcc);
        let tx = TxBuilder::new().native(contract, alice, 7, 2);
        let DecodeOutcome::Matched(d) = tx.decode_at(&NativeTransferDecoder, 0, &[alice]).unwrap() else {
            panic!("expected a match");
        };
        let ev = &d.events[0];
        assert_eq!(ev.event_type, HistoryEventType::Receive);
        assert_eq!(ev.asset.asset_ref(), AssetRef::Native);
        assert_eq!(ev.order_key.group, OrderGroup::InternalCall);
        assert_eq!(ev.address, Some(contract));
    }

    #[test]
    fn logs_are_not_native_transfers() {
        let tx = TxBuilder::new().log(Address::ZERO, vec![], vec![]);
        assert_eq!(
            tx.decode_at(&NativeTransferDecoder, 0, &[]).unwrap(),
            DecodeOutcome::NoMatch
        );
    }
}
