//! Generic fungible-token transfer decoder.

use alloy_primitives::B256;
use chainledger_core::{
    asset::AssetRef,
    context::DecodeContext,
    decoder::{Capabilities, DecodeOutcome, Decoded, DecoderKind, ProtocolDecoder, Scope},
    entry::{EntryIndex, TxEntry},
    error::DecodeError,
};

use super::directional_event;
use crate::transfer::{parse_transfer, transfer_topic};

/// Interprets every well-formed `Transfer(address,address,uint256)` log,
/// whoever emitted it. Loses any entry a protocol decoder also claims.
#[derive(Debug, Clone)]
pub struct Erc20TransferDecoder {
    transfer_topic: B256,
}

impl Erc20TransferDecoder {
    pub const NAME: &'static str = "erc20-transfer";

    pub fn new() -> Self {
        Self {
            transfer_topic: transfer_topic(),
        }
    }
}

impl Default for Erc20TransferDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDecoder for Erc20TransferDecoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> DecoderKind {
        DecoderKind::Generic
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::LOGS
    }

    fn scopes(&self) -> Vec<Scope> {
        vec![Scope::Topic {
            topic: self.transfer_topic,
        }]
    }

    fn decode(&self, entry: EntryIndex, ctx: &DecodeContext<'_>) -> Result<DecodeOutcome, DecodeError> {
        let Some(TxEntry::Log(log)) = ctx.entry(entry) else {
            return Ok(DecodeOutcome::NoMatch);
        };
        let Some(transfer) = parse_transfer(entry, log, &self.transfer_topic)? else {
            return Ok(DecodeOutcome::NoMatch);
        };

        let mut decoded = Decoded::new().claim(entry);
        if let Some(event) = directional_event(
            ctx,
            entry,
            AssetRef::Token(transfer.token),
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
    use alloy_primitives::{Address, U256};
    use chainledger_core::taxonomy::HistoryEventType;

    const TOKEN: Address = Address::repeat_byte(0x70);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn single_event(outcome: DecodeOutcome) -> chainledger_core::event::CandidateEvent {
        match outcome {
            DecodeOutcome::Matched(mut d) => {
                assert_eq!(d.events.len(), 1);
                d.events.remove(0)
            }
            DecodeOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn outgoing_transfer_is_spend() {
        let tx = TxBuilder::new().transfer(TOKEN, ALICE, BOB, 100);
        let ev = single_event(tx.decode_at(&Erc20TransferDecoder::new(), 0, &[ALICE]).unwrap());
        assert_eq!(ev.event_type, HistoryEventType::Spend);
        assert_eq!(ev.location_label, ALICE);
        assert_eq!(ev.address, Some(BOB));
        assert_eq!(ev.amount, U256::from(100u64));
    }

    #[test]
    fn both_sides_tracked_is_transfer() {
        let tx = TxBuilder::new().transfer(TOKEN, ALICE, BOB, 1);
        let ev = single_event(tx.decode_at(&Erc20TransferDecoder::new(), 0, &[ALICE, BOB]).unwrap());
        assert_eq!(ev.event_type, HistoryEventType::Transfer);
    }

    #[test]
    fn mint_has_no_counterparty_address() {
        let tx = TxBuilder::new().transfer(TOKEN, Address::ZERO, BOB, 5);
        let ev = single_event(tx.decode_at(&Erc20TransferDecoder::new(), 0, &[BOB]).unwrap());
        assert_eq!(ev.event_type, HistoryEventType::Receive);
        assert_eq!(ev.address, None);
    }

    #[test]
    fn untracked_transfer_is_claimed_silently() {
        let tx = TxBuilder::new().transfer(TOKEN, ALICE, BOB, 5);
        let DecodeOutcome::Matched(d) = tx.decode_at(&Erc20TransferDecoder::new(), 0, &[]).unwrap() else {
            panic!("expected a claim");
        };
        assert!(d.events.is_empty());
        assert_eq!(d.claims, vec![EntryIndex(0)]);
    }

    #[test]
    fn nft_transfer_is_not_claimed() {
        let tx = TxBuilder::new().log(
            TOKEN,
            vec![transfer_topic(), B256::ZERO, B256::ZERO, B256::with_last_byte(1)],
            vec![],
        );
        assert_eq!(
            tx.decode_at(&Erc20TransferDecoder::new(), 0, &[ALICE]).unwrap(),
            DecodeOutcome::NoMatch
        );
    }

    #[test]
    fn corrupt_payload_is_an_error() {
        let tx = TxBuilder::new().log(
            TOKEN,
            vec![transfer_topic(), B256::ZERO, B256::ZERO],
            vec![1, 2, 3],
        );
        assert!(tx.decode_at(&Erc20TransferDecoder::new(), 0, &[ALICE]).is_err());
    }
}
