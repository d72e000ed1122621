//! Safe multisig execution decoder.

use alloy_core::dyn_abi::DynSolType;
use alloy_primitives::{B256, U256};
use chainledger_core::{
    asset::AssetRef,
    context::DecodeContext,
    decoder::{Capabilities, DecodeOutcome, Decoded, DecoderKind, ProtocolDecoder, Scope},
    entry::{EntryIndex, OrderGroup, OrderKey, TxEntry},
    error::DecodeError,
    event::CandidateEvent,
    taxonomy::{Counterparty, HistoryEventSubType, HistoryEventType},
};

use crate::abi::LogData;
use crate::fingerprint::{keccak256_signature, signatures};

/// `ExecutionSuccess(bytes32 txHash, uint256 payment)` from any Safe proxy.
#[derive(Debug, Clone)]
pub struct SafeExecutionDecoder {
    execution_success: B256,
}

impl SafeExecutionDecoder {
    pub const NAME: &'static str = "safe-multisig";

    pub fn new() -> Self {
        Self {
            execution_success: keccak256_signature(signatures::SAFE_EXECUTION_SUCCESS),
        }
    }
}

impl Default for SafeExecutionDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDecoder for SafeExecutionDecoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> DecoderKind {
        DecoderKind::Specific
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::LOGS
    }

    fn counterparty(&self) -> Option<Counterparty> {
        Some(Counterparty::SafeMultisig)
    }

    fn scopes(&self) -> Vec<Scope> {
        vec![Scope::Topic {
            topic: self.execution_success,
        }]
    }

    fn decode(&self, entry: EntryIndex, ctx: &DecodeContext<'_>) -> Result<DecodeOutcome, DecodeError> {
        let Some(TxEntry::Log(log)) = ctx.entry(entry) else {
            return Ok(DecodeOutcome::NoMatch);
        };
        if log.topic0() != Some(&self.execution_success) {
            return Ok(DecodeOutcome::NoMatch);
        }
        let data = LogData::decode(&log.data, &[DynSolType::FixedBytes(32), DynSolType::Uint(256)])?;
        let safe_tx_hash = data.word(0, "txHash")?;

        let multisig = log.address;
        let sender = ctx.meta.sender;
        let actor = if ctx.is_tracked(&sender) {
            sender
        } else if ctx.is_tracked(&multisig) {
            multisig
        } else {
            return Ok(Decoded::new().claim(entry).into());
        };

        let event = CandidateEvent::new(
            ctx.meta,
            OrderKey::new(OrderGroup::Log, log.log_index),
            HistoryEventType::Informational,
            HistoryEventSubType::None,
            AssetRef::Native,
            U256::ZERO,
            actor,
        )
        .with_counterparty(Counterparty::SafeMultisig)
        .with_address(multisig)
        .with_extra("safe_tx_hash", format!("{safe_tx_hash:#x}"));
        Ok(Decoded::new().claim(entry).event(event).into())
    }
}
