//! ERC-20 `Transfer` parsing and the fan-in search protocol decoders use to
//! pair their own logs with the token movements they explain.

use alloy_core::dyn_abi::DynSolType;
use alloy_primitives::{Address, B256, U256};
use chainledger_core::{
    context::DecodeContext,
    entry::{EntryIndex, RawLogEntry},
    error::DecodeError,
};

use crate::abi::{topic_address, LogData};
use crate::fingerprint::{keccak256_signature, signatures};

/// A well-formed fungible token transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTransfer {
    pub entry: EntryIndex,
    pub log_index: u64,
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

impl TokenTransfer {
    pub fn is_mint(&self) -> bool {
        self.from == Address::ZERO
    }

    pub fn is_burn(&self) -> bool {
        self.to == Address::ZERO
    }
}

/// Returns the topic hash of `Transfer(address,address,uint256)`.
pub fn transfer_topic() -> B256 {
    keccak256_signature(signatures::ERC20_TRANSFER)
}

/// Parse a log as a fungible transfer.
///
/// `Ok(None)` when the log is not a fungible transfer at all (other
/// signature, or ERC-721 style with the token id as a fourth topic).
pub fn parse_transfer(
    entry: EntryIndex,
    log: &RawLogEntry,
    topic: &B256,
) -> Result<Option<TokenTransfer>, DecodeError> {
    if log.topic0() != Some(topic) || log.topics.len() != 3 {
        return Ok(None);
    }
    let from = topic_address(log, 1)?;
    let to = topic_address(log, 2)?;
    let amount = LogData::decode(&log.data, &[DynSolType::Uint(256)])?.uint(0, "value")?;
    Ok(Some(TokenTransfer {
        entry,
        log_index: log.log_index,
        token: log.address,
        from,
        to,
        amount,
    }))
}

/// Transfers a protocol decoder may still pair with its own log: well formed,
/// inside `(after, before)` by log index, and not yet claimed by another
/// protocol decoder. Malformed transfers are skipped here; the generic
/// transfer decoder reports them.
pub fn candidate_transfers(
    ctx: &DecodeContext<'_>,
    topic: &B256,
    after: Option<u64>,
    before: u64,
) -> Vec<TokenTransfer> {
    ctx.logs()
        .filter(|(_, log)| log.log_index < before && after.map_or(true, |a| log.log_index > a))
        .filter(|(idx, _)| !ctx.is_claimed_by_protocol(*idx))
        .filter_map(|(idx, log)| parse_transfer(idx, log, topic).ok().flatten())
        .collect()
}

/// Last matching transfer, i.e. the one closest to the protocol log.
pub fn find_last(
    transfers: &[TokenTransfer],
    taken: &[EntryIndex],
    pred: impl Fn(&TokenTransfer) -> bool,
) -> Option<TokenTransfer> {
    transfers
        .iter()
        .rev()
        .find(|t| !taken.contains(&t.entry) && pred(t))
        .copied()
}
