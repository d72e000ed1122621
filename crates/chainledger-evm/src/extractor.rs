//! `RawLogExtractor`: normalizes a fetched receipt and call trace into the
//! immutable, ordered entry arena.
//!
//! Arena order matches `OrderKey` order: the top-level call value first,
//! then logs by log index, then value-bearing internal calls in trace order.

use alloy_primitives::{Address, B256, U256};
use chainledger_core::{
    chain::ChainId,
    entry::{NativeTransfer, RawLogEntry, TransactionMeta, TxEntry},
    error::ExtractionError,
    source::{FetchedTransaction, RpcInternalCall, RpcLog},
};
use std::collections::BTreeMap;
use tracing::debug;

/// Output of extraction: transaction facts plus the entry arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTransaction {
    pub meta: TransactionMeta,
    pub entries: Vec<TxEntry>,
}

/// Call frames that never move value out of the caller.
const NON_VALUE_CALLS: &[&str] = &["delegatecall", "staticcall", "callcode"];

#[derive(Debug, Default, Clone, Copy)]
pub struct RawLogExtractor;

impl RawLogExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(
        &self,
        fetched: &FetchedTransaction,
        chain: &ChainId,
    ) -> Result<ExtractedTransaction, ExtractionError> {
        let tx_hash = parse_b256("txHash", &fetched.tx_hash)?;
        let sender = parse_address("from", &fetched.from)?;
        let to = fetched
            .to
            .as_deref()
            .map(|t| parse_address("to", t))
            .transpose()?;
        let meta = TransactionMeta {
            tx_hash,
            chain: chain.clone(),
            timestamp: fetched.timestamp,
            sender,
            to,
            gas_used: parse_u64("gasUsed", &fetched.gas_used)?,
            gas_price: parse_u128("effectiveGasPrice", &fetched.effective_gas_price)?,
            success: parse_u64("status", &fetched.status)? == 1,
        };

        let mut entries = Vec::with_capacity(fetched.logs.len() + 1);

        let value = parse_u256("value", &fetched.value)?;
        if meta.success && !value.is_zero() {
            if let Some(recipient) = to {
                entries.push(TxEntry::Native(NativeTransfer {
                    from: sender,
                    to: recipient,
                    amount: value,
                    call_index: 0,
                    depth: 0,
                    tx_hash,
                }));
            }
        }

        let mut logs: BTreeMap<u64, RawLogEntry> = BTreeMap::new();
        for rpc in fetched.logs.iter().filter(|l| !l.removed) {
            let log = parse_log(rpc, tx_hash)?;
            if logs.insert(log.log_index, log).is_some() {
                return Err(ExtractionError::DuplicateLogIndex(parse_u64(
                    "logIndex",
                    &rpc.log_index,
                )?));
            }
        }
        let log_count = logs.len();
        entries.extend(logs.into_values().map(TxEntry::Log));

        let mut internal = 0usize;
        if meta.success {
            for (i, call) in fetched.internal_calls.iter().enumerate() {
                if let Some(transfer) = parse_internal_call(i as u64, call, tx_hash)? {
                    entries.push(TxEntry::Native(transfer));
                    internal += 1;
                }
            }
        }

        debug!(
            tx = %tx_hash,
            chain = %chain,
            logs = log_count,
            internal_transfers = internal,
            "extracted entries"
        );
        Ok(ExtractedTransaction { meta, entries })
    }
}

fn parse_log(rpc: &RpcLog, expected: B256) -> Result<RawLogEntry, ExtractionError> {
    let log_index = parse_u64("logIndex", &rpc.log_index)?;
    let found = parse_b256("transactionHash", &rpc.transaction_hash)?;
    if found != expected {
        return Err(ExtractionError::ForeignLog {
            log_index,
            expected,
            found,
        });
    }
    if rpc.topics.len() > 4 {
        return Err(ExtractionError::TooManyTopics {
            log_index,
            count: rpc.topics.len(),
        });
    }
    let topics = rpc
        .topics
        .iter()
        .map(|t| parse_b256("topics", t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawLogEntry {
        address: parse_address("address", &rpc.address)?,
        topics,
        data: parse_bytes("data", &rpc.data)?,
        log_index,
        tx_hash: expected,
    })
}

/// Depth-0 frames duplicate the top-level value and are skipped.
fn parse_internal_call(
    call_index: u64,
    call: &RpcInternalCall,
    tx_hash: B256,
) -> Result<Option<NativeTransfer>, ExtractionError> {
    if call.depth == 0
        || call.error.is_some()
        || NON_VALUE_CALLS.contains(&call.call_type.to_ascii_lowercase().as_str())
    {
        return Ok(None);
    }
    let amount = parse_u256("value", &call.value)?;
    if amount.is_zero() {
        return Ok(None);
    }
    Ok(Some(NativeTransfer {
        from: parse_address("from", &call.from)?,
        to: parse_address("to", &call.to)?,
        amount,
        call_index,
        depth: call.depth,
        tx_hash,
    }))
}

fn strip(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

fn invalid(field: &str, kind: &'static str, value: &str) -> ExtractionError {
    ExtractionError::InvalidValue {
        field: field.to_string(),
        kind,
        value: value.to_string(),
    }
}

fn parse_u64(field: &str, value: &str) -> Result<u64, ExtractionError> {
    u64::from_str_radix(strip(value), 16).map_err(|_| invalid(field, "quantity", value))
}

fn parse_u128(field: &str, value: &str) -> Result<u128, ExtractionError> {
    u128::from_str_radix(strip(value), 16).map_err(|_| invalid(field, "quantity", value))
}

fn parse_u256(field: &str, value: &str) -> Result<U256, ExtractionError> {
    U256::from_str_radix(strip(value), 16).map_err(|_| invalid(field, "quantity", value))
}

fn parse_address(field: &str, value: &str) -> Result<Address, ExtractionError> {
    value.parse().map_err(|_| invalid(field, "address", value))
}

fn parse_b256(field: &str, value: &str) -> Result<B256, ExtractionError> {
    value.parse().map_err(|_| invalid(field, "hash", value))
}

fn parse_bytes(field: &str, value: &str) -> Result<Vec<u8>, ExtractionError> {
    hex::decode(strip(value)).map_err(|_| ExtractionError::InvalidHex {
        field: field.to_string(),
        value: value.to_string(),
    })
}
