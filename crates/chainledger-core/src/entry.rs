//! Raw per-transaction entries: event logs and native-currency transfers.
//!
//! Entries are produced once per fetch by the extractor and stored in an
//! immutable arena. Everything downstream refers to them by [`EntryIndex`].

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::ChainId;

/// Position of an entry inside a transaction's entry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryIndex(pub usize);

impl fmt::Display for EntryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One event log emitted during the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogEntry {
    /// Contract that emitted the log
    pub address: Address,
    /// topics[0] is the event signature hash; topics[1..] are indexed params
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed params, undecoded
    pub data: Vec<u8>,
    /// Log index within the transaction receipt
    pub log_index: u64,
    pub tx_hash: B256,
}

impl RawLogEntry {
    /// The event signature hash, if present.
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }

    pub fn topic(&self, i: usize) -> Option<&B256> {
        self.topics.get(i)
    }
}

/// A movement of the chain's native currency, taken from the call trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTransfer {
    pub from: Address,
    pub to: Address,
    /// Amount in the native currency's smallest unit
    pub amount: U256,
    /// Position of the originating call in trace order (0 = top-level call)
    pub call_index: u64,
    /// Call depth; the top-level transaction value has depth 0
    pub depth: u32,
    pub tx_hash: B256,
}

/// A single raw entry in the arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxEntry {
    Log(RawLogEntry),
    Native(NativeTransfer),
}

impl TxEntry {
    pub fn as_log(&self) -> Option<&RawLogEntry> {
        match self {
            TxEntry::Log(l) => Some(l),
            TxEntry::Native(_) => None,
        }
    }

    pub fn as_native(&self) -> Option<&NativeTransfer> {
        match self {
            TxEntry::Native(n) => Some(n),
            TxEntry::Log(_) => None,
        }
    }

    /// The provisional ordering key every event derived from this entry inherits.
    pub fn order_key(&self) -> OrderKey {
        match self {
            TxEntry::Log(l) => OrderKey::new(OrderGroup::Log, l.log_index),
            TxEntry::Native(n) if n.depth == 0 => {
                OrderKey::new(OrderGroup::TopLevelValue, n.call_index)
            }
            TxEntry::Native(n) => OrderKey::new(OrderGroup::InternalCall, n.call_index),
        }
    }

    /// Address used for registry lookup: the emitter for logs, the recipient for transfers.
    pub fn lookup_address(&self) -> Address {
        match self {
            TxEntry::Log(l) => l.address,
            TxEntry::Native(n) => n.to,
        }
    }

    pub fn lookup_topic(&self) -> Option<B256> {
        match self {
            TxEntry::Log(l) => l.topic0().copied(),
            TxEntry::Native(_) => None,
        }
    }
}

/// Ordering buckets. The gas bucket is reserved for the synthesized fee event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderGroup {
    Gas,
    TopLevelValue,
    Log,
    InternalCall,
}

/// Provisional ordering key of a candidate event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub group: OrderGroup,
    pub index: u64,
}

impl OrderKey {
    pub const GAS: OrderKey = OrderKey { group: OrderGroup::Gas, index: 0 };

    pub fn new(group: OrderGroup, index: u64) -> Self {
        Self { group, index }
    }
}

/// Transaction-level facts shared by every entry of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMeta {
    pub tx_hash: B256,
    pub chain: ChainId,
    /// Block timestamp (Unix seconds, UTC)
    pub timestamp: i64,
    pub sender: Address,
    pub to: Option<Address>,
    pub gas_used: u64,
    /// Effective gas price in the native smallest unit
    pub gas_price: u128,
    /// Whether the transaction executed successfully
    pub success: bool,
}

impl TransactionMeta {
    /// Fee paid by the sender in the native smallest unit.
    pub fn fee(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.gas_price)
    }

    pub fn block_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.timestamp, 0)
    }
}
