//! Error types for the ChainLedger decode pipeline.

use alloy_primitives::{Address, B256};
use thiserror::Error;

use crate::asset::AssetRef;
use crate::entry::EntryIndex;

/// A decoder claimed an entry (signature matched) but could not interpret it.
/// Always scoped to one decoder and one entry; never aborts the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected at least {expected} topics, found {found}")]
    MissingTopic { expected: usize, found: usize },

    #[error("topic {index} is not a left-padded address")]
    MalformedAddressTopic { index: usize },

    #[error("ABI decode failed: {reason}")]
    AbiDecodeFailed { reason: String },

    #[error("Type mismatch in field '{field}': expected {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Normalizing a fetched receipt into entries failed. Fatal for the
/// transaction: nothing is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Invalid hex in field '{field}': {value}")]
    InvalidHex { field: String, value: String },

    #[error("Invalid {kind} in field '{field}': {value}")]
    InvalidValue {
        field: String,
        kind: &'static str,
        value: String,
    },

    #[error("Log at index {log_index} belongs to {found}, expected {expected}")]
    ForeignLog {
        log_index: u64,
        expected: B256,
        found: B256,
    },

    #[error("Duplicate log index {0}")]
    DuplicateLogIndex(u64),

    #[error("Log {log_index} has {count} topics (max 4)")]
    TooManyTopics { log_index: u64, count: usize },
}

/// Fetching the receipt or trace failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("Fetch timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Transaction {tx_hash} not found on {chain}")]
    NotFound { tx_hash: B256, chain: String },
}

impl FetchError {
    /// Returns `true` if retrying the same fetch may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }
}

/// The asset resolver does not know a token. Degrades the event to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetResolutionError {
    #[error("Unknown asset {address} on {chain}")]
    UnknownAsset { chain: String, address: Address },

    #[error("Asset metadata lookup failed: {0}")]
    Lookup(String),
}

/// No historical price for an asset at a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No price for {asset} at {timestamp}: {reason}")]
pub struct PriceUnavailableError {
    pub asset: String,
    pub timestamp: i64,
    pub reason: String,
}

/// Registry construction failed. Raised at startup, never during decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Decoders '{existing}' and '{incoming}' both claim {scope} as protocol-specific")]
    Conflict {
        existing: String,
        incoming: String,
        scope: String,
    },

    #[error("Decoder '{name}' declares no scopes")]
    EmptyScopes { name: String },

    #[error("No registry configured for chain '{chain}'")]
    UnknownChain { chain: String },
}

/// Candidate failed taxonomy or content validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEventError {
    #[error("Subtype '{subtype}' is not allowed for type '{event_type}'")]
    InvalidPair { event_type: String, subtype: String },

    #[error("Event has zero balance and no informational content")]
    Empty,

    #[error("Event does not reference any claimed entry of asset {asset}")]
    Orphan { asset: AssetRef },
}

/// Pipeline-wide failures for one transaction.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Fetch failed after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: FetchError,
    },

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Decode of {tx_hash} cancelled after {ms}ms")]
    Cancelled { tx_hash: B256, ms: u64 },

    #[error("Result store error: {0}")]
    Store(String),

    #[error("Worker pool closed")]
    PoolClosed,
}

/// A decoder failure recorded in a partial result.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntryError {
    /// `None` when a transaction-level decoder produced the failure.
    pub entry: Option<EntryIndex>,
    pub decoder: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_retryability() {
        assert!(FetchError::Transport("connection reset".into()).is_retryable());
        assert!(FetchError::Timeout { ms: 5000 }.is_retryable());
        assert!(!FetchError::Rpc { code: -32000, message: "execution reverted".into() }
            .is_retryable());
        assert!(!FetchError::NotFound { tx_hash: B256::ZERO, chain: "ethereum".into() }
            .is_retryable());
    }

    #[test]
    fn conflict_message_names_both_decoders() {
        let err = RegistryError::Conflict {
            existing: "aave-v3".into(),
            incoming: "fork".into(),
            scope: "topic 0xabc".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("aave-v3") && msg.contains("fork"));
    }
}
