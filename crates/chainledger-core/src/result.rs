//! Per-transaction decode results.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::entry::EntryIndex;
use crate::error::EntryError;
use crate::event::HistoryEvent;

/// Final ordered events of one transaction. Rebuilt from scratch on every
/// decode; never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTransactionResult {
    pub tx_hash: B256,
    pub chain: String,
    pub events: Vec<HistoryEvent>,
}

impl DecodedTransactionResult {
    /// Canonical JSON encoding; two decodes of the same input compare equal here.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// An entry no accepted decoder claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnclaimedEntry {
    pub entry: EntryIndex,
    /// `log:<index>` or `call:<index>`
    pub position: String,
    pub topic0: Option<B256>,
}

/// Two protocol-specific decoders produced overlapping claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConflict {
    pub entry: EntryIndex,
    /// Decoder whose claim was kept
    pub kept: String,
    pub dropped: String,
}

/// Result plus everything that kept it from being complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResult {
    pub result: DecodedTransactionResult,
    pub unclaimed: Vec<UnclaimedEntry>,
    pub entry_errors: Vec<EntryError>,
    pub conflicts: Vec<DecoderConflict>,
}

/// Outcome of one pipeline run.
///
/// `Partial` whenever any entry is unclaimed, any decoder recorded an
/// [`EntryError`], or two decoders conflicted over an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecodeReport {
    /// Every raw entry was claimed with no errors or conflicts
    Complete(DecodedTransactionResult),
    Partial(PartialResult),
}

impl DecodeReport {
    pub fn result(&self) -> &DecodedTransactionResult {
        match self {
            DecodeReport::Complete(r) => r,
            DecodeReport::Partial(p) => &p.result,
        }
    }

    pub fn into_result(self) -> DecodedTransactionResult {
        match self {
            DecodeReport::Complete(r) => r,
            DecodeReport::Partial(p) => p.result,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, DecodeReport::Complete(_))
    }

    pub fn events(&self) -> &[HistoryEvent] {
        &self.result().events
    }
}
