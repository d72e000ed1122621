//! The `ProtocolDecoder` trait: the pluggable unit of the decoder catalog.
//!
//! A decoder owns a set of contract addresses and/or event signatures and
//! turns matching raw entries into candidate events. Decoders are stored as
//! `Arc<dyn ProtocolDecoder>` inside an immutable registry and shared across
//! worker tasks and rayon threads, so implementations must be `Send + Sync`
//! and must not keep per-transaction state.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::DecodeContext;
use crate::entry::EntryIndex;
use crate::error::DecodeError;
use crate::event::CandidateEvent;
use crate::taxonomy::Counterparty;

/// Where a decoder is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    /// Offered every entry (and every transaction, for transaction-level decoders)
    Global,
    /// Every entry emitted by (or sent to) one contract
    Address { address: Address },
    /// One event signature from one contract
    AddressTopic { address: Address, topic: B256 },
    /// One event signature from any contract
    Topic { topic: B256 },
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Address { address } => write!(f, "address {address}"),
            Scope::AddressTopic { address, topic } => write!(f, "address {address} topic {topic}"),
            Scope::Topic { topic } => write!(f, "topic {topic}"),
        }
    }
}

/// Merge precedence class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderKind {
    /// Fallback interpretation (plain transfers); loses every contested entry
    Generic,
    /// Protocol-specific interpretation
    Specific,
}

/// Which kinds of input a decoder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub logs: bool,
    pub transfers: bool,
    /// Invoked once per transaction rather than per entry
    pub transaction: bool,
}

impl Capabilities {
    pub const LOGS: Self = Self { logs: true, transfers: false, transaction: false };
    pub const TRANSFERS: Self = Self { logs: false, transfers: true, transaction: false };
    pub const TRANSACTION: Self = Self { logs: false, transfers: false, transaction: true };
    pub const LOGS_AND_TRANSFERS: Self = Self { logs: true, transfers: true, transaction: false };
}

/// A successful interpretation: events plus the entries they consumed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub events: Vec<CandidateEvent>,
    pub claims: Vec<EntryIndex>,
}

impl Decoded {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(mut self, idx: EntryIndex) -> Self {
        if !self.claims.contains(&idx) {
            self.claims.push(idx);
        }
        self
    }

    pub fn event(mut self, event: CandidateEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// Outcome of offering one entry to one decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// The decoder's pattern did not apply. Not an error.
    NoMatch,
    Matched(Decoded),
}

impl From<Decoded> for DecodeOutcome {
    fn from(d: Decoded) -> Self {
        DecodeOutcome::Matched(d)
    }
}

/// The trait every protocol decoder implements.
pub trait ProtocolDecoder: Send + Sync {
    /// Stable, unique name; re-registering under the same name replaces.
    fn name(&self) -> &str;

    fn kind(&self) -> DecoderKind;

    fn capabilities(&self) -> Capabilities;

    /// Counterparty tag stamped on this decoder's events, if any.
    fn counterparty(&self) -> Option<Counterparty> {
        None
    }

    /// Scopes used by `DecoderRegistry::register_decoder`.
    fn scopes(&self) -> Vec<Scope>;

    /// Interpret one matched entry. The entry itself is claimed implicitly
    /// on a match; additional entries (fan-in) must be listed in `claims`.
    fn decode(
        &self,
        _entry: EntryIndex,
        _ctx: &DecodeContext<'_>,
    ) -> Result<DecodeOutcome, DecodeError> {
        Ok(DecodeOutcome::NoMatch)
    }

    /// Transaction-level hook for decoders with the `transaction` capability.
    fn decode_transaction(&self, _ctx: &DecodeContext<'_>) -> Result<DecodeOutcome, DecodeError> {
        Ok(DecodeOutcome::NoMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_are_deduplicated() {
        let d = Decoded::new()
            .claim(EntryIndex(2))
            .claim(EntryIndex(1))
            .claim(EntryIndex(2));
        assert_eq!(d.claims, vec![EntryIndex(2), EntryIndex(1)]);
    }

    #[test]
    fn scope_display() {
        assert_eq!(Scope::Global.to_string(), "global");
        let s = Scope::Address { address: Address::ZERO }.to_string();
        assert!(s.starts_with("address 0x0000"));
    }
}
