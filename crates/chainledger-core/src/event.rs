//! Candidate events produced by decoders and the frozen history events
//! they become after sequencing.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::asset::{format_units, AssetRef, AssetState, Valuation};
use crate::chain::ChainId;
use crate::entry::{OrderKey, TransactionMeta};
use crate::error::MalformedEventError;
use crate::taxonomy::{Counterparty, HistoryEventSubType, HistoryEventType};

/// Free-form structured data attached to an event (e.g. `is_liquidation`).
/// A `BTreeMap` keeps serialization order stable.
pub type ExtraData = BTreeMap<String, serde_json::Value>;

/// An event under construction during one decode pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub tx_hash: B256,
    pub order_key: OrderKey,
    pub timestamp: i64,
    pub chain: ChainId,
    pub event_type: HistoryEventType,
    pub event_subtype: HistoryEventSubType,
    pub asset: AssetState,
    /// Magnitude in the asset's smallest unit; direction comes from the type
    pub amount: U256,
    /// Whose position this event affects
    pub location_label: Address,
    pub counterparty: Option<Counterparty>,
    /// Contract or address the action was performed against
    pub address: Option<Address>,
    pub extra: ExtraData,
    pub valuation: Valuation,
    /// Populated by the notes stage only
    pub notes: Option<String>,
}

impl CandidateEvent {
    pub fn new(
        meta: &TransactionMeta,
        order_key: OrderKey,
        event_type: HistoryEventType,
        event_subtype: HistoryEventSubType,
        asset: AssetRef,
        amount: U256,
        location_label: Address,
    ) -> Self {
        Self {
            tx_hash: meta.tx_hash,
            order_key,
            timestamp: meta.timestamp,
            chain: meta.chain.clone(),
            event_type,
            event_subtype,
            asset: AssetState::pending(asset),
            amount,
            location_label,
            counterparty: None,
            address: None,
            extra: ExtraData::new(),
            valuation: Valuation::NotRequested,
            notes: None,
        }
    }

    pub fn with_counterparty(mut self, counterparty: Counterparty) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Purely informational: carries no balance impact.
    pub fn is_informational(&self) -> bool {
        self.event_type == HistoryEventType::Informational
    }

    /// Check the taxonomy pair and that the event carries some content.
    pub fn validate(&self) -> Result<(), MalformedEventError> {
        if !self.event_type.allows(self.event_subtype) {
            return Err(MalformedEventError::InvalidPair {
                event_type: self.event_type.to_string(),
                subtype: self.event_subtype.to_string(),
            });
        }
        if self.amount.is_zero() && !self.is_informational() {
            return Err(MalformedEventError::Empty);
        }
        Ok(())
    }

    /// Amount scaled by the resolved asset's decimals, if resolved.
    pub fn display_amount(&self) -> Option<String> {
        self.asset
            .identity()
            .map(|id| format_units(self.amount, id.decimals))
    }
}

/// A finalized, immutable history event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Dense, zero-based position within the transaction
    pub sequence_index: u32,
    pub tx_hash: B256,
    pub timestamp: i64,
    pub chain: String,
    pub event_type: HistoryEventType,
    pub event_subtype: HistoryEventSubType,
    pub asset: AssetState,
    pub amount: U256,
    /// `None` while the asset is unresolved
    pub display_amount: Option<String>,
    pub location_label: Address,
    pub counterparty: Option<Counterparty>,
    pub address: Option<Address>,
    pub extra: ExtraData,
    pub valuation: Valuation,
    pub notes: String,
}

impl HistoryEvent {
    /// Freeze a candidate at its final position. The notes stage must have run.
    pub fn freeze(candidate: CandidateEvent, sequence_index: u32) -> Self {
        let display_amount = candidate.display_amount();
        Self {
            sequence_index,
            tx_hash: candidate.tx_hash,
            timestamp: candidate.timestamp,
            chain: candidate.chain.slug,
            event_type: candidate.event_type,
            event_subtype: candidate.event_subtype,
            asset: candidate.asset,
            amount: candidate.amount,
            display_amount,
            location_label: candidate.location_label,
            counterparty: candidate.counterparty,
            address: candidate.address,
            extra: candidate.extra,
            valuation: candidate.valuation,
            notes: candidate.notes.unwrap_or_default(),
        }
    }
}
