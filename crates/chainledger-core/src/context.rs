//! Read-only per-transaction view handed to every decoder invocation.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::chain::ChainId;
use crate::entry::{EntryIndex, RawLogEntry, TransactionMeta, TxEntry};

/// The set of addresses whose positions the caller cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAccounts(BTreeSet<Address>);

impl TrackedAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains(address)
    }

    pub fn insert(&mut self, address: Address) -> bool {
        self.0.insert(address)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.0.iter()
    }
}

impl FromIterator<Address> for TrackedAccounts {
    fn from_iter<T: IntoIterator<Item = Address>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Entries already claimed by protocol-specific decoders earlier in the
/// dispatch pass. Generic claims are not recorded here.
#[derive(Debug, Clone, Default)]
pub struct ClaimSet(BTreeSet<EntryIndex>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, idx: EntryIndex) -> bool {
        self.0.contains(&idx)
    }

    pub fn extend(&mut self, claims: impl IntoIterator<Item = EntryIndex>) {
        self.0.extend(claims);
    }
}

/// Everything a decoder may look at while interpreting one entry.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    pub meta: &'a TransactionMeta,
    pub entries: &'a [TxEntry],
    pub tracked: &'a TrackedAccounts,
    claimed: &'a ClaimSet,
}

impl<'a> DecodeContext<'a> {
    pub fn new(
        meta: &'a TransactionMeta,
        entries: &'a [TxEntry],
        tracked: &'a TrackedAccounts,
        claimed: &'a ClaimSet,
    ) -> Self {
        Self {
            meta,
            entries,
            tracked,
            claimed,
        }
    }

    pub fn chain(&self) -> &'a ChainId {
        &self.meta.chain
    }

    pub fn entry(&self, idx: EntryIndex) -> Option<&'a TxEntry> {
        self.entries.get(idx.0)
    }

    pub fn log(&self, idx: EntryIndex) -> Option<&'a RawLogEntry> {
        self.entry(idx).and_then(TxEntry::as_log)
    }

    /// All log entries in arena order, with their indices.
    pub fn logs(&self) -> impl Iterator<Item = (EntryIndex, &'a RawLogEntry)> + 'a {
        let entries: &'a [TxEntry] = self.entries;
        entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_log().map(|l| (EntryIndex(i), l)))
    }

    pub fn is_tracked(&self, address: &Address) -> bool {
        self.tracked.contains(address)
    }

    /// Whether a protocol-specific decoder already interpreted this entry.
    pub fn is_claimed_by_protocol(&self, idx: EntryIndex) -> bool {
        self.claimed.contains(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::chains;
    use crate::entry::NativeTransfer;
    use alloy_primitives::{B256, U256};

    #[test]
    fn logs_skip_native_entries() {
        let meta = TransactionMeta {
            tx_hash: B256::ZERO,
            chain: chains::ethereum(),
            timestamp: 0,
            sender: Address::ZERO,
            to: None,
            gas_used: 0,
            gas_price: 0,
            success: true,
        };
        let entries = vec![
            TxEntry::Native(NativeTransfer {
                from: Address::ZERO,
                to: Address::repeat_byte(1),
                amount: U256::from(5u64),
                call_index: 0,
                depth: 0,
                tx_hash: B256::ZERO,
            }),
            TxEntry::Log(RawLogEntry {
                address: Address::repeat_byte(2),
                topics: vec![],
                data: vec![],
                log_index: 0,
                tx_hash: B256::ZERO,
            }),
        ];
        let tracked: TrackedAccounts = [Address::repeat_byte(1)].into_iter().collect();
        let mut claimed = ClaimSet::new();
        claimed.extend([EntryIndex(1)]);
        let ctx = DecodeContext::new(&meta, &entries, &tracked, &claimed);

        let logs: Vec<_> = ctx.logs().map(|(i, _)| i).collect();
        assert_eq!(logs, vec![EntryIndex(1)]);
        assert!(ctx.is_tracked(&Address::repeat_byte(1)));
        assert!(ctx.is_claimed_by_protocol(EntryIndex(1)));
        assert!(!ctx.is_claimed_by_protocol(EntryIndex(0)));
    }
}
