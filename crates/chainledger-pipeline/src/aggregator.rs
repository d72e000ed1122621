//! `EventAggregator`: the synchronous core of one decode run.
//!
//! Offers every entry to its decoders, validates what they return, resolves
//! overlapping claims by precedence and produces the sequenced candidate
//! list. Enrichment and notes happen afterwards, in the pipeline.
//!
//! Merge precedence: protocol-specific groups in registration order, then
//! generic groups. A group is accepted only if none of its claimed entries
//! was already taken by an accepted group; informational-only groups are
//! kept regardless and never take claims from anyone.

use alloy_primitives::{Address, U256};
use chainledger_core::{
    asset::AssetRef,
    context::{ClaimSet, DecodeContext, TrackedAccounts},
    decoder::{DecodeOutcome, Decoded, DecoderKind},
    entry::{EntryIndex, TransactionMeta, TxEntry},
    error::EntryError,
    event::CandidateEvent,
    result::{DecoderConflict, UnclaimedEntry},
    taxonomy::{Counterparty, HistoryEventSubType, HistoryEventType},
};
use chainledger_evm::extractor::ExtractedTransaction;
use chainledger_registry::{DecoderRegistry, RegisteredDecoder};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// Forward-only stages of one transaction's decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Fetched,
    Dispatched,
    Collected,
    Merged,
    Sequenced,
    Enriched,
    Finalized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetched => "fetched",
            Stage::Dispatched => "dispatched",
            Stage::Collected => "collected",
            Stage::Merged => "merged",
            Stage::Sequenced => "sequenced",
            Stage::Enriched => "enriched",
            Stage::Finalized => "finalized",
        };
        write!(f, "{s}")
    }
}

/// Output of one decoder invocation.
#[derive(Debug, Clone)]
struct CandidateGroup {
    decoder: String,
    position: usize,
    kind: DecoderKind,
    /// Dispatch order, used to emit accepted events
    seq: usize,
    events: Vec<CandidateEvent>,
    claims: Vec<EntryIndex>,
}

impl CandidateGroup {
    fn informational_only(&self) -> bool {
        !self.events.is_empty() && self.events.iter().all(CandidateEvent::is_informational)
    }

    fn precedence(&self) -> (u8, usize, usize) {
        let class = match self.kind {
            DecoderKind::Specific => 0,
            DecoderKind::Generic => 1,
        };
        (class, self.position, self.seq)
    }
}

/// Sequenced candidates plus everything the merge could not account for.
#[derive(Debug, Clone)]
pub struct AggregatedTransaction {
    pub meta: TransactionMeta,
    /// Final order; `sequence_index` is the position in this list
    pub events: Vec<CandidateEvent>,
    pub unclaimed: Vec<UnclaimedEntry>,
    pub entry_errors: Vec<EntryError>,
    pub conflicts: Vec<DecoderConflict>,
    pub entry_count: usize,
}

impl AggregatedTransaction {
    /// Every entry was claimed and nothing had to be recovered.
    pub fn is_complete(&self) -> bool {
        self.unclaimed.is_empty() && self.entry_errors.is_empty() && self.conflicts.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EventAggregator;

impl EventAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Run dispatch, collection, merge and sequencing for one transaction.
    pub fn aggregate(
        &self,
        registry: &DecoderRegistry,
        tx: &ExtractedTransaction,
        tracked: &TrackedAccounts,
    ) -> AggregatedTransaction {
        let meta = &tx.meta;
        let entries = tx.entries.as_slice();

        let (groups, entry_errors, failed) = dispatch(registry, meta, entries, tracked);
        debug!(tx = %meta.tx_hash, stage = %Stage::Dispatched, groups = groups.len(), "dispatch done");
        debug!(
            tx = %meta.tx_hash,
            stage = %Stage::Collected,
            errors = entry_errors.len(),
            "candidates validated"
        );

        let Merged {
            mut events,
            claimed,
            conflicts,
        } = merge(groups);
        debug!(tx = %meta.tx_hash, stage = %Stage::Merged, events = events.len(), "claims merged");

        let mut unclaimed = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let idx = EntryIndex(i);
            if claimed.contains(&idx) {
                continue;
            }
            if let Some(message) = failed.get(&idx) {
                events.push(fallback_event(meta, entry, message));
            }
            unclaimed.push(unclaimed_entry(idx, entry));
        }

        sequence(&mut events);
        debug!(
            tx = %meta.tx_hash,
            stage = %Stage::Sequenced,
            events = events.len(),
            unclaimed = unclaimed.len(),
            "events sequenced"
        );

        AggregatedTransaction {
            meta: meta.clone(),
            events,
            unclaimed,
            entry_errors,
            conflicts,
            entry_count: entries.len(),
        }
    }
}

type Dispatched = (Vec<CandidateGroup>, Vec<EntryError>, BTreeMap<EntryIndex, String>);

fn dispatch(
    registry: &DecoderRegistry,
    meta: &TransactionMeta,
    entries: &[TxEntry],
    tracked: &TrackedAccounts,
) -> Dispatched {
    let mut groups = Vec::new();
    let mut errors = Vec::new();
    let mut failed: BTreeMap<EntryIndex, String> = BTreeMap::new();
    let mut claimed = ClaimSet::new();

    for (i, entry) in entries.iter().enumerate() {
        let idx = EntryIndex(i);
        for reg in registry.decoders_for(entry) {
            let outcome = {
                let ctx = DecodeContext::new(meta, entries, tracked, &claimed);
                reg.decoder.decode(idx, &ctx)
            };
            match outcome {
                Ok(DecodeOutcome::NoMatch) => {}
                Ok(DecodeOutcome::Matched(decoded)) => {
                    let mut g = group(reg, groups.len(), decoded.claim(idx));
                    if let Err(message) = collect(&mut g, Some(idx), &mut errors) {
                        // nothing valid survived: the entry stays open for later decoders
                        failed.entry(idx).or_insert(message);
                        continue;
                    }
                    if g.kind == DecoderKind::Specific {
                        claimed.extend(g.claims.iter().copied());
                    }
                    groups.push(g);
                }
                Err(e) => {
                    warn!(
                        tx = %meta.tx_hash,
                        entry = idx.0,
                        decoder = reg.decoder.name(),
                        error = %e,
                        "decoder failed on entry"
                    );
                    failed.entry(idx).or_insert_with(|| e.to_string());
                    errors.push(EntryError {
                        entry: Some(idx),
                        decoder: reg.decoder.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    for reg in registry.transaction_decoders() {
        let ctx = DecodeContext::new(meta, entries, tracked, &claimed);
        match reg.decoder.decode_transaction(&ctx) {
            Ok(DecodeOutcome::NoMatch) => {}
            Ok(DecodeOutcome::Matched(decoded)) => {
                let mut g = group(reg, groups.len(), decoded);
                let entry = g.claims.first().copied();
                if collect(&mut g, entry, &mut errors).is_ok() {
                    groups.push(g);
                }
            }
            Err(e) => {
                // no entry to blame; the decoder simply contributes nothing
                warn!(tx = %meta.tx_hash, decoder = reg.decoder.name(), error = %e, "transaction decoder failed");
            }
        }
    }

    (groups, errors, failed)
}

fn group(reg: RegisteredDecoder<'_>, seq: usize, decoded: Decoded) -> CandidateGroup {
    let counterparty = reg.decoder.counterparty();
    let events = decoded
        .events
        .into_iter()
        .map(|mut e| {
            if e.counterparty.is_none() {
                e.counterparty = counterparty;
            }
            e
        })
        .collect();
    CandidateGroup {
        decoder: reg.decoder.name().to_string(),
        position: reg.position,
        kind: reg.decoder.kind(),
        seq,
        events,
        claims: decoded.claims,
    }
}

/// Drop candidates that violate the taxonomy or carry nothing.
///
/// Every dropped candidate is recorded against `entry`. Fails with the last
/// validation message when the group had candidates and none survived.
fn collect(
    g: &mut CandidateGroup,
    entry: Option<EntryIndex>,
    errors: &mut Vec<EntryError>,
) -> Result<(), String> {
    if g.events.is_empty() {
        return Ok(());
    }
    let mut last = None;
    g.events.retain(|e| match e.validate() {
        Ok(()) => true,
        Err(err) => {
            warn!(decoder = %g.decoder, entry = ?entry, error = %err, "dropping malformed candidate");
            errors.push(EntryError {
                entry,
                decoder: g.decoder.clone(),
                message: err.to_string(),
            });
            last = Some(err.to_string());
            false
        }
    });
    match last {
        Some(message) if g.events.is_empty() => Err(message),
        _ => Ok(()),
    }
}

struct Merged {
    events: Vec<CandidateEvent>,
    claimed: BTreeSet<EntryIndex>,
    conflicts: Vec<DecoderConflict>,
}

fn merge(groups: Vec<CandidateGroup>) -> Merged {
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by_key(|&i| groups[i].precedence());

    // entry -> index of the accepted group holding it
    let mut holders: BTreeMap<EntryIndex, usize> = BTreeMap::new();
    let mut accepted = vec![false; groups.len()];
    let mut conflicts = Vec::new();

    for i in order {
        let g = &groups[i];
        let overlap: Vec<EntryIndex> = g
            .claims
            .iter()
            .copied()
            .filter(|c| holders.contains_key(c))
            .collect();

        if overlap.is_empty() {
            for c in &g.claims {
                holders.insert(*c, i);
            }
            accepted[i] = true;
            continue;
        }
        if g.informational_only() {
            accepted[i] = true;
            continue;
        }
        if g.kind == DecoderKind::Specific {
            for entry in overlap {
                let kept = &groups[holders[&entry]];
                if kept.kind == DecoderKind::Specific && kept.decoder != g.decoder {
                    warn!(
                        entry = entry.0,
                        kept = %kept.decoder,
                        dropped = %g.decoder,
                        "protocol decoders overlap; keeping the earlier registration"
                    );
                    conflicts.push(DecoderConflict {
                        entry,
                        kept: kept.decoder.clone(),
                        dropped: g.decoder.clone(),
                    });
                }
            }
        }
    }

    let claimed = holders.keys().copied().collect();
    let events = groups
        .into_iter()
        .zip(accepted)
        .filter(|(_, ok)| *ok)
        .flat_map(|(g, _)| g.events)
        .collect();
    Merged {
        events,
        claimed,
        conflicts,
    }
}

/// Stable sort by order key: gas first, then top-level value, logs, internal calls.
fn sequence(events: &mut [CandidateEvent]) {
    events.sort_by_key(|e| e.order_key);
}

fn unclaimed_entry(idx: EntryIndex, entry: &TxEntry) -> UnclaimedEntry {
    let (position, topic0) = match entry {
        TxEntry::Log(l) => (format!("log:{}", l.log_index), l.topic0().copied()),
        TxEntry::Native(n) => (format!("call:{}", n.call_index), None),
    };
    UnclaimedEntry {
        entry: idx,
        position,
        topic0,
    }
}

/// Minimal "unknown activity" event for an entry every decoder failed on.
fn fallback_event(meta: &TransactionMeta, entry: &TxEntry, message: &str) -> CandidateEvent {
    let (asset, address) = match entry {
        TxEntry::Log(l) => (AssetRef::Token(l.address), l.address),
        TxEntry::Native(n) => (AssetRef::Native, n.to),
    };
    let event = CandidateEvent::new(
        meta,
        entry.order_key(),
        HistoryEventType::Informational,
        HistoryEventSubType::None,
        asset,
        U256::ZERO,
        meta.sender,
    )
    .with_counterparty(Counterparty::Unknown)
    .with_extra("error", message);
    let event = match entry {
        TxEntry::Log(l) => event.with_extra("log_index", l.log_index),
        TxEntry::Native(n) => event.with_extra("call_index", n.call_index),
    };
    if address == Address::ZERO {
        event
    } else {
        event.with_address(address)
    }
}
