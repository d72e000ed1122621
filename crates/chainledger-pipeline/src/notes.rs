//! `NotesFormatter`: renders the human-readable description of an event.
//!
//! Templates are keyed by `(type, subtype, counterparty, qualifier)` and use
//! `{placeholder}` substitution. The qualifier distinguishes events that share
//! a taxonomy pair but read differently, e.g. a debt payback that is part of
//! a liquidation. Lookup falls back from the most to the least specific key.
//!
//! Placeholders: `{amount}`, `{symbol}`, `{counterparty}`, `{address}`,
//! `{location}`, `{event_type}`, `{event_subtype}`, and any key of the
//! event's extra data.

use alloy_primitives::Address;
use chainledger_core::{
    asset::{AssetRef, AssetState},
    event::CandidateEvent,
    taxonomy::{Counterparty, HistoryEventSubType as S, HistoryEventType as T},
};
use std::collections::HashMap;

/// Template lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoteKey {
    pub event_type: T,
    pub event_subtype: S,
    pub counterparty: Option<Counterparty>,
    pub qualifier: Option<String>,
}

impl NoteKey {
    pub fn new(event_type: T, event_subtype: S, counterparty: Option<Counterparty>) -> Self {
        Self {
            event_type,
            event_subtype,
            counterparty,
            qualifier: None,
        }
    }

    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }
}

/// Per-key template table. `Default` carries the built-in catalog wording.
#[derive(Debug, Clone)]
pub struct NotesTemplates {
    templates: HashMap<NoteKey, String>,
}

impl NotesTemplates {
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Add or override one template.
    pub fn set(&mut self, key: NoteKey, template: impl Into<String>) -> &mut Self {
        self.templates.insert(key, template.into());
        self
    }

    pub fn with(mut self, key: NoteKey, template: impl Into<String>) -> Self {
        self.set(key, template);
        self
    }

    pub fn get(&self, key: &NoteKey) -> Option<&str> {
        self.templates.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Most specific template for an event: qualified, unqualified, then
    /// the protocol-agnostic pair.
    fn lookup(&self, event: &CandidateEvent, qualifier: Option<&str>) -> Option<&str> {
        let base = NoteKey::new(event.event_type, event.event_subtype, event.counterparty);
        if let Some(q) = qualifier {
            if let Some(t) = self.get(&base.clone().qualified(q)) {
                return Some(t);
            }
        }
        self.get(&base)
            .or_else(|| self.get(&NoteKey::new(event.event_type, event.event_subtype, None)))
    }
}

impl Default for NotesTemplates {
    fn default() -> Self {
        use Counterparty::{AaveV3, CompoundV3, Gas, SafeMultisig, Unknown};

        let k = |t, s, c: Option<Counterparty>| NoteKey::new(t, s, c);
        Self::empty()
            // generic movements
            .with(k(T::Spend, S::None, None), "Send {amount} {symbol} to {address}")
            .with(k(T::Receive, S::None, None), "Receive {amount} {symbol} from {address}")
            .with(k(T::Transfer, S::None, None), "Transfer {amount} {symbol} to {address}")
            .with(k(T::Spend, S::Fee, Some(Gas)), "Burned {amount} {symbol} for gas")
            // aave v3
            .with(k(T::Deposit, S::DepositAsset, Some(AaveV3)), "Deposit {amount} {symbol} into AAVE v3")
            .with(k(T::Receive, S::ReceiveWrapped, Some(AaveV3)), "Receive {amount} {symbol} from AAVE v3")
            .with(k(T::Spend, S::ReturnWrapped, Some(AaveV3)), "Return {amount} {symbol} to AAVE v3")
            .with(k(T::Withdrawal, S::RemoveAsset, Some(AaveV3)), "Withdraw {amount} {symbol} from AAVE v3")
            .with(
                k(T::Receive, S::GenerateDebt, Some(AaveV3)),
                "Borrow {amount} {symbol} from AAVE v3 with {rate_mode} APY {apy}%",
            )
            .with(k(T::Spend, S::PaybackDebt, Some(AaveV3)), "Repay {amount} {symbol} on AAVE v3")
            .with(
                k(T::Spend, S::PaybackDebt, Some(AaveV3)).qualified("liquidation"),
                "Payback {amount} {symbol} for an AAVE v3 position",
            )
            .with(
                k(T::Spend, S::Liquidate, Some(AaveV3)),
                "An AAVE v3 position got liquidated for {amount} {symbol}",
            )
            .with(k(T::Spend, S::Fee, Some(AaveV3)), "Spend {amount} {symbol} as an AAVE v3 fee")
            .with(
                k(T::Informational, S::None, Some(AaveV3)).qualified("enable_collateral"),
                "Enable {symbol} as collateral on AAVE v3",
            )
            .with(
                k(T::Informational, S::None, Some(AaveV3)).qualified("disable_collateral"),
                "Disable {symbol} as collateral on AAVE v3",
            )
            .with(k(T::Receive, S::Reward, Some(AaveV3)), "Claim {amount} {symbol} from Aave incentives")
            // compound v3
            .with(k(T::Deposit, S::DepositAsset, Some(CompoundV3)), "Supply {amount} {symbol} to Compound v3")
            .with(k(T::Receive, S::ReceiveWrapped, Some(CompoundV3)), "Receive {amount} {symbol} from Compound v3")
            .with(k(T::Spend, S::ReturnWrapped, Some(CompoundV3)), "Return {amount} {symbol} to Compound v3")
            .with(k(T::Withdrawal, S::RemoveAsset, Some(CompoundV3)), "Withdraw {amount} {symbol} from Compound v3")
            .with(k(T::Receive, S::GenerateDebt, Some(CompoundV3)), "Borrow {amount} {symbol} from Compound v3")
            .with(k(T::Spend, S::PaybackDebt, Some(CompoundV3)), "Repay {amount} {symbol} to Compound v3")
            .with(k(T::Receive, S::Reward, Some(CompoundV3)), "Collect {amount} {symbol} from Compound v3 rewards")
            // safe
            .with(
                k(T::Informational, S::None, Some(SafeMultisig)),
                "Successfully executed safe transaction {safe_tx_hash} for multisig {address}",
            )
            .with(
                k(T::Informational, S::None, Some(Unknown)),
                "Unknown activity at {address} could not be decoded",
            )
    }
}

const FALLBACK_TEMPLATE: &str = "{event_type} {amount} {symbol}";
const MISSING: &str = "unknown";

/// Pure renderer over a template table.
#[derive(Debug, Clone, Default)]
pub struct NotesFormatter {
    templates: NotesTemplates,
}

impl NotesFormatter {
    pub fn new(templates: NotesTemplates) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &NotesTemplates {
        &self.templates
    }

    /// Render the notes of one event. Never empty: unresolved assets render
    /// with their raw amount and contract address.
    pub fn render(&self, event: &CandidateEvent) -> String {
        let qualifier = qualifier(event);
        let template = self
            .templates
            .lookup(event, qualifier.as_deref())
            .unwrap_or(FALLBACK_TEMPLATE);
        substitute(template, |name| placeholder(event, name))
    }
}

/// `extra.action` when present, `liquidation` for liquidation legs.
fn qualifier(event: &CandidateEvent) -> Option<String> {
    if let Some(action) = event.extra.get("action").and_then(|v| v.as_str()) {
        return Some(action.to_string());
    }
    if event.extra.get("is_liquidation").and_then(|v| v.as_bool()) == Some(true) {
        return Some("liquidation".to_string());
    }
    None
}

fn placeholder(event: &CandidateEvent, name: &str) -> Option<String> {
    let value = match name {
        "amount" => event
            .display_amount()
            .unwrap_or_else(|| event.amount.to_string()),
        "symbol" => symbol(event),
        "counterparty" => event
            .counterparty
            .map_or(MISSING, Counterparty::display_name)
            .to_string(),
        "address" => event.address.unwrap_or(Address::ZERO).to_checksum(None),
        "location" => event.location_label.to_checksum(None),
        "event_type" => capitalize(&event.event_type.to_string()),
        "event_subtype" => event.event_subtype.to_string(),
        key => match event.extra.get(key)? {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };
    Some(value)
}

fn symbol(event: &CandidateEvent) -> String {
    match &event.asset {
        AssetState::Resolved { identity, .. } => identity.symbol.clone(),
        AssetState::Pending { asset } | AssetState::Unresolved { asset, .. } => match asset {
            AssetRef::Native => event.chain.native_symbol.clone(),
            AssetRef::Token(address) => format!("units of {}", address.to_checksum(None)),
        },
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Replace every `{name}` in `template`; unknown names render as `unknown`.
fn substitute(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                out.push_str(&lookup(name).unwrap_or_else(|| MISSING.to_string()));
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
