//! The closed two-level event taxonomy and counterparty tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Economic nature of a history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventType {
    Receive,
    Spend,
    Deposit,
    Withdrawal,
    Transfer,
    Informational,
}

/// Refinement of a [`HistoryEventType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventSubType {
    None,
    Fee,
    DepositAsset,
    RemoveAsset,
    ReceiveWrapped,
    ReturnWrapped,
    GenerateDebt,
    PaybackDebt,
    Liquidate,
    Reward,
}

impl HistoryEventType {
    /// Subtypes that may be paired with this type.
    pub fn allowed_subtypes(self) -> &'static [HistoryEventSubType] {
        use HistoryEventSubType as S;
        match self {
            HistoryEventType::Spend => &[
                S::None,
                S::Fee,
                S::ReturnWrapped,
                S::PaybackDebt,
                S::Liquidate,
            ],
            HistoryEventType::Receive => &[S::None, S::ReceiveWrapped, S::GenerateDebt, S::Reward],
            HistoryEventType::Deposit => &[S::DepositAsset],
            HistoryEventType::Withdrawal => &[S::RemoveAsset],
            HistoryEventType::Transfer => &[S::None],
            HistoryEventType::Informational => &[S::None],
        }
    }

    pub fn allows(self, subtype: HistoryEventSubType) -> bool {
        self.allowed_subtypes().contains(&subtype)
    }

    /// Whether events of this type reduce the actor's balance.
    pub fn is_outgoing(self) -> bool {
        matches!(self, HistoryEventType::Spend | HistoryEventType::Deposit)
    }
}

impl fmt::Display for HistoryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HistoryEventType::Receive => "receive",
            HistoryEventType::Spend => "spend",
            HistoryEventType::Deposit => "deposit",
            HistoryEventType::Withdrawal => "withdrawal",
            HistoryEventType::Transfer => "transfer",
            HistoryEventType::Informational => "informational",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for HistoryEventSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HistoryEventSubType::None => "none",
            HistoryEventSubType::Fee => "fee",
            HistoryEventSubType::DepositAsset => "deposit asset",
            HistoryEventSubType::RemoveAsset => "remove asset",
            HistoryEventSubType::ReceiveWrapped => "receive wrapped",
            HistoryEventSubType::ReturnWrapped => "return wrapped",
            HistoryEventSubType::GenerateDebt => "generate debt",
            HistoryEventSubType::PaybackDebt => "payback debt",
            HistoryEventSubType::Liquidate => "liquidate",
            HistoryEventSubType::Reward => "reward",
        };
        write!(f, "{s}")
    }
}

/// Which integration attributed an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Counterparty {
    #[serde(rename = "gas")]
    Gas,
    #[serde(rename = "aave-v3")]
    AaveV3,
    #[serde(rename = "compound-v3")]
    CompoundV3,
    #[serde(rename = "safe-multisig")]
    SafeMultisig,
    /// Fallback events for entries no decoder could interpret
    #[serde(rename = "unknown")]
    Unknown,
}

impl Counterparty {
    pub fn as_str(self) -> &'static str {
        match self {
            Counterparty::Gas => "gas",
            Counterparty::AaveV3 => "aave-v3",
            Counterparty::CompoundV3 => "compound-v3",
            Counterparty::SafeMultisig => "safe-multisig",
            Counterparty::Unknown => "unknown",
        }
    }

    /// Label used in rendered notes.
    pub fn display_name(self) -> &'static str {
        match self {
            Counterparty::Gas => "gas",
            Counterparty::AaveV3 => "AAVE v3",
            Counterparty::CompoundV3 => "Compound v3",
            Counterparty::SafeMultisig => "Safe multisig",
            Counterparty::Unknown => "an unknown protocol",
        }
    }
}

impl fmt::Display for Counterparty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
