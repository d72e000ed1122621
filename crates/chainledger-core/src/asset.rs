//! Asset references, resolved identities, and valuation state.
//!
//! Amounts stay in smallest units until an asset is resolved; only then
//! are they scaled with the asset's decimals.

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::ChainId;

/// An asset as seen by a decoder: either the chain's native currency or a
/// token contract. Acts as the placeholder until resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "snake_case")]
pub enum AssetRef {
    Native,
    Token(Address),
}

impl AssetRef {
    pub fn token_address(&self) -> Option<Address> {
        match self {
            AssetRef::Native => None,
            AssetRef::Token(a) => Some(*a),
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetRef::Native => write!(f, "native"),
            AssetRef::Token(a) => write!(f, "{}", a.to_checksum(None)),
        }
    }
}

/// Canonical asset identity returned by an asset resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetIdentity {
    /// e.g. `eip155:1/erc20:0xdAC17F958D2ee523a2206206994597C13D831ec7`
    pub identifier: String,
    pub symbol: String,
    pub decimals: u8,
}

impl AssetIdentity {
    /// Identity of a chain's native currency; never needs a resolver.
    pub fn native(chain: &ChainId) -> Self {
        Self {
            identifier: format!("{}:native", chain.slug),
            symbol: chain.native_symbol.clone(),
            decimals: chain.native_decimals,
        }
    }

    pub fn erc20(
        chain: &ChainId,
        address: Address,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Self {
            identifier: format!("{}/erc20:{}", chain.caip_prefix(), address.to_checksum(None)),
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// Resolution state of an event's asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssetState {
    Pending { asset: AssetRef },
    Resolved { asset: AssetRef, identity: AssetIdentity },
    Unresolved { asset: AssetRef, reason: String },
}

impl AssetState {
    pub fn pending(asset: AssetRef) -> Self {
        AssetState::Pending { asset }
    }

    pub fn asset_ref(&self) -> AssetRef {
        match self {
            AssetState::Pending { asset }
            | AssetState::Resolved { asset, .. }
            | AssetState::Unresolved { asset, .. } => *asset,
        }
    }

    pub fn identity(&self) -> Option<&AssetIdentity> {
        match self {
            AssetState::Resolved { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, AssetState::Resolved { .. })
    }
}

/// Valuation attached during enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Valuation {
    NotRequested,
    Priced { price: Decimal, value: Decimal },
    Unavailable { reason: String },
}

impl Valuation {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            Valuation::Priced { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// Render an amount in smallest units as a decimal string with `decimals`
/// fractional digits, trailing zeros trimmed.
pub fn format_units(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::chains;

    #[test]
    fn format_units_scales_and_trims() {
        assert_eq!(format_units(U256::from(99_503_000_000u64), 6), "99503");
        assert_eq!(format_units(U256::from(10_000_000_000_000_000u64), 18), "0.01");
        assert_eq!(format_units(U256::from(30_005_421u64), 8), "0.30005421");
        assert_eq!(format_units(U256::ZERO, 18), "0");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
        let ldo: U256 = "71657177259074315114745".parse().unwrap();
        assert_eq!(format_units(ldo, 18), "71657.177259074315114745");
    }

    #[test]
    fn erc20_identifier_is_checksummed() {
        let usdt: Address = "0xdac17f958d2ee523a2206206994597c13d831ec7".parse().unwrap();
        let id = AssetIdentity::erc20(&chains::ethereum(), usdt, "USDT", 6);
        assert_eq!(
            id.identifier,
            "eip155:1/erc20:0xdAC17F958D2ee523a2206206994597C13D831ec7"
        );
    }

    #[test]
    fn native_identity_uses_chain_symbol() {
        let id = AssetIdentity::native(&chains::gnosis());
        assert_eq!(id.symbol, "XDAI");
        assert_eq!(id.decimals, 18);
    }
}
