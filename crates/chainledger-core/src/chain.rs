//! Chain identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fully qualified EVM chain identifier, e.g. `ethereum`, `arbitrum_one`.
/// Used as the key when selecting a decoder registry and when building
/// canonical asset identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId {
    /// Human-readable slug, e.g. "ethereum", "polygon_pos"
    pub slug: String,
    /// EIP-155 chain id (1 for Ethereum mainnet)
    pub evm_chain_id: u64,
    /// Symbol of the currency gas is paid in
    pub native_symbol: String,
    /// Decimals of the native currency's smallest unit
    pub native_decimals: u8,
}

impl ChainId {
    pub fn evm(slug: impl Into<String>, chain_id: u64, native_symbol: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            evm_chain_id: chain_id,
            native_symbol: native_symbol.into(),
            native_decimals: 18,
        }
    }

    /// CAIP-19 style prefix shared by every token identifier on this chain.
    pub fn caip_prefix(&self) -> String {
        format!("eip155:{}", self.evm_chain_id)
    }

    /// Look up a well-known chain by slug.
    pub fn from_slug(slug: &str) -> Option<Self> {
        chains::all().into_iter().find(|c| c.slug == slug)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug)
    }
}

/// Well-known chain IDs for convenience.
pub mod chains {
    use super::ChainId;

    pub fn ethereum() -> ChainId { ChainId::evm("ethereum", 1, "ETH") }
    pub fn optimism() -> ChainId { ChainId::evm("optimism", 10, "ETH") }
    pub fn gnosis() -> ChainId { ChainId::evm("gnosis", 100, "XDAI") }
    pub fn polygon_pos() -> ChainId { ChainId::evm("polygon_pos", 137, "MATIC") }
    pub fn base() -> ChainId { ChainId::evm("base", 8453, "ETH") }
    pub fn arbitrum_one() -> ChainId { ChainId::evm("arbitrum_one", 42161, "ETH") }
    pub fn scroll() -> ChainId { ChainId::evm("scroll", 534352, "ETH") }

    pub fn all() -> Vec<ChainId> {
        vec![
            ethereum(),
            optimism(),
            gnosis(),
            polygon_pos(),
            base(),
            arbitrum_one(),
            scroll(),
        ]
    }
}
