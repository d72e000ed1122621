//! Interfaces to external collaborators and the wire shape of a fetched
//! transaction.
//!
//! The fetched shape mirrors what JSON-RPC nodes return (`eth_getTransactionReceipt`
//! plus a call trace): every quantity is a `0x`-prefixed hex string. The
//! extractor is responsible for validating and normalizing it.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::asset::AssetIdentity;
use crate::chain::ChainId;
use crate::error::{AssetResolutionError, FetchError, PriceUnavailableError};

/// A log as returned by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub log_index: String,
    pub transaction_hash: String,
    /// Logs dropped by a reorg are flagged and skipped
    #[serde(default)]
    pub removed: bool,
}

/// One frame of a flattened call trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcInternalCall {
    pub from: String,
    pub to: String,
    pub value: String,
    pub depth: u32,
    /// `call`, `delegatecall`, `staticcall`, `create`, ...
    #[serde(default = "default_call_type")]
    pub call_type: String,
    /// Set when the frame reverted; its value never moved
    #[serde(default)]
    pub error: Option<String>,
}

fn default_call_type() -> String {
    "call".into()
}

/// Receipt, transaction fields, and trace for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedTransaction {
    pub tx_hash: String,
    /// Chain slug the transaction was fetched from
    pub chain: String,
    /// Block timestamp, Unix seconds
    pub timestamp: i64,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    /// Top-level call value
    #[serde(default = "zero_quantity")]
    pub value: String,
    pub gas_used: String,
    pub effective_gas_price: String,
    /// `0x1` on success
    #[serde(default = "success_status")]
    pub status: String,
    pub logs: Vec<RpcLog>,
    #[serde(default)]
    pub internal_calls: Vec<RpcInternalCall>,
}

fn zero_quantity() -> String {
    "0x0".into()
}

fn success_status() -> String {
    "0x1".into()
}

impl FetchedTransaction {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Fetches the receipt and trace for one transaction. Retryable failures
/// are reported through [`FetchError::is_retryable`].
#[async_trait]
pub trait ReceiptFetcher: Send + Sync {
    async fn fetch_receipt(
        &self,
        tx_hash: B256,
        chain: &ChainId,
    ) -> Result<FetchedTransaction, FetchError>;
}

/// Resolves token contracts to canonical asset identities.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve_asset(
        &self,
        chain: &ChainId,
        address: Address,
    ) -> Result<AssetIdentity, AssetResolutionError>;
}

/// Historical USD price of one unit of an asset.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn historical_price(
        &self,
        asset: &AssetIdentity,
        timestamp: i64,
    ) -> Result<Decimal, PriceUnavailableError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_fetched_transaction() {
        let json = r#"{
            "txHash": "0x01",
            "chain": "ethereum",
            "timestamp": 1700000000,
            "from": "0x00000000000000000000000000000000000000aa",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "logs": []
        }"#;
        let tx = FetchedTransaction::from_json(json).unwrap();
        assert_eq!(tx.status, "0x1");
        assert_eq!(tx.value, "0x0");
        assert!(tx.to.is_none());
        assert!(tx.internal_calls.is_empty());
    }
}
