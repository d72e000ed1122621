//! EVM event fingerprint computation.
//!
//! The fingerprint of an EVM event is the keccak256 hash of its canonical
//! signature string, e.g.:
//!   keccak256("Transfer(address,address,uint256)")
//!   → 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef
//!
//! For raw logs, topics[0] IS the fingerprint; decoders compute the
//! fingerprints they own once, at construction.

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

/// Compute the keccak256 fingerprint of an event signature string.
/// Input: `"EventName(type1,type2,...)"`, the canonical ABI signature.
pub fn keccak256_signature(signature: &str) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    B256::from(output)
}

/// Canonical signatures of every event the catalog understands.
pub mod signatures {
    pub const ERC20_TRANSFER: &str = "Transfer(address,address,uint256)";

    pub const AAVE_SUPPLY: &str = "Supply(address,address,address,uint256,uint16)";
    pub const AAVE_WITHDRAW: &str = "Withdraw(address,address,address,uint256)";
    pub const AAVE_BORROW: &str = "Borrow(address,address,address,uint256,uint8,uint256,uint16)";
    pub const AAVE_REPAY: &str = "Repay(address,address,address,uint256,bool)";
    pub const AAVE_LIQUIDATION_CALL: &str =
        "LiquidationCall(address,address,address,uint256,uint256,address,bool)";
    pub const AAVE_COLLATERAL_ENABLED: &str = "ReserveUsedAsCollateralEnabled(address,address)";
    pub const AAVE_COLLATERAL_DISABLED: &str = "ReserveUsedAsCollateralDisabled(address,address)";
    pub const AAVE_REWARDS_CLAIMED: &str = "RewardsClaimed(address,address,address,address,uint256)";
    pub const AAVE_RESERVE_DATA_UPDATED: &str =
        "ReserveDataUpdated(address,uint256,uint256,uint256,uint256,uint256)";

    pub const COMET_SUPPLY: &str = "Supply(address,address,uint256)";
    pub const COMET_WITHDRAW: &str = "Withdraw(address,address,uint256)";
    pub const COMET_SUPPLY_COLLATERAL: &str = "SupplyCollateral(address,address,address,uint256)";
    pub const COMET_WITHDRAW_COLLATERAL: &str = "WithdrawCollateral(address,address,address,uint256)";
    pub const COMET_REWARD_CLAIMED: &str = "RewardClaimed(address,address,address,uint256)";

    pub const SAFE_EXECUTION_SUCCESS: &str = "ExecutionSuccess(bytes32,uint256)";
}
