//! Fetched-transaction builders shared by pipeline tests.

use alloy_primitives::{address, Address, B256, U256};
use chainledger_core::source::{FetchedTransaction, RpcInternalCall, RpcLog};
use chainledger_evm::{
    fingerprint::{keccak256_signature, signatures},
    transfer_topic,
};

pub const USER: Address = address!("93a208b0d7007f5733ea23F65bACF101Be8aC6cD");
pub const USDT: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
pub const A_USDT: Address = address!("23878914EFE38d27C4D67Ab83ed1b93A74D4086a");
pub const AAVE_POOL: Address = address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2");
pub const TX_HASH: &str = "0x867d09a777ca7c5cbccd281d197ffbed327b5a8f07153483e94f75d4e1d04413";

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn tx_hash() -> B256 {
    TX_HASH.parse().unwrap()
}

fn hex_word(word: B256) -> String {
    format!("{word:#x}")
}

fn data_hex(data: &[u8]) -> String {
    let mut s = String::from("0x");
    for b in data {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn word(v: u64) -> Vec<u8> {
    U256::from(v).to_be_bytes::<32>().to_vec()
}

pub struct FetchedBuilder {
    tx: FetchedTransaction,
    hash: String,
}

impl FetchedBuilder {
    pub fn new(sender: Address) -> Self {
        Self {
            tx: FetchedTransaction {
                tx_hash: TX_HASH.into(),
                chain: "ethereum".into(),
                timestamp: 1_711_029_839,
                from: format!("{sender}"),
                to: Some(format!("{AAVE_POOL}")),
                value: "0x0".into(),
                gas_used: "0x0".into(),
                effective_gas_price: "0x0".into(),
                status: "0x1".into(),
                logs: Vec::new(),
                internal_calls: Vec::new(),
            },
            hash: TX_HASH.into(),
        }
    }

    pub fn hash(mut self, hash: B256) -> Self {
        self.hash = hex_word(hash);
        self
    }

    pub fn chain(mut self, slug: &str) -> Self {
        self.tx.chain = slug.into();
        self
    }

    pub fn gas(mut self, gas_used: u64, gas_price: u64) -> Self {
        self.tx.gas_used = format!("0x{gas_used:x}");
        self.tx.effective_gas_price = format!("0x{gas_price:x}");
        self
    }

    pub fn log(mut self, address: Address, topics: Vec<B256>, data: Vec<u8>) -> Self {
        let index = self.tx.logs.len();
        self.tx.logs.push(RpcLog {
            address: format!("{address}"),
            topics: topics.into_iter().map(hex_word).collect(),
            data: data_hex(&data),
            log_index: format!("0x{index:x}"),
            transaction_hash: TX_HASH.into(),
            removed: false,
        });
        self
    }

    pub fn transfer(self, token: Address, from: Address, to: Address, amount: u64) -> Self {
        self.log(
            token,
            vec![transfer_topic(), from.into_word(), to.into_word()],
            word(amount),
        )
    }

    pub fn native(mut self, from: Address, to: Address, amount: u64, depth: u32) -> Self {
        self.tx.internal_calls.push(RpcInternalCall {
            from: format!("{from}"),
            to: format!("{to}"),
            value: format!("0x{amount:x}"),
            depth,
            call_type: "call".into(),
            error: None,
        });
        self
    }

    pub fn aave_supply(self, reserve: Address, user: Address, on_behalf_of: Address, amount: u64) -> Self {
        let mut data = user.into_word().to_vec();
        data.extend(word(amount));
        self.log(
            AAVE_POOL,
            vec![
                keccak256_signature(signatures::AAVE_SUPPLY),
                reserve.into_word(),
                on_behalf_of.into_word(),
                B256::ZERO,
            ],
            data,
        )
    }

    pub fn aave_supply_raw(self, reserve: Address, on_behalf_of: Address, data: Vec<u8>) -> Self {
        self.log(
            AAVE_POOL,
            vec![
                keccak256_signature(signatures::AAVE_SUPPLY),
                reserve.into_word(),
                on_behalf_of.into_word(),
                B256::ZERO,
            ],
            data,
        )
    }

    pub fn aave_collateral(self, enabled: bool, reserve: Address, user: Address) -> Self {
        let signature = if enabled {
            signatures::AAVE_COLLATERAL_ENABLED
        } else {
            signatures::AAVE_COLLATERAL_DISABLED
        };
        self.log(
            AAVE_POOL,
            vec![keccak256_signature(signature), reserve.into_word(), user.into_word()],
            vec![],
        )
    }

    pub fn build(mut self) -> FetchedTransaction {
        self.tx.tx_hash = self.hash.clone();
        for log in &mut self.tx.logs {
            log.transaction_hash = self.hash.clone();
        }
        self.tx
    }
}
