//! Transaction builders shared by decoder tests.

use alloy_primitives::{ruint::UintTryFrom, Address, B256, U256};
use chainledger_core::{
    chain::{chains, ChainId},
    context::{ClaimSet, DecodeContext, TrackedAccounts},
    decoder::{DecodeOutcome, ProtocolDecoder},
    entry::{EntryIndex, NativeTransfer, RawLogEntry, TransactionMeta, TxEntry},
    error::DecodeError,
};

use crate::abi::address_topic;
use crate::transfer::transfer_topic;

pub fn word<T>(v: T) -> Vec<u8>
where
    U256: UintTryFrom<T>,
{
    U256::from(v).to_be_bytes::<32>().to_vec()
}

pub fn addr_word(a: Address) -> Vec<u8> {
    address_topic(a).to_vec()
}

pub struct TxBuilder {
    pub sender: Address,
    pub chain: ChainId,
    gas_used: u64,
    gas_price: u128,
    entries: Vec<TxEntry>,
    next_log: u64,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self {
            sender: Address::repeat_byte(0xaa),
            chain: chains::ethereum(),
            gas_used: 0,
            gas_price: 0,
            entries: Vec::new(),
            next_log: 0,
        }
    }

    pub fn gas(mut self, gas_used: u64, gas_price: u128) -> Self {
        self.gas_used = gas_used;
        self.gas_price = gas_price;
        self
    }

    pub fn log(mut self, address: Address, topics: Vec<B256>, data: Vec<u8>) -> Self {
        self.entries.push(TxEntry::Log(RawLogEntry {
            address,
            topics,
            data,
            log_index: self.next_log,
            tx_hash: B256::repeat_byte(0x01),
        }));
        self.next_log += 1;
        self
    }

    pub fn transfer(self, token: Address, from: Address, to: Address, amount: u64) -> Self {
        self.log(
            token,
            vec![transfer_topic(), address_topic(from), address_topic(to)],
            word(amount),
        )
    }

    pub fn native(mut self, from: Address, to: Address, amount: u64, depth: u32) -> Self {
        let call_index = self.entries.len() as u64;
        self.entries.push(TxEntry::Native(NativeTransfer {
            from,
            to,
            amount: U256::from(amount),
            call_index,
            depth,
            tx_hash: B256::repeat_byte(0x01),
        }));
        self
    }

    pub fn parts(
        &self,
        tracked: &[Address],
    ) -> (TransactionMeta, Vec<TxEntry>, TrackedAccounts, ClaimSet) {
        let meta = TransactionMeta {
            tx_hash: B256::repeat_byte(0x01),
            chain: self.chain.clone(),
            timestamp: 1_711_029_839,
            sender: self.sender,
            to: None,
            gas_used: self.gas_used,
            gas_price: self.gas_price,
            success: true,
        };
        (
            meta,
            self.entries.clone(),
            tracked.iter().copied().collect(),
            ClaimSet::new(),
        )
    }

    /// Offer entry `idx` to `decoder` with nothing claimed yet.
    pub fn decode_at(
        &self,
        decoder: &dyn ProtocolDecoder,
        idx: usize,
        tracked: &[Address],
    ) -> Result<DecodeOutcome, DecodeError> {
        let (meta, entries, tracked, claimed) = self.parts(tracked);
        let ctx = DecodeContext::new(&meta, &entries, &tracked, &claimed);
        decoder.decode(EntryIndex(idx), &ctx)
    }
}
