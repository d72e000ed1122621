//! Typed access to indexed topics and ABI-encoded log data.
//!
//! Indexed value types are stored left-padded to 32 bytes; the data payload
//! is the ABI encoding of a tuple of the non-indexed params. Decoding goes
//! through alloy-core's `DynSolType`, so a short or corrupt payload becomes
//! a `DecodeError` scoped to the entry instead of a panic.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, U256};
use chainledger_core::{entry::RawLogEntry, error::DecodeError};

/// Indexed address parameter at `topics[index]`.
pub fn topic_address(log: &RawLogEntry, index: usize) -> Result<Address, DecodeError> {
    let topic = topic(log, index)?;
    if topic[..12].iter().any(|b| *b != 0) {
        return Err(DecodeError::MalformedAddressTopic { index });
    }
    Ok(Address::from_word(*topic))
}

/// Indexed `uint256` parameter at `topics[index]`.
pub fn topic_uint(log: &RawLogEntry, index: usize) -> Result<U256, DecodeError> {
    topic(log, index).map(|t| U256::from_be_bytes(t.0))
}

fn topic(log: &RawLogEntry, index: usize) -> Result<&B256, DecodeError> {
    log.topic(index).ok_or(DecodeError::MissingTopic {
        expected: index + 1,
        found: log.topics.len(),
    })
}

/// Decoded non-indexed params of one log.
#[derive(Debug, Clone)]
pub struct LogData(Vec<DynSolValue>);

impl LogData {
    /// Decode `data` as the tuple `types`.
    pub fn decode(data: &[u8], types: &[DynSolType]) -> Result<Self, DecodeError> {
        if types.is_empty() {
            return Ok(Self(Vec::new()));
        }
        let tuple = DynSolType::Tuple(types.to_vec());
        let decoded = tuple
            .abi_decode(data)
            .map_err(|e| DecodeError::AbiDecodeFailed {
                reason: e.to_string(),
            })?;
        let values = match decoded {
            DynSolValue::Tuple(vals) => vals,
            other => vec![other],
        };
        Ok(Self(values))
    }

    fn get(&self, index: usize, field: &str) -> Result<&DynSolValue, DecodeError> {
        self.0.get(index).ok_or_else(|| DecodeError::InvalidField {
            field: field.to_string(),
            reason: format!("no value at position {index}"),
        })
    }

    pub fn address(&self, index: usize, field: &str) -> Result<Address, DecodeError> {
        self.get(index, field)?
            .as_address()
            .ok_or_else(|| mismatch(field, "address"))
    }

    pub fn uint(&self, index: usize, field: &str) -> Result<U256, DecodeError> {
        self.get(index, field)?
            .as_uint()
            .map(|(v, _)| v)
            .ok_or_else(|| mismatch(field, "uint"))
    }

    pub fn bool(&self, index: usize, field: &str) -> Result<bool, DecodeError> {
        self.get(index, field)?
            .as_bool()
            .ok_or_else(|| mismatch(field, "bool"))
    }

    pub fn word(&self, index: usize, field: &str) -> Result<B256, DecodeError> {
        match self.get(index, field)? {
            DynSolValue::FixedBytes(word, 32) => Ok(*word),
            _ => Err(mismatch(field, "bytes32")),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn mismatch(field: &str, expected: &str) -> DecodeError {
    DecodeError::TypeMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
    }
}

/// Left-pad an address into a topic word.
pub fn address_topic(address: Address) -> B256 {
    address.into_word()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(topics: Vec<B256>, data: Vec<u8>) -> RawLogEntry {
        RawLogEntry {
            address: Address::ZERO,
            topics,
            data,
            log_index: 0,
            tx_hash: B256::ZERO,
        }
    }

    fn word(v: u64) -> Vec<u8> {
        U256::from(v).to_be_bytes::<32>().to_vec()
    }

    #[test]
    fn address_topic_roundtrips() {
        let user = Address::repeat_byte(0x42);
        let log = log_with(vec![B256::ZERO, address_topic(user)], vec![]);
        assert_eq!(topic_address(&log, 1).unwrap(), user);
    }

    #[test]
    fn dirty_address_topic_is_rejected() {
        let log = log_with(vec![B256::ZERO, B256::repeat_byte(0xff)], vec![]);
        assert_eq!(
            topic_address(&log, 1),
            Err(DecodeError::MalformedAddressTopic { index: 1 })
        );
    }

    #[test]
    fn missing_topic() {
        let log = log_with(vec![B256::ZERO], vec![]);
        assert_eq!(
            topic_address(&log, 2),
            Err(DecodeError::MissingTopic { expected: 3, found: 1 })
        );
    }

    #[test]
    fn decodes_static_tuple() {
        let mut data = address_topic(Address::repeat_byte(0x11)).to_vec();
        data.extend(word(500));
        data.extend(word(1));
        let decoded = LogData::decode(
            &data,
            &[DynSolType::Address, DynSolType::Uint(256), DynSolType::Bool],
        )
        .unwrap();
        assert_eq!(decoded.address(0, "user").unwrap(), Address::repeat_byte(0x11));
        assert_eq!(decoded.uint(1, "amount").unwrap(), U256::from(500u64));
        assert!(decoded.bool(2, "flag").unwrap());
        assert!(decoded.uint(0, "user").is_err());
    }

    #[test]
    fn short_payload_is_a_decode_error() {
        let err = LogData::decode(&word(1)[..16], &[DynSolType::Uint(256)]).unwrap_err();
        assert!(matches!(err, DecodeError::AbiDecodeFailed { .. }));
    }
}
