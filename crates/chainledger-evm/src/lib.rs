//! # chainledger-evm
//!
//! EVM support for ChainLedger: turns a fetched receipt and call trace into
//! the entry arena, and ships the built-in protocol decoders.
//!
//! ```text
//! FetchedTransaction ──► RawLogExtractor ──► [TxEntry] ──► decoders ──► CandidateEvent
//! ```

pub mod abi;
pub mod decoders;
pub mod extractor;
pub mod fingerprint;
pub mod transfer;

pub use decoders::default_registry;
pub use extractor::{ExtractedTransaction, RawLogExtractor};
pub use fingerprint::keccak256_signature;
pub use transfer::{parse_transfer, transfer_topic, TokenTransfer};
