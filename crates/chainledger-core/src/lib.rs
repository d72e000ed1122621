//! # chainledger-core
//!
//! Core traits, types, and primitives shared across all ChainLedger crates.
//! Every protocol decoder, the registry, and the decode pipeline are built
//! on top of the interfaces defined here.

pub mod asset;
pub mod chain;
pub mod context;
pub mod decoder;
pub mod entry;
pub mod error;
pub mod event;
pub mod result;
pub mod source;
pub mod taxonomy;

pub use asset::{format_units, AssetIdentity, AssetRef, AssetState, Valuation};
pub use chain::{chains, ChainId};
pub use context::{ClaimSet, DecodeContext, TrackedAccounts};
pub use decoder::{Capabilities, DecodeOutcome, Decoded, DecoderKind, ProtocolDecoder, Scope};
pub use entry::{
    EntryIndex, NativeTransfer, OrderGroup, OrderKey, RawLogEntry, TransactionMeta, TxEntry,
};
pub use error::{
    AssetResolutionError, DecodeError, EntryError, ExtractionError, FetchError,
    MalformedEventError, PipelineError, PriceUnavailableError, RegistryError,
};
pub use event::{CandidateEvent, ExtraData, HistoryEvent};
pub use result::{DecodeReport, DecodedTransactionResult, DecoderConflict, PartialResult, UnclaimedEntry};
pub use source::{
    AssetResolver, FetchedTransaction, PriceOracle, ReceiptFetcher, RpcInternalCall, RpcLog,
};
pub use taxonomy::{Counterparty, HistoryEventSubType, HistoryEventType};
