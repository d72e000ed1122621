//! # chainledger-pipeline
//!
//! Turns a transaction hash into an ordered list of accounting events.
//!
//! ## Stages
//! ```text
//! fetch ─► extract ─► dispatch ─► collect ─► merge ─► sequence ─► enrich ─► notes
//!  (I/O)                 └──────── EventAggregator (sync) ────────┘   (I/O)
//! ```
//!
//! ## Quick start
//! ```no_run
//! use std::sync::Arc;
//! use chainledger_core::{chains, TrackedAccounts};
//! use chainledger_evm::default_registry;
//! use chainledger_pipeline::{
//!     Enricher, MemoryReceiptSource, StaticAssetResolver, TransactionDecodePipeline,
//! };
//! use chainledger_registry::RegistrySet;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let eth = chains::ethereum();
//! let registries = RegistrySet::new().with(&eth, default_registry(&eth)?.freeze());
//! let pipeline = TransactionDecodePipeline::new(
//!     registries,
//!     Arc::new(MemoryReceiptSource::new()),
//!     Enricher::new(Arc::new(StaticAssetResolver::new())),
//! );
//! let report = pipeline
//!     .decode("0x867d09a777ca7c5cbccd281d197ffbed327b5a8f07153483e94f75d4e1d04413".parse()?, &eth, &TrackedAccounts::new())
//!     .await?;
//! for event in report.events() {
//!     println!("{}: {}", event.sequence_index, event.notes);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod batch;
pub mod config;
pub mod enrich;
pub mod memory;
pub mod notes;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod store;

#[cfg(test)]
mod testing;

pub use aggregator::{AggregatedTransaction, EventAggregator, Stage};
pub use batch::BatchDecoder;
pub use config::{PipelineConfig, RetrySettings};
pub use enrich::Enricher;
pub use memory::{MemoryReceiptSource, StaticAssetResolver, StaticPriceOracle};
pub use notes::{NoteKey, NotesFormatter, NotesTemplates};
pub use pipeline::TransactionDecodePipeline;
pub use pool::{DecodeJob, DecodeWorkerPool, PoolStats};
pub use retry::{RetryConfig, RetryPolicy};
pub use store::{MemoryResultStore, ResultStore};
