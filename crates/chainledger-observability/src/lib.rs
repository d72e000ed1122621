//! # chainledger-observability
//!
//! OpenTelemetry-based observability for ChainLedger.
//!
//! ## Built-in metrics
//! - `chainledger.transactions_decoded` — counter, tagged with chain + completeness
//! - `chainledger.events_emitted`       — counter, tagged with chain + counterparty
//! - `chainledger.entry_errors`         — counter, tagged with chain + decoder
//! - `chainledger.unclaimed_entries`    — counter, tagged with chain
//! - `chainledger.fetch_retries`        — counter, tagged with chain
//! - `chainledger.decode_latency_ms`    — histogram, tagged with chain
//!
//! ## Structured logging
//! JSON or human-readable logs, levels configurable per component, with
//! optional amount redaction.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::LedgerMetrics;
pub use tracing_setup::{init_tracing, redact_amount, LogConfig};
