//! ChainLedger metrics definitions.
//!
//! All metrics use OpenTelemetry conventions and can be exported through
//! whatever meter provider the host application installs.

use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Central metrics handle for the decode pipeline.
#[derive(Clone)]
pub struct LedgerMetrics {
    pub transactions_decoded: Counter<u64>,
    pub events_emitted: Counter<u64>,
    pub entry_errors: Counter<u64>,
    pub unclaimed_entries: Counter<u64>,
    pub fetch_retries: Counter<u64>,
    pub decode_latency_ms: Histogram<f64>,
}

impl LedgerMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            transactions_decoded: meter
                .u64_counter("chainledger.transactions_decoded")
                .with_description("Transactions that reached the finalized state")
                .build(),
            events_emitted: meter
                .u64_counter("chainledger.events_emitted")
                .with_description("History events emitted in finalized results")
                .build(),
            entry_errors: meter
                .u64_counter("chainledger.entry_errors")
                .with_description("Recovered per-entry decoder failures")
                .build(),
            unclaimed_entries: meter
                .u64_counter("chainledger.unclaimed_entries")
                .with_description("Raw entries no decoder claimed")
                .build(),
            fetch_retries: meter
                .u64_counter("chainledger.fetch_retries")
                .with_description("Receipt fetch attempts retried after a transient failure")
                .build(),
            decode_latency_ms: meter
                .f64_histogram("chainledger.decode_latency_ms")
                .with_description("End-to-end decode time of one transaction in milliseconds")
                .build(),
        }
    }

    pub fn record_transaction(&self, chain: &str, complete: bool) {
        let completeness = if complete { "complete" } else { "partial" };
        self.transactions_decoded.add(
            1,
            &[
                KeyValue::new("chain", chain.to_string()),
                KeyValue::new("completeness", completeness),
            ],
        );
    }

    pub fn record_event(&self, chain: &str, counterparty: &str) {
        self.events_emitted.add(
            1,
            &[
                KeyValue::new("chain", chain.to_string()),
                KeyValue::new("counterparty", counterparty.to_string()),
            ],
        );
    }

    pub fn record_entry_error(&self, chain: &str, decoder: &str) {
        self.entry_errors.add(
            1,
            &[
                KeyValue::new("chain", chain.to_string()),
                KeyValue::new("decoder", decoder.to_string()),
            ],
        );
    }

    pub fn record_unclaimed(&self, chain: &str, count: u64) {
        if count > 0 {
            self.unclaimed_entries
                .add(count, &[KeyValue::new("chain", chain.to_string())]);
        }
    }

    pub fn record_retry(&self, chain: &str) {
        self.fetch_retries
            .add(1, &[KeyValue::new("chain", chain.to_string())]);
    }

    pub fn record_latency(&self, ms: f64, chain: &str) {
        self.decode_latency_ms
            .record(ms, &[KeyValue::new("chain", chain.to_string())]);
    }
}

impl std::fmt::Debug for LedgerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_against_noop_meter() {
        let meter = opentelemetry::global::meter("chainledger-test");
        let metrics = LedgerMetrics::new(&meter);
        metrics.record_transaction("ethereum", true);
        metrics.record_event("ethereum", "aave-v3");
        metrics.record_entry_error("ethereum", "aave-v3");
        metrics.record_unclaimed("ethereum", 0);
        metrics.record_retry("ethereum");
        metrics.record_latency(1.5, "ethereum");
    }
}
