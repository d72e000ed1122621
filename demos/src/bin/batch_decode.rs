//! # batch_decode
//!
//! Decodes a synthetic batch of already-fetched transactions in parallel
//! with `BatchDecoder` (rayon) and reports throughput. No enrichment: the
//! batch path stops after sequencing.
//!
//! Run with:
//! ```sh
//! cargo run --release --bin batch_decode
//! BATCH_SIZE=100000 cargo run --release --bin batch_decode
//! ```

use alloy_primitives::Address;
use anyhow::Result;
use chainledger_core::{
    chain::chains,
    context::TrackedAccounts,
    source::{FetchedTransaction, RpcLog},
};
use chainledger_evm::{default_registry, transfer_topic};
use chainledger_observability::{init_tracing, LogConfig};
use chainledger_pipeline::BatchDecoder;
use std::time::Instant;
use tracing::info;

const USER: &str = "0x93a208b0d7007f5733ea23f65bacf101be8ac6cd";
const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

fn address_topic(address: &str) -> String {
    format!("0x{:0>64}", address.trim_start_matches("0x"))
}

/// One USDT transfer into the tracked account plus gas.
fn synthetic_transaction(i: u64) -> FetchedTransaction {
    let tx_hash = format!("0x{i:064x}");
    let sender = format!("0x{:040x}", i + 1);
    FetchedTransaction {
        tx_hash: tx_hash.clone(),
        chain: "ethereum".into(),
        timestamp: 1_700_000_000 + i as i64,
        from: USER.into(),
        to: Some(USDT.into()),
        value: "0x0".into(),
        gas_used: "0xfde8".into(),
        effective_gas_price: "0x3b9aca00".into(),
        status: "0x1".into(),
        logs: vec![RpcLog {
            address: USDT.into(),
            topics: vec![
                format!("{:#x}", transfer_topic()),
                address_topic(&sender),
                address_topic(USER),
            ],
            data: format!("0x{:064x}", 1_000_000 * (i + 1)),
            log_index: "0x0".into(),
            transaction_hash: tx_hash,
            removed: false,
        }],
        internal_calls: Vec::new(),
    }
}

fn main() -> Result<()> {
    init_tracing(&LogConfig::default());

    let batch_size: u64 = std::env::var("BATCH_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);

    // ── 1. Registry and tracked accounts ──────────────────────────────────────
    let eth = chains::ethereum();
    let decoder = BatchDecoder::new(default_registry(&eth)?.freeze());
    let mut tracked = TrackedAccounts::new();
    tracked.insert(USER.parse::<Address>()?);

    // ── 2. Build the batch ────────────────────────────────────────────────────
    let batch: Vec<FetchedTransaction> = (0..batch_size).map(synthetic_transaction).collect();
    info!(batch_size, "batch built");

    // ── 3. Decode in parallel ─────────────────────────────────────────────────
    let started = Instant::now();
    let results = decoder.decode_all(&batch, &eth, &tracked);
    let elapsed = started.elapsed();

    let decoded: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let events: usize = decoded.iter().map(|tx| tx.events.len()).sum();
    let complete = decoded.iter().filter(|tx| tx.is_complete()).count();

    println!("ChainLedger — Batch Decode Demo");
    println!("═══════════════════════════════════════════════════════");
    println!("  transactions : {batch_size}");
    println!("  decoded      : {}", decoded.len());
    println!("  complete     : {complete}");
    println!("  events       : {events}");
    println!("  elapsed      : {elapsed:?}");
    println!(
        "  throughput   : {:.0} tx/s",
        batch_size as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    Ok(())
}
