//! # decode_fixture
//!
//! Decodes one golden fixture end to end: in-memory receipt source,
//! static token list, static price oracle, and the default EVM decoder
//! catalog.
//!
//! Run from the workspace root with:
//! ```sh
//! cargo run --bin decode_fixture
//!
//! # Another fixture:
//! cargo run --bin decode_fixture -- fixtures/evm/aave-v3-liquidation.json
//!
//! # Full JSON result instead of the table:
//! OUTPUT_JSON=1 cargo run --bin decode_fixture
//! ```

use alloy_primitives::{Address, B256};
use anyhow::{anyhow, Context, Result};
use chainledger_core::{
    chain::ChainId, context::TrackedAccounts, result::DecodeReport, source::FetchedTransaction,
};
use chainledger_evm::default_registry;
use chainledger_observability::{
    metrics::LedgerMetrics,
    tracing_setup::{init_tracing, LogConfig},
};
use chainledger_pipeline::{
    Enricher, MemoryReceiptSource, StaticAssetResolver, StaticPriceOracle,
    TransactionDecodePipeline,
};
use chainledger_registry::RegistrySet;
use opentelemetry::global;
use rust_decimal::Decimal;
use std::{path::Path, sync::Arc, time::Instant};
use tracing::info;

const DEFAULT_FIXTURE: &str = "fixtures/evm/aave-v3-supply.json";
const TOKENS: &str = "fixtures/evm/tokens.json";

/// Demo prices keyed by asset identifier.
const PRICES: &[(&str, i64)] = &[
    ("ethereum:native", 2_000),
    ("eip155:1/erc20:0xdAC17F958D2ee523a2206206994597C13D831ec7", 1),
    ("eip155:1/erc20:0xA0b86991c6218b36c1D19D4a2e9Eb0cE3606eB48", 1),
];

fn read_json(path: impl AsRef<Path>) -> Result<serde_json::Value> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn load_resolver(path: &str) -> Result<StaticAssetResolver> {
    let tokens = read_json(path)?;
    let chains = tokens.as_object().ok_or_else(|| anyhow!("{path}: expected an object"))?;
    let mut resolver = StaticAssetResolver::new();
    for (slug, list) in chains {
        let chain = ChainId::from_slug(slug).ok_or_else(|| anyhow!("unknown chain {slug}"))?;
        for token in list.as_array().into_iter().flatten() {
            let address: Address = token["address"]
                .as_str()
                .ok_or_else(|| anyhow!("token without address"))?
                .parse()?;
            let symbol = token["symbol"].as_str().unwrap_or("???");
            let decimals = token["decimals"].as_u64().unwrap_or(18) as u8;
            resolver = resolver.with_token(&chain, address, symbol, decimals);
        }
    }
    Ok(resolver)
}

fn load_oracle() -> StaticPriceOracle {
    PRICES
        .iter()
        .fold(StaticPriceOracle::new(), |oracle, (id, usd)| {
            oracle.with_price(*id, Decimal::from(*usd))
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Initialise structured logging ──────────────────────────────────────
    let log_config = LogConfig {
        level: "info".into(),
        components: [("chainledger-pipeline".into(), "debug".into())].into(),
        json: std::env::var("LOG_JSON").is_ok(),
        anonymize_amounts: false,
    };
    init_tracing(&log_config);

    // ── 2. Load the fixture ───────────────────────────────────────────────────
    let fixture_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_FIXTURE.into());
    let fixture = read_json(&fixture_path)?;
    let receipt: FetchedTransaction = serde_json::from_value(fixture["receipt"].clone())
        .with_context(|| format!("{fixture_path}: malformed receipt"))?;
    let chain = ChainId::from_slug(&receipt.chain)
        .ok_or_else(|| anyhow!("unsupported chain {}", receipt.chain))?;
    let tx_hash: B256 = receipt.tx_hash.parse()?;

    let mut tracked = TrackedAccounts::new();
    for account in fixture["tracked"].as_array().into_iter().flatten() {
        if let Some(account) = account.as_str() {
            tracked.insert(account.parse::<Address>()?);
        }
    }

    // ── 3. Assemble the pipeline ──────────────────────────────────────────────
    let registries = RegistrySet::new().with(&chain, default_registry(&chain)?.freeze());
    let enricher = Enricher::new(Arc::new(load_resolver(TOKENS)?)).with_oracle(Arc::new(load_oracle()));
    let metrics = LedgerMetrics::new(&global::meter("chainledger-demos"));
    let pipeline = TransactionDecodePipeline::new(
        registries,
        Arc::new(MemoryReceiptSource::new().with_transaction(receipt)),
        enricher,
    )
    .with_metrics(metrics);

    // ── 4. Decode ─────────────────────────────────────────────────────────────
    let started = Instant::now();
    let report = pipeline.decode(tx_hash, &chain, &tracked).await?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "fixture decoded");

    if std::env::var("OUTPUT_JSON").is_ok() {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("ChainLedger — Fixture Decode");
    println!("═══════════════════════════════════════════════════════");
    println!("  fixture : {fixture_path}");
    println!("  tx      : {tx_hash:#x}");
    println!("  chain   : {chain}");
    println!("  status  : {}", if report.is_complete() { "complete" } else { "partial" });
    println!("═══════════════════════════════════════════════════════");

    for event in report.events() {
        let value = event
            .valuation
            .value()
            .map(|v| format!(" (≈ ${v})"))
            .unwrap_or_default();
        println!(
            "  #{:<2} {:<8} / {:<22} {}{}",
            event.sequence_index, event.event_type, event.event_subtype, event.notes, value
        );
    }

    // ── 5. What kept the result from being complete ───────────────────────────
    if let DecodeReport::Partial(partial) = &report {
        println!();
        for entry in &partial.unclaimed {
            println!("  unclaimed : {}", entry.position);
        }
        for error in &partial.entry_errors {
            println!("  error     : {} at {:?}: {}", error.decoder, error.entry, error.message);
        }
        for conflict in &partial.conflicts {
            println!("  conflict  : {} kept over {}", conflict.kept, conflict.dropped);
        }
    }

    Ok(())
}
