//! # worker_pool
//!
//! Decodes every golden fixture concurrently through a `DecodeWorkerPool`,
//! publishing reports into a `MemoryResultStore`. Pool size, queue
//! capacity, retry policy, deadline and logging come from a YAML
//! `PipelineConfig`.
//!
//! Run from the workspace root with:
//! ```sh
//! cargo run --bin worker_pool
//!
//! # Custom config:
//! cargo run --bin worker_pool -- path/to/pipeline.yaml
//! ```

use alloy_primitives::{Address, B256};
use anyhow::{anyhow, Context, Result};
use chainledger_core::{chain::ChainId, context::TrackedAccounts, source::FetchedTransaction};
use chainledger_evm::default_registry;
use chainledger_observability::{init_tracing, LedgerMetrics};
use chainledger_pipeline::{
    DecodeJob, DecodeWorkerPool, Enricher, MemoryReceiptSource, MemoryResultStore,
    PipelineConfig, ResultStore, StaticAssetResolver, TransactionDecodePipeline,
};
use chainledger_registry::RegistrySet;
use opentelemetry::global;
use std::{path::Path, sync::Arc, time::Instant};
use tracing::info;

const DEFAULT_CONFIG: &str = "demos/pipeline.yaml";
const FIXTURE_DIR: &str = "fixtures/evm";
const TOKENS: &str = "fixtures/evm/tokens.json";

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

/// A fixture's receipt plus the job that decodes it.
fn load_fixture(path: &Path) -> Result<(FetchedTransaction, DecodeJob)> {
    let fixture = read_json(path)?;
    let receipt: FetchedTransaction = serde_json::from_value(fixture["receipt"].clone())
        .with_context(|| format!("{}: malformed receipt", path.display()))?;
    let chain = ChainId::from_slug(&receipt.chain)
        .ok_or_else(|| anyhow!("unsupported chain {}", receipt.chain))?;
    let tx_hash: B256 = receipt.tx_hash.parse()?;

    let mut tracked = TrackedAccounts::new();
    for account in fixture["tracked"].as_array().into_iter().flatten() {
        if let Some(account) = account.as_str() {
            tracked.insert(account.parse::<Address>()?);
        }
    }
    Ok((receipt, DecodeJob::new(tx_hash, chain, tracked)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Configuration and logging ──────────────────────────────────────────
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.into());
    let yaml = std::fs::read_to_string(&config_path)
        .with_context(|| format!("reading {config_path}"))?;
    let config = PipelineConfig::from_yaml_str(&yaml)?;
    init_tracing(&config.log);
    info!(
        config = %config_path,
        workers = config.workers,
        queue_capacity = config.queue_capacity,
        "worker pool demo starting"
    );

    // ── 2. Fixtures ───────────────────────────────────────────────────────────
    let mut paths: Vec<_> = std::fs::read_dir(FIXTURE_DIR)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json") && !p.ends_with("tokens.json"))
        .collect();
    paths.sort();

    let mut source = MemoryReceiptSource::new();
    let mut jobs = Vec::with_capacity(paths.len());
    for path in &paths {
        let (receipt, job) = load_fixture(path)?;
        source = source.with_transaction(receipt);
        jobs.push(job);
    }

    // ── 3. Pipeline, store and pool ───────────────────────────────────────────
    let mut registries = RegistrySet::new();
    for job in &jobs {
        if registries.get(&job.chain).is_err() {
            registries.insert(&job.chain, default_registry(&job.chain)?.freeze());
        }
    }
    let enricher = Enricher::new(Arc::new(load_resolver(TOKENS)?)).attach_prices(config.attach_prices);
    let pipeline = TransactionDecodePipeline::new(registries, Arc::new(source), enricher)
        .with_retry(config.retry.policy())
        .with_metrics(LedgerMetrics::new(&global::meter("chainledger-demos")))
        .anonymize_amounts(config.log.anonymize_amounts);

    let store = Arc::new(MemoryResultStore::new());
    let pool = DecodeWorkerPool::spawn(
        pipeline,
        store.clone(),
        config.workers,
        config.queue_capacity,
        config.decode_timeout(),
    );

    // ── 4. Submit and drain ───────────────────────────────────────────────────
    let started = Instant::now();
    for job in &jobs {
        pool.submit(job.clone()).await?;
    }
    let stats = pool.shutdown().await;
    let elapsed = started.elapsed();

    println!("ChainLedger — Worker Pool Demo");
    println!("═══════════════════════════════════════════════════════");
    println!("  jobs      : {}", jobs.len());
    println!("  published : {}", stats.published);
    println!("  failed    : {}", stats.failed);
    println!("  elapsed   : {elapsed:?}");
    println!("═══════════════════════════════════════════════════════");

    // ── 5. Read the published reports back ───────────────────────────────────
    for (path, job) in paths.iter().zip(&jobs) {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
        match store.get(&job.chain.slug, job.tx_hash).await? {
            Some(report) => {
                println!(
                    "\n  {name} [{}]",
                    if report.is_complete() { "complete" } else { "partial" }
                );
                for event in report.events() {
                    println!("    #{:<2} {}", event.sequence_index, event.notes);
                }
            }
            None => println!("\n  {name} [not published]"),
        }
    }

    Ok(())
}
