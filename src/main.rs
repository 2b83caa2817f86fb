//! # chunk-weld CLI (`weld`)
//!
//! The `weld` binary drives the aggregation pipeline against a
//! configured chunk store.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `weld check` | Validate configuration and probe store connectivity |
//! | `weld docs --tenant <id>` | List document ids for a tenant |
//! | `weld aggregate --tenant <id> --doc <id>` | Aggregate one document |
//! | `weld corpus --tenant <id>` | Aggregate the whole tenant corpus |
//!
//! ## Examples
//!
//! ```bash
//! # Validate config and store reachability
//! weld check --config ./config/weld.toml
//!
//! # Aggregate one document, print the JSON collection
//! weld aggregate --tenant 18 --doc 42
//!
//! # Aggregate everything for tenant 18 into a file
//! weld corpus --tenant 18 --out ./artifacts/tenant-18.json
//! ```

mod aggregate;
mod config;
mod dedup;
mod error;
mod export;
mod models;
mod pipeline;
mod store;
mod tags;
mod tokens;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{load_config, Config};
use crate::pipeline::{Pipeline, PipelineRun};
use crate::store::postgres::PostgresStore;
use crate::store::FragmentStore;
use crate::tags::ProvenanceTagger;
use crate::tokens::TiktokenCounter;

/// chunk-weld — token-bounded chunk aggregation for RAG ingestion.
#[derive(Parser)]
#[command(
    name = "weld",
    about = "Token-bounded chunk aggregation pipeline for RAG ingestion",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/weld.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and probe store connectivity.
    Check,

    /// List distinct document ids for a tenant.
    Docs {
        /// Tenant (company) identifier.
        #[arg(long)]
        tenant: i64,
    },

    /// Aggregate a single document and emit the fragment collection.
    Aggregate {
        /// Tenant (company) identifier.
        #[arg(long)]
        tenant: i64,

        /// Document identifier.
        #[arg(long)]
        doc: i64,

        /// Write JSON here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Aggregate every document for a tenant, paginating the store.
    Corpus {
        /// Tenant (company) identifier.
        #[arg(long)]
        tenant: i64,

        /// Write JSON here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Check => run_check(&config).await,
        Commands::Docs { tenant } => run_docs(&config, tenant).await,
        Commands::Aggregate { tenant, doc, out } => {
            let run = run_pipeline(&config, tenant, Some(doc)).await?;
            report(&run, out.as_deref())
        }
        Commands::Corpus { tenant, out } => {
            let run = run_pipeline(&config, tenant, None).await?;
            report(&run, out.as_deref())
        }
    }
}

async fn run_check(config: &Config) -> Result<()> {
    let store = PostgresStore::connect(&config.store)
        .await
        .context("store connection failed")?;
    // Cheap probe; tenant 0 should exist nowhere but the query must parse.
    store.count_fragments(0, None).await?;
    store.close().await;
    println!("config ok");
    println!("  store: {}", config.store.table);
    println!("  min_tokens: {}", config.aggregation.min_tokens);
    println!("  page_size: {}", config.aggregation.page_size);
    println!("  subgraph labels: {}", config.subgraphs.len());
    Ok(())
}

async fn run_docs(config: &Config, tenant: i64) -> Result<()> {
    let store = PostgresStore::connect(&config.store).await?;
    let docs = store.list_documents(tenant).await?;
    store.close().await;
    for doc in &docs {
        println!("{doc}");
    }
    eprintln!("{} documents for tenant {}", docs.len(), tenant);
    Ok(())
}

async fn run_pipeline(config: &Config, tenant: i64, doc: Option<i64>) -> Result<PipelineRun> {
    let store = Arc::new(PostgresStore::connect(&config.store).await?);
    let counter = Arc::new(TiktokenCounter::new()?);
    let tagger = ProvenanceTagger::new(config.subgraphs.clone());
    let pipeline = Pipeline::new(
        store.clone(),
        counter,
        tagger,
        &config.aggregation,
        Duration::from_secs(config.store.timeout_secs),
    )?;

    let run = match doc {
        Some(doc) => pipeline.aggregate_document(tenant, doc).await,
        None => {
            let cancel = CancellationToken::new();
            let signal_guard = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_guard.cancel();
                }
            });
            pipeline.aggregate_corpus(tenant, &cancel).await
        }
    };

    store.close().await;
    Ok(run)
}

fn report(run: &PipelineRun, out: Option<&std::path::Path>) -> Result<()> {
    export::write_run(run, out)?;

    eprintln!("  rows fetched: {}", run.rows_fetched);
    eprintln!("  rows kept after dedup: {}", run.rows_kept);
    eprintln!("  aggregated fragments: {}", run.fragments.len());
    for (doc, err) in &run.skipped_documents {
        eprintln!("  skipped document {doc}: {err}");
    }
    if run.cancelled {
        eprintln!("  cancelled — output is a partial prefix");
    }
    match &run.error {
        Some(err) => {
            eprintln!("  aborted: {err}");
            anyhow::bail!("pipeline run incomplete: {err}");
        }
        None => {
            eprintln!("ok");
            Ok(())
        }
    }
}
