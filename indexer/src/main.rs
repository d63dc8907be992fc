use anyhow::Result;
use clap::{Parser, Subcommand};
use hover_core::backend::{CreateOutcome, IndexSpec, SearchBackend};
use hover_core::corpus::CorpusReader;
use hover_core::elastic::ElasticBackend;
use hover_core::normalize::normalize;
use hover_core::IndexedDocument;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

const PROGRESS_EVERY: u64 = 10_000;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Load a Wikipedia dump into the BM25 search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index if needed and bulk-load a dump directory or shard file
    Build {
        /// Dump path (directory of .bz2 shards, or a single shard)
        #[arg(long)]
        input: String,
        /// Target index name
        #[arg(long, default_value = "hotpot_wiki")]
        index: String,
        /// Search engine endpoint
        #[arg(long, default_value = "http://localhost:9200")]
        es_url: String,
        /// Documents per bulk request
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
        /// Abort on the first document with a missing title instead of
        /// skipping it
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, index, es_url, batch_size, strict } => {
            let backend = ElasticBackend::new(&es_url)?;
            build_index(&backend, &index, Path::new(&input), batch_size, strict)
        }
    }
}

fn build_index(
    backend: &dyn SearchBackend,
    index: &str,
    input: &Path,
    batch_size: usize,
    strict: bool,
) -> Result<()> {
    match backend.create_index(index, &IndexSpec::default())? {
        CreateOutcome::Created => tracing::info!(index, "created index"),
        CreateOutcome::AlreadyExists => {
            tracing::info!(index, "index already exists, loading into it")
        }
    }
    let stats = bulk_load(backend, index, input, batch_size, strict)?;
    tracing::info!(
        indexed = stats.indexed,
        failed = stats.failed,
        missing_title = stats.missing_title,
        "bulk load complete"
    );
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct LoadStats {
    indexed: u64,
    /// Documents the engine permanently rejected after its retries.
    failed: u64,
    missing_title: u64,
}

fn bulk_load(
    backend: &dyn SearchBackend,
    index: &str,
    input: &Path,
    batch_size: usize,
    strict: bool,
) -> Result<LoadStats> {
    let reader = CorpusReader::discover(input)?;
    tracing::info!(shards = reader.shard_count(), input = %input.display(), "scanning corpus");

    let mut stats = LoadStats::default();
    let mut batch: Vec<IndexedDocument> = Vec::with_capacity(batch_size);
    for raw in reader.docs() {
        match normalize(raw) {
            Ok(doc) => batch.push(doc),
            Err(err) => {
                if strict {
                    return Err(err);
                }
                stats.missing_title += 1;
                tracing::warn!(%err, "skipping document");
                continue;
            }
        }
        if batch.len() >= batch_size {
            flush(backend, index, &mut batch, &mut stats)?;
        }
    }
    flush(backend, index, &mut batch, &mut stats)?;

    // Queries issued after the load must observe every document.
    backend.refresh(index)?;
    Ok(stats)
}

fn flush(
    backend: &dyn SearchBackend,
    index: &str,
    batch: &mut Vec<IndexedDocument>,
    stats: &mut LoadStats,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let before = stats.indexed;
    let summary = backend.bulk_write(index, batch)?;
    stats.indexed += summary.indexed;
    for failure in &summary.failures {
        tracing::warn!(id = %failure.id, reason = %failure.reason, "document failed permanently");
    }
    stats.failed += summary.failures.len() as u64;
    batch.clear();
    if stats.indexed / PROGRESS_EVERY > before / PROGRESS_EVERY {
        tracing::info!(indexed = stats.indexed, "indexing progress");
    }
    Ok(())
}
