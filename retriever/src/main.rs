use anyhow::Result;
use clap::Parser;
use hover_core::elastic::ElasticBackend;
use hover_retriever::eval::evaluate;
use hover_retriever::{load_dataset, Retriever};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

const SPLITS: [&str; 3] = ["train", "dev", "test"];

#[derive(Parser)]
#[command(name = "retriever")]
#[command(about = "Retrieve evidence documents per claim and score recall", long_about = None)]
struct Args {
    /// Directory holding the dataset split files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Directory for per-split result files
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    /// Index to query
    #[arg(long, default_value = "hotpot_wiki")]
    index: String,
    /// Search engine endpoint
    #[arg(long, default_value = "http://localhost:9200")]
    es_url: String,
    /// Documents retrieved per claim
    #[arg(long, default_value_t = 100)]
    k: usize,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let backend = ElasticBackend::new(&args.es_url)?;
    let retriever = Retriever::new(&backend, &args.index);

    for split in SPLITS {
        let dataset_path = args.data_dir.join(format!("hover_{split}_release_v1.1.json"));
        if !dataset_path.exists() {
            tracing::warn!(split, path = %dataset_path.display(), "dataset file missing, skipping split");
            continue;
        }
        let dataset = load_dataset(&dataset_path)?;
        tracing::info!(split, examples = dataset.len(), "loaded dataset");

        let output = args.output_dir.join(format!("hover_{split}_bm25_top{}.json", args.k));
        let results = retriever.batch_retrieve(&dataset, args.k, Some(&output))?;

        // The test split ships without labels; nothing to score there.
        if results.values().any(|r| r.label.is_some()) {
            let metrics = evaluate(&results)?;
            tracing::info!(
                split,
                total_claims = metrics.total_claims,
                claims_with_all_docs = metrics.claims_with_all_docs,
                coverage = metrics.coverage,
                avg_recall = metrics.avg_recall,
                "retrieval quality"
            );
        }
    }
    Ok(())
}
