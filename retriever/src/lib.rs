pub mod eval;

use anyhow::{Context, Result};
use hover_core::backend::{FieldCombination, Hit, SearchBackend, SearchRequest};
use hover_core::{ClaimExample, ClaimResult, RetrievedDoc};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

/// Total attempts per claim query before the claim is given up on.
const QUERY_ATTEMPTS: usize = 3;

/// A claim naming an entity should strongly prefer that entity's page.
const TITLE_BOOST: f32 = 3.0;

pub struct Retriever<'a> {
    backend: &'a dyn SearchBackend,
    index: String,
}

impl<'a> Retriever<'a> {
    pub fn new(backend: &'a dyn SearchBackend, index: impl Into<String>) -> Self {
        Self { backend, index: index.into() }
    }

    /// Top-k candidate documents for one claim, in engine rank order.
    ///
    /// The query spans `title` and `text` with the title boosted 3x, combined
    /// best-field-wins so one strong field beats two weak ones. Each hit's
    /// sentence blob is split back into the ordered sentence sequence.
    pub fn retrieve(&self, claim: &str, k: usize) -> Result<Vec<RetrievedDoc>> {
        let req = SearchRequest {
            text: claim.to_string(),
            fields: vec![("title".to_string(), TITLE_BOOST), ("text".to_string(), 1.0)],
            k,
            combine: FieldCombination::BestFields,
        };
        let hits = self.query_with_retry(&req)?;
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedDoc {
                doc_id: hit.id,
                title: hit.fields.title,
                sentences: split_sentences(&hit.fields.sentences),
                score: hit.score,
                url: hit.fields.url,
            })
            .collect())
    }

    fn query_with_retry(&self, req: &SearchRequest) -> Result<Vec<Hit>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.backend.query(&self.index, req) {
                Ok(hits) => return Ok(hits),
                Err(err) if attempt < QUERY_ATTEMPTS => {
                    tracing::warn!(%err, attempt, "query failed, retrying");
                    std::thread::sleep(Duration::from_millis(200 * attempt as u64));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One retrieval per claim over the whole dataset, keyed by uid (last
    /// write wins on a duplicate uid). A claim that still fails after retries
    /// is logged and dropped; the batch continues. When `output` is given the
    /// complete mapping is written once, after all claims are processed.
    pub fn batch_retrieve(
        &self,
        dataset: &[ClaimExample],
        k: usize,
        output: Option<&Path>,
    ) -> Result<BTreeMap<String, ClaimResult>> {
        let mut results: BTreeMap<String, ClaimResult> = BTreeMap::new();
        let mut failed = 0u64;
        for (done, example) in dataset.iter().enumerate() {
            match self.retrieve(&example.claim, k) {
                Ok(retrieved_docs) => {
                    results.insert(
                        example.uid.clone(),
                        ClaimResult {
                            claim: example.claim.clone(),
                            retrieved_docs,
                            label: example.label,
                            supporting_facts: example.supporting_facts.clone(),
                        },
                    );
                }
                Err(err) => {
                    failed += 1;
                    tracing::error!(uid = %example.uid, %err, "retrieval failed for claim");
                }
            }
            if (done + 1) % 100 == 0 {
                tracing::info!(done = done + 1, total = dataset.len(), "retrieval progress");
            }
        }
        if failed > 0 {
            tracing::warn!(failed, "claims dropped after retry exhaustion");
        }
        if let Some(path) = output {
            save_results(&results, path)?;
        }
        Ok(results)
    }
}

fn split_sentences(blob: &str) -> Vec<String> {
    if blob.is_empty() {
        return Vec::new();
    }
    blob.split('\n').map(str::to_string).collect()
}

/// Load one dataset split: a JSON array of claim examples. Unknown keys in
/// the release files are ignored.
pub fn load_dataset(path: &Path) -> Result<Vec<ClaimExample>> {
    let f = File::open(path).with_context(|| format!("opening dataset {}", path.display()))?;
    let dataset = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing dataset {}", path.display()))?;
    Ok(dataset)
}

pub fn save_results(results: &BTreeMap<String, ClaimResult>, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(f), results)?;
    tracing::info!(path = %path.display(), claims = results.len(), "saved results");
    Ok(())
}
