use crate::IndexedDocument;
use anyhow::Result;
use serde::Deserialize;

/// Ranking configuration for a new index. Fixed at creation time; changing
/// the BM25 constants afterwards requires rebuilding the index.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub shards: u32,
    pub replicas: u32,
    /// Term-frequency saturation constant.
    pub k1: f64,
    /// Length-normalization constant.
    pub b: f64,
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self { shards: 1, replicas: 0, k1: 1.2, b: 0.75 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The index was already there; callers proceed without modification.
    AlreadyExists,
}

/// How per-field scores combine in a multi-field query. `BestFields` takes
/// the single strongest field so a weak match in both fields does not outrank
/// a strong match in one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCombination {
    BestFields,
    MostFields,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub text: String,
    /// (field name, boost) pairs, e.g. `("title", 3.0)`.
    pub fields: Vec<(String, f32)>,
    pub k: usize,
    pub combine: FieldCombination,
}

/// Stored fields returned with each hit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoredFields {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sentences: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub id: String,
    pub score: f32,
    pub fields: StoredFields,
}

#[derive(Debug, Clone)]
pub struct DocFailure {
    pub id: String,
    pub reason: String,
}

/// Outcome of one bulk write. Failures are permanent: the backend has already
/// exhausted its per-item retries by the time they are reported.
#[derive(Debug, Clone, Default)]
pub struct BulkSummary {
    pub indexed: u64,
    pub failures: Vec<DocFailure>,
}

/// The search engine, seen as a ranking oracle. The engine owns term
/// statistics and scoring; this side owns everything else.
pub trait SearchBackend {
    /// Idempotent: an existing index is left untouched.
    fn create_index(&self, name: &str, spec: &IndexSpec) -> Result<CreateOutcome>;

    fn bulk_write(&self, index: &str, docs: &[IndexedDocument]) -> Result<BulkSummary>;

    /// Blocks until all prior writes are visible to queries.
    fn refresh(&self, index: &str) -> Result<()>;

    /// Ranked hits, descending score, at most `req.k`.
    fn query(&self, index: &str, req: &SearchRequest) -> Result<Vec<Hit>>;
}
