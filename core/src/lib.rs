pub mod backend;
pub mod corpus;
pub mod elastic;
pub mod memory;
pub mod normalize;

use serde::{Deserialize, Serialize};

/// One line of a corpus shard, as it appears in the Wikipedia dump.
///
/// `title` is optional at the parse layer so that a document missing it can be
/// reported per-document instead of vanishing as a malformed line. `text` is
/// kept as raw JSON values: the dump mixes plain sentence strings with
/// one-level nested sentence lists.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDocument {
    pub id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub text: Vec<serde_json::Value>,
}

/// Canonical indexable document. Serialized form is the stored `_source`;
/// `id` travels separately as the bulk action id.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedDocument {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    /// All sentences joined by a single space, index field `text`.
    #[serde(rename = "text")]
    pub full_text: String,
    /// All sentences joined by newline, index field `sentences`. Splitting on
    /// newline recovers the original ordered sentence sequence.
    #[serde(rename = "sentences")]
    pub sentences_blob: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "SUPPORTED")]
    Supported,
    #[serde(rename = "NOT_SUPPORTED")]
    NotSupported,
}

/// One claim from a dataset split. The test split carries neither label nor
/// supporting facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimExample {
    pub uid: String,
    pub claim: String,
    #[serde(default)]
    pub label: Option<Label>,
    /// (document title, sentence index) gold evidence pairs.
    #[serde(default)]
    pub supporting_facts: Vec<(String, u32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDoc {
    pub doc_id: String,
    pub title: String,
    pub sentences: Vec<String>,
    /// Relevance score as assigned by the engine, higher is better.
    pub score: f32,
    pub url: String,
}

/// Retrieval output for one claim. Built once per run, never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResult {
    pub claim: String,
    /// Engine rank order, descending relevance.
    pub retrieved_docs: Vec<RetrievedDoc>,
    pub label: Option<Label>,
    pub supporting_facts: Vec<(String, u32)>,
}
