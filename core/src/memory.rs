use crate::backend::{
    BulkSummary, CreateOutcome, DocFailure, FieldCombination, Hit, IndexSpec, SearchBackend,
    SearchRequest, StoredFields,
};
use crate::IndexedDocument;
use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

/// In-memory stand-in for the search engine, used by tests across the
/// workspace. It models the contract semantics — idempotent creation, upsert
/// by id, writes invisible until `refresh`, boosted multi-field matching with
/// best/most combination — with naive token-overlap scoring. It is a test
/// double, not a ranking engine.
#[derive(Default)]
pub struct MemoryBackend {
    indexes: Mutex<BTreeMap<String, MemIndex>>,
    reject: HashSet<String>,
}

#[derive(Default)]
struct MemIndex {
    live: Vec<IndexedDocument>,
    pending: Vec<IndexedDocument>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that permanently fails writes for the given document ids,
    /// for exercising partial bulk failure handling.
    pub fn rejecting<I: IntoIterator<Item = String>>(ids: I) -> Self {
        Self { indexes: Mutex::default(), reject: ids.into_iter().collect() }
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn field_text<'a>(doc: &'a IndexedDocument, field: &str) -> Option<&'a str> {
    match field {
        "title" => Some(&doc.title),
        "text" => Some(&doc.full_text),
        "sentences" => Some(&doc.sentences_blob),
        _ => None,
    }
}

fn score(doc: &IndexedDocument, query: &HashSet<String>, req: &SearchRequest) -> f32 {
    let mut best = 0.0f32;
    let mut sum = 0.0f32;
    for (field, boost) in &req.fields {
        let Some(text) = field_text(doc, field) else { continue };
        let overlap = tokens(text).intersection(query).count() as f32;
        let s = overlap * boost;
        best = best.max(s);
        sum += s;
    }
    match req.combine {
        FieldCombination::BestFields => best,
        FieldCombination::MostFields => sum,
    }
}

impl SearchBackend for MemoryBackend {
    fn create_index(&self, name: &str, _spec: &IndexSpec) -> Result<CreateOutcome> {
        let mut indexes = self.indexes.lock();
        if indexes.contains_key(name) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        indexes.insert(name.to_string(), MemIndex::default());
        Ok(CreateOutcome::Created)
    }

    fn bulk_write(&self, index: &str, docs: &[IndexedDocument]) -> Result<BulkSummary> {
        let mut indexes = self.indexes.lock();
        let Some(idx) = indexes.get_mut(index) else { bail!("no such index: {index}") };
        let mut summary = BulkSummary::default();
        for doc in docs {
            if self.reject.contains(&doc.id) {
                summary
                    .failures
                    .push(DocFailure { id: doc.id.clone(), reason: "rejected".into() });
                continue;
            }
            idx.pending.retain(|d| d.id != doc.id);
            idx.pending.push(doc.clone());
            summary.indexed += 1;
        }
        Ok(summary)
    }

    fn refresh(&self, index: &str) -> Result<()> {
        let mut indexes = self.indexes.lock();
        let Some(idx) = indexes.get_mut(index) else { bail!("no such index: {index}") };
        let pending = std::mem::take(&mut idx.pending);
        for doc in pending {
            idx.live.retain(|d| d.id != doc.id);
            idx.live.push(doc);
        }
        Ok(())
    }

    fn query(&self, index: &str, req: &SearchRequest) -> Result<Vec<Hit>> {
        let indexes = self.indexes.lock();
        let Some(idx) = indexes.get(index) else { bail!("no such index: {index}") };
        let query = tokens(&req.text);
        let mut scored: Vec<(f32, &IndexedDocument)> = idx
            .live
            .iter()
            .map(|doc| (score(doc, &query, req), doc))
            .filter(|(s, _)| *s > 0.0)
            .collect();
        // Stable sort keeps insertion order among ties, so runs are repeatable.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(req.k);
        Ok(scored
            .into_iter()
            .map(|(s, doc)| Hit {
                id: doc.id.clone(),
                score: s,
                fields: StoredFields {
                    title: doc.title.clone(),
                    sentences: doc.sentences_blob.clone(),
                    url: doc.url.clone(),
                },
            })
            .collect())
    }
}
