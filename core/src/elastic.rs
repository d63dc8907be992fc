use crate::backend::{
    BulkSummary, CreateOutcome, DocFailure, FieldCombination, Hit, IndexSpec, SearchBackend,
    SearchRequest, StoredFields,
};
use crate::IndexedDocument;
use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Total attempts per document in a bulk write before the failure is
/// reported as permanent.
const BULK_ATTEMPTS: usize = 3;

/// Elasticsearch over its REST API. One handle per endpoint; cheap to create,
/// holds no index state, safe to scope per run.
pub struct ElasticBackend {
    http: Client,
    base: String,
}

impl ElasticBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("building http client")?;
        Ok(Self { http, base: base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }
}

fn index_settings(spec: &IndexSpec) -> Value {
    json!({
        "settings": {
            "number_of_shards": spec.shards,
            "number_of_replicas": spec.replicas,
            "analysis": {
                "analyzer": { "default": { "type": "standard" } }
            },
            "similarity": {
                "bm25_similarity": { "type": "BM25", "k1": spec.k1, "b": spec.b }
            }
        },
        "mappings": {
            "properties": {
                "title": {
                    "type": "text",
                    "similarity": "bm25_similarity",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "text": { "type": "text", "similarity": "bm25_similarity" },
                "sentences": { "type": "text", "similarity": "bm25_similarity" }
            }
        }
    })
}

fn field_spec(fields: &[(String, f32)]) -> Vec<String> {
    fields
        .iter()
        .map(|(name, boost)| {
            if (*boost - 1.0).abs() < f32::EPSILON {
                name.clone()
            } else {
                format!("{name}^{boost}")
            }
        })
        .collect()
}

fn query_body(req: &SearchRequest) -> Value {
    let mode = match req.combine {
        FieldCombination::BestFields => "best_fields",
        FieldCombination::MostFields => "most_fields",
    };
    json!({
        "size": req.k,
        "query": {
            "multi_match": {
                "query": req.text,
                "fields": field_spec(&req.fields),
                "type": mode
            }
        },
        "_source": ["title", "sentences", "url"]
    })
}

fn bulk_body(index: &str, docs: &[&IndexedDocument]) -> Result<String> {
    let mut body = String::new();
    for doc in docs {
        let action = json!({ "index": { "_index": index, "_id": doc.id } });
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

#[derive(Deserialize)]
struct BulkResponse {
    items: Vec<BulkItem>,
}

#[derive(Deserialize)]
struct BulkItem {
    index: BulkItemStatus,
}

#[derive(Deserialize)]
struct BulkItemStatus {
    error: Option<Value>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f32>,
    #[serde(rename = "_source")]
    source: StoredFields,
}

impl SearchBackend for ElasticBackend {
    fn create_index(&self, name: &str, spec: &IndexSpec) -> Result<CreateOutcome> {
        let head = self.http.head(self.url(name)).send().context("checking index existence")?;
        if head.status() == StatusCode::OK {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let resp = self.http.put(self.url(name)).json(&index_settings(spec)).send()?;
        let status = resp.status();
        if status.is_success() {
            return Ok(CreateOutcome::Created);
        }
        let text = resp.text().unwrap_or_default();
        // Lost a creation race; same outcome as the HEAD short-circuit.
        if text.contains("resource_already_exists_exception") {
            return Ok(CreateOutcome::AlreadyExists);
        }
        bail!("index creation failed: {status}: {text}");
    }

    fn bulk_write(&self, index: &str, docs: &[IndexedDocument]) -> Result<BulkSummary> {
        let mut summary = BulkSummary::default();
        let mut pending: Vec<&IndexedDocument> = docs.iter().collect();
        let mut attempt = 0;
        while !pending.is_empty() {
            attempt += 1;
            let resp = self
                .http
                .post(self.url("_bulk"))
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(bulk_body(index, &pending)?)
                .send()?
                .error_for_status()?;
            let parsed: BulkResponse = resp.json().context("parsing bulk response")?;
            if parsed.items.len() != pending.len() {
                bail!(
                    "bulk response carried {} items for {} documents",
                    parsed.items.len(),
                    pending.len()
                );
            }
            let mut retry: Vec<&IndexedDocument> = Vec::new();
            for (doc, item) in pending.iter().copied().zip(parsed.items.iter()) {
                match &item.index.error {
                    None => summary.indexed += 1,
                    Some(reason) if attempt >= BULK_ATTEMPTS => {
                        summary.failures.push(DocFailure {
                            id: doc.id.clone(),
                            reason: reason.to_string(),
                        });
                    }
                    Some(_) => retry.push(doc),
                }
            }
            if attempt >= BULK_ATTEMPTS {
                break;
            }
            if !retry.is_empty() {
                std::thread::sleep(Duration::from_millis(500 * attempt as u64));
            }
            pending = retry;
        }
        Ok(summary)
    }

    fn refresh(&self, index: &str) -> Result<()> {
        self.http
            .post(self.url(&format!("{index}/_refresh")))
            .send()?
            .error_for_status()
            .context("refreshing index")?;
        Ok(())
    }

    fn query(&self, index: &str, req: &SearchRequest) -> Result<Vec<Hit>> {
        let resp = self
            .http
            .post(self.url(&format!("{index}/_search")))
            .json(&query_body(req))
            .send()?
            .error_for_status()?;
        let parsed: SearchResponse = resp.json().context("parsing search response")?;
        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|h| Hit { id: h.id, score: h.score.unwrap_or(0.0), fields: h.source })
            .collect())
    }
}
