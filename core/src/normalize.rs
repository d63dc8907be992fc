use crate::{IndexedDocument, RawDocument};
use anyhow::{bail, Result};
use serde_json::Value;

/// Flatten a raw `text` field into an ordered sentence sequence.
///
/// Plain strings are kept as-is; arrays are flattened one level keeping only
/// their string members. Anything else is corpus noise and is dropped.
pub fn flatten_sentences(text: &[Value]) -> Vec<String> {
    let mut sentences = Vec::new();
    for item in text {
        match item {
            Value::String(s) => sentences.push(s.clone()),
            Value::Array(inner) => {
                sentences.extend(inner.iter().filter_map(|v| v.as_str().map(str::to_string)));
            }
            _ => {}
        }
    }
    sentences
}

/// Convert one raw corpus record into its canonical indexable shape.
///
/// The title is load-bearing for identity and evaluation matching, so a
/// missing or empty title fails this document. Identity falls back to the
/// title when the dump carries no id.
pub fn normalize(raw: RawDocument) -> Result<IndexedDocument> {
    let title = match raw.title {
        Some(t) if !t.is_empty() => t,
        _ => bail!("document missing title"),
    };
    let sentences = flatten_sentences(&raw.text);
    let full_text = sentences.join(" ");
    let sentences_blob = sentences.join("\n");
    let id = match raw.id {
        Some(id) if !id.is_empty() => id,
        _ => title.clone(),
    };
    Ok(IndexedDocument { id, title, full_text, sentences_blob, url: raw.url.unwrap_or_default() })
}
