use anyhow::{bail, Result};
use hover_core::ClaimResult;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub total_claims: usize,
    /// Claims whose every gold evidence title was retrieved.
    pub claims_with_all_docs: usize,
    pub coverage: f64,
    pub avg_recall: f64,
}

/// Fraction of distinct gold evidence titles present among the retrieved
/// titles. A claim without gold facts scores zero rather than being skipped.
pub fn claim_recall(result: &ClaimResult) -> f64 {
    let required: HashSet<&str> =
        result.supporting_facts.iter().map(|(title, _)| title.as_str()).collect();
    if required.is_empty() {
        return 0.0;
    }
    let retrieved: HashSet<&str> =
        result.retrieved_docs.iter().map(|doc| doc.title.as_str()).collect();
    let found = required.intersection(&retrieved).count();
    found as f64 / required.len() as f64
}

/// Aggregate recall over a full retrieval run. Erroring on an empty result
/// set keeps a zero-claim run from reporting NaN as a metric.
pub fn evaluate(results: &BTreeMap<String, ClaimResult>) -> Result<EvaluationMetrics> {
    if results.is_empty() {
        bail!("cannot evaluate an empty result set");
    }
    let mut claims_with_all_docs = 0usize;
    let mut total_recall = 0.0f64;
    for result in results.values() {
        let recall = claim_recall(result);
        total_recall += recall;
        if recall == 1.0 {
            claims_with_all_docs += 1;
        }
    }
    let total_claims = results.len();
    Ok(EvaluationMetrics {
        total_claims,
        claims_with_all_docs,
        coverage: claims_with_all_docs as f64 / total_claims as f64,
        avg_recall: total_recall / total_claims as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hover_core::RetrievedDoc;

    fn result(required: &[&str], retrieved: &[&str]) -> ClaimResult {
        ClaimResult {
            claim: "c".into(),
            retrieved_docs: retrieved
                .iter()
                .map(|title| RetrievedDoc {
                    doc_id: title.to_string(),
                    title: title.to_string(),
                    sentences: vec![],
                    score: 1.0,
                    url: String::new(),
                })
                .collect(),
            label: None,
            supporting_facts: required.iter().map(|t| (t.to_string(), 0)).collect(),
        }
    }

    #[test]
    fn recall_is_intersection_over_required() {
        let r = result(&["A", "B"], &["A", "C"]);
        assert_eq!(claim_recall(&r), 0.5);
    }

    #[test]
    fn recall_without_gold_facts_is_zero() {
        let r = result(&[], &["A", "B"]);
        assert_eq!(claim_recall(&r), 0.0);
    }

    #[test]
    fn duplicate_gold_titles_count_once() {
        // Two supporting sentences from the same document need one retrieval.
        let mut r = result(&["A"], &["A"]);
        r.supporting_facts.push(("A".to_string(), 1));
        assert_eq!(claim_recall(&r), 1.0);
    }

    #[test]
    fn coverage_and_avg_recall_aggregate_over_claims() {
        let mut results = BTreeMap::new();
        results.insert("u1".to_string(), result(&["A"], &["A"]));
        results.insert("u2".to_string(), result(&["B"], &["B"]));
        results.insert("u3".to_string(), result(&["C"], &["D"]));
        let metrics = evaluate(&results).unwrap();
        assert_eq!(metrics.total_claims, 3);
        assert_eq!(metrics.claims_with_all_docs, 2);
        assert!((metrics.coverage - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics.avg_recall - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_result_set_is_a_loud_error() {
        assert!(evaluate(&BTreeMap::new()).is_err());
    }
}
