use hover_core::backend::{IndexSpec, SearchBackend};
use hover_core::memory::MemoryBackend;
use hover_core::normalize::normalize;
use hover_core::{ClaimExample, Label, RawDocument};
use hover_retriever::eval::evaluate;
use hover_retriever::{load_dataset, Retriever};
use serde_json::json;
use tempfile::tempdir;

const INDEX: &str = "wiki";

fn build_index(docs: &[(&str, &[&str])]) -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.create_index(INDEX, &IndexSpec::default()).unwrap();
    let indexed: Vec<_> = docs
        .iter()
        .map(|(title, sentences)| {
            normalize(RawDocument {
                id: None,
                url: None,
                title: Some(title.to_string()),
                text: sentences.iter().map(|s| json!(s)).collect(),
            })
            .unwrap()
        })
        .collect();
    backend.bulk_write(INDEX, &indexed).unwrap();
    backend.refresh(INDEX).unwrap();
    backend
}

fn example(uid: &str, claim: &str, facts: &[&str], label: Option<Label>) -> ClaimExample {
    ClaimExample {
        uid: uid.into(),
        claim: claim.into(),
        label,
        supporting_facts: facts.iter().map(|t| (t.to_string(), 0)).collect(),
    }
}

#[test]
fn title_only_overlap_still_retrieves_and_outranks_body_overlap() {
    let backend = build_index(&[
        ("Eiffel Tower", &["A wrought-iron lattice structure."] as &[&str]),
        ("Some list", &["The Eiffel Tower appears in this text."]),
    ]);
    let retriever = Retriever::new(&backend, INDEX);
    let docs = retriever.retrieve("Eiffel Tower", 10).unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].title, "Eiffel Tower");
    assert!(docs[0].score > docs[1].score);
}

#[test]
fn capital_of_france_returns_paris_first() {
    let backend = build_index(&[
        ("Paris", &["Paris is the capital of France."] as &[&str]),
        ("Lyon", &["Lyon is a city in France."]),
    ]);
    let retriever = Retriever::new(&backend, INDEX);
    let docs = retriever.retrieve("capital of France", 1).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].doc_id, "Paris");
}

#[test]
fn hits_carry_the_ordered_sentence_sequence() {
    let sentences = ["First sentence.", "Second sentence.", "Third sentence."];
    let backend = build_index(&[("Ordered", &sentences as &[&str])]);
    let retriever = Retriever::new(&backend, INDEX);
    let docs = retriever.retrieve("ordered sentence", 5).unwrap();
    assert_eq!(docs[0].sentences, sentences);
    assert!(docs[0].score > 0.0);
}

#[test]
fn batch_results_are_keyed_by_uid_and_keep_annotations() {
    let backend = build_index(&[
        ("Paris", &["Paris is the capital of France."] as &[&str]),
        ("Lyon", &["Lyon is a city in France."]),
    ]);
    let retriever = Retriever::new(&backend, INDEX);
    let dataset = vec![
        example("u1", "Paris is the capital of France", &["Paris"], Some(Label::Supported)),
        example("u2", "Lyon is the capital of France", &["Lyon", "Paris"], Some(Label::NotSupported)),
    ];
    let results = retriever.batch_retrieve(&dataset, 10, None).unwrap();
    assert_eq!(results.len(), 2);
    let r1 = &results["u1"];
    assert_eq!(r1.label, Some(Label::Supported));
    assert_eq!(r1.supporting_facts, vec![("Paris".to_string(), 0)]);
    assert!(r1.retrieved_docs.iter().any(|d| d.title == "Paris"));
}

#[test]
fn duplicate_uids_keep_the_last_result() {
    let backend = build_index(&[("Paris", &["Paris is the capital of France."] as &[&str])]);
    let retriever = Retriever::new(&backend, INDEX);
    let dataset = vec![
        example("dup", "Paris", &[], None),
        example("dup", "capital of France", &[], None),
    ];
    let results = retriever.batch_retrieve(&dataset, 10, None).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results["dup"].claim, "capital of France");
}

#[test]
fn batch_retrieval_is_deterministic_over_a_static_index() {
    let backend = build_index(&[
        ("Paris", &["Paris is the capital of France."] as &[&str]),
        ("Lyon", &["Lyon is a city in France."]),
        ("France", &["France is a country in Europe."]),
    ]);
    let retriever = Retriever::new(&backend, INDEX);
    let dataset = vec![
        example("u1", "capital of France", &[], None),
        example("u2", "city in France", &[], None),
    ];
    let first = retriever.batch_retrieve(&dataset, 10, None).unwrap();
    let second = retriever.batch_retrieve(&dataset, 10, None).unwrap();
    assert_eq!(serde_json::to_value(&first).unwrap(), serde_json::to_value(&second).unwrap());
}

#[test]
fn results_are_persisted_once_as_a_single_mapping() {
    let backend = build_index(&[("Paris", &["Paris is the capital of France."] as &[&str])]);
    let retriever = Retriever::new(&backend, INDEX);
    let dir = tempdir().unwrap();
    let out = dir.path().join("nested/results.json");
    let dataset = vec![example("u1", "capital of France", &["Paris"], Some(Label::Supported))];
    retriever.batch_retrieve(&dataset, 10, Some(&out)).unwrap();

    let written: serde_json::Value =
        serde_json::from_reader(std::fs::File::open(&out).unwrap()).unwrap();
    assert_eq!(written["u1"]["claim"], "capital of France");
    assert_eq!(written["u1"]["label"], "SUPPORTED");
    assert_eq!(written["u1"]["retrieved_docs"][0]["title"], "Paris");
    assert!(written["u1"]["retrieved_docs"][0]["sentences"].is_array());
}

#[test]
fn end_to_end_recall_over_a_batch() {
    let backend = build_index(&[
        ("Paris", &["Paris is the capital of France."] as &[&str]),
        ("Lyon", &["Lyon is a city in France."]),
    ]);
    let retriever = Retriever::new(&backend, INDEX);
    let dataset = vec![
        example("u1", "Paris is the capital of France", &["Paris"], Some(Label::Supported)),
        example("u2", "Berlin is the capital of Germany", &["Berlin"], Some(Label::NotSupported)),
    ];
    let results = retriever.batch_retrieve(&dataset, 10, None).unwrap();
    let metrics = evaluate(&results).unwrap();
    assert_eq!(metrics.total_claims, 2);
    assert_eq!(metrics.claims_with_all_docs, 1);
    assert!((metrics.coverage - 0.5).abs() < 1e-9);
    assert!((metrics.avg_recall - 0.5).abs() < 1e-9);
}

#[test]
fn dataset_files_parse_with_optional_fields_and_unknown_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hover_dev_release_v1.1.json");
    std::fs::write(
        &path,
        r#"[
            {"uid":"a","claim":"c1","label":"SUPPORTED","supporting_facts":[["Paris",0],["Lyon",2]],"num_hops":2},
            {"uid":"b","claim":"c2"}
        ]"#,
    )
    .unwrap();
    let dataset = load_dataset(&path).unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset[0].label, Some(Label::Supported));
    assert_eq!(dataset[0].supporting_facts[1], ("Lyon".to_string(), 2));
    assert_eq!(dataset[1].label, None);
    assert!(dataset[1].supporting_facts.is_empty());
}
