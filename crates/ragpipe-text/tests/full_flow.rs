use ragpipe_core::traits::SearchService;
use ragpipe_core::types::{FieldDef, IndexSchema, SearchDocument};
use ragpipe_text::TantivySearchService;

fn docs(items: &[(&str, &str)]) -> Vec<SearchDocument> {
    items.iter().map(|(id, content)| SearchDocument { id: id.to_string(), content: content.to_string() }).collect()
}

#[test]
fn tantivy_full_flow() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let svc = TantivySearchService::open(tmp.path());
    let schema = IndexSchema::chunks("manual");
    svc.create_or_update_index(&schema).expect("create");
    svc.create_or_update_index(&schema).expect("create is idempotent");

    let results = svc
        .upsert_documents("manual", &docs(&[
            ("0", "The boiler must be bled before the first firing."),
            ("1", "Firewood should be seasoned for a year. Firewood burns hotter when dry."),
            ("2", "Networking cables run along the north wall."),
        ]))
        .expect("upsert");
    assert!(results.iter().all(|r| r.succeeded));

    let hits = svc.search("manual", "firewood", 5).expect("search");
    assert_eq!(hits.first().map(|h| h.id.as_str()), Some("1"));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

    // A natural-language question with punctuation must not fail to parse.
    let hits = svc.search("manual", "How do I bleed the boiler? (first: firing)", 5).expect("lenient");
    assert_eq!(hits.first().map(|h| h.id.as_str()), Some("0"));

    // Indexes persist on disk and are reopened lazily by a fresh service.
    let reopened = TantivySearchService::open(tmp.path());
    let hits = reopened.search("manual", "networking", 5).expect("search after reopen");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, "Networking cables run along the north wall.");
}

#[test]
fn upsert_same_id_overwrites() {
    let svc = TantivySearchService::in_memory();
    svc.create_or_update_index(&IndexSchema::chunks("idx")).expect("create");
    svc.upsert_documents("idx", &docs(&[("0", "alpha"), ("1", "bravo")])).expect("first run");
    svc.upsert_documents("idx", &docs(&[("0", "charlie"), ("1", "delta")])).expect("second run");

    let mut ids = svc.list_ids("idx", 100).expect("list");
    ids.sort();
    assert_eq!(ids, vec!["0", "1"]);
    assert!(svc.search("idx", "alpha", 5).expect("search").is_empty());
    assert_eq!(svc.search("idx", "charlie", 5).expect("search")[0].id, "0");
}

#[test]
fn top_k_caps_results() {
    let svc = TantivySearchService::in_memory();
    svc.create_or_update_index(&IndexSchema::chunks("idx")).expect("create");
    let many: Vec<SearchDocument> = (0..20).map(|i| SearchDocument { id: i.to_string(), content: format!("solar panel note {}", i) }).collect();
    svc.upsert_documents("idx", &many).expect("upsert");
    assert_eq!(svc.search("idx", "solar", 5).expect("search").len(), 5);
    assert_eq!(svc.search("idx", "solar", 1).expect("search").len(), 1);
    assert!(svc.search("idx", "solar", 0).expect("search").is_empty());
}

#[test]
fn huge_top_k_returns_what_the_index_holds() {
    let svc = TantivySearchService::in_memory();
    svc.create_or_update_index(&IndexSchema::chunks("idx")).expect("create");
    svc.upsert_documents("idx", &docs(&[("0", "rain barrel overflow"), ("1", "rain gauge reading")])).expect("upsert");

    let hits = svc.search("idx", "rain", usize::MAX / 4).expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(svc.list_ids("idx", usize::MAX).expect("list").len(), 2);

    svc.create_or_update_index(&IndexSchema::chunks("empty")).expect("create");
    assert!(svc.search("empty", "rain", usize::MAX / 4).expect("search empty").is_empty());
}

#[test]
fn empty_key_is_a_per_item_failure() {
    let svc = TantivySearchService::in_memory();
    svc.create_or_update_index(&IndexSchema::chunks("idx")).expect("create");
    let results = svc.upsert_documents("idx", &docs(&[("0", "kept"), ("", "dropped")])).expect("upsert");
    assert!(results[0].succeeded);
    assert!(!results[1].succeeded);
    assert_eq!(svc.list_ids("idx", 10).expect("list"), vec!["0"]);
}

#[test]
fn delete_removes_documents() {
    let svc = TantivySearchService::in_memory();
    svc.create_or_update_index(&IndexSchema::chunks("idx")).expect("create");
    svc.upsert_documents("idx", &docs(&[("a", "one"), ("b", "two")])).expect("upsert");
    svc.delete_documents("idx", &["a".to_string()]).expect("delete");
    assert_eq!(svc.list_ids("idx", 10).expect("list"), vec!["b"]);
}

#[test]
fn conflicting_schema_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let svc = TantivySearchService::open(tmp.path());
    svc.create_or_update_index(&IndexSchema::chunks("idx")).expect("create");
    let mut other = IndexSchema::chunks("idx");
    other.fields.push(FieldDef::searchable("title"));
    assert!(svc.create_or_update_index(&other).is_err());
}
