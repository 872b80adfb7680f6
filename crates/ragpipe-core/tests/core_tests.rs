use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

use ragpipe_core::blob::FsBlobStore;
use ragpipe_core::config::{Backend, ChunkingConfig, Settings};
use ragpipe_core::data_processor::{split_pages, DataProcessor};
use ragpipe_core::traits::{BlobStore, PageSource};
use ragpipe_core::{Error, Stage};

struct FixedPages(Vec<String>);

impl PageSource for FixedPages {
    fn pages(&self, _path: &Path) -> ragpipe_core::Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

struct BrokenPage;

impl PageSource for BrokenPage {
    fn pages(&self, path: &Path) -> ragpipe_core::Result<Vec<String>> {
        Err(Error::DocumentRead(format!("{}: page 2 is corrupt", path.display())))
    }
}

fn texts(pages: &[&str], chunk_size: usize) -> Vec<String> {
    split_pages(pages, chunk_size).expect("split").into_iter().map(|c| c.text).collect()
}

#[test]
fn split_ten_chars_by_four() {
    assert_eq!(texts(&["ABCDEFGHIJ"], 4), vec!["ABCD", "EFGH", "IJ"]);
}

#[test]
fn empty_page_yields_no_chunks() {
    assert!(texts(&[""], 4).is_empty());
    // Surrounding pages are unaffected and numbering stays contiguous.
    let chunks = split_pages(&["ab", "", "cd"], 4).expect("split");
    assert_eq!(chunks.iter().map(|c| c.sequence_index).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(chunks.iter().map(|c| c.page).collect::<Vec<_>>(), vec![0, 2]);
}

#[test]
fn chunks_cover_page_text_exactly() {
    let page = "The quick brown fox jumps over the lazy dog. Ünïcödé too.";
    for size in [1, 2, 3, 7, 10, 57, 58, 1000] {
        let chunks = texts(&[page], size);
        assert_eq!(chunks.concat(), page, "chunk_size={}", size);
        let expected = page.chars().count().div_ceil(size);
        assert_eq!(chunks.len(), expected, "chunk_size={}", size);
        let (last, rest) = chunks.split_last().expect("non-empty");
        assert!(rest.iter().all(|c| c.chars().count() == size));
        assert!(last.chars().count() <= size);
    }
}

#[test]
fn page_order_is_preserved() {
    assert_eq!(texts(&["abcde", "fg"], 2), vec!["ab", "cd", "e", "fg"]);
}

#[test]
fn zero_chunk_size_is_rejected() {
    let err = split_pages(&["abc"], 0).expect_err("zero size");
    assert_eq!(err.stage(), Stage::Config);
}

#[test]
fn process_file_uses_configured_chunk_size() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("doc.pdf");
    fs::write(&file, b"%PDF-stub").unwrap();
    let processor = DataProcessor::with_source(
        &ChunkingConfig { chunk_size: 3 },
        Box::new(FixedPages(vec!["abcdef".into(), "g".into()])),
    );
    let chunks = processor.process_file(&file).expect("process");
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2].text, "g");
    assert_eq!(chunks[2].page, 1);
}

#[test]
fn process_file_missing_is_document_read_error() {
    let processor = DataProcessor::new(&ChunkingConfig::default());
    let err = processor.process_file(Path::new("/definitely/not/here.pdf")).expect_err("missing");
    assert!(matches!(err, Error::DocumentRead(_)));
}

#[test]
fn page_extraction_failure_propagates() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("doc.pdf");
    fs::write(&file, b"%PDF-stub").unwrap();
    let processor = DataProcessor::with_source(&ChunkingConfig::default(), Box::new(BrokenPage));
    let err = processor.process_file(&file).expect_err("corrupt");
    assert_eq!(err.stage(), Stage::Read);
}

#[test]
fn garbage_pdf_is_document_read_error() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("not-a.pdf");
    fs::write(&file, b"this is plainly not a pdf").unwrap();
    let err = DataProcessor::new(&ChunkingConfig::default()).process_file(&file).expect_err("garbage");
    assert!(matches!(err, Error::DocumentRead(_)));
}

#[test]
fn fs_blob_store_overwrites_by_name() {
    let tmp = TempDir::new().unwrap();
    let store = FsBlobStore::at(tmp.path());
    store.put("report.pdf", Box::new(Cursor::new(b"first".to_vec())), 5).expect("put");
    store.put("report.pdf", Box::new(Cursor::new(b"second".to_vec())), 6).expect("put again");
    assert_eq!(fs::read(tmp.path().join("report.pdf")).unwrap(), b"second");
}

#[test]
fn fs_blob_store_rejects_escaping_names() {
    let tmp = TempDir::new().unwrap();
    let store = FsBlobStore::at(tmp.path());
    assert!(store.put("../evil.pdf", Box::new(Cursor::new(Vec::new())), 0).is_err());
    assert!(store.put("", Box::new(Cursor::new(Vec::new())), 0).is_err());
}

#[test]
fn settings_defaults_match_reference() {
    let s = Settings::default();
    assert_eq!(s.chunking.chunk_size, 1000);
    assert_eq!(s.retrieval.top_k, 5);
    assert_eq!(s.search.backend, Backend::Local);
    s.validate().expect("defaults are valid");
}

#[test]
fn settings_load_merges_explicit_file() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("ragpipe.toml");
    fs::write(
        &file,
        "[chunking]\nchunk_size = 250\n\n[retrieval]\ntop_k = 3\n\n[search]\nindex_name = \"manuals\"\n",
    )
    .unwrap();
    let s = Settings::load_for_env("test", Some(file.as_path())).expect("load");
    assert_eq!(s.chunking.chunk_size, 250);
    assert_eq!(s.retrieval.top_k, 3);
    assert_eq!(s.search.index_name, "manuals");
    assert_eq!(s.completion.api_version, "2024-10-21");
}

#[test]
fn settings_reject_invalid_values() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("bad.toml");
    fs::write(&file, "[retrieval]\ntop_k = 0\n").unwrap();
    let err = Settings::load_for_env("test", Some(file.as_path())).expect_err("top_k 0");
    assert_eq!(err.stage(), Stage::Config);

    let mut s = Settings::default();
    s.search.backend = Backend::Azure;
    assert!(s.validate().is_err(), "azure search needs service and key");
    s.search.service = Some("acme".into());
    s.search.key = Some("secret".into());
    s.validate().expect("complete azure search settings");
}

#[test]
fn settings_missing_explicit_file_is_config_error() {
    let err = Settings::load_for_env("test", Some(Path::new("/no/such/ragpipe.toml"))).expect_err("missing");
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn completion_settings_checked_on_demand() {
    let mut s = Settings::default();
    assert!(s.require_completion().is_err());
    s.completion.endpoint = Some("https://example.openai.azure.com".into());
    s.completion.key = Some("k".into());
    s.completion.deployment = Some("gpt-4o".into());
    let (endpoint, _, deployment) = s.require_completion().expect("complete");
    assert_eq!(endpoint, "https://example.openai.azure.com");
    assert_eq!(deployment, "gpt-4o");
}
