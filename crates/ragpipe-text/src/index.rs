use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, Query, QueryParser};
use tantivy::schema::{Field, FieldEntry, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use ragpipe_core::config::{expand_path, SearchConfig};
use ragpipe_core::traits::SearchService;
use ragpipe_core::types::{IndexSchema, IndexingResult, SearchDocument, SearchHit};

use crate::tantivy_utils::{build_schema, classify_fields, register_tokenizer};

const WRITER_HEAP_BYTES: usize = 50_000_000;

struct ManagedIndex {
	index: Index,
	id_field: Field,
	content_field: Field,
	searchable: Vec<Field>,
}

impl ManagedIndex {
	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let (key, searchable) = classify_fields(&schema);
		let key = key.ok_or_else(|| anyhow!("index has no key field"))?;
		let id_field = schema.get_field(&key)?;
		let searchable = searchable.iter().map(|name| schema.get_field(name)).collect::<tantivy::Result<Vec<_>>>()?;
		let content_field = *searchable.first().ok_or_else(|| anyhow!("index has no searchable field"))?;
		Ok(Self { index, id_field, content_field, searchable })
	}

	fn writer(&self) -> Result<IndexWriter> {
		Ok(self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?)
	}

	fn stored_str(&self, doc: &TantivyDocument, field: Field) -> String {
		doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string()
	}
}

/// Lexical search service over tantivy, one index per index name.
///
/// With a root directory each index lives in `<root>/<name>` and survives
/// restarts; without one indexes are held in RAM.
pub struct TantivySearchService {
	root: Option<PathBuf>,
	indexes: Mutex<HashMap<String, ManagedIndex>>,
}

impl TantivySearchService {
	pub fn open(root: impl Into<PathBuf>) -> Self {
		Self { root: Some(root.into()), indexes: Mutex::new(HashMap::new()) }
	}

	pub fn from_config(config: &SearchConfig) -> Self {
		Self::open(expand_path(&config.local_dir))
	}

	pub fn in_memory() -> Self {
		Self { root: None, indexes: Mutex::new(HashMap::new()) }
	}

	fn index_dir(&self, name: &str) -> Result<Option<PathBuf>> {
		if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
			bail!("invalid index name '{}'", name);
		}
		Ok(self.root.as_ref().map(|r| r.join(name)))
	}

	/// Run `f` against a registered index, opening it from disk on first use.
	fn with_index<T>(&self, name: &str, f: impl FnOnce(&ManagedIndex) -> Result<T>) -> Result<T> {
		let mut indexes = self.indexes.lock().map_err(|_| anyhow!("index registry lock poisoned"))?;
		if !indexes.contains_key(name) {
			let dir = self.index_dir(name)?.filter(|d| d.join("meta.json").exists()).ok_or_else(|| anyhow!("index '{}' does not exist", name))?;
			debug!(index = name, dir = %dir.display(), "opening index");
			indexes.insert(name.to_string(), ManagedIndex::from_index(Index::open_in_dir(&dir)?)?);
		}
		let managed = indexes.get(name).ok_or_else(|| anyhow!("index '{}' does not exist", name))?;
		f(managed)
	}
}

fn field_entries(index: &Index) -> Vec<FieldEntry> {
	index.schema().fields().map(|(_, entry)| entry.clone()).collect()
}

impl SearchService for TantivySearchService {
	fn create_or_update_index(&self, schema: &IndexSchema) -> Result<()> {
		if schema.key_field().is_none() {
			bail!("index schema '{}' declares no key field", schema.name);
		}
		let wanted = build_schema(schema);
		let mut indexes = self.indexes.lock().map_err(|_| anyhow!("index registry lock poisoned"))?;
		let existing = match indexes.get(&schema.name) {
			Some(managed) => Some(managed.index.clone()),
			None => match self.index_dir(&schema.name)? {
				Some(dir) if dir.join("meta.json").exists() => Some(Index::open_in_dir(&dir)?),
				_ => None,
			},
		};
		let index = match existing {
			Some(index) => {
				let current = field_entries(&index);
				let desired: Vec<FieldEntry> = wanted.fields().map(|(_, entry)| entry.clone()).collect();
				if current != desired {
					bail!("index '{}' already exists with a different schema", schema.name);
				}
				debug!(index = %schema.name, "index schema already up to date");
				index
			}
			None => {
				let index = match self.index_dir(&schema.name)? {
					Some(dir) => {
						std::fs::create_dir_all(&dir)?;
						Index::create_in_dir(&dir, wanted)?
					}
					None => Index::create_in_ram(wanted),
				};
				info!(index = %schema.name, "created index");
				index
			}
		};
		if !indexes.contains_key(&schema.name) {
			indexes.insert(schema.name.clone(), ManagedIndex::from_index(index)?);
		}
		Ok(())
	}

	fn upsert_documents(&self, index: &str, docs: &[SearchDocument]) -> Result<Vec<IndexingResult>> {
		self.with_index(index, |m| {
			let mut index_writer = m.writer()?;
			let mut results = Vec::with_capacity(docs.len());
			for d in docs {
				if d.id.is_empty() {
					results.push(IndexingResult::failed(&d.id, "document key must not be empty"));
					continue;
				}
				index_writer.delete_term(Term::from_field_text(m.id_field, &d.id));
				index_writer.add_document(doc!(
					m.id_field => d.id.clone(),
					m.content_field => d.content.clone(),
				))?;
				results.push(IndexingResult::ok(&d.id));
			}
			index_writer.commit()?;
			let failed = results.iter().filter(|r| !r.succeeded).count();
			if failed > 0 { warn!(index, failed, "rejected documents during upsert"); }
			debug!(index, written = results.len() - failed, "committed upsert");
			Ok(results)
		})
	}

	fn search(&self, index: &str, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
		if top_k == 0 { return Ok(Vec::new()); }
		self.with_index(index, |m| {
			let reader: IndexReader = m.index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
			let searcher = reader.searcher();
			let q: Box<dyn Query> = if query.trim() == "*" {
				Box::new(AllQuery)
			} else {
				let qp = QueryParser::for_index(&m.index, m.searchable.clone());
				let (q, errors) = qp.parse_query_lenient(query);
				if !errors.is_empty() { debug!(query, errors = errors.len(), "lenient query parse dropped clauses"); }
				q
			};
			// TopDocs preallocates for its limit, so never ask for more than the index holds.
			let limit = top_k.min(usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX)).max(1);
			let top_docs = searcher.search(&*q, &TopDocs::with_limit(limit))?;
			let mut hits = Vec::with_capacity(top_docs.len());
			for (score, addr) in top_docs {
				let doc: TantivyDocument = searcher.doc(addr)?;
				hits.push(SearchHit { id: m.stored_str(&doc, m.id_field), content: m.stored_str(&doc, m.content_field), score });
			}
			Ok(hits)
		})
	}

	fn delete_documents(&self, index: &str, ids: &[String]) -> Result<Vec<IndexingResult>> {
		self.with_index(index, |m| {
			let mut index_writer = m.writer()?;
			for id in ids { index_writer.delete_term(Term::from_field_text(m.id_field, id)); }
			index_writer.commit()?;
			Ok(ids.iter().map(|id| IndexingResult::ok(id)).collect())
		})
	}

	fn list_ids(&self, index: &str, limit: usize) -> Result<Vec<String>> {
		Ok(self.search(index, "*", limit)?.into_iter().map(|h| h.id).collect())
	}
}
