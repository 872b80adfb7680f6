use tantivy::schema::{FieldType, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use ragpipe_core::types::IndexSchema;

pub const CONTENT_TOKENIZER: &str = "text_with_stopwords";
const KEY_TOKENIZER: &str = "raw";

/// Key fields are stored untokenized so they can be addressed by term for
/// overwrite and delete. Searchable fields go through the stop-word analyzer.
pub fn build_schema(def: &IndexSchema) -> Schema {
	let mut schema_builder = Schema::builder();
	for field in &def.fields {
		if field.key {
			schema_builder.add_text_field(&field.name, STRING | STORED);
		} else if field.searchable {
			let text_field_indexing = TextFieldIndexing::default().set_tokenizer(CONTENT_TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
			let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
			schema_builder.add_text_field(&field.name, text_options);
		} else {
			schema_builder.add_text_field(&field.name, STORED);
		}
	}
	schema_builder.build()
}

/// Names of the key field and the searchable fields of an existing index.
pub fn classify_fields(schema: &Schema) -> (Option<String>, Vec<String>) {
	let mut key = None;
	let mut searchable = Vec::new();
	for (_, entry) in schema.fields() {
		if let FieldType::Str(options) = entry.field_type() {
			match options.get_indexing_options().map(TextFieldIndexing::tokenizer) {
				Some(KEY_TOKENIZER) if key.is_none() => key = Some(entry.name().to_string()),
				Some(CONTENT_TOKENIZER) => searchable.push(entry.name().to_string()),
				_ => {}
			}
		}
	}
	(key, searchable)
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(CONTENT_TOKENIZER, tokenizer);
}
