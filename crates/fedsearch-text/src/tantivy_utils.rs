use std::path::Path;

use fedsearch_core::{Error, Result};
use tantivy::directory::MmapDirectory;
use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

pub const TOKENIZER: &str = "text_with_stopwords";
const WRITER_HEAP_BYTES: usize = 20_000_000;

/// Resource directory: one document per stored descriptor or role slot.
pub fn build_resource_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("key", STRING | STORED);
	schema_builder.add_text_field("payload", STORED);
	schema_builder.build()
}

/// Result store: cache entries and corpus hits share one index, told apart by `kind`.
pub fn build_results_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("kind", STRING | STORED);
	schema_builder.add_text_field("key", STRING | STORED);
	schema_builder.add_text_field("rid", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	schema_builder.add_text_field("text", TextOptions::default().set_indexing_options(text_field_indexing));
	schema_builder.add_text_field("payload", STORED);
	schema_builder.add_i64_field("stamp", STORED);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TOKENIZER, tokenizer);
}

/// Open the index at `dir`, creating it (and the directory) on first use.
pub fn open_or_create(dir: &Path, schema: Schema) -> Result<Index> {
	std::fs::create_dir_all(dir)?;
	let mmap = MmapDirectory::open(dir).map_err(Error::storage)?;
	let index = Index::open_or_create(mmap, schema).map_err(Error::storage)?;
	register_tokenizer(&index);
	Ok(index)
}

pub fn single_writer(index: &Index) -> Result<IndexWriter> {
	index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(Error::storage)
}

/// Reader that only sees a commit after an explicit `reload`.
pub fn manual_reader(index: &Index) -> Result<IndexReader> {
	index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(Error::storage)
}

pub fn stored_str(doc: &TantivyDocument, field: tantivy::schema::Field) -> Option<&str> {
	doc.get_first(field).and_then(|v| v.as_str())
}

pub fn stored_i64(doc: &TantivyDocument, field: tantivy::schema::Field) -> Option<i64> {
	doc.get_first(field).and_then(|v| v.as_i64())
}
