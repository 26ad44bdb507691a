//! Result cache with TTL expiration, doubling as the corpus of seen hits.
//!
//! A cache entry is the hit list a resource returned for a query, keyed by
//! (resource id, normalized query). Entries live in an LRU that mirrors the
//! on-disk index: when capacity evicts an entry it is deleted in the same
//! commit that stores its replacement. Every stored hit is also indexed as
//! free text so later queries can be answered without a remote fetch.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use fedsearch_core::hit::rank;
use fedsearch_core::{Error, Hit, Result};
use lru::LruCache;
use serde_json::Value;
use tantivy::collector::{Count, DocSetCollector, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::{doc, Index, IndexReader, IndexWriter, TantivyDocument, Term};
use tracing::{debug, info, warn};

use crate::tantivy_utils::{build_results_schema, manual_reader, open_or_create, single_writer, stored_i64, stored_str};

const KIND_ENTRY: &str = "entry";
const KIND_HIT: &str = "hit";

#[derive(Clone, Copy)]
struct ResultFields {
	kind: Field,
	key: Field,
	rid: Field,
	text: Field,
	payload: Field,
	stamp: Field,
}

/// Entry in the result cache.
#[derive(Debug, Clone)]
struct CacheEntry {
	hits: Vec<Hit>,
	/// Milliseconds since the epoch at store time.
	stamp: i64,
}

pub struct ResultCache {
	index: Index,
	reader: IndexReader,
	writer: Mutex<IndexWriter>,
	fields: ResultFields,
	entries: Mutex<LruCache<String, CacheEntry>>,
	ttl: Duration,
}

fn poisoned<T>(_: PoisonError<T>) -> Error { Error::Storage("result cache lock poisoned".to_string()) }

/// Trimmed, whitespace-collapsed, lowercased.
pub fn normalize_query(query: &str) -> String {
	query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Cache key for a (resource id, query) pair.
pub fn cache_key(rid: &str, query: &str) -> String {
	format!("{}\u{1f}{}", rid, normalize_query(query))
}

fn entry_term(fields: &ResultFields, key: &str) -> Term {
	Term::from_field_text(fields.key, &format!("{}:{}", KIND_ENTRY, key))
}

impl ResultCache {
	/// Open (or create) the store under `dir`, holding at most `capacity`
	/// entries that stay fresh for `ttl`.
	pub fn open(dir: &Path, capacity: usize, ttl: Duration) -> Result<Self> {
		let cap = NonZeroUsize::new(capacity).ok_or_else(|| Error::InvalidConfig("cache capacity must be > 0".to_string()))?;
		let index = open_or_create(dir, build_results_schema())?;
		let schema = index.schema();
		let field = |name: &str| schema.get_field(name).map_err(Error::storage);
		let fields = ResultFields {
			kind: field("kind")?, key: field("key")?, rid: field("rid")?,
			text: field("text")?, payload: field("payload")?, stamp: field("stamp")?,
		};
		let reader = manual_reader(&index)?;

		let mut stored = Vec::new();
		let searcher = reader.searcher();
		let entry_query = TermQuery::new(Term::from_field_text(fields.kind, KIND_ENTRY), IndexRecordOption::Basic);
		for addr in searcher.search(&entry_query, &DocSetCollector).map_err(Error::storage)? {
			let doc: TantivyDocument = searcher.doc(addr).map_err(Error::storage)?;
			let Some(key) = stored_str(&doc, fields.key).and_then(|k| k.strip_prefix("entry:")) else { continue };
			let stamp = stored_i64(&doc, fields.stamp).unwrap_or(0);
			match stored_str(&doc, fields.payload).map(serde_json::from_str::<Vec<Hit>>) {
				Some(Ok(hits)) => stored.push((key.to_string(), CacheEntry { hits, stamp })),
				_ => warn!(key, "skipping unreadable cache entry"),
			}
		}
		stored.sort_by_key(|(_, e)| e.stamp);

		let mut entries = LruCache::new(cap);
		let mut evicted = Vec::new();
		for (key, entry) in stored {
			if let Some((old, _)) = entries.push(key, entry) { evicted.push(old); }
		}

		let mut writer = single_writer(&index)?;
		if !evicted.is_empty() {
			for key in &evicted { writer.delete_term(entry_term(&fields, key)); }
			writer.commit().map_err(Error::storage)?;
			reader.reload().map_err(Error::storage)?;
		}
		info!(path = %dir.display(), entries = entries.len(), dropped = evicted.len(), "opened result cache");

		Ok(Self { index, reader, writer: Mutex::new(writer), fields, entries: Mutex::new(entries), ttl })
	}

	fn is_fresh(&self, entry: &CacheEntry) -> bool {
		let age = Utc::now().timestamp_millis().saturating_sub(entry.stamp);
		u128::try_from(age).is_ok_and(|age| age < self.ttl.as_millis())
	}

	/// Hits stored for exactly this key, unless missing or expired.
	pub fn lookup(&self, rid: &str, query: &str) -> Result<Option<Vec<Hit>>> {
		let key = cache_key(rid, query);
		let mut entries = self.entries.lock().map_err(poisoned)?;
		match entries.get(&key) {
			Some(entry) if self.is_fresh(entry) => { debug!(rid, query, "cache hit"); Ok(Some(entry.hits.clone())) }
			Some(_) => { debug!(rid, query, "cache entry expired"); Ok(None) }
			None => { debug!(rid, query, "cache miss"); Ok(None) }
		}
	}

	/// Store `hits` for (rid, query), replacing any earlier entry, and index
	/// each hit into the corpus. One commit: either all of it lands or none.
	pub fn store(&self, rid: &str, query: &str, hits: &[Hit]) -> Result<()> {
		let key = cache_key(rid, query);
		let now = Utc::now();
		let stamp = now.timestamp_millis();
		let found_before = now.to_rfc3339();
		let payload = serde_json::to_string(hits)?;

		let mut writer = self.writer.lock().map_err(poisoned)?;
		let victim = {
			let entries = self.entries.lock().map_err(poisoned)?;
			if entries.contains(&key) || entries.len() < entries.cap().get() { None } else { entries.peek_lru().map(|(k, _)| k.clone()) }
		};
		let f = self.fields;
		let staged = (|| -> Result<()> {
			writer.delete_term(entry_term(&f, &key));
			writer.add_document(doc!(
				f.kind => KIND_ENTRY, f.key => format!("{}:{}", KIND_ENTRY, key), f.rid => rid,
				f.payload => payload, f.stamp => stamp,
			)).map_err(Error::storage)?;
			for hit in hits {
				let indexed = Hit::from_json(&Value::Object(hit.to_serializable_for_index(&found_before, Some(rid))));
				let hit_key = format!("{}:{}", KIND_HIT, indexed.id());
				writer.delete_term(Term::from_field_text(f.key, &hit_key));
				writer.add_document(doc!(
					f.kind => KIND_HIT, f.key => hit_key, f.rid => indexed.rid().unwrap_or(rid),
					f.text => indexed.to_index_text(), f.payload => serde_json::to_string(&indexed)?, f.stamp => stamp,
				)).map_err(Error::storage)?;
			}
			if let Some(old) = &victim { writer.delete_term(entry_term(&f, old)); }
			writer.commit().map_err(Error::storage)?;
			Ok(())
		})();
		if let Err(e) = staged {
			if let Err(rollback) = writer.rollback() { warn!(error = %rollback, "rollback failed"); }
			return Err(e);
		}
		self.reader.reload().map_err(Error::storage)?;

		// The victim is already gone from disk; drop it here even if a lookup
		// touched it meanwhile, so memory and disk hold the same keys.
		let mut entries = self.entries.lock().map_err(poisoned)?;
		if let Some(old) = &victim {
			entries.pop(old);
			debug!(evicted = %old, "cache entry evicted");
		}
		entries.put(key, CacheEntry { hits: hits.to_vec(), stamp });
		debug!(rid, query, hits = hits.len(), "stored cache entry");
		Ok(())
	}

	/// Free-text search over every stored hit, best first.
	pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Hit>> {
		let parsed = self.parse(query);
		self.collect(parsed, limit)
	}

	/// Free-text search restricted to hits produced by `rid`.
	pub fn search_resource(&self, rid: &str, query: &str, limit: usize) -> Result<Vec<Hit>> {
		let parsed = self.parse(query);
		self.collect(Box::new(BooleanQuery::new(vec![(Occur::Must, parsed), (Occur::Must, self.rid_query(rid))])), limit)
	}

	/// Stored hits of one resource, no query text involved.
	pub fn preview(&self, rid: &str, limit: usize) -> Result<Vec<Hit>> {
		self.collect(self.rid_query(rid), limit)
	}

	/// Number of distinct hits in the corpus.
	pub fn corpus_len(&self) -> Result<usize> {
		self.reader.searcher().search(&self.kind_query(KIND_HIT), &Count).map_err(Error::storage)
	}

	pub fn len(&self) -> usize { self.entries.lock().map_or(0, |e| e.len()) }

	pub fn is_empty(&self) -> bool { self.len() == 0 }

	fn parse(&self, query: &str) -> Box<dyn Query> {
		let parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
		let (parsed, errors) = parser.parse_query_lenient(query);
		if !errors.is_empty() { debug!(query, errors = errors.len(), "query parsed leniently"); }
		parsed
	}

	fn kind_query(&self, kind: &str) -> Box<dyn Query> {
		Box::new(TermQuery::new(Term::from_field_text(self.fields.kind, kind), IndexRecordOption::Basic))
	}

	fn rid_query(&self, rid: &str) -> Box<dyn Query> {
		Box::new(TermQuery::new(Term::from_field_text(self.fields.rid, rid), IndexRecordOption::Basic))
	}

	fn collect(&self, query: Box<dyn Query>, limit: usize) -> Result<Vec<Hit>> {
		if limit == 0 { return Ok(Vec::new()); }
		let query = BooleanQuery::new(vec![(Occur::Must, query), (Occur::Must, self.kind_query(KIND_HIT))]);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(limit)).map_err(Error::storage)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (_score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(Error::storage)?;
			if let Some(payload) = stored_str(&doc, self.fields.payload) {
				hits.push(serde_json::from_str::<Hit>(payload)?);
			}
		}
		rank(&mut hits);
		Ok(hits)
	}

	/// Release the index writer and wait for background merges.
	pub fn close(self) -> Result<()> {
		let writer = self.writer.into_inner().map_err(poisoned)?;
		writer.wait_merging_threads().map_err(Error::storage)
	}
}
