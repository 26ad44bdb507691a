//! Persistent registry of federated resources.
//!
//! Besides the open id → resource map the directory keeps two role slots:
//! the mother (the upstream resource that can resolve unknown ids) and
//! myself (the descriptor this instance advertises). A resource put into a
//! slot is also reachable through the map under its own id.
//!
//! Every `put*` commits to disk before it returns.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use fedsearch_core::{Error, Resource, Result};
use tantivy::collector::DocSetCollector;
use tantivy::query::AllQuery;
use tantivy::schema::Field;
use tantivy::{doc, IndexWriter, TantivyDocument, Term};
use tracing::{debug, info, warn};

use crate::tantivy_utils::{build_resource_schema, manual_reader, open_or_create, single_writer, stored_str};

const MOTHER_KEY: &str = "role:mother";
const MYSELF_KEY: &str = "role:myself";
const RESOURCE_PREFIX: &str = "resource:";

pub struct ResourceDirectory {
	writer: Mutex<IndexWriter>,
	key_field: Field,
	payload_field: Field,
	resources: RwLock<HashMap<String, Resource>>,
	mother: RwLock<Option<Resource>>,
	myself: RwLock<Option<Resource>>,
}

fn poisoned<T>(_: PoisonError<T>) -> Error { Error::Storage("resource directory lock poisoned".to_string()) }

fn resource_key(id: &str) -> String { format!("{}{}", RESOURCE_PREFIX, id) }

impl ResourceDirectory {
	/// Open (or create) the directory stored under `dir` and load every resource.
	pub fn open(dir: &Path) -> Result<Self> {
		let index = open_or_create(dir, build_resource_schema())?;
		let schema = index.schema();
		let key_field = schema.get_field("key").map_err(Error::storage)?;
		let payload_field = schema.get_field("payload").map_err(Error::storage)?;

		let mut resources = HashMap::new();
		let mut mother = None;
		let mut myself = None;
		let searcher = manual_reader(&index)?.searcher();
		for addr in searcher.search(&AllQuery, &DocSetCollector).map_err(Error::storage)? {
			let doc: TantivyDocument = searcher.doc(addr).map_err(Error::storage)?;
			let (Some(key), Some(payload)) = (stored_str(&doc, key_field), stored_str(&doc, payload_field)) else { continue };
			let resource = match Resource::from_json_str(payload) {
				Ok(r) => r,
				Err(e) => { warn!(key, error = %e, "skipping unreadable resource"); continue; }
			};
			match key {
				MOTHER_KEY => mother = Some(resource),
				MYSELF_KEY => myself = Some(resource),
				k => if let Some(id) = k.strip_prefix(RESOURCE_PREFIX) { resources.insert(id.to_string(), resource); },
			}
		}
		info!(path = %dir.display(), resources = resources.len(), mother = mother.is_some(), myself = myself.is_some(), "opened resource directory");

		let writer = single_writer(&index)?;
		Ok(Self {
			writer: Mutex::new(writer), key_field, payload_field,
			resources: RwLock::new(resources), mother: RwLock::new(mother), myself: RwLock::new(myself),
		})
	}

	/// Insert or replace a resource by id.
	pub fn put(&self, resource: Resource) -> Result<()> {
		let mut writer = self.lock_writer()?;
		self.persist(&mut writer, &[resource_key(resource.id())], &resource)?;
		debug!(id = resource.id(), "stored resource");
		self.resources.write().map_err(poisoned)?.insert(resource.id().to_string(), resource);
		Ok(())
	}

	pub fn put_mother(&self, resource: Resource) -> Result<()> {
		let mut writer = self.lock_writer()?;
		self.persist(&mut writer, &[MOTHER_KEY.to_string(), resource_key(resource.id())], &resource)?;
		info!(id = resource.id(), "stored mother resource");
		self.resources.write().map_err(poisoned)?.insert(resource.id().to_string(), resource.clone());
		*self.mother.write().map_err(poisoned)? = Some(resource);
		Ok(())
	}

	pub fn put_myself(&self, resource: Resource) -> Result<()> {
		let mut writer = self.lock_writer()?;
		self.persist(&mut writer, &[MYSELF_KEY.to_string(), resource_key(resource.id())], &resource)?;
		info!(id = resource.id(), "stored own resource");
		self.resources.write().map_err(poisoned)?.insert(resource.id().to_string(), resource.clone());
		*self.myself.write().map_err(poisoned)? = Some(resource);
		Ok(())
	}

	/// Writes `resource` under every key in one commit; nothing is kept on failure.
	fn persist(&self, writer: &mut IndexWriter, keys: &[String], resource: &Resource) -> Result<()> {
		let payload = serde_json::to_string(resource)?;
		let staged = keys.iter().try_for_each(|key| {
			writer.delete_term(Term::from_field_text(self.key_field, key));
			writer.add_document(doc!(self.key_field => key.clone(), self.payload_field => payload.clone())).map(|_| ())
		}).and_then(|()| writer.commit().map(|_| ()));
		if let Err(e) = staged {
			if let Err(rollback) = writer.rollback() { warn!(error = %rollback, "rollback failed"); }
			return Err(Error::storage(e));
		}
		Ok(())
	}

	fn lock_writer(&self) -> Result<MutexGuard<'_, IndexWriter>> { self.writer.lock().map_err(poisoned) }

	/// Map first, then the mother slot, then the myself slot.
	fn resolve(&self, id: &str) -> Result<Option<Resource>> {
		if let Some(r) = self.resources.read().map_err(poisoned)?.get(id) { return Ok(Some(r.clone())); }
		if let Some(r) = self.mother.read().map_err(poisoned)?.as_ref().filter(|m| m.id() == id) { return Ok(Some(r.clone())); }
		Ok(self.myself.read().map_err(poisoned)?.as_ref().filter(|m| m.id() == id).cloned())
	}

	/// The resource with its private parameters removed.
	pub fn get(&self, id: &str) -> Result<Option<Resource>> {
		Ok(self.resolve(id)?.map(|r| r.redacted()))
	}

	/// Same resolution as [`ResourceDirectory::get`], credentials intact.
	/// For the fetch path only.
	pub fn get_internal(&self, id: &str) -> Result<Option<Resource>> { self.resolve(id) }

	pub fn get_mother(&self) -> Result<Option<Resource>> {
		Ok(self.get_mother_internal()?.map(|r| r.redacted()))
	}

	pub fn get_mother_internal(&self) -> Result<Option<Resource>> { Ok(self.mother.read().map_err(poisoned)?.clone()) }

	pub fn get_myself(&self) -> Result<Option<Resource>> {
		Ok(self.get_myself_internal()?.map(|r| r.redacted()))
	}

	pub fn get_myself_internal(&self) -> Result<Option<Resource>> { Ok(self.myself.read().map_err(poisoned)?.clone()) }

	/// True when `id` names the mother or this instance itself.
	pub fn is_local(&self, id: &str) -> Result<bool> {
		let is_mother = self.mother.read().map_err(poisoned)?.as_ref().is_some_and(|m| m.id() == id);
		Ok(is_mother || self.myself.read().map_err(poisoned)?.as_ref().is_some_and(|m| m.id() == id))
	}

	/// Up to `n` resources whose display name starts with `prefix`
	/// (case-insensitive; `None` matches all), highest prior first, then by id.
	pub fn top_values(&self, prefix: Option<&str>, n: usize) -> Result<Vec<Resource>> {
		let prefix = prefix.map(str::to_lowercase);
		let resources = self.resources.read().map_err(poisoned)?;
		let mut matches: Vec<&Resource> = resources.values()
			.filter(|r| prefix.as_deref().map_or(true, |p| r.label().to_lowercase().starts_with(p)))
			.collect();
		matches.sort_by(|a, b| b.prior().total_cmp(&a.prior()).then_with(|| a.id().cmp(b.id())));
		Ok(matches.into_iter().take(n).map(Resource::redacted).collect())
	}

	pub fn ids(&self) -> Result<Vec<String>> {
		let mut ids: Vec<String> = self.resources.read().map_err(poisoned)?.keys().cloned().collect();
		ids.sort();
		Ok(ids)
	}

	pub fn len(&self) -> usize { self.resources.read().map_or(0, |r| r.len()) }

	pub fn is_empty(&self) -> bool { self.len() == 0 }

	/// Release the index writer and wait for background merges.
	pub fn close(self) -> Result<()> {
		let writer = self.writer.into_inner().map_err(poisoned)?;
		writer.wait_merging_threads().map_err(Error::storage)
	}
}
