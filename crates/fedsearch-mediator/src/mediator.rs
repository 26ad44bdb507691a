//! Answers one query: resolve the resource, pick cache, corpus or remote
//! fetch, then merge, rank and wrap the hits.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fedsearch_core::config::{MediatorSettings, Settings};
use fedsearch_core::hit::{rank, RID};
use fedsearch_core::{Error, FetchError, Fetcher, Hit, Resource, Result, Suggester};
use fedsearch_text::{cache_key, ResourceDirectory, ResultCache};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::response::{QueryResponse, ResponseBody};

type Flight = Shared<BoxFuture<'static, Result<Vec<Hit>>>>;
type FlightTable = Arc<Mutex<HashMap<String, Flight>>>;

pub struct Mediator {
    directory: Arc<ResourceDirectory>,
    cache: Arc<ResultCache>,
    fetcher: Arc<dyn Fetcher>,
    suggester: Arc<dyn Suggester>,
    settings: MediatorSettings,
    in_flight: FlightTable,
}

/// `"wiki.json"` → `"wiki"`; a bare id is taken as is.
pub fn resource_id(token: &str) -> &str {
    let token = token.trim();
    token.strip_suffix(".json").unwrap_or(token)
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error { Error::Storage("in-flight table poisoned".to_string()) }

/// Run synchronous store I/O on the blocking pool.
async fn blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op).await.map_err(|e| {
        warn!(error = %e, "blocking store task failed");
        Error::storage(e)
    })?
}

/// Local copies first so they win on duplicate ids, then best first.
fn merge(local: Vec<Hit>, fresh: Vec<Hit>, limit: usize) -> Vec<Hit> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Hit> = local.into_iter().chain(fresh).filter(|h| seen.insert(h.id())).collect();
    rank(&mut merged);
    merged.truncate(limit);
    merged
}

impl Mediator {
    pub fn new(
        directory: Arc<ResourceDirectory>,
        cache: Arc<ResultCache>,
        fetcher: Arc<dyn Fetcher>,
        suggester: Arc<dyn Suggester>,
        settings: MediatorSettings,
    ) -> Self {
        Self { directory, cache, fetcher, suggester, settings, in_flight: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Open the directory and the result cache where `settings` says they live.
    pub fn open(settings: &Settings, fetcher: Arc<dyn Fetcher>, suggester: Arc<dyn Suggester>) -> Result<Self> {
        settings.validate()?;
        let directory = ResourceDirectory::open(&settings.storage.resources_dir())?;
        let cache = ResultCache::open(&settings.storage.results_dir(), settings.cache.capacity, settings.cache.ttl())?;
        Ok(Self::new(Arc::new(directory), Arc::new(cache), fetcher, suggester, settings.mediator.clone()))
    }

    pub fn directory(&self) -> &Arc<ResourceDirectory> { &self.directory }

    pub fn cache(&self) -> &Arc<ResultCache> { &self.cache }

    /// Fetches currently running; each removes itself when it finishes.
    pub fn pending_fetches(&self) -> usize { self.in_flight.lock().map_or(0, |t| t.len()) }

    /// Release both stores. Fails while a fetch still holds the cache.
    pub fn close(self) -> Result<()> {
        let Self { directory, cache, .. } = self;
        let directory = Arc::try_unwrap(directory).map_err(|_| Error::Storage("resource directory still in use".to_string()))?;
        let cache = Arc::try_unwrap(cache).map_err(|_| Error::Storage("result cache still in use".to_string()))?;
        directory.close()?;
        cache.close()?;
        info!("storage closed");
        Ok(())
    }

    /// Answer `query` for the resource named by `token` (e.g. `"wiki.json"`).
    /// Never fails: errors come back as a not-found or unavailable status.
    pub async fn query(&self, token: &str, query: &str) -> QueryResponse {
        let id = resource_id(token);
        match self.run(id, query).await {
            Ok(body) => {
                info!(rid = id, query, hits = body.hits.len(), "query answered");
                QueryResponse::success(body)
            }
            Err(e) => {
                warn!(rid = id, query, error = %e, "query failed");
                QueryResponse::failure(&e)
            }
        }
    }

    async fn run(&self, id: &str, query: &str) -> Result<ResponseBody> {
        let resource = self.resolve(id).await?;
        let rid = resource.id().to_string();

        if query.trim().is_empty() {
            let hits = self.cache.preview(&rid, self.settings.preview_hits)?;
            return Ok(ResponseBody { resource, hits });
        }

        if self.directory.is_local(&rid)? {
            debug!(rid = %rid, "answering from local corpus");
            let hits = self.cache.search(query, self.settings.max_hits)?;
            return Ok(ResponseBody { resource, hits });
        }

        let fresh = match self.cache.lookup(&rid, query)? {
            Some(hits) => hits,
            None => {
                let internal = self.directory.get_internal(&rid)?.ok_or_else(|| Error::UnknownResource(rid.clone()))?;
                self.fetch_once(internal, query).await?
            }
        };
        let local = self.cache.search_resource(&rid, query, self.settings.max_hits)?;
        Ok(ResponseBody { resource, hits: merge(local, fresh, self.settings.max_hits) })
    }

    /// Directory first; unknown ids go to the mother. A resource the mother
    /// suggests is remembered in the directory.
    async fn resolve(&self, id: &str) -> Result<Resource> {
        if let Some(resource) = self.directory.get(id)? {
            return Ok(resource);
        }
        let Some(mother) = self.directory.get_mother_internal()? else {
            return Err(Error::UnknownResource(id.to_string()));
        };
        let suggestion = tokio::time::timeout(self.settings.fetch_timeout(), self.suggester.suggest(&mother, id)).await;
        match suggestion {
            Ok(Ok(Some(resource))) => {
                info!(rid = id, suggested = resource.id(), mother = mother.id(), "resource resolved by mother");
                let directory = Arc::clone(&self.directory);
                let stored = resource.clone();
                blocking(move || directory.put(stored)).await?;
                Ok(resource.redacted())
            }
            Ok(Ok(None)) => Err(Error::UnknownResource(id.to_string())),
            Ok(Err(e)) => {
                warn!(rid = id, mother = mother.id(), error = %e, "mother could not be asked");
                Err(Error::UnknownResource(id.to_string()))
            }
            Err(_) => {
                warn!(rid = id, mother = mother.id(), "mother did not answer in time");
                Err(Error::UnknownResource(id.to_string()))
            }
        }
    }

    /// Fetch and cache, collapsing concurrent requests for the same key into
    /// one remote call whose outcome every waiter receives. The fetch runs as
    /// its own task, so waiters that give up do not strand it.
    async fn fetch_once(&self, resource: Resource, query: &str) -> Result<Vec<Hit>> {
        let key = cache_key(resource.id(), query);
        let flight = {
            let mut in_flight = self.in_flight.lock().map_err(poisoned)?;
            in_flight.entry(key.clone()).or_insert_with(|| self.start_fetch(key, resource, query.to_string())).clone()
        };
        flight.await
    }

    fn start_fetch(&self, key: String, resource: Resource, query: String) -> Flight {
        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let timeout = self.settings.fetch_timeout();
        let task = tokio::spawn(async move {
            let outcome = fetch_and_store(fetcher, cache, resource, query, timeout).await;
            // Only this task removes its key; a new flight can only be added once it is gone.
            if let Ok(mut table) = in_flight.lock() {
                table.remove(&key);
            }
            outcome
        });
        task.map(|joined| {
            joined.unwrap_or_else(|e| {
                warn!(error = %e, "fetch task failed");
                Err(Error::ResourceUnavailable(e.to_string()))
            })
        })
        .boxed()
        .shared()
    }
}

async fn fetch_and_store(
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<ResultCache>,
    resource: Resource,
    query: String,
    timeout: Duration,
) -> Result<Vec<Hit>> {
    let rid = resource.id().to_string();
    debug!(rid = %rid, query = %query, "fetching from resource");
    let mut hits = match tokio::time::timeout(timeout, fetcher.fetch(&resource, &query)).await {
        Ok(fetched) => fetched?,
        Err(_) => return Err(FetchError::Timeout(timeout).into()),
    };
    for hit in &mut hits {
        hit.put_if_empty(RID, rid.as_str());
    }
    let stored = hits.clone();
    blocking(move || cache.store(&rid, &query, &stored)).await?;
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(rid: &str, url: &str, score: f32) -> Hit {
        let mut h = Hit::with_fields(url, "", url, "");
        h.put(RID, rid);
        h.set_score(score);
        h
    }

    #[test]
    fn token_suffix_is_stripped() {
        assert_eq!(resource_id("wiki.json"), "wiki");
        assert_eq!(resource_id("wiki"), "wiki");
        assert_eq!(resource_id(" wiki.json "), "wiki");
        assert_eq!(resource_id("wiki.xml"), "wiki.xml");
    }

    #[test]
    fn merge_prefers_local_copy_and_ranks() {
        let mut local = hit("r", "http://a", 1.0);
        local.put("foundBefore", "yesterday");
        let merged = merge(vec![local], vec![hit("r", "http://a", 1.0), hit("r", "http://b", 5.0)], 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].url(), Some("http://b"));
        assert!(merged[1].get("foundBefore").is_some());
    }

    #[test]
    fn merge_truncates() {
        let fresh = (0..5).map(|i| hit("r", &format!("http://{}", i), i as f32)).collect();
        let merged = merge(Vec::new(), fresh, 3);
        let scores: Vec<f32> = merged.iter().map(Hit::score).collect();
        assert_eq!(scores, vec![4.0, 3.0, 2.0]);
    }
}
