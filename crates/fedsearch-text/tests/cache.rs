use std::time::Duration;

use fedsearch_core::Hit;
use fedsearch_text::{cache_key, ResultCache};
use tempfile::TempDir;

const HOUR: Duration = Duration::from_secs(3600);

fn hits() -> Vec<Hit> {
    let mut a = Hit::with_fields("Searsia", "Search for noobs", "http://searsia.org", "");
    a.set_score(2.0);
    let mut b = Hit::with_fields("Federated <b>search</b>", "Many engines, one query", "http://example.org/fed", "");
    b.set_score(1.0);
    b.put("date", "2016-05-01");
    vec![a, b]
}

#[test]
fn store_then_lookup_returns_same_hits() {
    let tmp = TempDir::new().unwrap();
    let cache = ResultCache::open(tmp.path(), 10, HOUR).unwrap();
    assert_eq!(cache.lookup("wiki", "searsia").unwrap(), None);
    cache.store("wiki", "searsia", &hits()).unwrap();
    assert_eq!(cache.lookup("wiki", "searsia").unwrap(), Some(hits()));
    assert_eq!(cache.lookup("wiki", "  Searsia ").unwrap(), Some(hits()), "queries are normalized");
    assert_eq!(cache.lookup("other", "searsia").unwrap(), None);
}

#[test]
fn fresh_store_replaces_entry() {
    let tmp = TempDir::new().unwrap();
    let cache = ResultCache::open(tmp.path(), 10, HOUR).unwrap();
    cache.store("wiki", "q", &hits()).unwrap();
    cache.store("wiki", "q", &hits()[..1]).unwrap();
    assert_eq!(cache.lookup("wiki", "q").unwrap().unwrap().len(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn expired_entries_miss() {
    let tmp = TempDir::new().unwrap();
    let cache = ResultCache::open(tmp.path(), 10, Duration::ZERO).unwrap();
    cache.store("wiki", "q", &hits()).unwrap();
    assert_eq!(cache.lookup("wiki", "q").unwrap(), None);
}

#[test]
fn capacity_evicts_least_recently_used() {
    let tmp = TempDir::new().unwrap();
    {
        let cache = ResultCache::open(tmp.path(), 2, HOUR).unwrap();
        cache.store("r", "one", &hits()).unwrap();
        cache.store("r", "two", &hits()).unwrap();
        assert!(cache.lookup("r", "one").unwrap().is_some());
        cache.store("r", "three", &hits()).unwrap();
        assert!(cache.lookup("r", "two").unwrap().is_none(), "two was least recently used");
        assert!(cache.lookup("r", "one").unwrap().is_some());
        assert_eq!(cache.len(), 2);
        cache.close().unwrap();
    }
    let cache = ResultCache::open(tmp.path(), 2, HOUR).unwrap();
    assert_eq!(cache.len(), 2);
    assert!(cache.lookup("r", "two").unwrap().is_none(), "evicted entries are gone from disk too");
    assert_eq!(cache.lookup("r", "three").unwrap(), Some(hits()));
}

#[test]
fn shrinking_capacity_on_reopen_drops_oldest() {
    let tmp = TempDir::new().unwrap();
    {
        let cache = ResultCache::open(tmp.path(), 5, HOUR).unwrap();
        for q in ["a", "b", "c"] {
            cache.store("r", q, &hits()).unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }
        cache.close().unwrap();
    }
    let cache = ResultCache::open(tmp.path(), 1, HOUR).unwrap();
    assert_eq!(cache.len(), 1);
    assert!(cache.lookup("r", "c").unwrap().is_some());
}

#[test]
fn corpus_search_finds_stored_hits() {
    let tmp = TempDir::new().unwrap();
    let cache = ResultCache::open(tmp.path(), 10, HOUR).unwrap();
    cache.store("wiki", "searsia", &hits()).unwrap();

    let found = cache.search("searsia search for noobs", 10).unwrap();
    assert!(!found.is_empty());
    assert!(found.iter().any(|h| h.url() == Some("http://searsia.org")));
    for h in &found {
        assert_eq!(h.rid(), Some("wiki"), "rid is filled in when indexing");
        assert!(h.get("foundBefore").is_some());
        assert!(h.get("date").is_none());
    }
    let sanitized = cache.search("federated", 10).unwrap();
    assert_eq!(sanitized[0].title(), Some("Federated search"));
    assert!(cache.search("nothingmatches", 10).unwrap().is_empty());
    assert!(cache.search("searsia", 0).unwrap().is_empty());
}

#[test]
fn corpus_keeps_one_copy_per_hit_id() {
    let tmp = TempDir::new().unwrap();
    let cache = ResultCache::open(tmp.path(), 10, HOUR).unwrap();
    cache.store("wiki", "first", &hits()).unwrap();
    cache.store("wiki", "second", &hits()).unwrap();
    cache.store("other", "first", &hits()).unwrap();
    assert_eq!(cache.corpus_len().unwrap(), 4, "same url under two resources counts twice");
    assert_eq!(cache.preview("wiki", 10).unwrap().len(), 2);
    assert_eq!(cache.search_resource("other", "searsia", 10).unwrap().len(), 1);
}

#[test]
fn search_ranks_best_first() {
    let tmp = TempDir::new().unwrap();
    let cache = ResultCache::open(tmp.path(), 10, HOUR).unwrap();
    cache.store("wiki", "search", &hits()).unwrap();
    let found = cache.search("search", 10).unwrap();
    let scores: Vec<f32> = found.iter().map(|h| h.score()).collect();
    assert_eq!(scores, vec![2.0, 1.0]);
}

#[test]
fn keys_separate_resource_and_query() {
    assert_eq!(cache_key("wiki", " A  b "), cache_key("wiki", "a b"));
    assert_ne!(cache_key("wiki", "a"), cache_key("wik", "ia"));
}

#[test]
fn failed_store_keeps_committed_entries() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("results");
    let cache = ResultCache::open(&dir, 10, HOUR).unwrap();
    cache.store("wiki", "one", &hits()).unwrap();

    // Pull the index directory away so the next commit cannot write.
    std::fs::remove_dir_all(&dir).unwrap();
    assert!(cache.store("wiki", "two", &hits()).is_err());

    assert_eq!(cache.lookup("wiki", "one").unwrap(), Some(hits()));
    assert_eq!(cache.lookup("wiki", "two").unwrap(), None);
    assert_eq!(cache.len(), 1);
}
