use fedsearch_core::Resource;
use fedsearch_text::ResourceDirectory;
use serde_json::json;
use tempfile::TempDir;

fn utwente() -> Resource {
    Resource::from_json(&json!({"apitemplate": "http://utwente.nl/search?q={q}", "id": "567", "name": "UT"})).unwrap()
}

fn searsia() -> Resource {
    Resource::from_json(&json!({"apitemplate": "http://searsia.com/?q={q}", "id": "1234", "privateparameters": {"api": "topsecret"}})).unwrap()
}

fn newby() -> Resource {
    Resource::from_json(&json!({"apitemplate": "http://new.com/?q={q}", "id": "new", "privateparameters": {"apikey": "secret"}})).unwrap()
}

fn me() -> Resource {
    Resource::from_json(&json!({"apitemplate": "http://me.org?q={q}", "id": "me", "name": "Me"})).unwrap()
}

#[test]
fn add_and_get_resource() {
    let tmp = TempDir::new().unwrap();
    let engines = ResourceDirectory::open(tmp.path()).unwrap();
    engines.put(utwente()).unwrap();
    assert_eq!(engines.get("567").unwrap(), Some(utwente()));
    assert_eq!(engines.get("unknown").unwrap(), None);
}

#[test]
fn empty_directory_has_no_roles() {
    let tmp = TempDir::new().unwrap();
    let engines = ResourceDirectory::open(tmp.path()).unwrap();
    assert!(engines.is_empty());
    assert_eq!(engines.get_mother().unwrap(), None);
    assert_eq!(engines.get_myself().unwrap(), None);
    assert!(!engines.is_local("1234").unwrap());
}

#[test]
fn mother_is_reachable_by_slot_and_by_id() {
    let tmp = TempDir::new().unwrap();
    let engines = ResourceDirectory::open(tmp.path()).unwrap();
    engines.put_mother(searsia()).unwrap();
    assert_eq!(engines.get_mother().unwrap(), Some(searsia().redacted()));
    assert_eq!(engines.get_mother_internal().unwrap(), Some(searsia()));
    assert_eq!(engines.get("1234").unwrap(), Some(searsia().redacted()));
    assert!(engines.is_local("1234").unwrap());
}

#[test]
fn private_parameters_are_redacted_on_read() {
    let tmp = TempDir::new().unwrap();
    let engines = ResourceDirectory::open(tmp.path()).unwrap();
    engines.put(newby()).unwrap();
    let public = engines.get("new").unwrap().unwrap();
    assert!(public.private_parameters().is_none());
    let internal = engines.get_internal("new").unwrap().unwrap();
    assert_eq!(internal.private_parameters().and_then(|p| p.get("apikey")).map(String::as_str), Some("secret"));
}

#[test]
fn myself_round_trip() {
    let tmp = TempDir::new().unwrap();
    let engines = ResourceDirectory::open(tmp.path()).unwrap();
    engines.put_myself(me()).unwrap();
    assert_eq!(engines.get_myself().unwrap(), Some(me()));
    assert_eq!(engines.get("me").unwrap(), Some(me()));
}

#[test]
fn everything_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    {
        let engines = ResourceDirectory::open(tmp.path()).unwrap();
        engines.put_mother(searsia()).unwrap();
        engines.put_myself(me()).unwrap();
        engines.put(utwente()).unwrap();
        engines.put(newby()).unwrap();
        engines.close().unwrap();
    }
    let engines = ResourceDirectory::open(tmp.path()).unwrap();
    assert_eq!(engines.get_myself().unwrap(), Some(me()));
    assert_eq!(engines.get_mother_internal().unwrap(), Some(searsia()));
    assert_eq!(engines.get("567").unwrap(), Some(utwente()));
    assert!(engines.get_internal("new").unwrap().unwrap().has_private_parameters());
    assert_eq!(engines.ids().unwrap(), vec!["1234", "567", "me", "new"]);
}

#[test]
fn replacing_keeps_one_copy_per_id() {
    let tmp = TempDir::new().unwrap();
    {
        let engines = ResourceDirectory::open(tmp.path()).unwrap();
        engines.put(utwente()).unwrap();
        engines.put(utwente().with_name("University of Twente")).unwrap();
        engines.close().unwrap();
    }
    let engines = ResourceDirectory::open(tmp.path()).unwrap();
    assert_eq!(engines.len(), 1);
    assert_eq!(engines.get("567").unwrap().unwrap().name(), Some("University of Twente"));
}

#[test]
fn top_values_by_prefix_and_prior() {
    let tmp = TempDir::new().unwrap();
    let engines = ResourceDirectory::open(tmp.path()).unwrap();
    engines.put(utwente().with_prior(0.5)).unwrap();
    engines.put_mother(searsia().with_prior(0.9)).unwrap();
    engines.put(newby()).unwrap();
    engines.put_myself(me()).unwrap();

    assert_eq!(engines.top_values(None, 2).unwrap().len(), 2);
    let ids: Vec<String> = engines.top_values(None, 10).unwrap().iter().map(|r| r.id().to_string()).collect();
    assert_eq!(ids, vec!["1234", "567", "me", "new"]);
    let ut = engines.top_values(Some("u"), 10).unwrap();
    assert_eq!(ut.len(), 1);
    assert_eq!(ut[0].id(), "567");
    assert!(engines.top_values(Some("anything"), 1).unwrap().is_empty());
    assert!(engines.top_values(None, 10).unwrap().iter().all(|r| !r.has_private_parameters()));
}
