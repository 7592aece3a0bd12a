use reachscan::parsers::cache::ParseCache;
use reachscan::parsers::extract_file;
use std::fs;
use std::time::Duration;

#[test]
fn parse_cache_stores_and_detects_updates() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("app.js");
    fs::write(&file, "import _ from \"lodash\";\n_.merge(a, b);\n").unwrap();

    let cache = ParseCache::in_memory_only();
    assert!(cache.get(&file).is_none());

    let extraction = extract_file(&file, false).unwrap();
    cache.store(&file, &extraction).unwrap();
    assert_eq!(cache.get(&file), Some(extraction));

    // a changed size invalidates the entry even if the mtime is coarse
    std::thread::sleep(Duration::from_millis(5));
    fs::write(&file, "import _ from \"lodash\";\n_.merge(a, b);\n_.pick(o);\n").unwrap();
    assert!(cache.get(&file).is_none());

    let updated = extract_file(&file, false).unwrap();
    cache.store(&file, &updated).unwrap();
    assert_eq!(cache.get(&file).unwrap().calls.len(), 2);
    assert_eq!(cache.stats().memory_entries, 1);
    assert_eq!(cache.stats().disk_entries, 0);
}

#[test]
fn disk_entries_survive_a_new_cache_instance() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    let file = dir.path().join("main.py");
    fs::write(&file, "import requests\nrequests.get(url)\n").unwrap();

    let extraction = extract_file(&file, false).unwrap();
    ParseCache::new(Some(cache_dir.clone()))
        .store(&file, &extraction)
        .unwrap();

    let reopened = ParseCache::new(Some(cache_dir));
    assert_eq!(reopened.stats().memory_entries, 0);
    assert_eq!(reopened.stats().disk_entries, 1);
    assert_eq!(reopened.get(&file), Some(extraction));
    assert_eq!(reopened.stats().memory_entries, 1);

    reopened.clear().unwrap();
    assert_eq!(reopened.stats().disk_entries, 0);
    assert!(reopened.get(&file).is_none());
}
