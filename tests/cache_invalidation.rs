use std::fs;
use std::path::Path;
use std::sync::Arc;

use proxy_purge::cache::{CacheConfig, CacheInvalidator, CacheOptions, PurgeOutcome};
use tempfile::TempDir;

fn invalidator_with(root: &Path, levels: &str, key_format: Option<&str>) -> CacheInvalidator {
    let config = CacheConfig::initialize(CacheOptions {
        is_logging: Some(false),
        is_use_cache: Some(true),
        cache_root: Some(root.display().to_string()),
        cache_levels: Some(levels.to_string()),
        cache_key_format: key_format.map(str::to_string),
    })
    .expect("valid cache options");
    CacheInvalidator::new(Arc::new(config))
}

fn write_entry(path: &Path) {
    fs::create_dir_all(path.parent().expect("entry has a parent")).expect("create levels");
    fs::write(path, b"\nKEY: cached\n\nbody").expect("write entry");
}

#[test]
fn entry_written_by_the_proxy_is_removed() {
    let dir = TempDir::new().expect("temp dir");
    let invalidator = invalidator_with(dir.path(), "1:2", None);

    // Layout the proxy produces for `proxy_cache_path levels=1:2` and the default key.
    let entry = dir
        .path()
        .join("c/b9/1768c04994831cc822097d8c8eef2b9c");
    write_entry(&entry);

    assert!(invalidator.purge_by_url("https://example.com/posts/hello-world"));
    assert!(!entry.exists());
    // Level directories stay behind.
    assert!(dir.path().join("c/b9").is_dir());
}

#[test]
fn non_ascii_entry_is_found_under_its_decoded_key() {
    let dir = TempDir::new().expect("temp dir");
    let invalidator = invalidator_with(dir.path(), "1:2", None);

    // md5("GET|||example.com|/привет")
    let entry = dir.path().join("4/a4/99b75adbf53a5b4ad8b740d04464aa44");
    write_entry(&entry);

    let outcome = invalidator.purge("http://example.com/привет");
    assert!(matches!(outcome, PurgeOutcome::Removed(_)));
    assert!(!entry.exists());
}

#[test]
fn custom_layout_and_key_template_are_honoured() {
    let dir = TempDir::new().expect("temp dir");
    let invalidator = invalidator_with(dir.path(), "1:2:2", Some("GET|||HOST|PATH"));

    let location = invalidator
        .locate("http://example.com/a")
        .expect("resolvable url");
    assert_eq!(
        location.path(),
        dir.path().join("d/c3/f8/6c4c690592cf359e0297c2d006ef8c3d")
    );

    write_entry(location.path());
    assert!(invalidator.purge_by_url("http://example.com/a"));
    assert!(!location.path().exists());
}

#[test]
fn query_and_fragment_do_not_change_the_entry() {
    let dir = TempDir::new().expect("temp dir");
    let invalidator = invalidator_with(dir.path(), "1:2", None);

    let plain = invalidator.locate("http://example.com/a").expect("plain");
    let decorated = invalidator
        .locate("http://example.com/a?utm=1#top")
        .expect("decorated");
    assert_eq!(plain.path(), decorated.path());
}

#[test]
fn invalid_levels_fail_every_purge_without_touching_disk() {
    let dir = TempDir::new().expect("temp dir");
    let sentinel = dir.path().join("d/c3/6c4c690592cf359e0297c2d006ef8c3d");
    write_entry(&sentinel);

    for levels in ["0:2", "x:2", "16:16:1"] {
        let invalidator = invalidator_with(dir.path(), levels, None);
        let outcome = invalidator.purge("http://example.com/a");
        assert!(
            matches!(outcome, PurgeOutcome::Unresolved(_)),
            "levels {levels} should not resolve"
        );
        assert!(!outcome.succeeded());
    }
    assert!(sentinel.exists());
}

#[test]
fn whole_cache_purge_via_root_url() {
    let dir = TempDir::new().expect("temp dir");
    let invalidator = invalidator_with(dir.path(), "1:2", None);
    for url in ["http://example.com/a", "http://example.com/b", "http://other.org/"] {
        let location = invalidator.locate(url).expect("resolvable url");
        write_entry(location.path());
    }
    fs::write(dir.path().join("stray.tmp"), b"partial").expect("write stray file");

    assert!(invalidator.purge_by_url("/"));
    assert!(dir.path().is_dir());
    assert_eq!(fs::read_dir(dir.path()).expect("list root").count(), 0);
}

#[test]
fn whole_cache_purge_of_missing_root_fails() {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path().join("never-created");
    let invalidator = invalidator_with(&root, "1:2", None);

    assert!(!invalidator.purge_entire_cache());
    assert!(!root.exists());
}

#[cfg(unix)]
#[test]
fn whole_cache_purge_continues_past_a_locked_subtree() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().expect("temp dir");
    let invalidator = invalidator_with(dir.path(), "1:2", None);

    let locked = dir.path().join("a");
    fs::create_dir_all(locked.join("bc")).expect("create locked subtree");
    fs::write(locked.join("bc/entry"), b"pinned").expect("write locked entry");
    let open_entry = invalidator
        .locate("http://example.com/a")
        .expect("resolvable url");
    write_entry(open_entry.path());

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).expect("lock subtree");
    let write_check = locked.join("write-check");
    if fs::write(&write_check, b"").is_ok() {
        // Permission bits are not enforced (running as root).
        let _ = fs::remove_file(&write_check);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("unlock");
        return;
    }

    let purged = invalidator.purge_entire_cache();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("unlock");

    assert!(!purged);
    assert!(!open_entry.path().exists());
    assert!(locked.join("bc").is_dir());
}
