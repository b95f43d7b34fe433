use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use metrics_util::debugging::DebuggingRecorder;
use proxy_purge::cache::{CacheConfig, CacheInvalidator, CacheOptions};
use tempfile::TempDir;

#[test]
fn purge_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let dir = TempDir::new().expect("temp dir");
    let config = CacheConfig::initialize(CacheOptions {
        is_use_cache: Some(true),
        cache_root: Some(dir.path().display().to_string()),
        ..Default::default()
    })
    .expect("valid cache options");
    let invalidator = CacheInvalidator::new(Arc::new(config));

    let location = invalidator
        .locate("http://example.com/a")
        .expect("resolvable url");
    fs::create_dir_all(location.path().parent().expect("parent")).expect("create levels");
    fs::write(location.path(), b"cached").expect("write entry");

    assert!(invalidator.purge_by_url("http://example.com/a"));
    assert!(invalidator.purge_by_url("http://example.com/a"));
    assert!(!invalidator.purge_by_url("http://[broken"));
    assert!(invalidator.purge_by_url("/"));

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();
    for metric in [
        "proxy_purge_entry_total",
        "proxy_purge_entire_total",
        "proxy_purge_entire_ms",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let outcomes: HashSet<String> = snapshot
        .iter()
        .filter(|(composite_key, _, _, _)| composite_key.key().name() == "proxy_purge_entry_total")
        .flat_map(|(composite_key, _, _, _)| {
            composite_key
                .key()
                .labels()
                .map(|label| label.value().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    for outcome in ["removed", "not_found", "invalid"] {
        assert!(outcomes.contains(outcome), "missing outcome: {outcome}");
    }
}
