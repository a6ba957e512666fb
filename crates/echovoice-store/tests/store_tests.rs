//! Clip store behavior on real temporary directories: saving, retention
//! by count and age, containment-guarded deletion.

use std::fs;
use std::thread::sleep;
use std::time::Duration;

use echovoice_foundation::StoreError;
use echovoice_store::{ClipStore, RetentionConfig};

fn store_in(dir: &tempfile::TempDir) -> ClipStore {
    ClipStore::new(dir.path().join("clips"), "echo_voice")
}

#[test]
fn save_creates_a_prefixed_wav_file_with_the_payload() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let clip = store.save(b"RIFFdata").unwrap();
    assert_eq!(clip.size_bytes, 8);

    let name = clip.path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("echo_voice_"), "{name}");
    assert!(name.ends_with(".wav"), "{name}");
    assert_eq!(fs::read(&clip.path).unwrap(), b"RIFFdata");
}

#[test]
fn rapid_saves_never_collide() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let a = store.save(b"a").unwrap();
    let b = store.save(b"b").unwrap();
    let c = store.save(b"c").unwrap();

    assert_ne!(a.path, b.path);
    assert_ne!(b.path, c.path);
    assert_eq!(store.list().len(), 3);
}

#[test]
fn cleanup_by_count_evicts_oldest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let oldest = store.save(b"first").unwrap();
    sleep(Duration::from_millis(10));
    let middle = store.save(b"second").unwrap();
    sleep(Duration::from_millis(10));
    let newest = store.save(b"third").unwrap();

    assert_eq!(store.cleanup_by_count(2), 1);
    assert!(!oldest.path.exists(), "oldest clip must be evicted");
    assert!(middle.path.exists());
    assert!(newest.path.exists());

    // Already within the cap: nothing more to do.
    assert_eq!(store.cleanup_by_count(2), 0);
}

#[test]
fn cleanup_by_age_respects_the_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let clip = store.save(b"payload").unwrap();

    assert_eq!(store.cleanup_by_age(Duration::from_secs(3600)), 0);
    assert!(clip.path.exists());

    sleep(Duration::from_millis(20));
    assert_eq!(store.cleanup_by_age(Duration::ZERO), 1);
    assert!(!clip.path.exists());

    // Idempotent on an empty directory.
    assert_eq!(store.cleanup_by_age(Duration::ZERO), 0);
}

#[test]
fn retention_defaults_match_the_documented_policy() {
    let cfg = RetentionConfig::default();
    assert_eq!(cfg.max_file_age_ms, 3_600_000);
    assert_eq!(cfg.max_file_count, 10);
}

#[test]
fn delete_refuses_paths_outside_the_managed_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store.save(b"inside").unwrap();

    let foreign = dir.path().join("foreign.wav");
    fs::write(&foreign, b"not managed").unwrap();

    assert!(!store.delete(&foreign));
    assert!(foreign.exists(), "foreign file must be left unchanged");
}

#[test]
fn delete_inside_the_directory_succeeds_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let clip = store.save(b"inside").unwrap();

    assert!(store.delete(&clip.path));
    assert!(!clip.path.exists());
    // Deleting an already-absent file is not an error, just a no-op.
    assert!(!store.delete(&clip.path));
}

#[test]
fn clear_all_leaves_unmanaged_files_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store.save(b"one").unwrap();
    store.save(b"two").unwrap();

    let foreign = store.dir().join("other_prefix_20240101_000000_000.wav");
    fs::write(&foreign, b"someone else's").unwrap();

    assert_eq!(store.clear_all(), 2);
    assert!(store.list().is_empty());
    assert!(foreign.exists(), "foreign prefix must survive clear_all");
}

#[test]
fn save_surfaces_write_errors_without_leaving_partial_files() {
    // Pointing the store at a path that exists as a *file* makes directory
    // creation fail with a plain I/O error.
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocked");
    fs::write(&blocker, b"x").unwrap();

    let store = ClipStore::new(&blocker, "echo_voice");
    match store.save(b"payload") {
        Err(StoreError::Write(_)) => {}
        other => panic!("expected Write error, got {other:?}"),
    }
}
