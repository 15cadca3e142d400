//! Checkpoint Persistence Tests
//!
//! The checkpoint must survive restarts and tolerate a missing or damaged file.

use mastofm::core::{is_new, Checkpoint, CheckpointError, CheckpointStore};
use mastofm::domain::TrackRecord;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_checkpoint_survives_restart() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("persist.json");

    // First process
    let store = CheckpointStore::new(&path);
    assert!(store.load_or_default().is_empty());
    assert_ok!(store.save(&Checkpoint::new("1700000000")));
    drop(store);

    // Second process
    let store = CheckpointStore::new(&path);
    let checkpoint = store.load_or_default();
    assert_eq!(checkpoint.last_marker, "1700000000");

    let same = TrackRecord::new("A", "T", "1700000000");
    assert!(!is_new(Some(&same), &checkpoint));
}

#[test]
fn test_file_format_is_stable() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("persist.json");

    assert_ok!(CheckpointStore::new(&path).save(&Checkpoint::new("42")));

    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value, serde_json::json!({"last_uts": "42"}));
}

#[test]
fn test_missing_key_reads_as_empty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("persist.json");
    std::fs::write(&path, "{}").unwrap();

    let loaded = assert_ok!(CheckpointStore::new(&path).load());
    assert_eq!(loaded, Some(Checkpoint::default()));
}

#[test]
fn test_damaged_file_starts_fresh() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("persist.json");
    std::fs::write(&path, "{\"last_uts\": ").unwrap();

    let store = CheckpointStore::new(&path);
    let err = assert_err!(store.load());
    assert!(matches!(err, CheckpointError::Decode { .. }));
    assert!(store.load_or_default().is_empty());

    // The next save repairs the file
    assert_ok!(store.save(&Checkpoint::new("7")));
    assert_eq!(assert_ok!(store.load()), Some(Checkpoint::new("7")));
}

#[cfg(unix)]
#[test]
fn test_failed_save_keeps_previous_contents() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("state");
    std::fs::create_dir(&dir).unwrap();
    let path = dir.join("persist.json");

    let store = CheckpointStore::new(&path);
    assert_ok!(store.save(&Checkpoint::new("1")));

    // No temp file can be created next to the target
    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();

    // Privileged users ignore directory permissions
    let canary = dir.join("canary");
    if std::fs::File::create(&canary).is_ok() {
        std::fs::remove_file(&canary).unwrap();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
        eprintln!("skipping: directory permissions are not enforced for this user");
        return;
    }

    let result = store.save(&Checkpoint::new("2"));
    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();

    let err = assert_err!(result);
    assert!(matches!(err, CheckpointError::Io { .. }));
    assert_eq!(assert_ok!(store.load()), Some(Checkpoint::new("1")));

    let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
    assert_eq!(entries.len(), 1, "no temp file left behind");
}

#[test]
fn test_failed_rename_removes_temp_file() {
    let temp = TempDir::new().unwrap();

    // A non-empty directory in the target's place makes the rename fail
    let blocked = temp.path().join("persist.json");
    std::fs::create_dir(&blocked).unwrap();
    std::fs::write(blocked.join("keep"), "x").unwrap();

    let store = CheckpointStore::new(&blocked);
    let err = assert_err!(store.save(&Checkpoint::new("2")));
    assert!(matches!(err, CheckpointError::Io { .. }));

    assert!(blocked.join("keep").is_file());
    let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "no temp file left behind");
}
