use std::fs;

use algodrill::progress::{LEGACY_PROGRESS_FILE, PROGRESS_FILE};
use algodrill::{FileProgressStore, ProgressStore, Status};

#[test]
fn test_v1_migration_keeps_statuses_and_accepts_code() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(LEGACY_PROGRESS_FILE),
        r#"{"binary-search": "comfortable", "dp": "needs-work"}"#,
    )
    .unwrap();

    let mut store = FileProgressStore::open(dir.path());
    assert_eq!(store.status("binary-search"), Some(Status::Comfortable));
    store
        .save_code("binary-search", "function binarySearch() {}")
        .unwrap();

    let reopened = FileProgressStore::open(dir.path());
    assert_eq!(reopened.status("binary-search"), Some(Status::Comfortable));
    assert_eq!(reopened.status("dp"), Some(Status::NeedsWork));
    assert_eq!(reopened.code("binary-search"), Some("function binarySearch() {}"));
    assert!(!dir.path().join(LEGACY_PROGRESS_FILE).exists());

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(PROGRESS_FILE)).unwrap()).unwrap();
    assert_eq!(
        raw["binary-search"],
        serde_json::json!({ "status": "comfortable", "code": "function binarySearch() {}" })
    );
}

#[test]
fn test_store_creates_its_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    let mut store = FileProgressStore::open(&nested);
    store.set_status("dfs", Some(Status::Complete)).unwrap();
    assert!(nested.join(PROGRESS_FILE).exists());
}
