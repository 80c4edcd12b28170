use logicleap::{
    storage::{FileStore, KeyValueStore, MemoryStore},
    versions::{VersionStore, VERSIONS_STORAGE_KEY},
    AppError, Language, TaskType,
};
use std::sync::Arc;

#[test]
fn newest_version_comes_first() {
    let store = Arc::new(MemoryStore::new());
    let mut versions = VersionStore::open(store);

    let v1 = versions
        .save("p1", TaskType::Generate, Language::Bash, "r1")
        .unwrap()
        .unwrap();
    let v2 = versions
        .save("p2", TaskType::Explain, Language::Python, "r2")
        .unwrap()
        .unwrap();

    let ids: Vec<_> = versions.list().iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec![v2.id.as_str(), v1.id.as_str()]);
    assert_ne!(v1.id, v2.id);
    assert!(v1.id.starts_with("version-"));

    assert!(versions.delete(&v2.id).unwrap());
    let ids: Vec<_> = versions.list().iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec![v1.id.as_str()]);
    assert!(!versions.delete(&v2.id).unwrap());
}

#[test]
fn blank_result_is_not_saved() {
    let store = Arc::new(MemoryStore::new());
    let mut versions = VersionStore::open(store.clone());

    assert_eq!(
        versions
            .save("p", TaskType::Generate, Language::Auto, " \n\t")
            .unwrap(),
        None
    );
    assert!(versions.list().is_empty());
    assert_eq!(store.get(VERSIONS_STORAGE_KEY).unwrap(), None);
}

#[test]
fn changes_are_written_through() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));

    let saved = {
        let mut versions = VersionStore::open(store.clone());
        versions
            .save("p", TaskType::Security, Language::PowerShell, "Get-Acl")
            .unwrap()
            .unwrap()
    };

    let mut reopened = VersionStore::open(store.clone());
    assert_eq!(reopened.list(), &[saved.clone()]);
    assert_eq!(reopened.get(&saved.id), Some(&saved));

    reopened.clear().unwrap();
    assert!(reopened.list().is_empty());
    assert_eq!(store.get(VERSIONS_STORAGE_KEY).unwrap(), None);
    assert!(VersionStore::open(store).list().is_empty());
}

#[test]
fn corrupt_data_opens_empty_with_load_error() {
    let store = Arc::new(MemoryStore::new());
    store.set(VERSIONS_STORAGE_KEY, "{not json").unwrap();

    let mut versions = VersionStore::open(store.clone());
    assert!(versions.list().is_empty());
    assert!(matches!(
        versions.load_error(),
        Some(AppError::PersistenceLoad(_))
    ));

    versions
        .save("p", TaskType::Debug, Language::Vba, "fixed")
        .unwrap();
    assert!(VersionStore::open(store).load_error().is_none());
}

#[test]
fn reads_versions_saved_with_millisecond_timestamps() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            VERSIONS_STORAGE_KEY,
            r#"[{"id":"version-1700000000000","prompt":"p","taskType":"Step by step","language":"CMD Batch","result":"r","savedAt":"2024-11-14T22:13:20.000Z"}]"#,
        )
        .unwrap();

    let versions = VersionStore::open(store);
    let version = &versions.list()[0];
    assert_eq!(version.task_type, TaskType::StepByStep);
    assert_eq!(version.language, Language::Cmd);
}
