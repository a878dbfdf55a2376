//! File Project Store Tests

use std::fs;

use graph_studio::error::StoreError;
use graph_studio::store::ProjectSummary;
use graph_studio::{validate_spec_str, ChartSpec, ChartType, FileProjectStore, Project, ProjectStore};
use serde_json::Value;
use tempfile::TempDir;

fn fixture() -> ChartSpec {
    validate_spec_str(include_str!("fixtures/grouped_bar.spec.json")).unwrap()
}

fn store() -> (TempDir, FileProjectStore) {
    let dir = TempDir::new().unwrap();
    let store = FileProjectStore::new(dir.path().join("projects"));
    (dir, store)
}

#[test]
fn test_empty_store_lists_nothing() {
    let (_dir, store) = store();
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_save_load_delete() {
    let (_dir, store) = store();
    let project = Project::new("Quarterly revenue", fixture());
    store.save(&project).unwrap();

    let loaded = store.load(&project.id).unwrap();
    assert_eq!(loaded, project);
    assert!(loaded.checksum.verify_spec(&loaded.spec));

    let listed: Vec<ProjectSummary> = store.list().unwrap();
    assert_eq!(listed, vec![project.summary()]);

    store.delete(&project.id).unwrap();
    assert!(matches!(store.load(&project.id), Err(StoreError::NotFound(_))));
}

#[test]
fn test_delete_is_idempotent() {
    // The root directory of a fresh store does not exist yet
    let (_fresh_dir, fresh) = store();
    let (_dir, store) = store();
    let project = Project::new("Quarterly revenue", fixture());
    fresh.delete(&project.id).unwrap();

    store.save(&project).unwrap();
    store.delete(&project.id).unwrap();
    store.delete(&project.id).unwrap();

    assert!(store.list().unwrap().is_empty());
    assert!(!store.root().join(format!("{}.json", project.id)).exists());
}

#[test]
fn test_save_overwrites_by_id() {
    let (_dir, store) = store();
    let mut project = Project::new("Quarterly revenue", fixture());
    store.save(&project).unwrap();

    let mut edited = fixture();
    edited.chart_type = ChartType::StackedBar;
    project.update_spec(edited);
    store.save(&project).unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].chart_type, ChartType::StackedBar);
}

#[test]
fn test_list_is_newest_first() {
    let (_dir, store) = store();
    let older = Project::new("Older", fixture());
    let mut newer = Project::new("Newer", fixture());
    newer.updated_at = older.updated_at + chrono::Duration::seconds(60);
    store.save(&older).unwrap();
    store.save(&newer).unwrap();

    let names: Vec<String> = store.list().unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Newer", "Older"]);
}

#[test]
fn test_tampered_file_fails_checksum() {
    let (_dir, store) = store();
    let project = Project::new("Quarterly revenue", fixture());
    store.save(&project).unwrap();

    let path = store.root().join(format!("{}.json", project.id));
    let mut record: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    record["spec"]["title"] = Value::String("Edited by hand".into());
    fs::write(&path, serde_json::to_string_pretty(&record).unwrap()).unwrap();

    assert!(matches!(
        store.load(&project.id),
        Err(StoreError::ChecksumMismatch { .. })
    ));
    // Unloadable projects drop out of the listing
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_list_skips_corrupt_files() {
    let (_dir, store) = store();
    let project = Project::new("Quarterly revenue", fixture());
    store.save(&project).unwrap();
    fs::write(store.root().join("broken.json"), "{ not json").unwrap();
    fs::write(store.root().join("notes.txt"), "ignored").unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, project.id);
    assert!(store.load("broken").is_err());
}

#[test]
fn test_unsafe_ids_are_unknown() {
    let (_dir, store) = store();
    for id in ["../escape", "a/b", "", "with space"] {
        assert!(matches!(store.load(id), Err(StoreError::NotFound(_))), "{:?}", id);
        assert!(matches!(store.delete(id), Err(StoreError::NotFound(_))), "{:?}", id);
    }
}
