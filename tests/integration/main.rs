//! Integration tests for Mapedit
//!
//! These tests drive a whole editing session through the history crate and
//! the CLI binary.

use mapedit_core::{AddEntity, ChangeTags, DeleteWay, Entity, EntityId, EntityKind, Graph, MoveNode};
use mapedit_history::{BackupStore, CommitOptions, EditConfig, EditManager, FsBackupStore};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn street() -> Graph {
    Graph::with_entities(vec![
        Entity::node(EntityId::node(1), [0.0, 0.0]),
        Entity::node(EntityId::node(2), [1.0, 0.0]),
        Entity::node(EntityId::node(3), [2.0, 0.0]),
        Entity::way(EntityId::way(1), [EntityId::node(1), EntityId::node(2), EntityId::node(3)])
            .with_tags([("highway", "residential")]),
    ])
}

/// Three commits and an undo, saved as a backup under `root`.
fn save_session(root: &Path) -> EditManager {
    let config = EditConfig::default();
    let mut store = FsBackupStore::new(root, &config);
    let mut manager = EditManager::with_base(config, street());
    assert!(manager.lock_backup(&mut store).unwrap());

    let bench = manager.new_id(EntityKind::Node);
    manager.perform(&[&AddEntity(Entity::node(bench, [5.0, 5.0]).with_tags([("amenity", "bench")]))]);
    manager.commit(CommitOptions::new().annotation("Added a bench.").selected([bench]));

    manager.perform(&[&ChangeTags::new(EntityId::way(1), [("highway", "service")])]);
    manager.commit(CommitOptions::new().annotation("Changed tags."));

    manager.perform(&[&DeleteWay(EntityId::way(1))]);
    manager.commit(CommitOptions::new().annotation("Deleted a line."));
    manager.undo();

    manager.save_backup(&store).unwrap();
    assert!(store.has_backup());
    manager
}

fn mapedit(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_mapedit"))
        .args(args)
        .output()
        .expect("Failed to execute mapedit")
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let output = mapedit(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("mapedit"));
    assert!(stdout.contains("Inspect and manage map edit history backups"));

    let output = mapedit(&["version"]);
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Mapedit v"));
}

/// Test that a saved backup restores into a fresh session
#[test]
fn test_backup_restores_in_new_session() {
    let temp_dir = TempDir::new().unwrap();
    let original = save_session(temp_dir.path());
    let original_changes = original.changes();
    drop(original);

    let config = EditConfig::default();
    let mut store = FsBackupStore::new(temp_dir.path(), &config);
    let mut manager = EditManager::new(config);
    assert!(manager.lock_backup(&mut store).unwrap());
    assert!(manager.has_restorable_changes());

    let restored = tokio_test::block_on(manager.restore_backup(&store)).unwrap();
    assert!(restored);
    assert!(!manager.has_restorable_changes());

    assert_eq!(manager.index(), 2);
    assert_eq!(manager.get_undo_annotation(), Some("Changed tags."));
    assert_eq!(manager.get_redo_annotation(), Some("Deleted a line."));
    assert_eq!(manager.changes().created.len(), original_changes.created.len());
    assert_eq!(manager.changes().modified.len(), original_changes.modified.len());

    // IDs minted after the restore do not collide with restored ones.
    assert_eq!(manager.new_id(EntityKind::Node), EntityId::node(-2));

    manager.redo();
    assert!(!manager.graph().has_entity(&EntityId::way(1)));
    assert!(!manager.graph().has_entity(&EntityId::node(2)));
}

/// Test that editing after a restore keeps working and can be saved again
#[tokio::test]
async fn test_continue_editing_after_restore() {
    let temp_dir = TempDir::new().unwrap();
    drop(save_session(temp_dir.path()));

    let config = EditConfig {
        transition_duration_ms: 20,
        frame_interval_ms: 5,
        ..Default::default()
    };
    let mut store = FsBackupStore::new(temp_dir.path(), &config);
    let mut manager = EditManager::new(config);
    manager.lock_backup(&mut store).unwrap();
    manager.restore_backup(&store).await.unwrap();

    manager
        .perform_async(&[&MoveNode { id: EntityId::node(-1), to: [6.0, 6.0] }])
        .await
        .unwrap();
    manager.commit(CommitOptions::new().annotation("Moved a point."));
    assert_eq!(manager.get_redo_annotation(), None);

    manager.save_backup(&store).unwrap();
    let json = store.read().unwrap().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(doc["version"], 3);
    assert_eq!(doc["index"], 3);
    assert_eq!(doc["stack"].as_array().map(Vec::len), Some(4));
}

/// Test that the CLI summarizes a backup
#[test]
fn test_cli_inspect_and_validate() {
    let temp_dir = TempDir::new().unwrap();
    drop(save_session(temp_dir.path()));
    let root = temp_dir.path().to_string_lossy().to_string();

    let output = mapedit(&["--root", &root, "inspect"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("edits: 3"));
    assert!(stdout.contains("index: 2"));
    assert!(stdout.contains("Added a bench."));
    assert!(stdout.contains("created: 1"));

    let output = mapedit(&["--root", &root, "validate"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("ok: 3 edits, index 2"));
}

/// Test that the CLI rejects a malformed document
#[test]
fn test_cli_validate_rejects_bad_document() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.json");
    std::fs::write(&path, r#"{ "version": 9, "stack": [{}], "index": 0 }"#).unwrap();

    let path = path.to_string_lossy().to_string();
    let output = mapedit(&["validate", &path]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("version 9 not supported"));
}

/// Test that clear removes the backup directory
#[test]
fn test_cli_clear() {
    let temp_dir = TempDir::new().unwrap();
    drop(save_session(temp_dir.path()));
    assert!(temp_dir.path().join(".mapedit").exists());

    let root = temp_dir.path().to_string_lossy().to_string();
    let output = mapedit(&["--root", &root, "clear"]);
    assert!(output.status.success());
    assert!(!temp_dir.path().join(".mapedit").exists());
}

/// Test that a custom config moves the backup directory
#[test]
fn test_cli_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("mapedit.toml");
    std::fs::write(&config_path, "backup_dir = \"backups\"\n").unwrap();

    let config = EditConfig::load(&config_path).unwrap();
    let store = FsBackupStore::new(temp_dir.path(), &config);
    store.write(r#"{ "version": 3, "stack": [{}], "index": 0 }"#).unwrap();

    let root = temp_dir.path().to_string_lossy().to_string();
    let config_path = config_path.to_string_lossy().to_string();
    let output = mapedit(&["--root", &root, "--config", &config_path, "validate"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("ok: 0 edits, index 0"));
}
