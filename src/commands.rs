//! CLI command implementations

use anyhow::Context;
use mapedit_history::{EditConfig, EditManager, FsBackupStore};
use std::path::{Path, PathBuf};

pub fn load_config(path: Option<&Path>) -> anyhow::Result<EditConfig> {
    match path {
        Some(path) => EditConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EditConfig::default()),
    }
}

/// The explicit file, or the backup document under `root`.
pub fn document_path(root: &Path, config: &EditConfig, file: Option<PathBuf>) -> PathBuf {
    file.unwrap_or_else(|| FsBackupStore::new(root, config).backup_path())
}

async fn load(path: &Path, config: EditConfig) -> anyhow::Result<EditManager> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut manager = EditManager::new(config);
    manager
        .from_json_async(&json)
        .await
        .with_context(|| format!("invalid history document {}", path.display()))?;
    Ok(manager)
}

pub async fn inspect(path: &Path, config: EditConfig) -> anyhow::Result<()> {
    tracing::info!("Inspecting history: {}", path.display());
    let manager = load(path, config).await?;

    println!("edits: {}", manager.history().len() - 1);
    println!("index: {}", manager.index());
    for (position, edit) in manager.history().iter().enumerate().skip(1) {
        let marker = if position == manager.index() { '*' } else { ' ' };
        println!(
            "{} {:>3}  {}",
            marker,
            position,
            edit.annotation.as_deref().unwrap_or("(no annotation)")
        );
    }

    let changes = manager.changes();
    println!("created: {}", changes.created.len());
    println!("modified: {}", changes.modified.len());
    println!("deleted: {}", changes.deleted.len());

    let sources = manager.sources_used();
    if !sources.imagery.is_empty() {
        let imagery: Vec<&str> = sources.imagery.iter().map(String::as_str).collect();
        println!("imagery: {}", imagery.join(", "));
    }
    Ok(())
}

pub async fn validate(path: &Path, config: EditConfig) -> anyhow::Result<()> {
    let manager = load(path, config).await?;
    println!(
        "ok: {} edits, index {}",
        manager.history().len() - 1,
        manager.index()
    );
    Ok(())
}

pub fn clear(root: &Path, config: &EditConfig) -> anyhow::Result<()> {
    tracing::info!("Clearing history backup for: {}", root.display());

    mapedit_history::clear_backup_dir(root, config)?;

    tracing::info!("Backup cleared");
    Ok(())
}
