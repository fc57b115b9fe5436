//! Persisted form of the edit history

use crate::edit::{Edit, SourcesUsed, ViewTransform};
use crate::error::{EditError, Result};
use crate::manager::EditManager;
use mapedit_core::{Entity, EntityId, IdAllocator};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Document version written by `to_json`.
pub const HISTORY_VERSION: u64 = 3;

/// Versions `from_json` can read. Version 2 documents carry no base entities.
pub const SUPPORTED_VERSIONS: &[u64] = &[2, 3];

/// The whole history, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDocument {
    #[serde(default)]
    pub version: Option<u64>,
    /// Every entity value referenced by the stack, keyed by `Entity::key`.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Originals of the edited entities, their child nodes and parent ways.
    #[serde(default)]
    pub base_entities: Vec<Entity>,
    pub stack: Vec<StackItem>,
    #[serde(rename = "nextIDs", default)]
    pub next_ids: IdAllocator,
    pub index: usize,
    /// Milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// One edit of the stack: its overlay as entity keys and tombstoned ids, plus
/// the commit metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackItem {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub imagery_used: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub photos_used: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<ViewTransform>,
    #[serde(rename = "selectedIDs", default, skip_serializing_if = "Vec::is_empty")]
    pub selected_ids: Vec<String>,
}

impl StackItem {
    fn from_edit(edit: &Edit, entities: &mut BTreeMap<String, Arc<Entity>>) -> Self {
        let mut item = StackItem {
            annotation: edit.annotation.clone(),
            imagery_used: edit.sources.imagery.clone(),
            photos_used: edit.sources.photos.clone(),
            transform: edit.transform,
            selected_ids: edit.selected_ids.iter().map(EntityId::to_string).collect(),
            ..Default::default()
        };

        for (id, slot) in edit.graph.local_entities() {
            match slot {
                Some(entity) => item.modified.push(intern(entity, entities)),
                None => item.deleted.push(id.to_string()),
            }
        }
        item.modified.sort();
        item.deleted.sort();
        item
    }
}

/// Store `entity` under its key and return that key.
///
/// Values with the same id and version but different content would share a
/// key, so a later value gets its version bumped until it has a key of its own.
fn intern(entity: &Arc<Entity>, entities: &mut BTreeMap<String, Arc<Entity>>) -> String {
    let mut candidate = Arc::clone(entity);
    loop {
        let key = candidate.key();
        match entities.get(&key) {
            None => {
                entities.insert(key.clone(), candidate);
                return key;
            }
            Some(existing) if **existing == *candidate => return key,
            Some(_) => candidate = Arc::new(candidate.touch()),
        }
    }
}

/// A history rebuilt from a document, not yet installed into a manager.
struct Restored {
    base_entities: Vec<Arc<Entity>>,
    edits: Vec<RestoredEdit>,
    next_ids: IdAllocator,
    index: usize,
}

struct RestoredEdit {
    overlay: Vec<(EntityId, Option<Arc<Entity>>)>,
    annotation: Option<String>,
    selected_ids: BTreeSet<EntityId>,
    transform: Option<ViewTransform>,
    sources: SourcesUsed,
}

impl HistoryDocument {
    /// Check the document and resolve every reference in it.
    fn resolve(self) -> Result<Restored> {
        match self.version {
            None => return Err(EditError::MissingVersion),
            Some(v) if !SUPPORTED_VERSIONS.contains(&v) => return Err(EditError::UnsupportedVersion(v)),
            Some(_) => {}
        }
        if self.stack.is_empty() {
            return Err(EditError::EmptyStack);
        }
        if self.index >= self.stack.len() {
            return Err(EditError::InvalidIndex {
                index: self.index,
                len: self.stack.len(),
            });
        }

        let entities: BTreeMap<String, Arc<Entity>> = self
            .entities
            .into_iter()
            .map(|e| (e.key(), Arc::new(e)))
            .collect();

        // The first item stands for the base edit and is never replayed.
        let mut edits = Vec::with_capacity(self.stack.len() - 1);
        for (position, item) in self.stack.into_iter().enumerate().skip(1) {
            let mut overlay = Vec::with_capacity(item.modified.len() + item.deleted.len());
            for key in &item.modified {
                let entity = entities.get(key).ok_or_else(|| EditError::DanglingEntityKey {
                    item: position,
                    key: key.clone(),
                })?;
                overlay.push((entity.id, Some(Arc::clone(entity))));
            }
            for id in &item.deleted {
                overlay.push((id.parse::<EntityId>()?, None));
            }

            edits.push(RestoredEdit {
                overlay,
                annotation: item.annotation,
                selected_ids: item
                    .selected_ids
                    .iter()
                    .map(|id| id.parse::<EntityId>())
                    .collect::<std::result::Result<_, _>>()?,
                transform: item.transform,
                sources: SourcesUsed {
                    imagery: item.imagery_used,
                    photos: item.photos_used,
                },
            });
        }

        Ok(Restored {
            base_entities: self.base_entities.into_iter().map(Arc::new).collect(),
            edits,
            next_ids: self.next_ids,
            index: self.index,
        })
    }
}

impl EditManager {
    /// Serialize the history, or `None` when base and stable do not differ.
    pub fn to_json(&self) -> Result<Option<String>> {
        match self.to_document() {
            Some(doc) => Ok(Some(serde_json::to_string(&doc)?)),
            None => Ok(None),
        }
    }

    pub fn to_document(&self) -> Option<HistoryDocument> {
        if !self.has_changes() {
            return None;
        }

        let mut entities = BTreeMap::new();
        let stack: Vec<StackItem> = self
            .history
            .iter()
            .map(|edit| StackItem::from_edit(edit, &mut entities))
            .collect();

        let touched: BTreeSet<EntityId> = self
            .history
            .iter()
            .flat_map(|edit| edit.graph.local_ids().copied().collect::<Vec<_>>())
            .collect();

        let base = &self.base().graph;
        let mut base_entities: BTreeMap<EntityId, Arc<Entity>> = BTreeMap::new();
        for id in &touched {
            let Some(original) = base.entity(id) else {
                continue;
            };
            base_entities.insert(*id, original);
            for child in base.child_nodes(id) {
                base_entities.insert(child.id, child);
            }
            for parent in base.parent_ways(id) {
                base_entities.insert(parent.id, parent);
            }
        }

        debug!(
            "Serialized {} edits, {} entities, {} base entities",
            stack.len(),
            entities.len(),
            base_entities.len()
        );

        Some(HistoryDocument {
            version: Some(HISTORY_VERSION),
            entities: entities.into_values().map(|e| (*e).clone()).collect(),
            base_entities: base_entities.into_values().map(|e| (*e).clone()).collect(),
            stack,
            next_ids: self.ids,
            index: self.index,
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
        })
    }

    /// Replace the history with the one in `json`.
    ///
    /// The document is fully validated first; on error the manager is left
    /// untouched.
    pub fn from_json(&mut self, json: &str) -> Result<()> {
        let doc: HistoryDocument = serde_json::from_str(json)?;
        self.load_document(doc)
    }

    pub async fn from_json_async(&mut self, json: &str) -> Result<()> {
        tokio::task::yield_now().await;
        self.from_json(json)
    }

    pub fn load_document(&mut self, doc: HistoryDocument) -> Result<()> {
        let restored = doc.resolve()?;

        let previous = self.index;
        let staging_before = self.staging.graph.clone();
        let stable_before = self.stable().graph.clone();

        let base = self.base().graph.clone();
        base.base().rebase(restored.base_entities, true);

        let mut history = vec![Arc::clone(self.base())];
        history.extend(restored.edits.into_iter().map(|edit| {
            Arc::new(Edit {
                graph: base.load(edit.overlay),
                annotation: edit.annotation,
                selected_ids: edit.selected_ids,
                transform: edit.transform,
                sources: edit.sources,
            })
        }));

        self.history = history;
        self.index = restored.index;
        self.ids = restored.next_ids;
        self.checkpoints.clear();
        self.reset_staging();

        info!("Restored {} edits, cursor at {}", self.history.len() - 1, self.index);
        self.staging_changed(&staging_before);
        self.stable_changed(&stable_before);
        self.history_jumped(previous, self.index);
        Ok(())
    }
}
