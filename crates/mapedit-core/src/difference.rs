//! Difference computation between two graphs

use crate::graph::Graph;
use crate::model::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// How one entity differs between two graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub before: Option<Arc<Entity>>,
    pub after: Option<Arc<Entity>>,
}

impl Change {
    pub fn change_type(&self) -> ChangeType {
        match (&self.before, &self.after) {
            (None, Some(_)) => ChangeType::Created,
            (Some(_), None) => ChangeType::Deleted,
            _ => ChangeType::Modified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

/// One line of a change summary, as shown before saving.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryItem {
    pub entity: Arc<Entity>,
    pub change_type: ChangeType,
}

/// What kinds of change a difference contains, so renderers can pick between
/// a geometry redraw and a restyle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DidChange {
    pub addition: bool,
    pub deletion: bool,
    pub geometry: bool,
    pub properties: bool,
}

impl DidChange {
    fn record(&mut self, change: &Change) {
        match (&change.before, &change.after) {
            (None, Some(_)) => self.addition = true,
            (Some(_), None) => self.deletion = true,
            (Some(b), Some(a)) => {
                if b.refs != a.refs {
                    self.geometry = true;
                    // Relation membership counts as a property change too.
                    if a.kind() == EntityKind::Relation {
                        self.properties = true;
                    }
                }
                if b.loc != a.loc {
                    self.geometry = true;
                }
                if b.tags != a.tags {
                    self.properties = true;
                }
            }
            (None, None) => {}
        }
    }
}

/// The entities whose content differs between a `before` and an `after` graph.
#[derive(Debug, Clone)]
pub struct Difference {
    before: Graph,
    after: Graph,
    changes: BTreeMap<EntityId, Change>,
    did_change: DidChange,
}

impl Difference {
    /// Compute the difference between two graph states.
    ///
    /// Only overlay keys are visited when the graphs share a base layer. An
    /// entity created and then deleted again inside the span has no entry.
    pub fn between(before: &Graph, after: &Graph) -> Self {
        let mut diff = Difference {
            before: before.clone(),
            after: after.clone(),
            changes: BTreeMap::new(),
            did_change: DidChange::default(),
        };

        if before.shares_state(after) {
            return diff;
        }

        let mut ids: BTreeSet<EntityId> = before.local_ids().chain(after.local_ids()).copied().collect();
        if !Arc::ptr_eq(before.base(), after.base()) {
            ids.extend(before.base().ids());
            ids.extend(after.base().ids());
        }

        for id in ids {
            let b = before.entity(&id);
            let a = after.entity(&id);
            let changed = match (&b, &a) {
                (None, None) => false,
                (Some(b), Some(a)) => !Arc::ptr_eq(b, a) && !b.same_content(a),
                _ => true,
            };
            if changed {
                let change = Change { before: b, after: a };
                diff.did_change.record(&change);
                diff.changes.insert(id, change);
            }
        }

        diff
    }

    /// An empty difference anchored on a single graph.
    pub fn empty(graph: &Graph) -> Self {
        Difference {
            before: graph.clone(),
            after: graph.clone(),
            changes: BTreeMap::new(),
            did_change: DidChange::default(),
        }
    }

    pub fn before(&self) -> &Graph {
        &self.before
    }

    pub fn after(&self) -> &Graph {
        &self.after
    }

    pub fn changes(&self) -> &BTreeMap<EntityId, Change> {
        &self.changes
    }

    pub fn did_change(&self) -> DidChange {
        self.did_change
    }

    pub fn get(&self, id: &EntityId) -> Option<&Change> {
        self.changes.get(id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityId> {
        self.changes.keys()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Entities that exist only in `after`.
    pub fn created(&self) -> Vec<Arc<Entity>> {
        self.changes
            .values()
            .filter(|c| c.before.is_none())
            .filter_map(|c| c.after.clone())
            .collect()
    }

    /// `after` values of entities present on both sides.
    pub fn modified(&self) -> Vec<Arc<Entity>> {
        self.changes
            .values()
            .filter(|c| c.before.is_some())
            .filter_map(|c| c.after.clone())
            .collect()
    }

    /// `before` values of entities missing from `after`.
    pub fn deleted(&self) -> Vec<Arc<Entity>> {
        self.changes
            .values()
            .filter(|c| c.after.is_none())
            .filter_map(|c| c.before.clone())
            .collect()
    }

    /// Every entity affected by the change, with its final value (`None` = gone).
    ///
    /// Extends the changed set with the child nodes of changed ways, the members
    /// of changed multipolygons, and all parent ways/relations up the hierarchy.
    pub fn complete(&self) -> BTreeMap<EntityId, Option<Arc<Entity>>> {
        let head = &self.after;
        let mut result = BTreeMap::new();

        for (id, change) in &self.changes {
            let Some(entity) = change.after.as_ref().or(change.before.as_ref()) else {
                continue;
            };
            result.insert(*id, change.after.clone());

            match entity.kind() {
                EntityKind::Way => {
                    for node in refs_union(change) {
                        result.insert(node, head.entity(&node));
                    }
                }
                EntityKind::Relation if entity.is_multipolygon() => {
                    for member in refs_union(change) {
                        if let Some(found) = head.entity(&member) {
                            result.insert(member, Some(found));
                        }
                    }
                }
                _ => {}
            }

            let mut pending: Vec<EntityId> = head.parents_of(id).into_iter().collect();
            while let Some(parent) = pending.pop() {
                if result.contains_key(&parent) {
                    continue;
                }
                result.insert(parent, head.entity(&parent));
                pending.extend(
                    head.parents_of(&parent)
                        .into_iter()
                        .filter(|p| p.kind == EntityKind::Relation),
                );
            }
        }

        result
    }

    /// Per-entity change types the way a user thinks about them.
    ///
    /// Untagged vertices are folded into their parent ways: moving one
    /// reports the way as modified rather than the node itself.
    pub fn summary(&self) -> BTreeMap<EntityId, SummaryItem> {
        let base = &self.before;
        let head = &self.after;
        let mut result = BTreeMap::new();

        for change in self.changes.values() {
            match (&change.before, &change.after) {
                (b, Some(h)) if !head.is_vertex(&h.id) => {
                    let change_type = if b.is_some() { ChangeType::Modified } else { ChangeType::Created };
                    add_summary(&mut result, h, change_type);
                }
                (Some(b), None) if !base.is_vertex(&b.id) => {
                    add_summary(&mut result, b, ChangeType::Deleted);
                }
                (Some(b), Some(h)) => {
                    let moved = b.loc != h.loc;
                    let retagged = b.tags != h.tags;
                    if moved {
                        for parent in head.parent_ways(&h.id) {
                            if !result.contains_key(&parent.id) {
                                add_summary(&mut result, &parent, ChangeType::Modified);
                            }
                        }
                    }
                    if retagged || (moved && h.has_interesting_tags()) {
                        add_summary(&mut result, h, ChangeType::Modified);
                    }
                }
                (None, Some(h)) if h.has_interesting_tags() => {
                    add_summary(&mut result, h, ChangeType::Created);
                }
                (Some(b), None) if b.has_interesting_tags() => {
                    add_summary(&mut result, b, ChangeType::Deleted);
                }
                _ => {}
            }
        }

        result
    }
}

fn add_summary(result: &mut BTreeMap<EntityId, SummaryItem>, entity: &Arc<Entity>, change_type: ChangeType) {
    result.insert(entity.id, SummaryItem { entity: Arc::clone(entity), change_type });
}

fn refs_union(change: &Change) -> BTreeSet<EntityId> {
    change
        .before
        .iter()
        .chain(change.after.iter())
        .flat_map(|e| e.refs.iter().copied())
        .collect()
}
