//! Immutable entity graph: a shared base layer plus a persistent local overlay

use crate::model::*;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

type LocalEntities = im::HashMap<EntityId, Option<Arc<Entity>>>;
type LocalParents = im::HashMap<EntityId, im::HashSet<EntityId>>;

/// Originally-loaded entities, shared by every graph derived from the same root.
///
/// This is the one mutable piece of the graph model: merging freshly loaded
/// data makes it visible through every graph built on this layer at once.
#[derive(Default)]
pub struct BaseLayer {
    entities: DashMap<EntityId, Arc<Entity>>,
    /// child id -> ids of base entities that reference it
    parents: DashMap<EntityId, HashSet<EntityId>>,
}

impl std::fmt::Debug for BaseLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseLayer")
            .field("entity_count", &self.entities.len())
            .finish()
    }
}

impl BaseLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a base entity by ID.
    pub fn entity(&self, id: &EntityId) -> Option<Arc<Entity>> {
        self.entities.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// IDs of every base entity, in no particular order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|e| *e.key()).collect()
    }

    /// IDs of base entities referencing `id`.
    pub fn parents_of(&self, id: &EntityId) -> Vec<EntityId> {
        self.parents
            .get(id)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Merge entities into the base layer. Existing IDs are kept unless `force`.
    /// Returns the IDs that were actually written.
    pub fn rebase<I>(&self, entities: I, force: bool) -> Vec<EntityId>
    where
        I: IntoIterator<Item = Arc<Entity>>,
    {
        let mut merged = Vec::new();
        for entity in entities {
            let previous = self.entity(&entity.id);
            if previous.is_some() && !force {
                continue;
            }
            if let Some(previous) = previous {
                for child in &previous.refs {
                    if let Some(mut parents) = self.parents.get_mut(child) {
                        parents.remove(&entity.id);
                    }
                }
            }
            for child in &entity.refs {
                self.parents.entry(*child).or_default().insert(entity.id);
            }
            merged.push(entity.id);
            self.entities.insert(entity.id, entity);
        }
        tracing::debug!("Rebased {} entities into base layer", merged.len());
        merged
    }
}

/// A snapshot of the whole entity set.
///
/// Cloning is cheap: the base layer is shared and the local overlay is a
/// persistent map, so `replace`/`remove` only copy the touched path.
#[derive(Clone)]
pub struct Graph {
    base: Arc<BaseLayer>,
    /// `Some` = created/modified here, `None` = deleted here
    local: LocalEntities,
    /// child id -> locally present entities referencing it
    local_parents: LocalParents,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("base_count", &self.base.len())
            .field("local_count", &self.local.len())
            .finish()
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.base, &other.base) && self.local == other.local
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            base: Arc::new(BaseLayer::new()),
            local: LocalEntities::new(),
            local_parents: LocalParents::new(),
        }
    }

    /// A fresh graph whose base layer holds `entities`.
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let graph = Graph::new();
        graph.base.rebase(entities.into_iter().map(Arc::new), false);
        graph
    }

    /// A graph on the same base layer with an empty overlay.
    pub fn derive(&self) -> Self {
        Graph {
            base: Arc::clone(&self.base),
            local: LocalEntities::new(),
            local_parents: LocalParents::new(),
        }
    }

    pub fn base(&self) -> &Arc<BaseLayer> {
        &self.base
    }

    /// True when both graphs share a base and the very same overlay.
    pub fn shares_state(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.base, &other.base) && self.local.ptr_eq(&other.local)
    }

    /// Get an entity, searching the local overlay first, then the base.
    pub fn entity(&self, id: &EntityId) -> Option<Arc<Entity>> {
        match self.local.get(id) {
            Some(slot) => slot.clone(),
            None => self.base.entity(id),
        }
    }

    pub fn has_entity(&self, id: &EntityId) -> bool {
        self.entity(id).is_some()
    }

    /// True if `id` carries a tombstone in the overlay.
    pub fn is_locally_deleted(&self, id: &EntityId) -> bool {
        matches!(self.local.get(id), Some(None))
    }

    /// Iterate over the local overlay.
    pub fn local_entities(&self) -> impl Iterator<Item = (&EntityId, Option<&Arc<Entity>>)> {
        self.local.iter().map(|(id, slot)| (id, slot.as_ref()))
    }

    pub fn local_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.local.keys()
    }

    pub fn local_count(&self) -> usize {
        self.local.len()
    }

    /// Return a new graph with `entity` set in the overlay.
    pub fn replace(&self, entity: impl Into<Arc<Entity>>) -> Graph {
        let replacement = entity.into();
        let id = replacement.id;
        if let Some(current) = self.entity(&id) {
            if Arc::ptr_eq(&current, &replacement) || *current == *replacement {
                return self.clone();
            }
        }

        let mut graph = self.clone();
        graph.unindex_local(&id);
        index_refs(&mut graph.local_parents, &replacement);
        graph.local.insert(id, Some(replacement));
        graph
    }

    /// Return a new graph with `id` tombstoned. Unknown IDs leave the graph unchanged.
    pub fn remove(&self, id: &EntityId) -> Graph {
        if !self.has_entity(id) {
            return self.clone();
        }

        let mut graph = self.clone();
        graph.unindex_local(id);
        graph.local.insert(*id, None);
        graph
    }

    /// Return a new graph where `id` shows its base value again.
    pub fn revert(&self, id: &EntityId) -> Graph {
        if !self.local.contains_key(id) {
            return self.clone();
        }

        let mut graph = self.clone();
        graph.unindex_local(id);
        graph.local.remove(id);
        graph
    }

    /// A graph on the same base whose overlay is exactly `overlay`.
    pub fn load<I>(&self, overlay: I) -> Graph
    where
        I: IntoIterator<Item = (EntityId, Option<Arc<Entity>>)>,
    {
        let mut graph = self.derive();
        for (id, slot) in overlay {
            if let Some(entity) = &slot {
                index_refs(&mut graph.local_parents, entity);
            }
            graph.local.insert(id, slot);
        }
        graph
    }

    /// IDs of every entity that references `id`, honouring local overrides
    /// of the referencing entities.
    pub fn parents_of(&self, id: &EntityId) -> BTreeSet<EntityId> {
        let mut parents: BTreeSet<EntityId> = self
            .base
            .parents_of(id)
            .into_iter()
            .filter(|parent| !self.local.contains_key(parent))
            .collect();
        if let Some(local) = self.local_parents.get(id) {
            parents.extend(local.iter().copied());
        }
        parents
    }

    /// Ways that contain the given entity.
    pub fn parent_ways(&self, id: &EntityId) -> Vec<Arc<Entity>> {
        self.parents_of_kind(id, EntityKind::Way)
    }

    /// Relations that have the given entity as a member.
    pub fn parent_relations(&self, id: &EntityId) -> Vec<Arc<Entity>> {
        self.parents_of_kind(id, EntityKind::Relation)
    }

    /// Child nodes of a way, in order. Empty for anything else.
    pub fn child_nodes(&self, id: &EntityId) -> Vec<Arc<Entity>> {
        match self.entity(id) {
            Some(way) if way.kind() == EntityKind::Way => {
                way.refs.iter().filter_map(|child| self.entity(child)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// A node with no parent ways.
    pub fn is_poi(&self, id: &EntityId) -> bool {
        id.kind == EntityKind::Node && self.parent_ways(id).is_empty()
    }

    /// A node that belongs to at least one way.
    pub fn is_vertex(&self, id: &EntityId) -> bool {
        id.kind == EntityKind::Node && !self.parent_ways(id).is_empty()
    }

    fn parents_of_kind(&self, id: &EntityId, kind: EntityKind) -> Vec<Arc<Entity>> {
        self.parents_of(id)
            .into_iter()
            .filter(|parent| parent.kind == kind)
            .filter_map(|parent| self.entity(&parent))
            .collect()
    }

    fn unindex_local(&mut self, id: &EntityId) {
        if let Some(Some(previous)) = self.local.get(id).cloned() {
            unindex_refs(&mut self.local_parents, &previous);
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

fn index_refs(parents: &mut LocalParents, entity: &Entity) {
    for child in &entity.refs {
        parents
            .entry(*child)
            .or_insert_with(im::HashSet::new)
            .insert(entity.id);
    }
}

fn unindex_refs(parents: &mut LocalParents, entity: &Entity) {
    for child in &entity.refs {
        let now_empty = match parents.get_mut(child) {
            Some(set) => {
                set.remove(&entity.id);
                set.is_empty()
            }
            None => false,
        };
        if now_empty {
            parents.remove(child);
        }
    }
}
