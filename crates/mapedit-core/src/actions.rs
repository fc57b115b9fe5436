//! Stock editing actions

use crate::action::Action;
use crate::graph::Graph;
use crate::model::*;

/// Leaves the graph untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl Action for Noop {
    fn apply(&self, graph: &Graph) -> Graph {
        graph.clone()
    }
}

/// Adds (or overwrites) an entity.
#[derive(Debug, Clone)]
pub struct AddEntity(pub Entity);

impl Action for AddEntity {
    fn apply(&self, graph: &Graph) -> Graph {
        graph.replace(self.0.clone())
    }
}

/// Replaces the tags of an entity.
#[derive(Debug, Clone)]
pub struct ChangeTags {
    pub id: EntityId,
    pub tags: Tags,
}

impl ChangeTags {
    pub fn new<K, V>(id: EntityId, tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        ChangeTags {
            id,
            tags: tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl Action for ChangeTags {
    fn apply(&self, graph: &Graph) -> Graph {
        match graph.entity(&self.id) {
            Some(entity) => graph.replace(entity.update_tags(self.tags.clone())),
            None => graph.clone(),
        }
    }
}

/// Moves a node. Transitionable: at progress `t` the node sits `t` of the
/// way from where it was to `to`.
#[derive(Debug, Clone, Copy)]
pub struct MoveNode {
    pub id: EntityId,
    pub to: [f64; 2],
}

impl Action for MoveNode {
    fn apply(&self, graph: &Graph) -> Graph {
        self.apply_at(graph, 1.0)
    }

    fn transitionable(&self) -> bool {
        true
    }

    fn apply_at(&self, graph: &Graph, t: f64) -> Graph {
        let Some(node) = graph.entity(&self.id) else {
            return graph.clone();
        };
        let t = t.clamp(0.0, 1.0);
        let from = node.loc.unwrap_or(self.to);
        let loc = [
            from[0] + (self.to[0] - from[0]) * t,
            from[1] + (self.to[1] - from[1]) * t,
        ];
        graph.replace(node.update_loc(loc))
    }
}

/// Deletes a node, detaching it from parent ways and relations.
/// Ways left with fewer than two nodes are deleted too.
#[derive(Debug, Clone, Copy)]
pub struct DeleteNode(pub EntityId);

impl Action for DeleteNode {
    fn apply(&self, graph: &Graph) -> Graph {
        let id = self.0;
        let mut graph = graph.clone();

        for way in graph.parent_ways(&id) {
            let nodes: Vec<EntityId> = way.refs.iter().copied().filter(|n| *n != id).collect();
            let distinct: std::collections::BTreeSet<_> = nodes.iter().collect();
            graph = if distinct.len() < 2 {
                delete_way(&graph, &way.id)
            } else {
                graph.replace(way.update_refs(nodes))
            };
        }

        graph = detach_from_relations(&graph, &id);
        graph.remove(&id)
    }
}

/// Deletes a way along with child nodes that end up orphaned and untagged.
#[derive(Debug, Clone, Copy)]
pub struct DeleteWay(pub EntityId);

impl Action for DeleteWay {
    fn apply(&self, graph: &Graph) -> Graph {
        delete_way(graph, &self.0)
    }
}

/// Drops any local change to an entity, exposing its base value.
#[derive(Debug, Clone, Copy)]
pub struct RevertEntity(pub EntityId);

impl Action for RevertEntity {
    fn apply(&self, graph: &Graph) -> Graph {
        graph.revert(&self.0)
    }
}

fn delete_way(graph: &Graph, id: &EntityId) -> Graph {
    let Some(way) = graph.entity(id) else {
        return graph.clone();
    };

    let mut graph = detach_from_relations(graph, id).remove(id);
    for node in &way.refs {
        let orphaned = graph.parent_ways(node).is_empty() && graph.parent_relations(node).is_empty();
        let interesting = graph.entity(node).is_some_and(|n| n.has_interesting_tags());
        if orphaned && !interesting {
            graph = graph.remove(node);
        }
    }
    graph
}

fn detach_from_relations(graph: &Graph, id: &EntityId) -> Graph {
    let mut graph = graph.clone();
    for relation in graph.parent_relations(id) {
        let members: Vec<EntityId> = relation.refs.iter().copied().filter(|m| m != id).collect();
        graph = if members.is_empty() {
            detach_from_relations(&graph, &relation.id).remove(&relation.id)
        } else {
            graph.replace(relation.update_refs(members))
        };
    }
    graph
}
