//! Unit tests for mapedit-core module

use crate::test_utils::*;
use crate::*;
use std::sync::Arc;

fn ids(entities: &[Arc<Entity>]) -> Vec<EntityId> {
    entities.iter().map(|e| e.id).collect()
}

#[test]
fn test_entity_id_text_form() {
    insta::assert_snapshot!(EntityId::way(-3).to_string(), @"w-3");

    assert_eq!("n-1".parse::<EntityId>().unwrap(), n(-1));
    assert_eq!("r42".parse::<EntityId>().unwrap(), r(42));
    assert_eq!("".parse::<EntityId>(), Err(ParseIdError::Empty));
    assert_eq!("x1".parse::<EntityId>(), Err(ParseIdError::UnknownKind('x')));
    assert_eq!("n".parse::<EntityId>(), Err(ParseIdError::InvalidNumber("n".to_string())));

    assert!(n(-1).is_new());
    assert!(!n(1).is_new());
}

#[test]
fn test_entity_serialization() {
    let node = Entity::node(n(1), [1.0, 2.0]);
    let value = serde_json::to_value(&node).unwrap();
    assert_eq!(value, serde_json::json!({ "id": "n1", "v": 0, "loc": [1.0, 2.0] }));

    let way: Entity = serde_json::from_value(serde_json::json!({
        "id": "w-1",
        "tags": { "highway": "service" },
        "refs": ["n1", "n2"]
    }))
    .unwrap();
    assert_eq!(way.version, 0);
    assert_eq!(way.refs, vec![n(1), n(2)]);
    assert_eq!(way.tags.get("highway").map(String::as_str), Some("service"));
}

#[test]
fn test_entity_updates_bump_version() {
    let node = Entity::node(n(1), [0.0, 0.0]);
    let moved = node.update_loc([1.0, 1.0]);

    assert_eq!(node.key(), "n1v0");
    assert_eq!(moved.key(), "n1v1");
    assert!(!node.same_content(&moved));
    assert!(node.same_content(&node.touch()));
}

#[test]
fn test_interesting_tags() {
    let sourced = Entity::new(n(1)).with_tags([("source", "survey"), ("source:name", "sign")]);
    assert!(!sourced.has_interesting_tags());

    let cafe = Entity::new(n(1)).with_tags([("amenity", "cafe")]);
    assert!(cafe.has_interesting_tags());
}

#[test]
fn test_id_allocator() {
    let mut ids = IdAllocator::new();
    assert_eq!(ids.next(EntityKind::Node), n(-1));
    assert_eq!(ids.next(EntityKind::Node), n(-2));
    assert_eq!(ids.peek(EntityKind::Node), n(-3));
    assert_eq!(ids.peek(EntityKind::Way), w(-1));
}

#[test]
fn test_graph_replace_is_persistent() {
    let graph = create_test_graph();
    let edited = graph.replace(Entity::node(n(-1), [9.0, 9.0]));

    assert!(!graph.has_entity(&n(-1)));
    assert!(edited.has_entity(&n(-1)));
    assert_eq!(edited.local_count(), 1);
    assert!(Arc::ptr_eq(graph.base(), edited.base()));
}

#[test]
fn test_graph_noop_edits_share_state() {
    let graph = create_test_graph();

    let same = graph.replace(graph.entity(&n(1)).unwrap());
    assert!(same.shares_state(&graph));

    let unknown = graph.remove(&n(99));
    assert!(unknown.shares_state(&graph));

    let untouched = graph.revert(&n(1));
    assert!(untouched.shares_state(&graph));
}

#[test]
fn test_graph_remove_and_revert() {
    let graph = create_test_graph();
    let removed = graph.remove(&n(4));

    assert!(!removed.has_entity(&n(4)));
    assert!(removed.is_locally_deleted(&n(4)));
    assert!(graph.has_entity(&n(4)));

    let restored = removed.revert(&n(4));
    assert_eq!(restored.entity(&n(4)), graph.entity(&n(4)));
    assert_eq!(restored.local_count(), 0);
}

#[test]
fn test_graph_parent_queries() {
    let graph = create_test_graph();

    assert_eq!(ids(&graph.parent_ways(&n(2))), vec![w(1)]);
    assert_eq!(ids(&graph.parent_ways(&n(3))), vec![w(1), w(2)]);
    assert_eq!(ids(&graph.parent_relations(&w(1))), vec![r(1)]);
    assert!(graph.is_vertex(&n(2)));
    assert!(graph.is_poi(&n(4)));

    // Local override of a base way drops its old references.
    let way = graph.entity(&w(1)).unwrap();
    let shortened = graph.replace(way.update_refs(vec![n(1), n(3)]));
    assert!(shortened.parent_ways(&n(2)).is_empty());
    assert!(shortened.is_poi(&n(2)));

    // A locally created way picks up its children.
    let joined = graph.replace(Entity::way(w(-1), [n(4), n(5)]));
    assert!(joined.is_vertex(&n(4)));
    assert_eq!(ids(&joined.parent_ways(&n(5))), vec![w(-1), w(2)]);

    // And forgets them again once removed.
    let dropped = joined.remove(&w(-1));
    assert!(dropped.is_poi(&n(4)));
}

#[test]
fn test_graph_child_nodes() {
    let graph = create_test_graph();
    assert_eq!(ids(&graph.child_nodes(&w(1))), vec![n(1), n(2), n(3)]);
    assert!(graph.child_nodes(&n(1)).is_empty());
}

#[test]
fn test_base_rebase_is_shared() {
    let graph = create_test_graph();
    let edited = graph.replace(Entity::node(n(-1), [0.0, 0.0]));

    let merged = graph.base().rebase(vec![Arc::new(Entity::node(n(10), [7.0, 7.0]))], false);
    assert_eq!(merged, vec![n(10)]);
    assert!(edited.has_entity(&n(10)));
    assert!(graph.has_entity(&n(10)));

    let existing = Arc::new(Entity::node(n(1), [8.0, 8.0]));
    assert!(graph.base().rebase(vec![Arc::clone(&existing)], false).is_empty());
    assert_eq!(graph.entity(&n(1)).unwrap().loc, Some([0.0, 0.0]));

    assert_eq!(graph.base().rebase(vec![existing], true), vec![n(1)]);
    assert_eq!(graph.entity(&n(1)).unwrap().loc, Some([8.0, 8.0]));
}

#[test]
fn test_graph_load_replaces_overlay() {
    let graph = create_test_graph().replace(Entity::node(n(-5), [0.0, 0.0]));
    let loaded = graph.load(vec![
        (n(-1), Some(Arc::new(Entity::node(n(-1), [1.0, 1.0])))),
        (n(4), None),
    ]);

    assert!(!loaded.has_entity(&n(-5)));
    assert!(loaded.has_entity(&n(-1)));
    assert!(loaded.is_locally_deleted(&n(4)));
}

#[test]
fn test_difference_empty_for_same_graph() {
    let graph = create_test_graph();
    assert!(Difference::between(&graph, &graph).is_empty());
    assert!(Difference::empty(&graph).is_empty());
}

#[test]
fn test_difference_classifies_changes() {
    let before = create_test_graph();
    let node = before.entity(&n(1)).unwrap();
    let after = before
        .replace(node.update_loc([0.5, 0.5]))
        .replace(Entity::node(n(-1), [3.0, 3.0]))
        .remove(&n(4));

    let diff = Difference::between(&before, &after);
    assert_eq!(diff.keys().copied().collect::<Vec<_>>(), vec![n(-1), n(1), n(4)]);
    assert_eq!(ids(&diff.created()), vec![n(-1)]);
    assert_eq!(ids(&diff.modified()), vec![n(1)]);
    assert_eq!(ids(&diff.deleted()), vec![n(4)]);
    assert_eq!(diff.get(&n(4)).map(Change::change_type), Some(ChangeType::Deleted));
}

#[test]
fn test_difference_ignores_version_only_changes() {
    let before = create_test_graph();
    let touched = before.replace(before.entity(&n(1)).unwrap().touch());

    assert_eq!(touched.local_count(), 1);
    assert!(Difference::between(&before, &touched).is_empty());
}

#[test]
fn test_difference_skips_created_then_deleted() {
    let before = create_test_graph();
    let after = before.replace(Entity::node(n(-1), [0.0, 0.0])).remove(&n(-1));
    assert!(Difference::between(&before, &after).is_empty());
}

#[test]
fn test_difference_did_change_flags() {
    let before = create_test_graph();
    assert_eq!(Difference::between(&before, &before).did_change(), DidChange::default());

    let moved = before.replace(before.entity(&n(5)).unwrap().update_loc([4.0, 4.0]));
    let flags = Difference::between(&before, &moved).did_change();
    assert!(flags.geometry);
    assert!(!flags.properties && !flags.addition && !flags.deletion);

    let way = before.entity(&w(2)).unwrap();
    let retagged = before.replace(way.update_tags(Tags::from([("highway".to_string(), "path".to_string())])));
    let flags = Difference::between(&before, &retagged).did_change();
    assert!(flags.properties);
    assert!(!flags.geometry);

    let regrouped = before.replace(before.entity(&r(1)).unwrap().update_refs(vec![w(1), w(2)]));
    let flags = Difference::between(&before, &regrouped).did_change();
    assert!(flags.geometry && flags.properties);

    let added_and_removed = before.replace(Entity::node(n(-1), [1.0, 1.0])).remove(&n(4));
    let flags = Difference::between(&before, &added_and_removed).did_change();
    assert!(flags.addition && flags.deletion);
    assert!(!flags.geometry && !flags.properties);
}

#[test]
fn test_difference_across_bases() {
    let before = Graph::with_entities(vec![Entity::node(n(1), [0.0, 0.0])]);
    let after = Graph::new();

    let diff = Difference::between(&before, &after);
    assert_eq!(ids(&diff.deleted()), vec![n(1)]);
}

#[test]
fn test_difference_complete_walks_hierarchy() {
    let before = create_test_graph();

    let moved = before.replace(before.entity(&n(2)).unwrap().update_loc([1.0, 1.0]));
    let complete = Difference::between(&before, &moved).complete();
    assert_eq!(complete.keys().copied().collect::<Vec<_>>(), vec![n(2), w(1), r(1)]);

    let way = before.entity(&w(1)).unwrap();
    let retagged = before.replace(way.update_tags(Tags::from([("highway".to_string(), "service".to_string())])));
    let complete = Difference::between(&before, &retagged).complete();
    assert_eq!(
        complete.keys().copied().collect::<Vec<_>>(),
        vec![n(1), n(2), n(3), w(1), r(1)]
    );
}

#[test]
fn test_difference_summary_folds_vertices() {
    let before = create_test_graph();

    let moved = before.replace(before.entity(&n(2)).unwrap().update_loc([1.0, 1.0]));
    let summary = Difference::between(&before, &moved).summary();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[&w(1)].change_type, ChangeType::Modified);

    let poi = before.replace(before.entity(&n(4)).unwrap().update_loc([6.0, 6.0]));
    let summary = Difference::between(&before, &poi).summary();
    assert_eq!(summary[&n(4)].change_type, ChangeType::Modified);

    let drawn = before
        .replace(Entity::node(n(-1), [0.0, 1.0]))
        .replace(Entity::node(n(-2), [1.0, 1.0]))
        .replace(Entity::way(w(-1), [n(-1), n(-2)]));
    let summary = Difference::between(&before, &drawn).summary();
    assert_eq!(summary.keys().copied().collect::<Vec<_>>(), vec![w(-1)]);
    assert_eq!(summary[&w(-1)].change_type, ChangeType::Created);
}

#[test]
fn test_delete_node_shortens_way() {
    let graph = DeleteNode(n(2)).apply(&create_test_graph());

    assert!(!graph.has_entity(&n(2)));
    assert_eq!(graph.entity(&w(1)).unwrap().refs, vec![n(1), n(3)]);
}

#[test]
fn test_delete_node_removes_degenerate_way() {
    let graph = DeleteNode(n(5)).apply(&create_test_graph());

    assert!(!graph.has_entity(&n(5)));
    assert!(!graph.has_entity(&w(2)));
    assert!(graph.has_entity(&n(3)));
}

#[test]
fn test_delete_way_cleans_up() {
    let graph = DeleteWay(w(1)).apply(&create_test_graph());

    assert!(!graph.has_entity(&w(1)));
    assert!(!graph.has_entity(&r(1)));
    assert!(!graph.has_entity(&n(1)));
    assert!(!graph.has_entity(&n(2)));
    // Still part of w2
    assert!(graph.has_entity(&n(3)));
}

#[test]
fn test_change_tags_and_revert() {
    let graph = create_test_graph();
    let tagged = ChangeTags::new(n(4), [("amenity", "pub")]).apply(&graph);
    assert_eq!(tagged.entity(&n(4)).unwrap().tags["amenity"], "pub");

    let reverted = RevertEntity(n(4)).apply(&tagged);
    assert_eq!(reverted.entity(&n(4)).unwrap().tags["amenity"], "cafe");

    let missing = ChangeTags::new(n(99), [("amenity", "pub")]).apply(&graph);
    assert!(missing.shares_state(&graph));
}

#[test]
fn test_move_node_interpolates() {
    let graph = create_test_graph();
    let action = MoveNode { id: n(1), to: [2.0, 4.0] };

    assert!(action.transitionable());
    assert_eq!(action.apply_at(&graph, 0.5).entity(&n(1)).unwrap().loc, Some([1.0, 2.0]));
    assert_eq!(action.apply(&graph).entity(&n(1)).unwrap().loc, Some([2.0, 4.0]));
}

#[test]
fn test_closures_are_actions() {
    let graph = create_test_graph();

    let remove = |g: &Graph| g.remove(&n(4));
    assert!(!remove.transitionable());
    assert!(!remove.apply(&graph).has_entity(&n(4)));

    let fade = Transition(|g: &Graph, t: f64| {
        let node = g.entity(&n(4)).unwrap();
        g.replace(node.update_loc([t, t]))
    });
    assert!(fade.transitionable());
    assert_eq!(fade.apply_at(&graph, 2.0).entity(&n(4)).unwrap().loc, Some([1.0, 1.0]));

    assert!(Noop.apply(&graph).shares_state(&graph));
}
