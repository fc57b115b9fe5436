//! Test utilities for Mapedit

use crate::*;

pub fn n(number: i64) -> EntityId {
    EntityId::node(number)
}

pub fn w(number: i64) -> EntityId {
    EntityId::way(number)
}

pub fn r(number: i64) -> EntityId {
    EntityId::relation(number)
}

/// A small street network loaded into a fresh base layer:
///
/// - `w1` residential street over `n1`, `n2`, `n3`
/// - `w2` footway over `n3`, `n5`
/// - `n4` a tagged cafe (a POI)
/// - `r1` a route relation containing `w1`
pub fn create_test_graph() -> Graph {
    Graph::with_entities(vec![
        Entity::node(n(1), [0.0, 0.0]),
        Entity::node(n(2), [1.0, 0.0]),
        Entity::node(n(3), [2.0, 0.0]),
        Entity::node(n(4), [5.0, 5.0]).with_tags([("amenity", "cafe")]),
        Entity::node(n(5), [3.0, 1.0]),
        Entity::way(w(1), [n(1), n(2), n(3)]).with_tags([("highway", "residential")]),
        Entity::way(w(2), [n(3), n(5)]).with_tags([("highway", "footway")]),
        Entity::relation(r(1), [w(1)]).with_tags([("type", "route")]),
    ])
}
