//! Graph-transforming actions

use crate::graph::Graph;

/// A pure transformation from one graph to the next.
///
/// Applying an action twice to the same graph must give the same result, since
/// staging may be re-derived by replaying.
pub trait Action: Send + Sync {
    fn apply(&self, graph: &Graph) -> Graph;

    /// Whether the action can be eased in over several frames.
    fn transitionable(&self) -> bool {
        false
    }

    /// Apply the action at progress `t` in `[0, 1]`. Only `t = 1` is final.
    fn apply_at(&self, graph: &Graph, t: f64) -> Graph {
        let _ = t;
        self.apply(graph)
    }
}

impl<F> Action for F
where
    F: Fn(&Graph) -> Graph + Send + Sync,
{
    fn apply(&self, graph: &Graph) -> Graph {
        self(graph)
    }
}

/// Wraps a closure of `(graph, t)` as a transitionable action.
pub struct Transition<F>(pub F);

impl<F> Action for Transition<F>
where
    F: Fn(&Graph, f64) -> Graph + Send + Sync,
{
    fn apply(&self, graph: &Graph) -> Graph {
        (self.0)(graph, 1.0)
    }

    fn transitionable(&self) -> bool {
        true
    }

    fn apply_at(&self, graph: &Graph, t: f64) -> Graph {
        (self.0)(graph, t.clamp(0.0, 1.0))
    }
}
