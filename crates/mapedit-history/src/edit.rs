//! Edits: graph snapshots plus the metadata recorded when they were committed

use mapedit_core::{EntityId, Graph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Imagery source that is never reported as used.
pub const CUSTOM_IMAGERY: &str = "Custom";

/// Viewport position and zoom at the time of an edit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub x: f64,
    pub y: f64,
    pub k: f64,
    /// Rotation in radians.
    #[serde(default)]
    pub r: f64,
}

/// External sources that contributed to an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesUsed {
    #[serde(default)]
    pub imagery: BTreeSet<String>,
    #[serde(default)]
    pub photos: BTreeSet<String>,
}

impl SourcesUsed {
    pub fn is_empty(&self) -> bool {
        self.imagery.is_empty() && self.photos.is_empty()
    }

    /// Fold `other` into `self`, dropping the custom imagery placeholder.
    pub fn extend(&mut self, other: &SourcesUsed) {
        self.imagery.extend(
            other
                .imagery
                .iter()
                .filter(|source| source.as_str() != CUSTOM_IMAGERY)
                .cloned(),
        );
        self.photos.extend(other.photos.iter().cloned());
    }
}

/// One immutable entry of the edit history.
#[derive(Debug, Clone, Default)]
pub struct Edit {
    pub graph: Graph,
    pub annotation: Option<String>,
    pub selected_ids: BTreeSet<EntityId>,
    pub transform: Option<ViewTransform>,
    pub sources: SourcesUsed,
}

impl Edit {
    /// A bare edit over `graph`, carrying no metadata.
    pub fn new(graph: Graph) -> Self {
        Edit {
            graph,
            ..Default::default()
        }
    }

    /// Build an edit from a graph and the metadata supplied to a commit.
    pub fn committed(graph: Graph, options: CommitOptions, sources: SourcesUsed) -> Self {
        Edit {
            graph,
            annotation: options.annotation,
            selected_ids: options.selected_ids,
            transform: options.transform,
            sources,
        }
    }

    /// A copy of this edit with a different graph.
    pub fn with_graph(&self, graph: Graph) -> Self {
        Edit {
            graph,
            ..self.clone()
        }
    }
}

/// Metadata supplied to `commit` and `commit_append`.
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    pub annotation: Option<String>,
    pub selected_ids: BTreeSet<EntityId>,
    pub transform: Option<ViewTransform>,
    /// Falls back to the sources set on the manager when `None`.
    pub sources: Option<SourcesUsed>,
}

impl CommitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    pub fn selected(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.selected_ids = ids.into_iter().collect();
        self
    }

    pub fn transform(mut self, transform: ViewTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn sources(mut self, sources: SourcesUsed) -> Self {
        self.sources = Some(sources);
        self
    }
}
