//! Change notifications broadcast by the edit manager

use mapedit_core::{Difference, EntityId};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum EditEvent {
    /// Entities merged into the shared base layer.
    Merge(BTreeSet<EntityId>),
    /// Staging moved; carries the difference from the previous staging graph.
    StagingChange(Arc<Difference>),
    /// Stable moved; carries the difference from the previous stable graph.
    StableChange(Arc<Difference>),
    /// The history cursor moved through undo, redo, a checkpoint or a reset.
    HistoryJump { previous: usize, current: usize },
    BackupStatusChange(bool),
}
