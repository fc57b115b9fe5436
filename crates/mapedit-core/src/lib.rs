//! Mapedit Core — entity model, persistent graph, difference engine and actions

pub mod model;
pub mod graph;
pub mod difference;
pub mod action;
pub mod actions;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use model::{EntityId, EntityKind, Entity, Tags, IdAllocator, ParseIdError};
pub use graph::{Graph, BaseLayer};
pub use difference::{Difference, Change, ChangeType, DidChange, SummaryItem};
pub use action::{Action, Transition};
pub use actions::{Noop, AddEntity, ChangeTags, MoveNode, DeleteNode, DeleteWay, RevertEntity};
