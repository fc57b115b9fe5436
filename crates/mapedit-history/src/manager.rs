//! The edit manager: history stack, staging, transactions and checkpoints

use crate::config::EditConfig;
use crate::edit::{CommitOptions, Edit, SourcesUsed};
use crate::error::{EditError, Result};
use crate::events::EditEvent;
use mapedit_core::{Action, Difference, Entity, EntityId, EntityKind, Graph, IdAllocator};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Changes between base and stable, split by kind of change.
#[derive(Debug, Clone, Default)]
pub struct Changes {
    pub created: Vec<Arc<Entity>>,
    pub modified: Vec<Arc<Entity>>,
    /// Original values, as they were in the base graph.
    pub deleted: Vec<Arc<Entity>>,
}

impl From<&Difference> for Changes {
    fn from(diff: &Difference) -> Self {
        Changes {
            created: diff.created(),
            modified: diff.modified(),
            deleted: diff.deleted(),
        }
    }
}

/// Notifications held back while a transaction is open.
struct Transaction {
    staging_start: Graph,
    stable_start: Graph,
    stable_changed: bool,
    jumped_from: Option<usize>,
    merged: BTreeSet<EntityId>,
    backup_status: Option<bool>,
}

impl Transaction {
    fn open(staging: &Graph, stable: &Graph) -> Self {
        Transaction {
            staging_start: staging.clone(),
            stable_start: stable.clone(),
            stable_changed: false,
            jumped_from: None,
            merged: BTreeSet::new(),
            backup_status: None,
        }
    }
}

/// Owns the edit history of one editing session.
///
/// `history[0]` is the base edit and `history[index]` the stable edit.
/// Staging is stable plus whatever has been performed since the last commit.
pub struct EditManager {
    pub(crate) config: EditConfig,
    pub(crate) history: Vec<Arc<Edit>>,
    pub(crate) index: usize,
    pub(crate) staging: Arc<Edit>,
    pub(crate) work_in_progress: bool,
    pub(crate) checkpoints: HashMap<String, usize>,
    transaction: Option<Transaction>,
    pub(crate) ids: IdAllocator,
    sources: SourcesUsed,
    events: broadcast::Sender<EditEvent>,
    pub(crate) has_restorable_changes: bool,
}

impl std::fmt::Debug for EditManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditManager")
            .field("history_len", &self.history.len())
            .field("index", &self.index)
            .field("work_in_progress", &self.work_in_progress)
            .field("in_transaction", &self.transaction.is_some())
            .finish()
    }
}

impl Default for EditManager {
    fn default() -> Self {
        Self::new(EditConfig::default())
    }
}

impl EditManager {
    pub fn new(config: EditConfig) -> Self {
        Self::with_base(config, Graph::new())
    }

    /// Start a session whose base edit holds `graph`.
    pub fn with_base(config: EditConfig, graph: Graph) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let base = Arc::new(Edit::new(graph));
        EditManager {
            config,
            staging: Arc::new(Edit::new(base.graph.clone())),
            history: vec![base],
            index: 0,
            work_in_progress: false,
            checkpoints: HashMap::new(),
            transaction: None,
            ids: IdAllocator::new(),
            sources: SourcesUsed::default(),
            events,
            has_restorable_changes: false,
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EditEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    pub fn base(&self) -> &Arc<Edit> {
        &self.history[0]
    }

    pub fn stable(&self) -> &Arc<Edit> {
        &self.history[self.index]
    }

    pub fn staging(&self) -> &Arc<Edit> {
        &self.staging
    }

    /// The graph callers should read and render: the staging graph.
    pub fn graph(&self) -> &Graph {
        &self.staging.graph
    }

    pub fn history(&self) -> &[Arc<Edit>] {
        &self.history
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// True once anything has been performed since the last commit or revert.
    pub fn has_work_in_progress(&self) -> bool {
        self.work_in_progress
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn ids(&self) -> IdAllocator {
        self.ids
    }

    /// Allocate a provisional ID for a new entity.
    pub fn new_id(&mut self, kind: EntityKind) -> EntityId {
        self.ids.next(kind)
    }

    /// Merge freshly loaded entities into the shared base layer.
    ///
    /// Entities already in the base are left alone, except that base relations
    /// named in `seen_ids` get their version bumped when one of their members
    /// is newly loaded. When a newly merged way references a node that some
    /// edit had deleted locally, that tombstone is dropped in every history
    /// graph and in staging.
    pub fn merge<I>(&mut self, entities: I, seen_ids: Option<BTreeSet<EntityId>>)
    where
        I: IntoIterator<Item = Entity>,
    {
        let entities: Vec<Arc<Entity>> = entities.into_iter().map(Arc::new).collect();
        let seen = seen_ids.unwrap_or_else(|| entities.iter().map(|e| e.id).collect());
        let layer = Arc::clone(self.base().graph.base());

        let fresh: BTreeSet<EntityId> = entities
            .iter()
            .map(|e| e.id)
            .filter(|id| !layer.contains(id))
            .collect();
        let touched: Vec<Arc<Entity>> = seen
            .iter()
            .filter(|id| id.kind == EntityKind::Relation)
            .filter_map(|id| layer.entity(id))
            .filter(|relation| relation.refs.iter().any(|member| fresh.contains(member)))
            .map(|relation| Arc::new(relation.touch()))
            .collect();

        let merged: BTreeSet<EntityId> = layer.rebase(entities.iter().cloned(), false).into_iter().collect();
        if !touched.is_empty() {
            debug!("Bumped {} relations with new members", touched.len());
            layer.rebase(touched, true);
        }

        let children: BTreeSet<EntityId> = entities
            .iter()
            .filter(|e| e.kind() == EntityKind::Way && merged.contains(&e.id))
            .flat_map(|way| way.refs.iter().copied())
            .collect();
        self.restore_tombstones(&children);

        debug!("Merged {} of {} entities into base", merged.len(), entities.len());

        match &mut self.transaction {
            Some(tx) => tx.merged.extend(seen),
            None => self.emit(EditEvent::Merge(seen)),
        }
    }

    /// Fold `actions` over staging. History is not touched.
    pub fn perform(&mut self, actions: &[&dyn Action]) -> Arc<Difference> {
        if actions.is_empty() {
            return Arc::new(Difference::empty(&self.staging.graph));
        }

        let graph = actions
            .iter()
            .fold(self.staging.graph.clone(), |graph, action| action.apply(&graph));
        self.stage(graph)
    }

    /// Like `perform`, but a single transitionable action is eased in over
    /// the configured duration, updating staging once per frame.
    ///
    /// Returns the difference from staging before the call to the final step.
    pub async fn perform_async(&mut self, actions: &[&dyn Action]) -> Result<Arc<Difference>> {
        let action = match actions {
            [] => return Err(EditError::MissingAction),
            [action] if action.transitionable() => *action,
            _ => return Ok(self.perform(actions)),
        };

        let start = self.staging.graph.clone();
        let duration = self.config.transition_duration();
        let frame = self.config.frame_interval();
        let started = tokio::time::Instant::now();

        self.stage(action.apply_at(&start, 0.0));
        loop {
            tokio::time::sleep(frame).await;
            let elapsed = started.elapsed();
            if elapsed >= duration {
                break;
            }
            let t = elapsed.as_secs_f64() / duration.as_secs_f64();
            self.stage(action.apply_at(&start, t));
        }
        self.stage(action.apply_at(&start, 1.0));

        Ok(Arc::new(Difference::between(&start, &self.staging.graph)))
    }

    /// Throw away everything performed since the last commit. Silent when
    /// staging already matches stable.
    pub fn revert(&mut self) {
        if !self.work_in_progress {
            return;
        }
        let before = self.staging.graph.clone();
        let unchanged = Difference::between(&self.stable().graph, &before).is_empty();
        self.reset_staging();
        if unchanged {
            return;
        }
        debug!("Reverted staging to edit {}", self.index);
        self.staging_changed(&before);
    }

    /// Append staging to the history as a new stable edit, discarding any
    /// edits past the cursor.
    pub fn commit(&mut self, options: CommitOptions) {
        let staging_before = self.staging.graph.clone();
        let stable_before = self.stable().graph.clone();

        let edit = self.committed_edit(options);
        self.history.truncate(self.index + 1);
        self.history.push(Arc::new(edit));
        self.index += 1;
        self.reset_staging();

        info!(
            "Committed edit {}: {}",
            self.index,
            self.stable().annotation.as_deref().unwrap_or("(no annotation)")
        );
        self.staging_changed(&staging_before);
        self.stable_changed(&stable_before);
    }

    /// Fold staging into the current stable edit instead of adding a new one.
    pub fn commit_append(&mut self, options: CommitOptions) -> Result<()> {
        if self.index == 0 {
            return Err(EditError::CommitAppendToBase);
        }

        let staging_before = self.staging.graph.clone();
        let stable_before = self.stable().graph.clone();

        let edit = self.committed_edit(options);
        self.history[self.index] = Arc::new(edit);
        self.reset_staging();

        debug!("Appended staging to edit {}", self.index);
        self.staging_changed(&staging_before);
        self.stable_changed(&stable_before);
        Ok(())
    }

    /// Step the cursor back one edit. Does nothing at the base edit.
    pub fn undo(&mut self) {
        if self.index == 0 {
            return;
        }
        self.jump_to(self.index - 1);
    }

    /// Step the cursor forward one edit. Does nothing at the newest edit.
    pub fn redo(&mut self) {
        if self.index + 1 >= self.history.len() {
            return;
        }
        self.jump_to(self.index + 1);
    }

    /// Annotation of the edit `undo` would take back.
    pub fn get_undo_annotation(&self) -> Option<&str> {
        self.history[..=self.index]
            .iter()
            .rev()
            .find_map(|edit| edit.annotation.as_deref())
    }

    /// Annotation of the edit `redo` would bring back.
    pub fn get_redo_annotation(&self) -> Option<&str> {
        self.history[self.index + 1..]
            .iter()
            .find_map(|edit| edit.annotation.as_deref())
    }

    /// Annotations of every edit up to the cursor, oldest first.
    pub fn annotations(&self) -> Vec<&str> {
        self.history[1..=self.index]
            .iter()
            .filter_map(|edit| edit.annotation.as_deref())
            .collect()
    }

    /// Sources to record on the next commit that does not name its own.
    pub fn set_sources_used(&mut self, sources: SourcesUsed) {
        self.sources = sources;
    }

    /// Every source recorded on the edits up to the cursor.
    pub fn sources_used(&self) -> SourcesUsed {
        let mut used = SourcesUsed::default();
        for edit in &self.history[1..=self.index] {
            used.extend(&edit.sources);
        }
        used
    }

    /// Remember the current cursor position under `key`.
    pub fn set_checkpoint(&mut self, key: impl Into<String>) {
        let key = key.into();
        debug!("Checkpoint {} set at edit {}", key, self.index);
        self.checkpoints.insert(key, self.index);
    }

    /// Return to a checkpoint, dropping every edit after it. Unknown keys are
    /// ignored.
    pub fn restore_checkpoint(&mut self, key: &str) {
        let Some(&target) = self.checkpoints.get(key) else {
            debug!("No checkpoint {}", key);
            return;
        };
        if target >= self.history.len() {
            warn!("Checkpoint {} points past the end of history, ignoring", key);
            return;
        }

        self.history.truncate(target + 1);
        info!("Restored checkpoint {} at edit {}", key, target);
        self.jump_to(target);
    }

    /// Start buffering notifications. Nested calls are ignored.
    pub fn begin_transaction(&mut self) {
        if self.transaction.is_some() {
            return;
        }
        self.transaction = Some(Transaction::open(&self.staging.graph, &self.stable().graph));
    }

    /// Emit the notifications buffered since `begin_transaction`, collapsed
    /// into one of each kind.
    pub fn end_transaction(&mut self) {
        let Some(tx) = self.transaction.take() else {
            return;
        };

        if !tx.merged.is_empty() {
            self.emit(EditEvent::Merge(tx.merged));
        }
        self.staging_changed(&tx.staging_start);
        if tx.stable_changed {
            self.stable_changed(&tx.stable_start);
        }
        if let Some(previous) = tx.jumped_from {
            self.history_jumped(previous, self.index);
        }
        if let Some(ok) = tx.backup_status {
            self.backup_status_changed(ok);
        }
    }

    /// Base to stable.
    pub fn difference(&self) -> Difference {
        Difference::between(&self.base().graph, &self.stable().graph)
    }

    pub fn has_changes(&self) -> bool {
        !self.difference().is_empty()
    }

    pub fn changes(&self) -> Changes {
        Changes::from(&self.difference())
    }

    /// What `changes()` would report if `action` were applied on top of
    /// stable. Nothing is performed.
    pub fn changes_with(&self, action: &dyn Action) -> Changes {
        let head = action.apply(&self.stable().graph);
        Changes::from(&Difference::between(&self.base().graph, &head))
    }

    /// Drop all history and start over from an empty base.
    pub fn reset(&mut self) {
        let previous = self.index;
        let staging_before = self.staging.graph.clone();
        let stable_before = self.stable().graph.clone();

        if let Some(tx) = self.transaction.take() {
            warn!("Reset inside an open transaction, closing it");
            if !tx.merged.is_empty() {
                self.emit(EditEvent::Merge(tx.merged));
            }
        }
        self.history = vec![Arc::new(Edit::new(Graph::new()))];
        self.index = 0;
        self.checkpoints.clear();
        self.ids = IdAllocator::new();
        self.sources = SourcesUsed::default();
        self.has_restorable_changes = false;
        self.reset_staging();

        info!("Edit history reset");
        self.staging_changed(&staging_before);
        self.stable_changed(&stable_before);
        self.history_jumped(previous, 0);
        self.backup_status_changed(true);
    }

    pub async fn reset_async(&mut self) {
        self.reset();
        tokio::task::yield_now().await;
    }

    // ── Internals ─────────────────────────────────────────────────────

    pub(crate) fn emit(&self, event: EditEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Replace the staging graph and notify. Returns the staging difference.
    fn stage(&mut self, graph: Graph) -> Arc<Difference> {
        let before = self.staging.graph.clone();
        self.staging = Arc::new(self.staging.with_graph(graph));
        self.work_in_progress = true;

        let diff = Arc::new(Difference::between(&before, &self.staging.graph));
        if self.transaction.is_none() {
            self.emit(EditEvent::StagingChange(Arc::clone(&diff)));
        }
        diff
    }

    /// Staging becomes a fresh copy of stable.
    pub(crate) fn reset_staging(&mut self) {
        self.staging = Arc::new(Edit::new(self.stable().graph.clone()));
        self.work_in_progress = false;
    }

    fn committed_edit(&self, options: CommitOptions) -> Edit {
        let sources = options.sources.clone().unwrap_or_else(|| self.sources.clone());
        Edit::committed(self.staging.graph.clone(), options, sources)
    }

    fn jump_to(&mut self, target: usize) {
        let previous = self.index;
        let staging_before = self.staging.graph.clone();
        let stable_before = self.stable().graph.clone();

        self.index = target;
        self.reset_staging();

        debug!("History jump {} -> {}", previous, target);
        self.staging_changed(&staging_before);
        self.stable_changed(&stable_before);
        self.history_jumped(previous, target);
    }

    fn restore_tombstones(&mut self, ids: &BTreeSet<EntityId>) {
        if ids.is_empty() {
            return;
        }
        for edit in &mut self.history {
            if let Some(graph) = revert_tombstones(&edit.graph, ids) {
                *edit = Arc::new(edit.with_graph(graph));
            }
        }
        if let Some(graph) = revert_tombstones(&self.staging.graph, ids) {
            self.staging = Arc::new(self.staging.with_graph(graph));
        }
    }

    pub(crate) fn staging_changed(&mut self, before: &Graph) {
        if self.transaction.is_some() {
            return;
        }
        let diff = Difference::between(before, &self.staging.graph);
        self.emit(EditEvent::StagingChange(Arc::new(diff)));
    }

    pub(crate) fn stable_changed(&mut self, before: &Graph) {
        if let Some(tx) = &mut self.transaction {
            tx.stable_changed = true;
            return;
        }
        let diff = Difference::between(before, &self.stable().graph);
        self.emit(EditEvent::StableChange(Arc::new(diff)));
    }

    pub(crate) fn history_jumped(&mut self, previous: usize, current: usize) {
        if let Some(tx) = &mut self.transaction {
            tx.jumped_from.get_or_insert(previous);
            return;
        }
        self.emit(EditEvent::HistoryJump { previous, current });
    }

    pub(crate) fn backup_status_changed(&mut self, ok: bool) {
        if let Some(tx) = &mut self.transaction {
            tx.backup_status = Some(ok);
            return;
        }
        self.emit(EditEvent::BackupStatusChange(ok));
    }
}

/// `graph` with the local tombstones of `ids` dropped, or `None` if it has none.
fn revert_tombstones(graph: &Graph, ids: &BTreeSet<EntityId>) -> Option<Graph> {
    let deleted: Vec<&EntityId> = ids.iter().filter(|id| graph.is_locally_deleted(id)).collect();
    if deleted.is_empty() {
        return None;
    }
    Some(deleted.into_iter().fold(graph.clone(), |graph, id| graph.revert(id)))
}
