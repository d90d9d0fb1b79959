//! Authoritative in-memory task collection.
//!
//! Toggle and edit are applied locally before the API confirms them and are
//! reverted if it refuses; create and remove only touch the collection once
//! the API has answered. The collection lock is only ever taken for
//! synchronous reads and writes, never across a request, so independent
//! mutations interleave freely. Each mutation keeps its own undo value on its
//! own stack frame.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use taskflow_shared::TaskPatch;
use tokio::sync::{Mutex as LaneMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::api::TodoApi;
use crate::error::{ApiError, SyncError, SyncResult};
use crate::session::SessionContext;
use crate::stats::TaskStats;
use crate::task::{Task, TaskId, new_task_payload, normalize_description, validate_title};

pub const LOAD_FAILED: &str = "Failed to load todos";
pub const CREATE_FAILED: &str = "Failed to create todo";
pub const UPDATE_FAILED: &str = "Failed to update todo";
pub const DELETE_FAILED: &str = "Failed to delete todo";

#[derive(Debug, Default)]
struct RepoState {
    tasks: Vec<Task>,
    last_error: Option<String>,
}

/// Per-id FIFO lanes. Requests for one id queue behind each other; other
/// ids are unaffected.
#[derive(Debug, Default)]
struct IdLanes {
    lanes: Mutex<HashMap<TaskId, Arc<LaneMutex<()>>>>,
}

impl IdLanes {
    async fn enter(&self, id: TaskId) -> OwnedMutexGuard<()> {
        let lane = self.lanes.lock().entry(id).or_default().clone();
        lane.lock_owned().await
    }

    fn forget(&self, id: TaskId) {
        let mut lanes = self.lanes.lock();
        // only drop the lane when nobody else holds or waits on it
        if lanes.get(&id).is_some_and(|lane| Arc::strong_count(lane) == 1) {
            lanes.remove(&id);
        }
    }
}

pub struct TaskRepository {
    api: Arc<dyn TodoApi>,
    session: SessionContext,
    state: Mutex<RepoState>,
    lanes: Option<IdLanes>,
}

impl TaskRepository {
    pub fn new(api: Arc<dyn TodoApi>, session: SessionContext) -> Self {
        Self {
            api,
            session,
            state: Mutex::new(RepoState::default()),
            lanes: None,
        }
    }

    /// Sends mutations for the same id one at a time, in issue order.
    pub fn serialize_per_id(mut self, enabled: bool) -> Self {
        self.lanes = enabled.then(IdLanes::default);
        self
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    /// Runs `f` against the current collection without cloning it.
    pub fn with_tasks<R>(&self, f: impl FnOnce(&[Task]) -> R) -> R {
        f(&self.state.lock().tasks)
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.state.lock().tasks.iter().find(|task| task.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().tasks.is_empty()
    }

    pub fn stats(&self) -> TaskStats {
        self.with_tasks(TaskStats::from_tasks)
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn dismiss_error(&self) {
        self.state.lock().last_error = None;
    }

    /// Replaces the collection with the server's list. On failure the
    /// collection is left empty.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> SyncResult<usize> {
        match self.api.list_tasks().await {
            Ok(tasks) => {
                let tasks = dedupe_by_id(tasks);
                let count = tasks.len();
                self.state.lock().tasks = tasks;
                info!(count, "hydrated task collection");
                Ok(count)
            }
            Err(err) => {
                self.state.lock().tasks.clear();
                Err(self.record_failure(err, LOAD_FAILED))
            }
        }
    }

    /// Validates locally, then inserts the server's record at the front once
    /// it is confirmed. Nothing is inserted on failure.
    #[instrument(skip(self, title, description))]
    pub async fn create(&self, title: &str, description: Option<&str>) -> SyncResult<Task> {
        let payload = new_task_payload(title, description)?;

        match self.api.create_task(&payload).await {
            Ok(task) => {
                let mut state = self.state.lock();
                state.tasks.retain(|existing| existing.id != task.id);
                state.tasks.insert(0, task.clone());
                info!(id = %task.id, "created task");
                Ok(task)
            }
            Err(err) => Err(self.record_failure(err, CREATE_FAILED)),
        }
    }

    /// Flips `completed` right away and asks the server for the same value.
    /// A failed request puts back the value this call saw before flipping.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn toggle_complete(&self, id: TaskId) -> SyncResult<()> {
        let previous = {
            let mut state = self.state.lock();
            let task = find_mut(&mut state.tasks, id)?;
            let previous = task.completed;
            task.completed = !previous;
            previous
        };
        debug!(from = previous, to = !previous, "applied optimistic toggle");

        let lane = self.enter_lane(id).await;
        let result = self
            .api
            .update_task(id, &TaskPatch::completed(!previous))
            .await;
        drop(lane);
        self.leave_lane(id);

        match result {
            Ok(confirmed) => {
                let mut state = self.state.lock();
                if let Ok(task) = find_mut(&mut state.tasks, id)
                    && task.completed == confirmed.completed
                {
                    task.updated_at = confirmed.updated_at;
                }
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.state.lock();
                    if let Ok(task) = find_mut(&mut state.tasks, id) {
                        task.completed = previous;
                    }
                }
                debug!(restored = previous, "reverted optimistic toggle");
                Err(self.record_failure(err, UPDATE_FAILED))
            }
        }
    }

    /// Replaces the local record right away and persists the full record.
    /// A failed request restores the record this call replaced, unless a
    /// later mutation has already written over it.
    ///
    /// `completed` is sent as `updated` carries it. When that value comes
    /// from a toggle still in flight and the toggle then fails, the local
    /// entry reverts while the server keeps the edit's value; the next
    /// hydrate reconciles them.
    #[instrument(skip(self, updated), fields(id = %updated.id))]
    pub async fn edit(&self, mut updated: Task) -> SyncResult<Task> {
        updated.title = validate_title(&updated.title)?;
        updated.description = normalize_description(updated.description.as_deref());
        let id = updated.id;

        let previous = {
            let mut state = self.state.lock();
            let slot = find_mut(&mut state.tasks, id)?;
            updated.created_at = slot.created_at;
            updated.updated_at = slot.updated_at;
            std::mem::replace(slot, updated.clone())
        };
        debug!("applied optimistic edit");

        let lane = self.enter_lane(id).await;
        let result = self.api.update_task(id, &updated.to_update_patch()).await;
        drop(lane);
        self.leave_lane(id);

        match result {
            Ok(confirmed) => {
                let mut state = self.state.lock();
                if let Ok(slot) = find_mut(&mut state.tasks, id)
                    && *slot == updated
                {
                    *slot = confirmed.clone();
                }
                Ok(confirmed)
            }
            Err(err) => {
                {
                    let mut state = self.state.lock();
                    match find_mut(&mut state.tasks, id) {
                        Ok(slot) if *slot == updated => {
                            *slot = previous;
                            debug!("reverted optimistic edit");
                        }
                        _ => debug!("edit superseded; leaving newer record in place"),
                    }
                }
                Err(self.record_failure(err, UPDATE_FAILED))
            }
        }
    }

    /// Removes the entry once the server confirms the delete. On failure the
    /// entry stays exactly as it was.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn remove(&self, id: TaskId) -> SyncResult<()> {
        if self.get(id).is_none() {
            return Err(SyncError::NotFound(id));
        }

        let lane = self.enter_lane(id).await;
        let result = self.api.delete_task(id).await;
        drop(lane);
        self.leave_lane(id);

        match result {
            Ok(()) => {
                let mut state = self.state.lock();
                if let Some(pos) = state.tasks.iter().position(|task| task.id == id) {
                    state.tasks.remove(pos);
                }
                info!("deleted task");
                Ok(())
            }
            Err(err) => Err(self.record_failure(err, DELETE_FAILED)),
        }
    }

    async fn enter_lane(&self, id: TaskId) -> Option<OwnedMutexGuard<()>> {
        match &self.lanes {
            Some(lanes) => Some(lanes.enter(id).await),
            None => None,
        }
    }

    fn leave_lane(&self, id: TaskId) {
        if let Some(lanes) = &self.lanes {
            lanes.forget(id);
        }
    }

    /// A rejected credential tears the session down; anything else becomes
    /// the dismissible error message.
    fn record_failure(&self, err: ApiError, message: &str) -> SyncError {
        if err.is_unauthorized() {
            warn!(error = %err, "request rejected; ending session");
            self.session.invalidate();
            return SyncError::Unauthenticated;
        }

        warn!(error = %err, message, "task operation failed");
        self.state.lock().last_error = Some(message.to_string());
        SyncError::Api(err)
    }
}

fn find_mut(tasks: &mut [Task], id: TaskId) -> SyncResult<&mut Task> {
    tasks
        .iter_mut()
        .find(|task| task.id == id)
        .ok_or(SyncError::NotFound(id))
}

fn dedupe_by_id(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::with_capacity(tasks.len());
    let before = tasks.len();
    let kept: Vec<Task> = tasks.into_iter().filter(|task| seen.insert(task.id)).collect();
    if kept.len() != before {
        warn!(dropped = before - kept.len(), "server returned duplicate task ids");
    }
    kept
}
