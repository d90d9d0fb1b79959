//! Test doubles for the todo API.
//!
//! [`MockTodoApi`] keeps a server-side task list, records every call, and
//! lets a test fail or hold individual requests so interleavings can be
//! driven deterministically.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use reqwest::StatusCode;
use taskflow_shared::{TaskCreate, TaskPatch, UserProfile};
use tokio::sync::oneshot;

use crate::api::TodoApi;
use crate::error::{ApiError, ApiResult};
use crate::task::{Task, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    List,
    Create(TaskCreate),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
    CurrentUser,
}

/// Scripted outcome for the next request of one kind.
#[derive(Debug, Default)]
pub struct Scripted {
    fail: bool,
    unauthorized: bool,
    release: Option<oneshot::Receiver<()>>,
}

impl Scripted {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn fail() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Answers 401 for this one request only.
    pub fn unauthorized() -> Self {
        Self {
            unauthorized: true,
            ..Self::default()
        }
    }

    /// Holds the request until the returned sender fires (or is dropped).
    pub fn held(self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                release: Some(rx),
                ..self
            },
            tx,
        )
    }
}

#[derive(Debug, Default)]
struct MockState {
    tasks: Vec<Task>,
    next_id: i64,
    calls: Vec<ApiCall>,
    reject_credential: bool,
    fail_list: bool,
    fail_create: bool,
    fail_profile: bool,
    profile_name: Option<String>,
    list_script: VecDeque<Scripted>,
    update_script: VecDeque<Scripted>,
    delete_script: VecDeque<Scripted>,
}

#[derive(Debug, Default)]
pub struct MockTodoApi {
    state: Mutex<MockState>,
}

pub fn sample_task(id: i64, title: &str, completed: bool) -> Task {
    Task {
        id: TaskId::new(id),
        title: title.to_string(),
        description: None,
        completed,
        created_at: Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default(),
        updated_at: None,
    }
}

impl MockTodoApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_id = tasks.iter().map(|task| task.id.get()).max().unwrap_or(0);
        Self {
            state: Mutex::new(MockState {
                tasks,
                next_id,
                ..MockState::default()
            }),
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, ApiCall::List | ApiCall::CurrentUser))
            .collect()
    }

    pub fn server_tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    /// Every request answers 401 from now on.
    pub fn reject_credential(&self) {
        self.state.lock().reject_credential = true;
    }

    pub fn fail_list(&self) {
        self.state.lock().fail_list = true;
    }

    /// Scripts list calls in order; unscripted calls behave normally. The
    /// first list call of a mount is the session check, the second is the
    /// hydrate.
    pub fn script_list(&self, scripted: Scripted) {
        self.state.lock().list_script.push_back(scripted);
    }

    pub fn fail_create(&self) {
        self.state.lock().fail_create = true;
    }

    pub fn fail_profile(&self) {
        self.state.lock().fail_profile = true;
    }

    pub fn set_profile_name(&self, name: Option<&str>) {
        self.state.lock().profile_name = name.map(str::to_string);
    }

    pub fn script_update(&self, scripted: Scripted) {
        self.state.lock().update_script.push_back(scripted);
    }

    pub fn script_delete(&self, scripted: Scripted) {
        self.state.lock().delete_script.push_back(scripted);
    }

    fn record(&self, call: ApiCall) -> ApiResult<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.reject_credential {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: "Internal Server Error".to_string(),
    }
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: StatusCode::NOT_FOUND,
        detail: "Todo not found".to_string(),
    }
}

async fn settle(mut scripted: Scripted) -> ApiResult<()> {
    if let Some(release) = scripted.release.take() {
        let _ = release.await;
    }
    if scripted.unauthorized {
        return Err(ApiError::Unauthorized);
    }
    if scripted.fail {
        return Err(server_error());
    }
    Ok(())
}

#[async_trait]
impl TodoApi for MockTodoApi {
    async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        self.record(ApiCall::List)?;
        let scripted = self.state.lock().list_script.pop_front().unwrap_or_default();
        settle(scripted).await?;

        let state = self.state.lock();
        if state.fail_list {
            return Err(server_error());
        }
        Ok(state.tasks.clone())
    }

    async fn create_task(&self, payload: &TaskCreate) -> ApiResult<Task> {
        self.record(ApiCall::Create(payload.clone()))?;
        let mut state = self.state.lock();
        if state.fail_create {
            return Err(server_error());
        }
        state.next_id += 1;
        let mut task = sample_task(state.next_id, &payload.title, false);
        task.description = payload.description.clone();
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> ApiResult<Task> {
        self.record(ApiCall::Update(id, patch.clone()))?;
        let scripted = self.state.lock().update_script.pop_front().unwrap_or_default();
        settle(scripted).await?;

        let mut state = self.state.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(not_found)?;
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = description.clone();
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        task.updated_at = Some(task.created_at);
        Ok(task.clone())
    }

    async fn delete_task(&self, id: TaskId) -> ApiResult<()> {
        self.record(ApiCall::Delete(id))?;
        let scripted = self.state.lock().delete_script.pop_front().unwrap_or_default();
        settle(scripted).await?;

        let mut state = self.state.lock();
        let before = state.tasks.len();
        state.tasks.retain(|task| task.id != id);
        if state.tasks.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn current_user(&self) -> ApiResult<UserProfile> {
        self.record(ApiCall::CurrentUser)?;
        let state = self.state.lock();
        if state.fail_profile {
            return Err(server_error());
        }
        let email = state
            .profile_name
            .as_deref()
            .map(|name| format!("{name}@example.com"))
            .unwrap_or_else(|| "someone@example.com".to_string());
        Ok(UserProfile {
            email,
            name: state.profile_name.clone(),
            id: Some(1),
            created_at: None,
        })
    }
}
