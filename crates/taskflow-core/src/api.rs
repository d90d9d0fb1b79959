//! Seam between the dashboard core and the remote todo API.

pub mod rest;

use async_trait::async_trait;
use taskflow_shared::{TaskCreate, TaskPatch, UserProfile};

use crate::error::ApiResult;
use crate::task::{Task, TaskId};

pub use rest::RestClient;

/// Authenticated todo endpoints. Implementations attach the session
/// credential themselves.
#[async_trait]
pub trait TodoApi: Send + Sync {
    /// `GET /api/todos`
    async fn list_tasks(&self) -> ApiResult<Vec<Task>>;

    /// `POST /api/todos`
    async fn create_task(&self, payload: &TaskCreate) -> ApiResult<Task>;

    /// `PUT /api/todos/{id}`
    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> ApiResult<Task>;

    /// `DELETE /api/todos/{id}`
    async fn delete_task(&self, id: TaskId) -> ApiResult<()>;

    /// `GET /auth/me`
    async fn current_user(&self) -> ApiResult<UserProfile>;
}
