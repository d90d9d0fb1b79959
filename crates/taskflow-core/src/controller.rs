//! Dashboard lifecycle and user intents.
//!
//! A controller is one dashboard mount: it checks the session once,
//! hydrates the repository, then turns intents into repository calls. Any
//! call that comes back `Unauthenticated` ends the mount in `Redirecting`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::TodoApi;
use crate::error::{SyncError, SyncResult};
use crate::filter::{FilterState, StatusFilter};
use crate::repository::TaskRepository;
use crate::session::{SessionContext, SessionGate, SessionInfo};
use crate::stats::TaskStats;
use crate::task::{Task, TaskId};

pub const NO_TASK_SELECTED: &str = "No task selected for editing";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardPhase {
    Initializing,
    Authenticated,
    Ready,
    /// Terminal for this mount: the user is sent to sign-in.
    Redirecting,
}

/// Modal visibility. Purely presentational; never touches task data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalState {
    pub add_open: bool,
    pub editing: Option<TaskId>,
}

#[derive(Debug)]
struct UiState {
    phase: DashboardPhase,
    mount_started: bool,
    session: Option<SessionInfo>,
    filters: FilterState,
    modal: ModalState,
}

pub struct DashboardController {
    session: SessionContext,
    gate: SessionGate,
    repo: TaskRepository,
    ui: Mutex<UiState>,
}

impl DashboardController {
    pub fn new(api: Arc<dyn TodoApi>, session: SessionContext) -> Self {
        Self {
            gate: SessionGate::new(session.clone(), api.clone()),
            repo: TaskRepository::new(api, session.clone()),
            session,
            ui: Mutex::new(UiState {
                phase: DashboardPhase::Initializing,
                mount_started: false,
                session: None,
                filters: FilterState::default(),
                modal: ModalState::default(),
            }),
        }
    }

    pub fn serialize_per_id(mut self, enabled: bool) -> Self {
        self.repo = self.repo.serialize_per_id(enabled);
        self
    }

    pub fn phase(&self) -> DashboardPhase {
        self.ui.lock().phase
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        self.ui.lock().session.clone()
    }

    pub fn repository(&self) -> &TaskRepository {
        &self.repo
    }

    /// Verifies the session, then hydrates. Runs once per controller; later
    /// calls just report the current phase.
    #[instrument(skip(self))]
    pub async fn mount(&self) -> DashboardPhase {
        {
            let mut ui = self.ui.lock();
            if ui.mount_started {
                debug!(phase = ?ui.phase, "already mounted");
                return ui.phase;
            }
            ui.mount_started = true;
        }

        let info = match self.gate.verify().await {
            Ok(info) => info,
            Err(err) => {
                info!(error = %err, "session check failed; redirecting to sign-in");
                self.session.invalidate();
                return self.set_phase(DashboardPhase::Redirecting);
            }
        };

        {
            let mut ui = self.ui.lock();
            ui.session = Some(info);
            ui.phase = DashboardPhase::Authenticated;
        }

        match self.repo.hydrate().await {
            Err(SyncError::Unauthenticated) => self.set_phase(DashboardPhase::Redirecting),
            Err(err) => {
                warn!(error = %err, "dashboard ready without tasks");
                self.set_phase(DashboardPhase::Ready)
            }
            Ok(count) => {
                debug!(count, "dashboard ready");
                self.set_phase(DashboardPhase::Ready)
            }
        }
    }

    pub fn open_add(&self) {
        self.ui.lock().modal.add_open = true;
    }

    pub fn close_add(&self) {
        self.ui.lock().modal.add_open = false;
    }

    pub fn open_edit(&self, id: TaskId) -> SyncResult<()> {
        if self.repo.get(id).is_none() {
            return Err(SyncError::NotFound(id));
        }
        self.ui.lock().modal.editing = Some(id);
        Ok(())
    }

    pub fn close_edit(&self) {
        self.ui.lock().modal.editing = None;
    }

    pub fn modal(&self) -> ModalState {
        self.ui.lock().modal.clone()
    }

    /// Creates a task. The add modal closes only on success so the form
    /// keeps its input for a retry.
    #[instrument(skip(self, title, description))]
    pub async fn submit_add(&self, title: &str, description: Option<&str>) -> SyncResult<Task> {
        self.ensure_ready()?;
        let created = self.observe(self.repo.create(title, description).await)?;
        self.close_add();
        Ok(created)
    }

    /// Saves new fields for the task held by the edit modal.
    #[instrument(skip(self, title, description))]
    pub async fn submit_edit(&self, title: &str, description: Option<&str>) -> SyncResult<Task> {
        self.ensure_ready()?;
        let id = self
            .ui
            .lock()
            .modal
            .editing
            .ok_or_else(|| SyncError::Validation(NO_TASK_SELECTED.to_string()))?;
        let mut updated = self.repo.get(id).ok_or(SyncError::NotFound(id))?;
        updated.title = title.to_string();
        updated.description = description.map(str::to_string);

        let saved = self.observe(self.repo.edit(updated).await)?;
        self.close_edit();
        Ok(saved)
    }

    pub async fn toggle(&self, id: TaskId) -> SyncResult<()> {
        self.ensure_ready()?;
        self.observe(self.repo.toggle_complete(id).await)
    }

    pub async fn delete(&self, id: TaskId) -> SyncResult<()> {
        self.ensure_ready()?;
        let result = self.observe(self.repo.remove(id).await);
        if result.is_ok() {
            let mut ui = self.ui.lock();
            if ui.modal.editing == Some(id) {
                ui.modal.editing = None;
            }
        }
        result
    }

    #[instrument(skip(self))]
    pub fn logout(&self) {
        self.session.invalidate();
        let mut ui = self.ui.lock();
        ui.modal = ModalState::default();
        ui.phase = DashboardPhase::Redirecting;
        info!("logged out");
    }

    pub fn last_error(&self) -> Option<String> {
        self.repo.last_error()
    }

    pub fn dismiss_error(&self) {
        self.repo.dismiss_error();
    }

    pub fn filters(&self) -> FilterState {
        self.ui.lock().filters.clone()
    }

    pub fn set_status_filter(&self, status: StatusFilter) {
        self.ui.lock().filters.status = status;
    }

    pub fn set_search(&self, query: &str) {
        self.ui.lock().filters.search_query = query.to_string();
    }

    pub fn clear_search(&self) {
        self.ui.lock().filters.search_query.clear();
    }

    pub fn reset_filters(&self) {
        self.ui.lock().filters = FilterState::default();
    }

    pub fn visible_tasks(&self) -> Vec<Task> {
        let filters = self.filters();
        self.repo.with_tasks(|tasks| filters.apply(tasks))
    }

    pub fn is_empty_view(&self) -> bool {
        self.visible_tasks().is_empty()
    }

    pub fn stats(&self) -> TaskStats {
        self.repo.stats()
    }

    fn ensure_ready(&self) -> SyncResult<()> {
        match self.phase() {
            DashboardPhase::Ready => Ok(()),
            phase => Err(SyncError::NotReady(phase)),
        }
    }

    fn observe<T>(&self, result: SyncResult<T>) -> SyncResult<T> {
        if matches!(result, Err(SyncError::Unauthenticated)) {
            self.session.invalidate();
            self.set_phase(DashboardPhase::Redirecting);
        }
        result
    }

    fn set_phase(&self, phase: DashboardPhase) -> DashboardPhase {
        let mut ui = self.ui.lock();
        if ui.phase != phase {
            debug!(from = ?ui.phase, to = ?phase, "dashboard phase change");
        }
        ui.phase = phase;
        phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ApiCall, MockTodoApi, Scripted, sample_task};

    fn controller(
        tasks: Vec<Task>,
        token: Option<&str>,
    ) -> (Arc<MockTodoApi>, SessionContext, DashboardController) {
        let api = Arc::new(MockTodoApi::with_tasks(tasks));
        let session = SessionContext::in_memory(token);
        let dashboard = DashboardController::new(api.clone(), session.clone());
        (api, session, dashboard)
    }

    #[tokio::test]
    async fn mount_without_credential_redirects() {
        let (api, _session, dashboard) = controller(vec![], None);

        assert_eq!(dashboard.mount().await, DashboardPhase::Redirecting);
        assert!(api.calls().is_empty());
        assert!(matches!(
            dashboard.toggle(TaskId::new(1)).await,
            Err(SyncError::NotReady(DashboardPhase::Redirecting))
        ));
    }

    #[tokio::test]
    async fn mount_verifies_then_hydrates_once() {
        let (api, _session, dashboard) = controller(vec![sample_task(1, "A", false)], Some("tok"));
        api.set_profile_name(Some("grace"));

        assert_eq!(dashboard.phase(), DashboardPhase::Initializing);
        assert_eq!(dashboard.mount().await, DashboardPhase::Ready);
        assert_eq!(dashboard.mount().await, DashboardPhase::Ready);

        assert_eq!(
            api.calls(),
            vec![ApiCall::List, ApiCall::CurrentUser, ApiCall::List]
        );
        assert_eq!(
            dashboard.session_info().expect("session").display_name,
            "grace"
        );
        assert_eq!(dashboard.visible_tasks().len(), 1);
    }

    #[tokio::test]
    async fn rejected_session_check_clears_credential() {
        let (api, session, dashboard) = controller(vec![], Some("expired"));
        api.reject_credential();

        assert_eq!(dashboard.mount().await, DashboardPhase::Redirecting);
        assert!(!session.has_credential());
    }

    #[tokio::test]
    async fn hydrate_failure_after_valid_session_still_reaches_ready() {
        let (api, session, dashboard) = controller(vec![sample_task(1, "A", false)], Some("tok"));
        api.script_list(Scripted::ok());
        api.script_list(Scripted::fail());

        assert_eq!(dashboard.mount().await, DashboardPhase::Ready);
        assert_eq!(dashboard.last_error().as_deref(), Some(crate::repository::LOAD_FAILED));
        assert!(dashboard.repository().is_empty());
        assert!(dashboard.is_empty_view());
        assert!(session.has_credential());
    }

    #[tokio::test]
    async fn hydrate_rejected_after_valid_session_redirects() {
        let (api, session, dashboard) = controller(vec![sample_task(1, "A", false)], Some("tok"));
        api.script_list(Scripted::ok());
        api.script_list(Scripted::unauthorized());

        assert_eq!(dashboard.mount().await, DashboardPhase::Redirecting);
        assert!(!session.has_credential());
        assert_eq!(dashboard.last_error(), None);
        assert!(dashboard.repository().is_empty());
        assert_eq!(
            api.calls(),
            vec![ApiCall::List, ApiCall::CurrentUser, ApiCall::List]
        );
    }

    #[tokio::test]
    async fn add_modal_stays_open_on_failure() {
        let (api, _session, dashboard) = controller(vec![], Some("tok"));
        dashboard.mount().await;
        dashboard.open_add();

        assert!(matches!(
            dashboard.submit_add("  ", None).await,
            Err(SyncError::Validation(_))
        ));
        assert!(dashboard.modal().add_open);

        api.fail_create();
        assert!(dashboard.submit_add("Real", None).await.is_err());
        assert!(dashboard.modal().add_open);
        assert_eq!(dashboard.last_error().as_deref(), Some("Failed to create todo"));
    }

    #[tokio::test]
    async fn add_modal_closes_on_success() {
        let (_api, _session, dashboard) =
            controller(vec![sample_task(1, "Old", false)], Some("tok"));
        dashboard.mount().await;
        dashboard.open_add();

        let created = dashboard.submit_add("New", Some("desc")).await.expect("create");
        assert!(!dashboard.modal().add_open);
        assert_eq!(dashboard.visible_tasks()[0].id, created.id);
    }

    #[tokio::test]
    async fn edit_flow_updates_selected_task() {
        let (_api, _session, dashboard) =
            controller(vec![sample_task(1, "Draft", false)], Some("tok"));
        dashboard.mount().await;

        assert!(matches!(
            dashboard.submit_edit("x", None).await,
            Err(SyncError::Validation(ref msg)) if msg == NO_TASK_SELECTED
        ));
        assert!(matches!(
            dashboard.open_edit(TaskId::new(42)),
            Err(SyncError::NotFound(_))
        ));

        dashboard.open_edit(TaskId::new(1)).expect("open edit");
        let saved = dashboard
            .submit_edit(" Final ", Some("polished"))
            .await
            .expect("edit");

        assert_eq!(saved.title, "Final");
        assert_eq!(saved.description.as_deref(), Some("polished"));
        assert_eq!(dashboard.modal().editing, None);
    }

    #[tokio::test]
    async fn filters_only_shape_the_view() {
        let (_api, _session, dashboard) = controller(
            vec![
                sample_task(1, "Write report", false),
                sample_task(2, "Call mom", true),
            ],
            Some("tok"),
        );
        dashboard.mount().await;

        dashboard.set_status_filter(StatusFilter::Active);
        assert_eq!(dashboard.visible_tasks().len(), 1);

        dashboard.set_status_filter(StatusFilter::All);
        dashboard.set_search("MOM");
        assert_eq!(dashboard.visible_tasks()[0].id, TaskId::new(2));

        dashboard.set_search("zzz");
        assert!(dashboard.is_empty_view());
        assert_eq!(dashboard.stats().total, 2);

        dashboard.clear_search();
        assert_eq!(dashboard.visible_tasks().len(), 2);

        dashboard.set_status_filter(StatusFilter::Completed);
        dashboard.reset_filters();
        assert_eq!(dashboard.filters(), FilterState::default());
    }

    #[tokio::test]
    async fn unauthorized_mutation_redirects() {
        let (api, session, dashboard) = controller(vec![sample_task(1, "A", false)], Some("tok"));
        dashboard.mount().await;
        api.reject_credential();

        assert!(matches!(
            dashboard.delete(TaskId::new(1)).await,
            Err(SyncError::Unauthenticated)
        ));
        assert_eq!(dashboard.phase(), DashboardPhase::Redirecting);
        assert!(!session.has_credential());
        assert_eq!(dashboard.repository().len(), 1);
    }

    #[tokio::test]
    async fn failed_toggle_surfaces_dismissible_error() {
        let (api, _session, dashboard) = controller(vec![sample_task(1, "A", false)], Some("tok"));
        dashboard.mount().await;
        api.script_update(Scripted::fail());

        assert!(dashboard.toggle(TaskId::new(1)).await.is_err());
        assert_eq!(dashboard.phase(), DashboardPhase::Ready);
        assert!(dashboard.last_error().is_some());

        dashboard.dismiss_error();
        assert!(dashboard.last_error().is_none());
    }

    #[tokio::test]
    async fn logout_clears_credential_and_redirects() {
        let (_api, session, dashboard) = controller(vec![], Some("tok"));
        dashboard.mount().await;
        dashboard.open_add();

        dashboard.logout();

        assert_eq!(dashboard.phase(), DashboardPhase::Redirecting);
        assert!(!session.has_credential());
        assert_eq!(dashboard.modal(), ModalState::default());
    }
}
