//! Session state and the authentication gate.
//!
//! The bearer credential is held by an explicit [`SessionContext`] that is
//! handed to the gate, the API client and the repository. It is loaded once
//! when the context is built and torn down on logout or on the first
//! rejected request.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::api::TodoApi;
use crate::error::{SyncError, SyncResult};

pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// Persistent home of the bearer token.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<String>>;
    fn save(&self, token: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// Token kept in a single file, written atomically.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> anyhow::Result<Option<String>> {
        if !self.path.exists() {
            debug!("no credential file");
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        let token = raw.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    #[instrument(skip(self, token), fields(path = %self.path.display()))]
    fn save(&self, token: &str) -> anyhow::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir)?;
        writeln!(temp, "{}", token.trim())?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;
        info!("stored credential");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("removed credential file");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed removing {}", self.path.display()))
            }
        }
    }
}

/// Process-local store, used by tests and one-shot invocations.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: RwLock::new(Some(token.to_string())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> anyhow::Result<Option<String>> {
        Ok(self.token.read().clone())
    }

    fn save(&self, token: &str) -> anyhow::Result<()> {
        *self.token.write() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.token.write() = None;
        Ok(())
    }
}

/// Shared handle to the current credential.
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn CredentialStore>,
    token: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("has_token", &self.has_credential())
            .finish()
    }
}

impl SessionContext {
    #[instrument(skip(store))]
    pub fn load(store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let token = store.load().context("failed to load stored credential")?;
        debug!(has_token = token.is_some(), "session context loaded");
        Ok(Self {
            store,
            token: Arc::new(RwLock::new(token)),
        })
    }

    pub fn in_memory(token: Option<&str>) -> Self {
        let store = match token {
            Some(token) => MemoryCredentialStore::with_token(token),
            None => MemoryCredentialStore::default(),
        };
        Self {
            store: Arc::new(store),
            token: Arc::new(RwLock::new(token.map(str::to_string))),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn has_credential(&self) -> bool {
        self.token.read().is_some()
    }

    pub fn sign_in(&self, token: &str) -> anyhow::Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(anyhow!("refusing to store an empty token"));
        }
        self.store.save(token)?;
        *self.token.write() = Some(token.to_string());
        Ok(())
    }

    /// Drops the credential locally and in the store. Store failures are
    /// logged; the in-memory session is gone either way.
    pub fn invalidate(&self) {
        let had_token = self.token.write().take().is_some();
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear stored credential");
        }
        if had_token {
            info!("session invalidated");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub display_name: String,
    pub email: Option<String>,
}

impl SessionInfo {
    pub fn initial(&self) -> char {
        self.display_name
            .chars()
            .next()
            .map(|ch| ch.to_uppercase().next().unwrap_or(ch))
            .unwrap_or('U')
    }
}

/// Decides whether task data may be requested at all.
pub struct SessionGate {
    session: SessionContext,
    api: Arc<dyn TodoApi>,
}

impl SessionGate {
    pub fn new(session: SessionContext, api: Arc<dyn TodoApi>) -> Self {
        Self { session, api }
    }

    /// Checks the task list with the stored credential, then resolves a
    /// display name on a best-effort basis. Has no effect on session state;
    /// the caller decides what to tear down on failure.
    #[instrument(skip(self))]
    pub async fn verify(&self) -> SyncResult<SessionInfo> {
        if !self.session.has_credential() {
            info!("no credential; skipping session check");
            return Err(SyncError::Unauthenticated);
        }

        if let Err(err) = self.api.list_tasks().await {
            warn!(error = %err, "session check failed");
            return Err(SyncError::Unauthenticated);
        }

        let info = match self.api.current_user().await {
            Ok(profile) => SessionInfo {
                display_name: profile
                    .name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
                email: Some(profile.email),
            },
            Err(err) => {
                debug!(error = %err, "profile lookup failed; using generic label");
                SessionInfo {
                    display_name: DEFAULT_DISPLAY_NAME.to_string(),
                    email: None,
                }
            }
        };

        info!(display_name = %info.display_name, "session verified");
        Ok(info)
    }
}
