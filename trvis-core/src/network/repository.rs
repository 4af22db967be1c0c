//! Repository backed by the remote project service.
//!
//! Every request runs through a bounded retry loop with a per-attempt
//! timeout. Create, update and delete calls that fail for connectivity
//! reasons are reported to the caller and also remembered in a
//! [`PendingQueue`]; `sync` replays that queue in order. A
//! [`ConnectivityWatcher`] can be attached so that coming back online
//! triggers a replay automatically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use super::connectivity::ConnectivityWatcher;
use super::queue::{OperationKind, PendingOperation, PendingQueue};
use super::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::models::{ProjectData, StorageState};
use crate::repository::{ProjectRepository, RepositoryError, RepositoryResult, SyncStatus};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Called with the failure message when a replay stops on an error.
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Connection settings for a remote backend.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub base_url: String,
    /// Upper bound for a single attempt.
    pub timeout: Duration,
    pub retry_attempts: u32,
    /// Delay before the second attempt; later attempts wait proportionally
    /// longer.
    pub retry_delay: Duration,
}

impl NetworkConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

#[derive(Deserialize)]
struct ProjectList {
    projects: Vec<ProjectData>,
}

#[derive(Debug, Default)]
struct ReplayState {
    last_sync_time: Option<DateTime<Utc>>,
    sync_error: Option<String>,
}

fn project_path(id: &str) -> String {
    format!("/api/projects/{}", urlencoding::encode(id))
}

/// Delay before retry number `attempt + 1`. Saturates instead of overflowing.
fn backoff(delay: Duration, attempt: u32) -> Duration {
    delay.checked_mul(attempt).unwrap_or(Duration::MAX)
}

/// Attributes a status-derived error to the project it concerns.
fn for_project(id: &str) -> impl FnOnce(RepositoryError) -> RepositoryError + '_ {
    move |e| match e {
        RepositoryError::NotFound(_) => RepositoryError::NotFound(id.to_string()),
        RepositoryError::Conflict(_) => RepositoryError::Conflict(id.to_string()),
        other => other,
    }
}

/// Turns a non-2xx response into an error that carries the body text.
fn check_status(request: &ApiRequest, response: ApiResponse) -> RepositoryResult<ApiResponse> {
    if response.is_success() {
        return Ok(response);
    }

    match response.status {
        404 => Err(RepositoryError::NotFound(request.path.clone())),
        409 => Err(RepositoryError::Conflict(request.path.clone())),
        status => Err(RepositoryError::Network(format!(
            "{} {} returned {}: {}",
            request.method,
            request.path,
            status,
            response.body.trim()
        ))),
    }
}

/// State shared with the connectivity task.
struct NetworkInner {
    config: NetworkConfig,
    transport: Arc<dyn Transport>,
    on_error: Mutex<Option<ErrorCallback>>,
    ready: AtomicBool,
    /// Last state reported by the watcher. Stays true when none is attached.
    online: AtomicBool,
    queue: PendingQueue,
    replay: Mutex<ReplayState>,
    /// Keeps two replays from interleaving.
    sync_lock: tokio::sync::Mutex<()>,
}

impl NetworkInner {
    fn replay_state(&self) -> MutexGuard<'_, ReplayState> {
        self.replay.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn error_callback(&self) -> Option<ErrorCallback> {
        self.on_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn attempt(&self, request: &ApiRequest) -> RepositoryResult<ApiResponse> {
        match timeout(self.config.timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => check_status(request, response),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RepositoryError::Network(format!(
                "{} {} timed out after {}ms",
                request.method,
                request.path,
                self.config.timeout.as_millis()
            ))),
        }
    }

    /// Sends a request, retrying connectivity failures up to the configured
    /// number of attempts. Not-found and conflict answers return at once.
    async fn request(&self, request: ApiRequest) -> RepositoryResult<ApiResponse> {
        let attempts = self.config.retry_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_connectivity() => return Err(e),
                Err(e) if attempt >= attempts => {
                    tracing::warn!(
                        method = %request.method,
                        path = %request.path,
                        attempts,
                        "Request failed after all attempts: {}",
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!(
                        method = %request.method,
                        path = %request.path,
                        attempt,
                        "Request attempt failed: {}",
                        e
                    );
                    sleep(backoff(self.config.retry_delay, attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_create(&self, data: &ProjectData) -> RepositoryResult<()> {
        let body = serde_json::to_value(data)?;
        self.request(ApiRequest::post("/api/projects", body))
            .await
            .map_err(for_project(&data.id))?;
        Ok(())
    }

    async fn send_update(&self, id: &str, data: &ProjectData) -> RepositoryResult<()> {
        let body = serde_json::to_value(data)?;
        self.request(ApiRequest::put(project_path(id), body))
            .await
            .map_err(for_project(id))?;
        Ok(())
    }

    async fn send_delete(&self, id: &str) -> RepositoryResult<()> {
        self.request(ApiRequest::delete(project_path(id)))
            .await
            .map_err(for_project(id))?;
        Ok(())
    }

    /// Queues `operation` when `error` is a connectivity failure.
    fn remember(&self, operation: PendingOperation, error: &RepositoryError) {
        if error.is_connectivity() {
            let pending = self.queue.push(operation);
            tracing::warn!(pending, "Queued operation for later sync: {}", error);
        }
    }

    async fn replay(&self, operation: &PendingOperation) -> RepositoryResult<()> {
        let id = operation.project_id.as_deref();
        let data = operation.data.as_ref();

        match (operation.kind, id, data) {
            (OperationKind::Create, _, Some(data)) => self.send_create(data).await,
            (OperationKind::Update, Some(id), Some(data)) => self.send_update(id, data).await,
            (OperationKind::Delete, Some(id), _) => self.send_delete(id).await,
            _ => Err(RepositoryError::InvalidState(format!(
                "pending {:?} operation is missing its project id or data",
                operation.kind
            ))),
        }
    }

    async fn sync(&self) -> RepositoryResult<()> {
        if !self.online.load(Ordering::SeqCst) {
            tracing::debug!("Watcher reports offline, skipping sync");
            return Ok(());
        }

        let _guard = self.sync_lock.lock().await;
        let mut replayed = 0usize;

        while let Some(operation) = self.queue.front() {
            if let Err(e) = self.replay(&operation).await {
                let message = e.to_string();
                tracing::warn!(
                    replayed,
                    remaining = self.queue.len(),
                    "Sync stopped: {}",
                    message
                );
                self.replay_state().sync_error = Some(message.clone());
                if let Some(callback) = self.error_callback() {
                    callback(&message);
                }
                return Err(e);
            }
            self.queue.pop_front_if(&operation);
            replayed += 1;
        }

        let mut state = self.replay_state();
        state.sync_error = None;
        if replayed > 0 {
            state.last_sync_time = Some(Utc::now());
            tracing::info!(replayed, "Sync complete");
        }
        Ok(())
    }
}

pub struct NetworkRepository {
    inner: Arc<NetworkInner>,
    watcher: Option<Arc<dyn ConnectivityWatcher>>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkRepository {
    /// Creates a repository talking HTTP to `config.base_url`.
    pub fn new(config: NetworkConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.base_url.clone()));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: NetworkConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                config,
                transport,
                on_error: Mutex::new(None),
                ready: AtomicBool::new(false),
                online: AtomicBool::new(true),
                queue: PendingQueue::new(),
                replay: Mutex::new(ReplayState::default()),
                sync_lock: tokio::sync::Mutex::new(()),
            }),
            watcher: None,
            watch_task: Mutex::new(None),
        }
    }

    /// Replays the queue whenever `watcher` reports a transition to online.
    /// Takes effect on `initialize`.
    pub fn with_watcher(mut self, watcher: Arc<dyn ConnectivityWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn with_error_callback(self, callback: ErrorCallback) -> Self {
        self.set_error_callback(Some(callback));
        self
    }

    pub fn set_error_callback(&self, callback: Option<ErrorCallback>) {
        *self.inner.on_error.lock().unwrap_or_else(|e| e.into_inner()) = callback;
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.inner.config
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Queued operations in replay order.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.inner.queue.snapshot()
    }

    fn ensure_ready(&self) -> RepositoryResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(RepositoryError::NotInitialized)
        }
    }

    fn watch_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.watch_task.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn spawn_watch_task(&self) {
        let Some(watcher) = &self.watcher else {
            return;
        };

        let mut rx = watcher.subscribe();
        let online = *rx.borrow_and_update();
        self.inner.online.store(online, Ordering::SeqCst);
        let inner = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                let Some(inner) = inner.upgrade() else {
                    break;
                };

                let was_online = inner.online.swap(online, Ordering::SeqCst);
                if online && !was_online {
                    tracing::info!("Connection restored, syncing pending operations");
                    tokio::spawn(async move {
                        let _ = inner.sync().await;
                    });
                } else if !online && was_online {
                    tracing::info!("Connection lost, operating offline");
                }
            }
        });

        if let Some(previous) = self.watch_task().replace(handle) {
            previous.abort();
        }
    }
}

#[async_trait]
impl ProjectRepository for NetworkRepository {
    /// Probes `/health` once. An unreachable backend is only logged; the
    /// repository stays usable and queues writes until `sync` gets through.
    /// The online flag follows the watcher, if one is attached.
    async fn initialize(&self) -> RepositoryResult<()> {
        match self.inner.attempt(&ApiRequest::get("/health")).await {
            Ok(_) => {
                tracing::info!(base_url = %self.inner.config.base_url, "Network repository initialized");
            }
            Err(e) => {
                tracing::warn!(
                    base_url = %self.inner.config.base_url,
                    "Backend unreachable at startup: {}",
                    e
                );
            }
        }

        self.spawn_watch_task();
        self.inner.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    async fn get_projects(&self) -> RepositoryResult<Vec<ProjectData>> {
        self.ensure_ready()?;
        let response = self.inner.request(ApiRequest::get("/api/projects")).await?;
        Ok(response.json::<ProjectList>()?.projects)
    }

    async fn get_project(&self, id: &str) -> RepositoryResult<ProjectData> {
        self.ensure_ready()?;
        let response = self
            .inner
            .request(ApiRequest::get(project_path(id)))
            .await
            .map_err(for_project(id))?;
        response.json()
    }

    async fn create_project(&self, data: ProjectData) -> RepositoryResult<ProjectData> {
        self.ensure_ready()?;
        match self.inner.send_create(&data).await {
            Ok(()) => Ok(data),
            Err(e) => {
                self.inner.remember(PendingOperation::create(data), &e);
                Err(e)
            }
        }
    }

    async fn update_project(&self, id: &str, data: ProjectData) -> RepositoryResult<ProjectData> {
        self.ensure_ready()?;
        let mut updated = data;
        updated.id = id.to_string();
        updated.touch();

        match self.inner.send_update(id, &updated).await {
            Ok(()) => Ok(updated),
            Err(e) => {
                self.inner.remember(PendingOperation::update(id, updated), &e);
                Err(e)
            }
        }
    }

    async fn delete_project(&self, id: &str) -> RepositoryResult<()> {
        self.ensure_ready()?;
        match self.inner.send_delete(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.inner.remember(PendingOperation::delete(id), &e);
                Err(e)
            }
        }
    }

    async fn set_active_project(&self, id: Option<&str>) -> RepositoryResult<()> {
        let mut state = self.load_storage_state().await?;
        if let Some(id) = id {
            if !state.contains(id) {
                return Err(RepositoryError::NotFound(id.to_string()));
            }
        }
        state.active_project_id = id.map(String::from);
        self.save_storage_state(&state).await
    }

    async fn get_all_projects(&self) -> RepositoryResult<StorageState> {
        self.load_storage_state().await
    }

    async fn save_storage_state(&self, state: &StorageState) -> RepositoryResult<()> {
        self.ensure_ready()?;
        state.validate()?;
        let body = serde_json::to_value(state)?;
        self.inner
            .request(ApiRequest::post("/api/storage/save", body))
            .await?;
        Ok(())
    }

    async fn load_storage_state(&self) -> RepositoryResult<StorageState> {
        self.ensure_ready()?;
        let response = self
            .inner
            .request(ApiRequest::get("/api/storage/load"))
            .await?;
        response.json()
    }

    fn sync_status(&self) -> SyncStatus {
        let state = self.inner.replay_state();
        SyncStatus::derive(
            self.inner.queue.len(),
            state.last_sync_time,
            state.sync_error.clone(),
        )
    }

    async fn sync(&self) -> RepositoryResult<()> {
        self.ensure_ready()?;
        self.inner.sync().await
    }

    async fn clear_pending(&self) -> RepositoryResult<()> {
        let dropped = self.inner.queue.len();
        self.inner.queue.clear();
        self.inner.replay_state().sync_error = None;
        if dropped > 0 {
            tracing::info!(dropped, "Cleared pending operations");
        }
        Ok(())
    }

    async fn close(&self) {
        if let Some(handle) = self.watch_task().take() {
            handle.abort();
        }
        if self.inner.ready.swap(false, Ordering::SeqCst) {
            tracing::debug!(base_url = %self.inner.config.base_url, "Network repository closed");
        }
    }
}

impl Drop for NetworkRepository {
    fn drop(&mut self) {
        if let Some(handle) = self.watch_task().take() {
            handle.abort();
        }
    }
}
