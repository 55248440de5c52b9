use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::app_config::SyncSettings;
use crate::errors::{AppError, SyncError, WireError};
use crate::model::{Operation, SyncReport};
use crate::po;
use crate::sync::{CancellationToken, ProgressFn, SyncEngine};
use crate::text_source::{JsonTextSource, TextSource};
use crate::wire::{GridClient, HttpGridClient, RetryPolicy};

// @module: Command surface for hosts and the CLI

/// Capability exposed to hosts: the three sync operations
///
/// Implementations always return a report; errors that end a session land in its `fatal` field.
#[async_trait]
pub trait SyncCommands: Send + Sync {
    /// Name used for registry lookups
    fn name(&self) -> &str;

    async fn pull(&self, settings: &SyncSettings) -> SyncReport;

    async fn push(&self, settings: &SyncSettings) -> SyncReport;

    async fn status(&self, settings: &SyncSettings) -> SyncReport;

    /// Token observed by every session started through this provider
    fn cancellation(&self) -> CancellationToken;
}

/// Where a session gets its client and text source from
enum Backend {
    /// HTTP client and JSON file built from each call's settings
    FromSettings,
    /// Fixed instances shared by every call
    Fixed {
        client: Arc<dyn GridClient>,
        source: Arc<dyn TextSource>,
    },
}

/// Default command provider backed by the sync engine
pub struct CommandSurface {
    // @field: Client and store selection
    backend: Backend,
    // @field: Shared cancellation flag
    cancel: CancellationToken,
    // @field: Optional (done, total) callback
    progress: Option<ProgressFn>,
}

impl Default for CommandSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSurface {
    // @method: Talk to the configured service and local JSON store
    pub fn new() -> Self {
        Self {
            backend: Backend::FromSettings,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    // @method: Use the given client and text source for every session
    pub fn with_backends(client: Arc<dyn GridClient>, source: Arc<dyn TextSource>) -> Self {
        Self {
            backend: Backend::Fixed { client, source },
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn backends(&self, settings: &SyncSettings) -> Result<(Arc<dyn GridClient>, Arc<dyn TextSource>), WireError> {
        match &self.backend {
            Backend::FromSettings => {
                let client: Arc<dyn GridClient> = Arc::new(HttpGridClient::from_settings(settings)?);
                let source: Arc<dyn TextSource> = Arc::new(JsonTextSource::new(settings.local_path()));
                Ok((client, source))
            }
            Backend::Fixed { client, source } => Ok((client.clone(), source.clone())),
        }
    }

    fn engine(&self, settings: &SyncSettings) -> Result<SyncEngine, WireError> {
        let (client, source) = self.backends(settings)?;
        let engine = SyncEngine::new(client, source, settings.clone()).with_cancellation(self.cancel.clone());
        Ok(match &self.progress {
            Some(progress) => engine.with_progress(progress.clone()),
            None => engine,
        })
    }

    /// Run one operation
    pub async fn run(&self, operation: Operation, settings: &SyncSettings) -> SyncReport {
        info!(
            "Starting {} for project {} view {} (policy {})",
            operation,
            settings.project_id(),
            settings.view_id(),
            settings.conflict_policy()
        );
        let engine = match self.engine(settings) {
            Ok(engine) => engine,
            Err(error) => return SyncReport::fatal(operation, &SyncError::from(error)),
        };
        match operation {
            Operation::Pull => engine.pull().await,
            Operation::Push => engine.push().await,
            Operation::Status => engine.status().await,
        }
    }

    /// Check that the configured view answers with the configured key
    ///
    /// A settings-built client reports the first failure without retrying.
    pub async fn check_connection(&self, settings: &SyncSettings) -> Result<(), WireError> {
        let client: Arc<dyn GridClient> = match &self.backend {
            Backend::FromSettings => {
                Arc::new(HttpGridClient::from_settings(settings)?.with_retry_policy(RetryPolicy::none()))
            }
            Backend::Fixed { client, .. } => client.clone(),
        };
        client.test_connection(settings.project_id(), settings.view_id()).await
    }

    /// Write a PO file for one culture from the local store
    pub async fn export_po(&self, settings: &SyncSettings, culture: &str, output: &Path) -> Result<usize, AppError> {
        let (_, source) = self.backends(settings)?;
        let written = po::export_from_source(source.as_ref(), culture, output).await?;
        info!("Wrote {} entries for {} to {}", written, culture, output.display());
        Ok(written)
    }
}

#[async_trait]
impl SyncCommands for CommandSurface {
    fn name(&self) -> &str {
        "gridsync"
    }

    async fn pull(&self, settings: &SyncSettings) -> SyncReport {
        self.run(Operation::Pull, settings).await
    }

    async fn push(&self, settings: &SyncSettings) -> SyncReport {
        self.run(Operation::Push, settings).await
    }

    async fn status(&self, settings: &SyncSettings) -> SyncReport {
        self.run(Operation::Status, settings).await
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Long-lived host object with an explicit lifecycle
///
/// Sessions for the same (project, view) pair run one at a time; a second
/// request waits for the first to finish. Different pairs run in parallel.
pub struct SyncService {
    commands: Arc<dyn SyncCommands>,
    running: AtomicBool,
    locks: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncService {
    /// Create a stopped service
    pub fn new(commands: Arc<dyn SyncCommands>) -> Self {
        Self {
            commands,
            running: AtomicBool::new(false),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn start(&self) {
        self.commands.cancellation().reset();
        self.running.store(true, Ordering::SeqCst);
        info!("Sync service started ({})", self.commands.name());
    }

    /// Refuse new work and cancel running sessions at their next boundary
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.commands.cancellation().cancel();
        info!("Sync service stopped ({})", self.commands.name());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn pull(&self, settings: &SyncSettings) -> SyncReport {
        self.run(Operation::Pull, settings).await
    }

    pub async fn push(&self, settings: &SyncSettings) -> SyncReport {
        self.run(Operation::Push, settings).await
    }

    pub async fn status(&self, settings: &SyncSettings) -> SyncReport {
        self.run(Operation::Status, settings).await
    }

    fn lock_for(&self, settings: &SyncSettings) -> Arc<tokio::sync::Mutex<()>> {
        let key = (settings.project_id().to_string(), settings.view_id().to_string());
        self.locks.lock().entry(key).or_default().clone()
    }

    async fn run(&self, operation: Operation, settings: &SyncSettings) -> SyncReport {
        if !self.is_running() {
            warn!("Rejected {}: sync service is stopped", operation);
            return SyncReport::fatal(operation, &SyncError::ServiceStopped);
        }

        let lock = self.lock_for(settings);
        let _guard = lock.lock().await;
        if !self.is_running() {
            return SyncReport::fatal(operation, &SyncError::ServiceStopped);
        }
        debug!("Acquired session lock for {}/{}", settings.project_id(), settings.view_id());

        match operation {
            Operation::Pull => self.commands.pull(settings).await,
            Operation::Push => self.commands.push(settings).await,
            Operation::Status => self.commands.status(settings).await,
        }
    }
}

/// Command providers registered by name
#[derive(Default)]
pub struct CommandRegistry {
    providers: RwLock<BTreeMap<String, Arc<dyn SyncCommands>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, returning the one it replaced
    pub fn register(&self, provider: Arc<dyn SyncCommands>) -> Option<Arc<dyn SyncCommands>> {
        let name = provider.name().to_string();
        debug!("Registering command provider '{}'", name);
        self.providers.write().insert(name, provider)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SyncCommands>> {
        self.providers.read().get(name).cloned()
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn SyncCommands>> {
        self.providers.write().remove(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }
}
