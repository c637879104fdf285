//! Start/stop lifecycle for the scheduler store.
//!
//! [`SchedulerStoreService`] owns the storage handle and the snapshot
//! provider, and runs index provisioning as a single background task:
//!
//! - `start` spawns the task and returns a channel on which provisioning
//!   failures are reported. The channel closes when the task finishes.
//! - `stop` cancels the task and waits for it to exit before returning.
//!
//! Dependencies are passed to [`SchedulerStoreService::new`]; there is no
//! global registry.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, ServiceConfig};
use crate::constants::SERVICE_NAME;
use crate::error::ServiceError;
use crate::provider::{PeriodicTaskConfigProvider, StorageConfigProvider};
use crate::store::generic::GenericTaskStorage;
use crate::store::{DocumentBackend, PeriodicTaskStorage};

/// Lifecycle manager exposing storage and snapshot capabilities.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use periodic_tasks::config::ServiceConfig;
/// use periodic_tasks::service::SchedulerStoreService;
/// use periodic_tasks::store::memory::InMemoryTaskStorage;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let storage = Arc::new(InMemoryTaskStorage::new());
/// let mut service = SchedulerStoreService::new(storage, ServiceConfig::default()).unwrap();
///
/// let mut errors = service.start();
/// // The channel closes once provisioning finished without error.
/// assert!(errors.recv().await.is_none());
///
/// service.stop().await.unwrap();
/// # }
/// ```
pub struct SchedulerStoreService {
    storage: Arc<dyn PeriodicTaskStorage>,
    provider: Arc<StorageConfigProvider>,
    config: ServiceConfig,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SchedulerStoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerStoreService")
            .field("config", &self.config)
            .field("started", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl SchedulerStoreService {
    /// Creates a stopped service over storage built elsewhere.
    ///
    /// Only the paging settings of `config` apply here; `collection` and
    /// `index_timeout_ms` are whatever `storage` was built with. Use
    /// [`with_backend`](Self::with_backend) to have them applied.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `config` fails [`ServiceConfig::validate`].
    pub fn new(
        storage: Arc<dyn PeriodicTaskStorage>,
        config: ServiceConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let provider = StorageConfigProvider::new(Arc::clone(&storage))
            .with_config(config.provider_config())?;
        Ok(Self {
            storage,
            provider: Arc::new(provider),
            config,
            cancel: CancellationToken::new(),
            handle: None,
        })
    }

    /// Creates a stopped service whose storage is built from `backend` and
    /// [`ServiceConfig::storage_config`].
    ///
    /// The backend is bound to `config.collection` (for Redis this is the
    /// key prefix) and index provisioning is bounded by
    /// `config.index_timeout_ms`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `config` fails [`ServiceConfig::validate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use periodic_tasks::config::ServiceConfig;
    /// use periodic_tasks::service::SchedulerStoreService;
    /// use periodic_tasks::store::memory::InMemoryBackend;
    ///
    /// let config = ServiceConfig {
    ///     collection: "jobs".to_string(),
    ///     ..ServiceConfig::default()
    /// };
    /// let service = SchedulerStoreService::with_backend(InMemoryBackend::new(), config).unwrap();
    /// assert_eq!(service.config().collection, "jobs");
    /// ```
    pub fn with_backend<B>(backend: B, config: ServiceConfig) -> Result<Self, ConfigError>
    where
        B: DocumentBackend + 'static,
    {
        config.validate()?;
        let storage = GenericTaskStorage::new(backend.for_collection(&config.collection))
            .with_config(config.storage_config());
        Self::new(Arc::new(storage), config)
    }

    /// Spawns background index provisioning.
    ///
    /// The returned receiver yields [`ServiceError::IndexProvisioning`] if
    /// provisioning fails and is closed once the background task exits.
    /// Calling `start` while a background task is still owned by the service
    /// yields [`ServiceError::AlreadyStarted`] instead.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> mpsc::Receiver<ServiceError> {
        let (tx, rx) = mpsc::channel(1);

        if self.handle.is_some() {
            tracing::warn!(service = SERVICE_NAME, "start called on a running service");
            // Capacity 1 on a fresh channel: this cannot be full.
            let _ = tx.try_send(ServiceError::AlreadyStarted);
            return rx;
        }

        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        let storage = Arc::clone(&self.storage);
        let token = self.cancel.child_token();
        self.handle = Some(tokio::spawn(async move {
            match storage.provision_indexes(token).await {
                Ok(()) => tracing::debug!(service = SERVICE_NAME, "index provisioning finished"),
                Err(e) => {
                    tracing::warn!(service = SERVICE_NAME, error = %e, "index provisioning failed");
                    // The host may have dropped the receiver; nothing else to do then.
                    let _ = tx.send(ServiceError::IndexProvisioning(e)).await;
                },
            }
        }));

        tracing::info!(
            service = SERVICE_NAME,
            collection = %self.config.collection,
            "scheduler store service started"
        );
        rx
    }

    /// Cancels background work and waits for it to finish.
    ///
    /// A no-op on a service that was never started.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Join`] if the background task panicked.
    pub async fn stop(&mut self) -> Result<(), ServiceError> {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let joined = handle.await;
        tracing::info!(service = SERVICE_NAME, "scheduler store service stopped");
        joined.map_err(|e| ServiceError::Join(e.to_string()))
    }

    /// Returns `true` while a background task is owned by the service.
    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// The storage capability.
    pub fn storage(&self) -> Arc<dyn PeriodicTaskStorage> {
        Arc::clone(&self.storage)
    }

    /// The snapshot capability.
    pub fn config_provider(&self) -> Arc<dyn PeriodicTaskConfigProvider> {
        Arc::clone(&self.provider) as Arc<dyn PeriodicTaskConfigProvider>
    }

    /// The configuration this service was built with.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Service name reported to the host.
    pub fn name(&self) -> &'static str {
        SERVICE_NAME
    }
}

impl Drop for SchedulerStoreService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
