//! Lifecycle tests for `SchedulerStoreService`.
//!
//! A scripted storage controls how index provisioning behaves: finish,
//! fail, panic, or block until cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use periodic_tasks::config::ServiceConfig;
use periodic_tasks::provider::PeriodicTaskConfigProvider;
use periodic_tasks::service::SchedulerStoreService;
use periodic_tasks::store::backend::{FindOptions, IndexModel, UpsertOutcome};
use periodic_tasks::store::memory::{InMemoryBackend, InMemoryTaskStorage};
use periodic_tasks::store::{
    Criteria, Document, DocumentBackend, Filter, PeriodicTaskStorage, StorageError,
};
use periodic_tasks::{PeriodicTask, PeriodicTaskError, ServiceError, LOOKUP_INDEX_NAME};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provisioning {
    Fail,
    Panic,
    BlockUntilCancelled,
}

struct ScriptedStorage {
    inner: InMemoryTaskStorage,
    provisioning: Provisioning,
    finished: AtomicBool,
}

impl ScriptedStorage {
    fn new(provisioning: Provisioning) -> Self {
        Self {
            inner: InMemoryTaskStorage::new(),
            provisioning,
            finished: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PeriodicTaskStorage for ScriptedStorage {
    async fn find(&self, criteria: &Criteria) -> Result<Vec<PeriodicTask>, PeriodicTaskError> {
        self.inner.find(criteria).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, PeriodicTaskError> {
        self.inner.count(filter).await
    }

    async fn find_by_id(&self, id: &str) -> Result<PeriodicTask, PeriodicTaskError> {
        self.inner.find_by_id(id).await
    }

    async fn save(&self, task: &mut PeriodicTask) -> Result<(), PeriodicTaskError> {
        self.inner.save(task).await
    }

    async fn delete(&self, id: &str) -> Result<(), PeriodicTaskError> {
        self.inner.delete(id).await
    }

    async fn provision_indexes(&self, cancel: CancellationToken) -> Result<(), PeriodicTaskError> {
        match self.provisioning {
            Provisioning::Fail => Err(StorageError::Backend {
                message: "not authorized to create index".to_string(),
                source: None,
            }
            .into()),
            Provisioning::Panic => panic!("driver exploded"),
            Provisioning::BlockUntilCancelled => {
                cancel.cancelled().await;
                // Cleanup that must complete before stop() returns.
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.finished.store(true, Ordering::SeqCst);
                Ok(())
            },
        }
    }
}

fn service_over(storage: Arc<dyn PeriodicTaskStorage>) -> SchedulerStoreService {
    SchedulerStoreService::new(storage, ServiceConfig::default()).unwrap()
}

#[tokio::test]
async fn test_start_provisions_lookup_index() {
    let storage = Arc::new(InMemoryTaskStorage::new());
    let mut service = service_over(Arc::clone(&storage) as Arc<dyn PeriodicTaskStorage>);

    let mut errors = service.start();
    assert!(errors.recv().await.is_none());
    service.stop().await.unwrap();

    assert_eq!(storage.backend().index_names(), vec![LOOKUP_INDEX_NAME]);
}

#[tokio::test]
async fn test_provisioning_failure_is_reported() {
    let mut service = service_over(Arc::new(ScriptedStorage::new(Provisioning::Fail)));

    let mut errors = service.start();
    let err = errors.recv().await.expect("failure should be reported");
    assert!(matches!(err, ServiceError::IndexProvisioning(_)));
    assert!(err.to_string().contains("not authorized"));
    assert!(errors.recv().await.is_none());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_waits_for_background_task() {
    let storage = Arc::new(ScriptedStorage::new(Provisioning::BlockUntilCancelled));
    let mut service = service_over(Arc::clone(&storage) as Arc<dyn PeriodicTaskStorage>);

    let mut errors = service.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!storage.finished.load(Ordering::SeqCst));

    service.stop().await.unwrap();
    assert!(storage.finished.load(Ordering::SeqCst));
    // Cancellation is not an error.
    assert!(errors.recv().await.is_none());
}

#[tokio::test]
async fn test_panicking_background_task_reports_join_error() {
    let mut service = service_over(Arc::new(ScriptedStorage::new(Provisioning::Panic)));

    let _errors = service.start();
    let err = service.stop().await.unwrap_err();
    assert!(matches!(err, ServiceError::Join(_)), "got: {err:?}");
    assert!(!service.is_started());
}

#[tokio::test]
async fn test_second_start_while_running_is_rejected() {
    let mut service = service_over(Arc::new(ScriptedStorage::new(
        Provisioning::BlockUntilCancelled,
    )));

    let _first = service.start();
    let mut second = service.start();
    assert!(matches!(
        second.recv().await,
        Some(ServiceError::AlreadyStarted)
    ));
    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_capabilities_share_one_storage() {
    let mut service = service_over(Arc::new(InMemoryTaskStorage::new()));
    let storage = service.storage();
    let provider = service.config_provider();

    let mut task = PeriodicTask::new("t1", "0 * * * *", "sync").with_enabled(true);
    storage.save(&mut task).await.unwrap();

    let configs = provider.get_configs().await.unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].cronspec, "0 * * * *");
    assert_eq!(service.name(), "scheduler_store_provider");

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_service_uses_configured_page_size() {
    let config = ServiceConfig {
        page_size: 3,
        ..ServiceConfig::default()
    };
    let storage: Arc<dyn PeriodicTaskStorage> = Arc::new(InMemoryTaskStorage::new());
    for i in 0..7 {
        let mut task = PeriodicTask::new(format!("t{i}"), "@hourly", "job").with_enabled(true);
        storage.save(&mut task).await.unwrap();
    }
    let service = SchedulerStoreService::new(storage, config).unwrap();
    assert_eq!(service.config().page_size, 3);
    assert_eq!(
        service.config_provider().get_configs().await.unwrap().len(),
        7
    );
}

/// Backend whose index creation never completes and which remembers the
/// collection it was bound to.
#[derive(Default)]
struct StalledBackend {
    inner: InMemoryBackend,
    collection: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl DocumentBackend for StalledBackend {
    async fn find(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StorageError> {
        self.inner.find(filter, options).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StorageError> {
        self.inner.count(filter).await
    }

    async fn find_one(&self, id: &str) -> Result<Option<Document>, StorageError> {
        self.inner.find_one(id).await
    }

    async fn upsert(
        &self,
        id: &str,
        set: Document,
        set_on_insert: Document,
    ) -> Result<UpsertOutcome, StorageError> {
        self.inner.upsert(id, set, set_on_insert).await
    }

    async fn delete_one(&self, id: &str) -> Result<bool, StorageError> {
        self.inner.delete_one(id).await
    }

    async fn create_index(&self, _index: &IndexModel) -> Result<String, StorageError> {
        std::future::pending().await
    }

    fn for_collection(self, collection: &str) -> Self {
        *self.collection.lock().unwrap() = Some(collection.to_string());
        self
    }
}

#[tokio::test]
async fn test_configured_index_timeout_fires() {
    let config = ServiceConfig {
        index_timeout_ms: 20,
        ..ServiceConfig::default()
    };
    let mut service = SchedulerStoreService::with_backend(StalledBackend::default(), config).unwrap();

    let mut errors = service.start();
    let err = tokio::time::timeout(Duration::from_secs(2), errors.recv())
        .await
        .expect("configured timeout should fire well before the default")
        .expect("timeout should be reported");
    assert!(matches!(err, ServiceError::IndexProvisioning(_)));
    assert!(err.to_string().contains("timed out after 20ms"), "got: {err}");

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_configured_collection_binds_backend() {
    let backend = StalledBackend::default();
    let bound = Arc::clone(&backend.collection);
    let config = ServiceConfig {
        collection: "jobs".to_string(),
        ..ServiceConfig::default()
    };
    let service = SchedulerStoreService::with_backend(backend, config).unwrap();

    assert_eq!(bound.lock().unwrap().as_deref(), Some("jobs"));

    let storage = service.storage();
    let mut task = PeriodicTask::new("t1", "@hourly", "job").with_enabled(true);
    storage.save(&mut task).await.unwrap();
    assert_eq!(service.config_provider().get_configs().await.unwrap().len(), 1);
}
