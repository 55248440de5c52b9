/*!
 * Integration tests for the command surface, service lifecycle and registry
 */

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use gridsync::commands::{CommandRegistry, CommandSurface, SyncCommands, SyncService};
use gridsync::errors::{ReasonCode, WireError};
use gridsync::model::{Operation, Outcome, SyncReport};
use gridsync::text_source::MemoryTextSource;
use gridsync::wire::MockGridClient;
use gridsync::{CancellationToken, SyncSettings};

use crate::common::{create_temp_dir, grid_record, settings_with, test_settings, unsynced_entries};

fn surface(grid: &MockGridClient, source: &MemoryTextSource) -> CommandSurface {
    CommandSurface::with_backends(Arc::new(grid.clone()), Arc::new(source.clone()))
}

/// Provider that answers every call with an empty successful report
struct StaticCommands {
    name: String,
    cancel: CancellationToken,
}

impl StaticCommands {
    fn named(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            cancel: CancellationToken::new(),
        })
    }

    fn report(operation: Operation) -> SyncReport {
        let mut report = SyncReport::new(operation, Uuid::new_v4());
        report.finish();
        report
    }
}

#[async_trait]
impl SyncCommands for StaticCommands {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pull(&self, _settings: &SyncSettings) -> SyncReport {
        Self::report(Operation::Pull)
    }

    async fn push(&self, _settings: &SyncSettings) -> SyncReport {
        Self::report(Operation::Push)
    }

    async fn status(&self, _settings: &SyncSettings) -> SyncReport {
        Self::report(Operation::Status)
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[tokio::test]
async fn test_surface_run_withEachOperation_shouldDispatch() {
    let grid = MockGridClient::working().with_records(vec![grid_record("k", "Hi", &[("frFR", "Salut")])]);
    let source = MemoryTextSource::default();
    let surface = surface(&grid, &source);
    let settings = test_settings();

    let status = surface.run(Operation::Status, &settings).await;
    assert!(status.dry_run);
    assert_eq!(status.created, 2);
    assert!(source.entries().is_empty());

    let pull = surface.pull(&settings).await;
    assert_eq!(pull.operation, Operation::Pull);
    assert_eq!(pull.created, 2);

    let push = surface.push(&settings).await;
    assert_eq!(push.batches_total, 0);
}

#[tokio::test]
async fn test_check_connection_withMockBackends_shouldReportAuth() {
    let source = MemoryTextSource::default();

    assert!(surface(&MockGridClient::working(), &source)
        .check_connection(&test_settings())
        .await
        .is_ok());

    let result = surface(&MockGridClient::failing_auth(), &source)
        .check_connection(&test_settings())
        .await;
    assert!(matches!(result, Err(WireError::Auth(_))));
}

#[tokio::test]
async fn test_export_po_withMemoryStore_shouldWriteFile() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let output = temp_dir.path().join("fr.po");
    let grid = MockGridClient::working().with_records(vec![grid_record("k", "Hi", &[("frFR", "Salut")])]);
    let source = MemoryTextSource::default();
    let surface = surface(&grid, &source);
    surface.pull(&test_settings()).await;

    let written = surface.export_po(&test_settings(), "fr-FR", &output).await?;

    assert_eq!(written, 1);
    assert!(std::fs::read_to_string(&output)?.contains("msgstr \"Salut\""));
    Ok(())
}

/// Test the service lifecycle: stopped, started, stopped again
#[tokio::test]
async fn test_service_withLifecycle_shouldOnlyRunWhileStarted() {
    let grid = MockGridClient::working();
    let source = MemoryTextSource::new(unsynced_entries(2));
    let commands = Arc::new(surface(&grid, &source));
    let service = SyncService::new(commands.clone());
    let settings = test_settings();

    let refused = service.push(&settings).await;
    assert_eq!(refused.outcome, Outcome::Fatal);
    assert_eq!(refused.fatal.unwrap().reason, ReasonCode::ServiceStopped);
    assert_eq!(grid.upsert_count(), 0);

    service.start();
    assert!(service.is_running());
    let report = service.push(&settings).await;
    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.created, 2);

    service.stop();
    assert!(!service.is_running());
    assert!(commands.cancellation().is_cancelled());
    let after_stop = service.status(&settings).await;
    assert_eq!(after_stop.fatal.unwrap().reason, ReasonCode::ServiceStopped);

    service.start();
    assert!(!commands.cancellation().is_cancelled());
    assert!(service.status(&settings).await.fatal.is_none());
}

/// Two sessions for the same project and view run one after the other
#[tokio::test]
async fn test_service_withConcurrentPushes_shouldSerializeSamePair() {
    let grid = MockGridClient::working();
    let source = MemoryTextSource::new(unsynced_entries(4));
    let service = Arc::new(SyncService::new(Arc::new(surface(&grid, &source))));
    service.start();
    let settings = test_settings();

    let first = {
        let service = service.clone();
        let settings = settings.clone();
        tokio::spawn(async move { service.push(&settings).await })
    };
    let second = {
        let service = service.clone();
        let settings = settings.clone();
        tokio::spawn(async move { service.push(&settings).await })
    };
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    // whichever ran second found nothing left to push
    assert_eq!(first.created + second.created, 4);
    assert_eq!(grid.upsert_count(), 1);
}

#[tokio::test]
async fn test_service_withDifferentViews_shouldRunBoth() {
    let grid = MockGridClient::working().with_records(vec![grid_record("k", "Hi", &[])]);
    let service = SyncService::new(Arc::new(surface(&grid, &MemoryTextSource::default())));
    service.start();

    let view_a = settings_with(|c| c.view_id = "view-a".to_string());
    let view_b = settings_with(|c| c.view_id = "view-b".to_string());
    let (a, b) = tokio::join!(service.status(&view_a), service.status(&view_b));

    assert!(a.fatal.is_none());
    assert!(b.fatal.is_none());
}

#[test]
fn test_registry_withSeveralProviders_shouldLookUpByName() {
    let registry = CommandRegistry::new();
    assert!(registry.register(StaticCommands::named("zeta")).is_none());
    assert!(registry.register(StaticCommands::named("alpha")).is_none());

    assert_eq!(registry.names(), vec!["alpha".to_string(), "zeta".to_string()]);
    assert!(registry.get("missing").is_none());

    let replaced = registry.register(StaticCommands::named("alpha"));
    assert_eq!(replaced.unwrap().name(), "alpha");
    assert_eq!(registry.names().len(), 2);

    assert!(registry.unregister("zeta").is_some());
    assert_eq!(registry.names(), vec!["alpha".to_string()]);
}

#[test]
fn test_registry_withRegisteredProvider_shouldServeCalls() {
    let registry = CommandRegistry::new();
    registry.register(StaticCommands::named("static"));

    let provider = registry.get("static").unwrap();
    let report = tokio_test::block_on(async { provider.status(&test_settings()).await });
    assert_eq!(report.operation, Operation::Status);
    assert_eq!(report.outcome, Outcome::Success);
}
