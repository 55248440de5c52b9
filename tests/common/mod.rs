/*!
 * Common test utilities for the gridsync test suite
 */

use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;

use gridsync::app_config::{Config, NetworkConfig};
use gridsync::model::{GridCell, GridRecord, LocalizationEntry};
use gridsync::text_source::MemoryTextSource;
use gridsync::wire::MockGridClient;
use gridsync::{SyncEngine, SyncSettings};

/// Route library logs to the test output; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// A valid configuration for project `proj` and view `view`
pub fn test_config() -> Config {
    Config {
        api_key: "test-key".to_string(),
        project_id: "proj".to_string(),
        view_id: "view".to_string(),
        ..Config::default()
    }
}

pub fn test_settings() -> SyncSettings {
    settings_with(|_| {})
}

/// Valid settings after applying `adjust` to the test configuration
pub fn settings_with(adjust: impl FnOnce(&mut Config)) -> SyncSettings {
    let mut config = test_config();
    adjust(&mut config);
    SyncSettings::from_config(&config).expect("test settings should validate")
}

/// Network settings that keep HTTP tests fast
pub fn fast_network() -> NetworkConfig {
    NetworkConfig {
        timeout_secs: 5,
        retry_count: 2,
        retry_backoff_ms: 1,
        max_backoff_ms: 5,
        rate_limit_delay_ms: 0,
    }
}

/// A record with an English source column and the given translations
pub fn grid_record(key: &str, source: &str, translations: &[(&str, &str)]) -> GridRecord {
    let mut record = GridRecord::new(key).with_cell(GridCell::text("src_enUS", source));
    for (grid_culture, text) in translations {
        record = record.with_cell(GridCell::text(format!("tg_{}", grid_culture), *text));
    }
    record
}

/// `count` records `key0..`, each with only a source column
pub fn numbered_records(count: usize) -> Vec<GridRecord> {
    (0..count)
        .map(|i| grid_record(&format!("key{}", i), &format!("Text {}", i), &[]))
        .collect()
}

/// `count` unsynced French entries `key0..`
pub fn unsynced_entries(count: usize) -> Vec<LocalizationEntry> {
    (0..count)
        .map(|i| LocalizationEntry::new(format!("key{}", i), "fr-FR", format!("Texte {}", i)))
        .collect()
}

/// An entry whose baseline is `synced_text` but whose current text is `text`
pub fn edited_entry(key: &str, culture: &str, synced_text: &str, text: &str) -> LocalizationEntry {
    let mut entry = LocalizationEntry::new(key, culture, synced_text).synced();
    entry.text = text.to_string();
    entry
}

/// Engine wired to a mock grid and an in-memory store
pub fn engine(grid: &MockGridClient, source: &MemoryTextSource, settings: SyncSettings) -> SyncEngine {
    SyncEngine::new(Arc::new(grid.clone()), Arc::new(source.clone()), settings)
}
