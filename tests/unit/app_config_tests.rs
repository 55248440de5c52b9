/*!
 * Tests for configuration loading and settings validation
 */

use std::str::FromStr;

use gridsync::app_config::{Config, ConflictPolicy, LogLevel, MAX_BATCH_SIZE};
use gridsync::errors::ConfigError;
use gridsync::SyncSettings;

use crate::common::{create_temp_dir, settings_with, test_config};

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.base_url, "https://api.gridly.com");
    assert_eq!(config.conflict_policy, ConflictPolicy::RemoteWins);
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.page_size, 1000);
    assert_eq!(config.local_path, "localization.json");
    assert_eq!(config.columns.source_prefix, "src_");
    assert_eq!(config.columns.target_prefix, "tg_");
    assert_eq!(config.network.retry_count, 3);
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Defaults alone are missing the credentials and identifiers
#[test]
fn test_validate_withDefaultConfig_shouldRequireCredentials() {
    assert!(Config::default().validate().is_err());
    assert!(test_config().validate().is_ok());

    let mut config = test_config();
    config.api_key = "   ".to_string();
    assert!(matches!(
        SyncSettings::from_config(&config),
        Err(ConfigError::Missing(field)) if field == "api_key"
    ));
}

#[test]
fn test_from_config_withOutOfRangeBatchSize_shouldFail() {
    let mut config = test_config();
    config.batch_size = 0;
    assert!(SyncSettings::from_config(&config).is_err());

    config.batch_size = MAX_BATCH_SIZE + 1;
    assert!(SyncSettings::from_config(&config).is_err());

    config.batch_size = MAX_BATCH_SIZE;
    assert!(SyncSettings::from_config(&config).is_ok());
}

#[test]
fn test_from_config_withMixedCaseCultures_shouldNormalizeAndDedupe() {
    let settings = settings_with(|c| {
        c.cultures = vec!["fr_fr".to_string(), "FR-FR".to_string(), "de".to_string()];
    });

    assert_eq!(settings.cultures(), &["fr-FR".to_string(), "de".to_string()]);
    assert!(settings.includes_culture("fr-FR"));
    assert!(!settings.includes_culture("es-ES"));
}

#[test]
fn test_from_config_withInvalidCulture_shouldFail() {
    let mut config = test_config();
    config.cultures = vec!["not a culture".to_string()];
    assert!(SyncSettings::from_config(&config).is_err());
}

#[test]
fn test_includes_culture_withNoFilter_shouldAcceptEverything() {
    let settings = settings_with(|_| {});
    assert!(settings.includes_culture("ja-JP"));
}

#[test]
fn test_from_config_withBaseUrlWithoutSlash_shouldAppendOne() {
    let settings = settings_with(|c| c.base_url = "https://grid.example.com/api".to_string());
    assert_eq!(settings.base_url().as_str(), "https://grid.example.com/api/");

    let mut config = test_config();
    config.base_url = "ftp://grid.example.com".to_string();
    assert!(SyncSettings::from_config(&config).is_err());
}

#[test]
fn test_from_config_withOverlappingPrefixes_shouldFail() {
    let mut config = test_config();
    config.columns.target_prefix = "src_".to_string();
    assert!(SyncSettings::from_config(&config).is_err());

    config.columns.target_prefix = "src_tg_".to_string();
    assert!(SyncSettings::from_config(&config).is_err());
}

#[test]
fn test_from_config_withBadNetworkSettings_shouldFail() {
    let mut config = test_config();
    config.network.timeout_secs = 0;
    assert!(SyncSettings::from_config(&config).is_err());

    let mut config = test_config();
    config.network.retry_count = 11;
    assert!(SyncSettings::from_config(&config).is_err());

    let mut config = test_config();
    config.network.max_backoff_ms = 10;
    config.network.retry_backoff_ms = 100;
    assert!(SyncSettings::from_config(&config).is_err());
}

#[test]
fn test_conflict_policy_fromStr_withVariants_shouldParse() {
    assert_eq!(ConflictPolicy::from_str("remote-wins").unwrap(), ConflictPolicy::RemoteWins);
    assert_eq!(ConflictPolicy::from_str("LOCAL_WINS").unwrap(), ConflictPolicy::LocalWins);
    assert_eq!(ConflictPolicy::from_str("local").unwrap(), ConflictPolicy::LocalWins);
    assert_eq!(ConflictPolicy::from_str("skip").unwrap(), ConflictPolicy::Skip);
    assert!(ConflictPolicy::from_str("merge").is_err());
    assert_eq!(ConflictPolicy::LocalWins.to_string(), "local-wins");
    assert_eq!(ConflictPolicy::Skip.display_name(), "Skip");
}

/// Test saving and loading configuration
#[test]
fn test_save_and_load_withTempFile_shouldPreserveValues() -> anyhow::Result<()> {
    let temp_dir = create_temp_dir()?;
    let path = temp_dir.path().join("nested").join("gridsync.json");

    let mut config = test_config();
    config.conflict_policy = ConflictPolicy::Skip;
    config.cultures = vec!["fr-FR".to_string()];
    config.columns.culture_mapping.insert("zh-Hans".to_string(), "zhCN".to_string());
    config.save(&path)?;

    let loaded = Config::from_file(&path)?;
    assert_eq!(loaded.project_id, "proj");
    assert_eq!(loaded.conflict_policy, ConflictPolicy::Skip);
    assert_eq!(loaded.cultures, vec!["fr-FR".to_string()]);
    assert_eq!(loaded.columns, config.columns);
    Ok(())
}

#[test]
fn test_deserialize_withPartialJson_shouldFillDefaults() {
    let json = r#"{
        "api_key": "k",
        "project_id": "p",
        "view_id": "v",
        "conflict_policy": "local-wins",
        "network": { "retry_count": 5 }
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.conflict_policy, ConflictPolicy::LocalWins);
    assert_eq!(config.network.retry_count, 5);
    assert_eq!(config.network.timeout_secs, 30);
    assert_eq!(config.batch_size, 100);
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_file_withMissingFile_shouldFail() -> anyhow::Result<()> {
    let temp_dir = create_temp_dir()?;
    assert!(Config::from_file(temp_dir.path().join("absent.json")).is_err());
    Ok(())
}
