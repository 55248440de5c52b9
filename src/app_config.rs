use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use url::Url;

use crate::culture::{cultures_match, normalize_culture, CultureConverter};
use crate::errors::ConfigError;
use crate::mapper::ColumnLayout;

/// Application configuration module
/// This module handles loading, validating and saving the sync configuration,
/// and turning it into the immutable `SyncSettings` used by the engine.
/// Represents the configuration file
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// API key for the grid service
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Project identifier
    #[serde(default = "String::new")]
    pub project_id: String,

    /// View identifier; push always targets this view
    #[serde(default = "String::new")]
    pub view_id: String,

    /// Views pull and status read from, merged in order (empty means `view_id`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_view_ids: Vec<String>,

    /// Service base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// How pull resolves entries changed on both sides
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Records per upsert request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Records per fetched page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Cultures taking part in the sync (empty means all)
    #[serde(default)]
    pub cultures: Vec<String>,

    /// Local JSON store
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Whether push sends translations or only source texts
    #[serde(default = "default_include_targets")]
    pub include_targets: bool,

    /// Column layout of the view
    #[serde(default)]
    pub columns: ColumnConfig,

    /// Timeouts, retries and throttling
    #[serde(default)]
    pub network: NetworkConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Pull conflict resolution policy
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    // @policy: Remote text replaces local text
    #[default]
    RemoteWins,
    // @policy: Local text is kept and pushed later
    LocalWins,
    // @policy: Neither side changes, the conflict is reported
    Skip,
}

impl ConflictPolicy {
    // @returns: Human readable policy name
    pub fn display_name(&self) -> &str {
        match self {
            Self::RemoteWins => "Remote wins",
            Self::LocalWins => "Local wins",
            Self::Skip => "Skip",
        }
    }
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RemoteWins => "remote-wins",
            Self::LocalWins => "local-wins",
            Self::Skip => "skip",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "remote-wins" | "remote" => Ok(Self::RemoteWins),
            "local-wins" | "local" => Ok(Self::LocalWins),
            "skip" => Ok(Self::Skip),
            _ => Err(anyhow!("Invalid conflict policy: {}", s)),
        }
    }
}

/// Column layout of the view
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ColumnConfig {
    // @field: Prefix of the native-culture column
    #[serde(default = "default_source_prefix")]
    pub source_prefix: String,

    // @field: Prefix of translation columns
    #[serde(default = "default_target_prefix")]
    pub target_prefix: String,

    // @field: Namespace column; "path" uses the record path, empty disables
    #[serde(default = "default_namespace_column")]
    pub namespace_column: String,

    // @field: Comment/context column, empty disables
    #[serde(default = "String::new")]
    pub comment_column: String,

    // @field: Max length column, empty disables
    #[serde(default = "String::new")]
    pub max_length_column: String,

    // @field: Tags column, empty disables
    #[serde(default = "String::new")]
    pub tags_column: String,

    // @field: Record ids are "namespace,key"; disables the namespace column
    #[serde(default)]
    pub combined_namespace_key: bool,

    // @field: Canonical culture -> grid culture overrides
    #[serde(default)]
    pub culture_mapping: BTreeMap<String, String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            source_prefix: default_source_prefix(),
            target_prefix: default_target_prefix(),
            namespace_column: default_namespace_column(),
            comment_column: String::new(),
            max_length_column: String::new(),
            tags_column: String::new(),
            combined_namespace_key: false,
            culture_mapping: BTreeMap::new(),
        }
    }
}

/// Network tuning
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    // @field: Request timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Extra attempts for retryable failures
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    // @field: Base backoff, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    // @field: Backoff ceiling
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    // @field: Minimum delay between requests
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

pub const MAX_BATCH_SIZE: usize = 1000;
pub const DEFAULT_CONFIG_FILE: &str = "gridsync.json";

fn default_base_url() -> String {
    "https://api.gridly.com".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_page_size() -> usize {
    1000 // service maximum
}

fn default_local_path() -> String {
    "localization.json".to_string()
}

fn default_include_targets() -> bool {
    true
}

fn default_source_prefix() -> String {
    "src_".to_string()
}

fn default_target_prefix() -> String {
    "tg_".to_string()
}

fn default_namespace_column() -> String {
    "path".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_rate_limit_delay_ms() -> u64 {
    200
}

impl Config {
    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .context(format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        std::fs::write(path, json)
            .context(format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Config file to use when none is given: `./gridsync.json`, then the user config dir
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("gridsync").join(DEFAULT_CONFIG_FILE))
            .filter(|p| p.exists())
            .unwrap_or(local)
    }

    pub fn validate(&self) -> Result<()> {
        SyncSettings::from_config(self)?;
        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: String::new(),
            project_id: String::new(),
            view_id: String::new(),
            import_view_ids: Vec::new(),
            base_url: default_base_url(),
            conflict_policy: ConflictPolicy::default(),
            batch_size: default_batch_size(),
            page_size: default_page_size(),
            cultures: Vec::new(),
            local_path: default_local_path(),
            include_targets: default_include_targets(),
            columns: ColumnConfig::default(),
            network: NetworkConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

/// Validated, immutable options for one project/view
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    api_key: String,
    project_id: String,
    view_id: String,
    import_view_ids: Vec<String>,
    base_url: Url,
    conflict_policy: ConflictPolicy,
    batch_size: usize,
    page_size: usize,
    cultures: Vec<String>,
    local_path: PathBuf,
    include_targets: bool,
    layout: ColumnLayout,
    converter: CultureConverter,
    network: NetworkConfig,
}

impl SyncSettings {
    /// Validate a configuration and freeze it
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        let api_key = required("api_key", &config.api_key)?;
        let project_id = required("project_id", &config.project_id)?;
        let view_id = required("view_id", &config.view_id)?;

        let mut import_view_ids: Vec<String> = Vec::with_capacity(config.import_view_ids.len().max(1));
        for view in config.import_view_ids.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
            if !import_view_ids.iter().any(|v| v == view) {
                import_view_ids.push(view.to_string());
            }
        }
        if import_view_ids.is_empty() {
            import_view_ids.push(view_id.clone());
        }

        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| ConfigError::invalid("base_url", e.to_string()))?;
        if base_url.scheme() != "https" && base_url.scheme() != "http" {
            return Err(ConfigError::invalid("base_url", "scheme must be http or https"));
        }

        check_range("batch_size", config.batch_size)?;
        check_range("page_size", config.page_size)?;

        let mut cultures = Vec::with_capacity(config.cultures.len());
        for culture in &config.cultures {
            let canonical = normalize_culture(culture)
                .ok_or_else(|| ConfigError::invalid("cultures", format!("'{}' is not a valid culture", culture)))?;
            if !cultures.contains(&canonical) {
                cultures.push(canonical);
            }
        }

        if config.local_path.trim().is_empty() {
            return Err(ConfigError::Missing("local_path".to_string()));
        }

        let layout = ColumnLayout::from_config(&config.columns)?;
        let converter = CultureConverter::with_mapping(&config.columns.culture_mapping)?;

        let network = config.network;
        if network.timeout_secs == 0 {
            return Err(ConfigError::invalid("network.timeout_secs", "must be greater than zero"));
        }
        if network.retry_count > 10 {
            return Err(ConfigError::invalid("network.retry_count", "must be at most 10"));
        }
        if network.max_backoff_ms < network.retry_backoff_ms {
            return Err(ConfigError::invalid(
                "network.max_backoff_ms",
                "must not be lower than retry_backoff_ms",
            ));
        }

        Ok(Self {
            api_key,
            project_id,
            view_id,
            import_view_ids,
            base_url,
            conflict_policy: config.conflict_policy,
            batch_size: config.batch_size,
            page_size: config.page_size,
            cultures,
            local_path: PathBuf::from(config.local_path.trim()),
            include_targets: config.include_targets,
            layout,
            converter,
            network,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    /// Views pull reads from, in merge order
    pub fn import_view_ids(&self) -> &[String] {
        &self.import_view_ids
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cultures(&self) -> &[String] {
        &self.cultures
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn include_targets(&self) -> bool {
        self.include_targets
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn converter(&self) -> &CultureConverter {
        &self.converter
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Whether a culture passes the culture filter, in any spelling
    pub fn includes_culture(&self, culture: &str) -> bool {
        self.cultures.is_empty() || self.cultures.iter().any(|c| cultures_match(c, culture))
    }
}

fn required(field: &str, value: &str) -> std::result::Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(field.to_string()));
    }
    Ok(value.to_string())
}

fn check_range(field: &str, value: usize) -> std::result::Result<(), ConfigError> {
    if value == 0 || value > MAX_BATCH_SIZE {
        return Err(ConfigError::invalid(
            field,
            format!("must be between 1 and {}, got {}", MAX_BATCH_SIZE, value),
        ));
    }
    Ok(())
}
