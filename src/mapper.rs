/*!
 * Conversion between grid records and localization entries.
 *
 * A record holds one key; each culture column becomes one entry. Cells are
 * classified in this order:
 * - the namespace column (or the record path when the namespace column is `path`)
 * - the configured metadata columns (comment, max length, tags)
 * - source-prefixed columns, then target-prefixed columns
 * - anything else is kept verbatim as an extra column
 *
 * Entries remember the cells they were read from. `to_record` writes a cell
 * back as read (column id, raw value, position) while its parsed value is
 * unchanged, so a record survives a round trip untouched.
 *
 * With a combined namespace key the record id is `namespace,key`; it is split
 * at the first comma on the way in and joined on the way out.
 */

use log::debug;
use serde_json::Value;

use crate::app_config::ColumnConfig;
use crate::culture::{cultures_match, CultureConverter};
use crate::errors::{ConfigError, MappingError};
use crate::model::{EntryMetadata, EntryRole, EntryStatus, GridCell, GridRecord, LocalizationEntry};

const PATH_NAMESPACE: &str = "path";

/// Validated column layout of a view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    source_prefix: String,
    target_prefix: String,
    namespace_column: Option<String>,
    comment_column: Option<String>,
    max_length_column: Option<String>,
    tags_column: Option<String>,
    combined_namespace_key: bool,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            source_prefix: "src_".to_string(),
            target_prefix: "tg_".to_string(),
            namespace_column: Some(PATH_NAMESPACE.to_string()),
            comment_column: None,
            max_length_column: None,
            tags_column: None,
            combined_namespace_key: false,
        }
    }
}

impl ColumnLayout {
    pub fn from_config(config: &ColumnConfig) -> Result<Self, ConfigError> {
        let source_prefix = config.source_prefix.trim().to_string();
        let target_prefix = config.target_prefix.trim().to_string();
        if source_prefix.is_empty() {
            return Err(ConfigError::Missing("columns.source_prefix".to_string()));
        }
        if target_prefix.is_empty() {
            return Err(ConfigError::Missing("columns.target_prefix".to_string()));
        }
        if source_prefix.starts_with(&target_prefix) || target_prefix.starts_with(&source_prefix) {
            return Err(ConfigError::invalid(
                "columns.target_prefix",
                "source and target prefixes must not overlap",
            ));
        }

        Ok(Self {
            source_prefix,
            target_prefix,
            namespace_column: optional(&config.namespace_column),
            comment_column: optional(&config.comment_column),
            max_length_column: optional(&config.max_length_column),
            tags_column: optional(&config.tags_column),
            combined_namespace_key: config.combined_namespace_key,
        })
    }

    pub fn with_comment_column(mut self, column: impl Into<String>) -> Self {
        self.comment_column = Some(column.into());
        self
    }

    pub fn with_max_length_column(mut self, column: impl Into<String>) -> Self {
        self.max_length_column = Some(column.into());
        self
    }

    pub fn with_tags_column(mut self, column: impl Into<String>) -> Self {
        self.tags_column = Some(column.into());
        self
    }

    pub fn with_namespace_column(mut self, column: Option<String>) -> Self {
        self.namespace_column = column;
        self
    }

    /// Record ids are `namespace,key`; the namespace column is then unused
    pub fn with_combined_namespace_key(mut self, combined: bool) -> Self {
        self.combined_namespace_key = combined;
        self
    }

    fn uses_path_namespace(&self) -> bool {
        !self.combined_namespace_key && self.namespace_column.as_deref() == Some(PATH_NAMESPACE)
    }

    fn namespace_cell_column(&self) -> Option<&str> {
        if self.combined_namespace_key {
            return None;
        }
        self.namespace_column.as_deref().filter(|c| *c != PATH_NAMESPACE)
    }

    fn is_metadata_column(&self, column: &str) -> bool {
        [
            self.namespace_cell_column(),
            self.comment_column.as_deref(),
            self.max_length_column.as_deref(),
            self.tags_column.as_deref(),
        ]
        .contains(&Some(column))
    }

    pub fn prefix_for(&self, role: EntryRole) -> &str {
        match role {
            EntryRole::Source => &self.source_prefix,
            EntryRole::Target => &self.target_prefix,
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Pure record <-> entry conversion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordMapper {
    layout: ColumnLayout,
    converter: CultureConverter,
}

impl RecordMapper {
    pub fn new(layout: ColumnLayout, converter: CultureConverter) -> Self {
        Self { layout, converter }
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// Split a record into one entry per culture column
    pub fn to_entries(&self, record: &GridRecord) -> Result<Vec<LocalizationEntry>, MappingError> {
        let (id_namespace, key) = self.split_id(&record.id);
        if key.trim().is_empty() {
            return Err(MappingError::EmptyKey);
        }

        let mut namespace = if self.layout.uses_path_namespace() {
            record.path.clone()
        } else {
            id_namespace.map(str::to_string)
        };
        let mut shared = EntryMetadata {
            path: if self.layout.uses_path_namespace() { None } else { record.path.clone() },
            column_order: record.cells.iter().map(|c| c.column_id.clone()).collect(),
            ..EntryMetadata::default()
        };
        let mut cultures: Vec<(EntryRole, String, &GridCell)> = Vec::new();

        for cell in &record.cells {
            let column = cell.column_id.as_str();

            if self.layout.is_metadata_column(column) {
                if self.layout.namespace_cell_column() == Some(column) {
                    namespace = Some(cell.value_as_text());
                } else if self.layout.comment_column.as_deref() == Some(column) {
                    shared.comment = Some(cell.value_as_text());
                } else if self.layout.max_length_column.as_deref() == Some(column) {
                    shared.max_length = parse_max_length(&record.id, cell)?;
                } else {
                    shared.tags = parse_tags(&cell.value);
                }
                shared.metadata_cells.push(cell.clone());
                continue;
            }

            match self.culture_column(column) {
                Some((role, grid_culture)) => {
                    let culture = self.converter.from_grid(grid_culture).ok_or_else(|| {
                        MappingError::UnknownCulture {
                            record_id: record.id.clone(),
                            column_id: cell.column_id.clone(),
                            culture: grid_culture.to_string(),
                        }
                    })?;
                    if cultures.iter().any(|(_, c, _)| *c == culture) {
                        return Err(MappingError::DuplicateCulture {
                            key: key.to_string(),
                            culture,
                        });
                    }
                    cultures.push((role, culture, cell));
                }
                None => shared.extra_columns.push(cell.clone()),
            }
        }

        if cultures.is_empty() {
            debug!("Record '{}' has no culture columns", record.id);
        }

        let entries = cultures
            .into_iter()
            .map(|(role, culture, cell)| {
                let text = cell.value_as_text();
                let status = EntryStatus::from_grid(&text, cell.dependency_status.as_deref());
                let mut metadata = shared.clone();
                metadata.dependency_status = cell.dependency_status.clone();
                metadata.origin_cell = Some(cell.clone());
                LocalizationEntry {
                    key: key.to_string(),
                    culture,
                    text,
                    role,
                    status,
                    namespace: namespace.clone(),
                    metadata,
                    synced_hash: None,
                }
            })
            .collect();

        Ok(entries)
    }

    /// Namespace and key encoded in a record id; the id is the key unless
    /// combined keys are enabled and it holds a comma
    fn split_id<'a>(&self, id: &'a str) -> (Option<&'a str>, &'a str) {
        if self.layout.combined_namespace_key {
            if let Some((namespace, key)) = id.split_once(',') {
                return (Some(namespace), key);
            }
        }
        (None, id)
    }

    /// Record id for a key, joined with its namespace when keys are combined
    fn record_id(&self, key: &str, namespace: Option<&str>) -> String {
        match namespace {
            Some(namespace) if self.layout.combined_namespace_key => format!("{},{}", namespace, key),
            _ => key.to_string(),
        }
    }

    /// Role and grid culture of a culture column, by prefix
    fn culture_column<'a>(&self, column: &'a str) -> Option<(EntryRole, &'a str)> {
        if let Some(culture) = column.strip_prefix(self.layout.source_prefix.as_str()) {
            Some((EntryRole::Source, culture))
        } else {
            column
                .strip_prefix(self.layout.target_prefix.as_str())
                .map(|culture| (EntryRole::Target, culture))
        }
    }

    /// Whether a column still names the entry's role and culture
    fn column_matches(&self, column: &str, entry: &LocalizationEntry) -> bool {
        match self.culture_column(column) {
            Some((role, grid_culture)) if role == entry.role => self
                .converter
                .from_grid(grid_culture)
                .is_some_and(|culture| cultures_match(&culture, &entry.culture)),
            _ => false,
        }
    }

    /// Grid column for one entry, e.g. `tg_frFR`
    pub fn column_for(&self, entry: &LocalizationEntry) -> Result<String, MappingError> {
        if entry.key.trim().is_empty() {
            return Err(MappingError::EmptyKey);
        }
        let grid = self.converter.to_grid(&entry.culture).ok_or_else(|| MappingError::UnmappableCulture {
            key: entry.key.clone(),
            culture: entry.culture.clone(),
        })?;
        Ok(format!("{}{}", self.layout.prefix_for(entry.role), grid))
    }

    /// Merge the entries of one key back into a record
    pub fn to_record(&self, entries: &[LocalizationEntry]) -> Result<GridRecord, MappingError> {
        let first = entries.first().ok_or(MappingError::EmptyGroup)?;
        let key = first.key.as_str();
        if key.trim().is_empty() {
            return Err(MappingError::EmptyKey);
        }
        if let Some(other) = entries.iter().find(|e| e.key != key) {
            return Err(MappingError::MixedKeys {
                expected: key.to_string(),
                found: other.key.clone(),
            });
        }

        // shared attributes come from the source entry when there is one
        let lead = entries.iter().find(|e| e.role == EntryRole::Source).unwrap_or(first);
        let kept = &lead.metadata.metadata_cells;

        let mut record = GridRecord::new(self.record_id(key, lead.namespace.as_deref()));
        record.path = if self.layout.uses_path_namespace() {
            lead.namespace.clone()
        } else {
            lead.metadata.path.clone()
        };

        if let Some(column) = self.layout.namespace_cell_column() {
            let cell = unchanged_cell(kept, column, &lead.namespace, |c| Some(Some(c.value_as_text())))
                .or_else(|| lead.namespace.as_ref().map(|ns| GridCell::text(column, ns.clone())));
            record.cells.extend(cell);
        }
        if let Some(column) = self.layout.comment_column.as_deref() {
            let comment = &lead.metadata.comment;
            let cell = unchanged_cell(kept, column, comment, |c| Some(Some(c.value_as_text())))
                .or_else(|| comment.as_ref().map(|text| GridCell::text(column, text.clone())));
            record.cells.extend(cell);
        }
        if let Some(column) = self.layout.max_length_column.as_deref() {
            let max_length = lead.metadata.max_length;
            let cell = unchanged_cell(kept, column, &max_length, |c| parse_max_length(key, c).ok())
                .or_else(|| {
                    max_length.map(|max| GridCell {
                        column_id: column.to_string(),
                        dependency_status: None,
                        value: Value::from(max),
                    })
                });
            record.cells.extend(cell);
        }
        if let Some(column) = self.layout.tags_column.as_deref() {
            let tags = &lead.metadata.tags;
            let cell = unchanged_cell(kept, column, tags, |c| Some(parse_tags(&c.value)))
                .or_else(|| (!tags.is_empty()).then(|| GridCell::text(column, tags.join(", "))));
            record.cells.extend(cell);
        }

        for entry in entries {
            let cell = self.culture_cell(entry)?;
            if record.cells.iter().any(|c| c.column_id == cell.column_id) {
                return Err(MappingError::DuplicateCulture {
                    key: key.to_string(),
                    culture: entry.culture.clone(),
                });
            }
            record.cells.push(cell);
        }

        record.cells.extend(lead.metadata.extra_columns.iter().cloned());

        let order = &lead.metadata.column_order;
        if !order.is_empty() {
            record
                .cells
                .sort_by_key(|cell| order.iter().position(|c| *c == cell.column_id).unwrap_or(usize::MAX));
        }
        Ok(record)
    }

    /// Cell holding an entry's text, in the column and raw form it was read
    /// from while those still fit
    fn culture_cell(&self, entry: &LocalizationEntry) -> Result<GridCell, MappingError> {
        let origin = entry
            .metadata
            .origin_cell
            .as_ref()
            .filter(|cell| self.column_matches(&cell.column_id, entry));

        let (column_id, value) = match origin {
            Some(cell) if cell.value_as_text() == entry.text => (cell.column_id.clone(), cell.value.clone()),
            Some(cell) => (cell.column_id.clone(), Value::String(entry.text.clone())),
            None => (self.column_for(entry)?, Value::String(entry.text.clone())),
        };

        Ok(GridCell {
            column_id,
            dependency_status: entry.metadata.dependency_status.clone(),
            value,
        })
    }
}

/// The cell read for `column`, if it still parses to `current`
fn unchanged_cell<T: PartialEq>(
    cells: &[GridCell],
    column: &str,
    current: &T,
    parse: impl Fn(&GridCell) -> Option<T>,
) -> Option<GridCell> {
    cells
        .iter()
        .find(|c| c.column_id == column)
        .filter(|c| parse(c).as_ref() == Some(current))
        .cloned()
}

fn parse_max_length(record_id: &str, cell: &GridCell) -> Result<Option<u32>, MappingError> {
    let invalid = |message: String| MappingError::InvalidMetadata {
        record_id: record_id.to_string(),
        column_id: cell.column_id.clone(),
        message,
    };
    match &cell.value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| invalid(format!("'{}' is not a valid length", n))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| invalid(format!("'{}' is not a valid length", s))),
        other => Err(invalid(format!("unexpected value {}", other))),
    }
}

fn parse_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
