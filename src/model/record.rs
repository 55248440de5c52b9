/*!
 * Wire form of the grid: records made of cells.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One cell of a grid record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    /// Column identifier, e.g. `src_enUS` or `tg_frFR`
    pub column_id: String,

    /// Dependency status reported by the service (`upToDate`, `outOfDate`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_status: Option<String>,

    /// Raw cell value
    #[serde(default)]
    pub value: Value,
}

impl GridCell {
    /// Create a cell holding a string value
    pub fn text(column_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            dependency_status: None,
            value: Value::String(text.into()),
        }
    }

    pub fn with_dependency_status(mut self, status: impl Into<String>) -> Self {
        self.dependency_status = Some(status.into());
        self
    }

    /// The value rendered as text; null becomes an empty string
    pub fn value_as_text(&self) -> String {
        match &self.value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// One row of a grid view; its id is the entry key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub cells: Vec<GridCell>,
}

impl GridRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: None,
            cells: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_cell(mut self, cell: GridCell) -> Self {
        self.cells.push(cell);
        self
    }

    /// Find a cell by column id
    pub fn cell(&self, column_id: &str) -> Option<&GridCell> {
        self.cells.iter().find(|c| c.column_id == column_id)
    }
}
