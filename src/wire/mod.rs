/*!
 * Clients for the remote content grid.
 *
 * - `HttpGridClient`: the real service over HTTPS with retry and throttling
 * - `MockGridClient`: an in-memory grid with scripted failures for tests
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::WireError;
use crate::model::GridRecord;

pub mod http;
pub mod mock;
pub mod retry;

pub use http::HttpGridClient;
pub use mock::{MockBehavior, MockGridClient};
pub use retry::RetryPolicy;

/// Opaque pagination token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(String);

impl Cursor {
    pub fn from_offset(offset: usize) -> Self {
        Self(offset.to_string())
    }

    pub fn offset(&self) -> Result<usize, WireError> {
        self.0
            .parse()
            .map_err(|_| WireError::InvalidRequest(format!("malformed cursor '{}'", self.0)))
    }
}

/// One page of records
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<GridRecord>,
    pub next_cursor: Option<Cursor>,
}

/// Acknowledgement for one submitted record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub record_id: String,
    pub accepted: bool,
    pub message: Option<String>,
}

impl Ack {
    pub fn accepted(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            accepted: true,
            message: None,
        }
    }

    pub fn rejected(record_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            accepted: false,
            message: Some(message.into()),
        }
    }
}

/// Access to a grid view's records
///
/// Implementations validate identifiers before doing any I/O.
#[async_trait]
pub trait GridClient: Send + Sync + Debug {
    /// Fetch one page of records; `None` starts from the beginning
    async fn fetch_records(
        &self,
        project_id: &str,
        view_id: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page, WireError>;

    /// Create or update records, returning one ack per submitted record
    async fn upsert_records(
        &self,
        project_id: &str,
        view_id: &str,
        records: &[GridRecord],
    ) -> Result<Vec<Ack>, WireError>;

    /// Check that the view is reachable with the configured credentials
    async fn test_connection(&self, project_id: &str, view_id: &str) -> Result<(), WireError>;
}

/// Reject empty identifiers before any request is made
pub fn validate_identifiers(project_id: &str, view_id: &str) -> Result<(), WireError> {
    if project_id.trim().is_empty() {
        return Err(WireError::InvalidRequest("project id must not be empty".to_string()));
    }
    if view_id.trim().is_empty() {
        return Err(WireError::InvalidRequest("view id must not be empty".to_string()));
    }
    Ok(())
}
