/*!
 * Structured outcome of a sync session.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{ReasonCode, SyncError};
use crate::model::entry::EntryId;

/// Which operation produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Pull,
    Push,
    Status,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Status => "status",
        };
        f.write_str(name)
    }
}

/// Overall result of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    PartialFailure,
    Fatal,
}

/// A failure attributed to a single entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFailure {
    pub key: String,
    pub culture: String,
    pub reason: ReasonCode,
    pub message: String,
}

/// Session-level failure that stopped the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatalError {
    pub reason: ReasonCode,
    pub message: String,
}

/// Counts and failures of one pull, push or status session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub session_id: Uuid,
    pub operation: Operation,
    pub outcome: Outcome,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub failed: usize,
    pub batches_applied: usize,
    pub batches_total: usize,
    pub cancelled: bool,
    pub dry_run: bool,
    /// Local changes waiting to be pushed (status only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_push: Option<usize>,
    pub failures: Vec<EntryFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<FatalError>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn new(operation: Operation, session_id: Uuid) -> Self {
        Self {
            session_id,
            operation,
            outcome: Outcome::Success,
            created: 0,
            updated: 0,
            unchanged: 0,
            skipped: 0,
            conflicts: 0,
            failed: 0,
            batches_applied: 0,
            batches_total: 0,
            cancelled: false,
            dry_run: operation == Operation::Status,
            pending_push: None,
            failures: Vec::new(),
            fatal: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Report for a session that could not start
    pub fn fatal(operation: Operation, error: &SyncError) -> Self {
        let mut report = Self::new(operation, Uuid::new_v4());
        report.set_fatal(error);
        report.finish();
        report
    }

    /// Record a failure for one entry
    pub fn record_failure(&mut self, id: &EntryId, reason: ReasonCode, message: impl Into<String>) {
        self.failed += 1;
        self.failures.push(EntryFailure {
            key: id.key.clone(),
            culture: id.culture.clone(),
            reason,
            message: message.into(),
        });
    }

    pub fn set_fatal(&mut self, error: &SyncError) {
        self.fatal = Some(FatalError {
            reason: error.reason_code(),
            message: error.to_string(),
        });
    }

    /// Stamp the finish time and derive the outcome
    ///
    /// An abort after at least one applied batch is partial, not fatal: the
    /// remote side already holds those changes.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.outcome = if self.fatal.is_some() && self.batches_applied == 0 {
            Outcome::Fatal
        } else if self.fatal.is_some() || self.failed > 0 || self.cancelled {
            Outcome::PartialFailure
        } else {
            Outcome::Success
        };
    }

    /// Entries written locally (pull) or remotely (push)
    pub fn applied(&self) -> usize {
        self.created + self.updated
    }

    pub fn failures_with(&self, reason: ReasonCode) -> impl Iterator<Item = &EntryFailure> {
        self.failures.iter().filter(move |f| f.reason == reason)
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            Outcome::Success => 0,
            Outcome::PartialFailure => 2,
            Outcome::Fatal => 1,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.outcome {
            Outcome::Success => "success",
            Outcome::PartialFailure => "partial failure",
            Outcome::Fatal => "fatal",
        };
        let mode = if self.dry_run { " (dry run)" } else { "" };
        writeln!(f, "{}{}: {}", self.operation, mode, outcome)?;
        writeln!(
            f,
            "  created {}, updated {}, unchanged {}, skipped {}, conflicts {}, failed {}",
            self.created, self.updated, self.unchanged, self.skipped, self.conflicts, self.failed
        )?;
        if self.batches_total > 0 {
            writeln!(f, "  batches {}/{}", self.batches_applied, self.batches_total)?;
        }
        if let Some(pending) = self.pending_push {
            writeln!(f, "  pending push {}", pending)?;
        }
        if self.cancelled {
            writeln!(f, "  cancelled before completion")?;
        }
        for failure in &self.failures {
            writeln!(
                f,
                "  - {}[{}] {}: {}",
                failure.key, failure.culture, failure.reason, failure.message
            )?;
        }
        if let Some(fatal) = &self.fatal {
            writeln!(f, "  fatal ({}): {}", fatal.reason, fatal.message)?;
        }
        Ok(())
    }
}
