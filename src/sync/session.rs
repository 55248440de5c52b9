/*!
 * Session state machine.
 *
 * ```text
 * Idle -> Fetching -> Diffing -> Applying -> Reporting -> Idle
 *                                      any non-Idle state -> Failed
 * ```
 *
 * Push starts at `Diffing` (nothing to fetch); status skips `Applying`.
 */

use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::SyncError;
use crate::model::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Fetching,
    Diffing,
    Applying,
    Reporting,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Fetching => "Fetching",
            Self::Diffing => "Diffing",
            Self::Applying => "Applying",
            Self::Reporting => "Reporting",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

impl SyncState {
    /// Whether `self -> to` is a legal transition
    pub fn can_transition_to(self, to: SyncState) -> bool {
        use SyncState::*;
        match (self, to) {
            (Failed, _) => false,
            (Idle, Failed) => false,
            (_, Failed) => true,
            (Idle, Fetching) | (Idle, Diffing) => true,
            (Fetching, Diffing) => true,
            (Diffing, Applying) | (Diffing, Reporting) => true,
            (Applying, Reporting) => true,
            (Reporting, Idle) => true,
            _ => false,
        }
    }
}

/// One pull, push or status run
#[derive(Debug, Clone)]
pub struct SyncSession {
    id: Uuid,
    operation: Operation,
    state: SyncState,
    started_at: DateTime<Utc>,
    history: Vec<SyncState>,
}

impl SyncSession {
    pub fn new(operation: Operation) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            state: SyncState::Idle,
            started_at: Utc::now(),
            history: vec![SyncState::Idle],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// States visited so far, starting with `Idle`
    pub fn history(&self) -> &[SyncState] {
        &self.history
    }

    pub fn transition(&mut self, to: SyncState) -> Result<(), SyncError> {
        if !self.state.can_transition_to(to) {
            return Err(SyncError::InvalidTransition { from: self.state, to });
        }
        debug!("Session {} ({}): {} -> {}", self.id, self.operation, self.state, to);
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `Failed`; a no-op when already failed or idle
    pub fn fail(&mut self, error: &SyncError) {
        if self.state.can_transition_to(SyncState::Failed) {
            error!("Session {} ({}) failed in {}: {}", self.id, self.operation, self.state, error);
            self.state = SyncState::Failed;
            self.history.push(SyncState::Failed);
        }
    }
}
