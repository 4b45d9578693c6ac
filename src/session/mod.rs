//! Persisted run records.
//!
//! A run leaves a single JSON document behind so the acquired tokens can be
//! inspected or fed to other tooling after the process exits. Credentials are
//! short-lived; the record is a snapshot, not a cache.

use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::cart::CartConfirmation;
use crate::gatekeeper::GatekeeperCredential;
use crate::workflow::WorkflowOutcome;

/// Errors raised while writing a session record.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to write session file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode session record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Snapshot of one workflow run.
#[derive(Debug, Serialize)]
pub struct SessionRecord {
    pub fingerprint: String,
    pub turnstile_token: Option<String>,
    pub credential: Option<GatekeeperCredential>,
    pub cart: Option<CartConfirmation>,
    pub workflow_completed: bool,
    pub failed_stage: Option<String>,
    pub failure: Option<String>,
    pub timestamp: i64,
}

impl SessionRecord {
    pub fn from_outcome(outcome: &WorkflowOutcome) -> Self {
        Self {
            fingerprint: outcome.fingerprint.to_string(),
            turnstile_token: outcome
                .solution
                .as_ref()
                .map(|solution| solution.token.clone()),
            credential: outcome.credential.clone(),
            cart: outcome.confirmation.clone(),
            workflow_completed: outcome.is_success(),
            failed_stage: outcome.failed_stage().map(|stage| stage.to_string()),
            failure: outcome
                .failure
                .as_ref()
                .map(|failure| failure.error.to_string()),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Write the record as pretty-printed JSON.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let encoded = serde_json::to_string_pretty(self)?;
        fs::write(path, encoded)?;
        Ok(())
    }
}
