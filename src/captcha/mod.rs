//! Captcha solving service integration.
//!
//! The crate never solves Turnstile locally. It delegates to an external
//! solving service speaking the asynchronous `createTask` / `getTaskResult`
//! protocol and exposes the result as a bare token the gatekeeper endpoint
//! will accept.

mod capmonster;

pub use capmonster::CapMonsterClient;

use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

/// Polling discipline for the solving service.
///
/// Fixed inter-poll delay with a hard tick cap; no adaptive backoff.
#[derive(Debug, Clone)]
pub struct CaptchaConfig {
    pub max_polls: u32,
    pub poll_interval: Duration,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            max_polls: 30,
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Lifecycle of a solving task as observed through polling.
///
/// Status only moves forward: `Created` → `Processing` → one of the terminal
/// states (`Ready`, `Failed`, `TimedOut`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Created,
    Processing,
    Ready,
    Failed,
    TimedOut,
}

impl TaskStatus {
    /// Map a wire status string onto the state machine. Anything the
    /// protocol does not recognize keeps the task in `Processing`.
    pub fn from_wire(status: &str) -> Self {
        match status {
            "ready" => TaskStatus::Ready,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Processing,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Ready | TaskStatus::Failed | TaskStatus::TimedOut
        )
    }
}

/// Handle to a task created on the solving service.
#[derive(Debug, Clone)]
pub struct ChallengeTask {
    pub id: String,
    pub status: TaskStatus,
}

impl ChallengeTask {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Created,
        }
    }
}

/// Solved challenge token returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaSolution {
    pub token: String,
}

impl CaptchaSolution {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// Errors surfaced by the solving client.
#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed solver response: {0}")]
    Protocol(String),
    #[error("solver service error: {0}")]
    Service(String),
    #[error("solver task not ready after {polls} polls")]
    Timeout { polls: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_wire_status_keeps_processing() {
        assert_eq!(TaskStatus::from_wire("ready"), TaskStatus::Ready);
        assert_eq!(TaskStatus::from_wire("failed"), TaskStatus::Failed);
        assert_eq!(TaskStatus::from_wire("processing"), TaskStatus::Processing);
        assert_eq!(TaskStatus::from_wire("queued"), TaskStatus::Processing);
        assert_eq!(TaskStatus::from_wire("redy"), TaskStatus::Processing);
        assert_eq!(TaskStatus::from_wire(""), TaskStatus::Processing);
    }

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Ready.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::TimedOut.is_terminal());
        assert!(!TaskStatus::Created.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }
}
