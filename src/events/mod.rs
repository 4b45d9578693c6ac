//! Event stream for workflow progress.
//!
//! The orchestrator emits structured events instead of printing; CLI front
//! ends, log sinks, or tests subscribe through the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::fingerprint::Fingerprint;
use crate::workflow::Stage;

/// Emitted once per run, before the first stage.
#[derive(Debug, Clone)]
pub struct WorkflowStartedEvent {
    pub fingerprint: Fingerprint,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StageStartedEvent {
    pub stage: Stage,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StageCompletedEvent {
    pub stage: Stage,
    pub elapsed: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StageFailedEvent {
    pub stage: Stage,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Emitted once per run, after the pipeline halted or completed.
#[derive(Debug, Clone)]
pub struct WorkflowCompletedEvent {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    WorkflowStarted(WorkflowStartedEvent),
    StageStarted(StageStartedEvent),
    StageCompleted(StageCompletedEvent),
    StageFailed(StageFailedEvent),
    WorkflowCompleted(WorkflowCompletedEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &WorkflowEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: WorkflowEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::WorkflowStarted(started) => {
                log::info!("workflow started (fingerprint {})", started.fingerprint);
            }
            WorkflowEvent::StageStarted(stage) => {
                log::info!("stage {} started", stage.stage);
            }
            WorkflowEvent::StageCompleted(stage) => {
                log::info!(
                    "stage {} completed in {:.2}s",
                    stage.stage,
                    stage.elapsed.as_secs_f64()
                );
            }
            WorkflowEvent::StageFailed(stage) => {
                log::warn!("stage {} failed: {}", stage.stage, stage.error);
            }
            WorkflowEvent::WorkflowCompleted(done) => {
                log::info!("workflow completed success={}", done.success);
            }
        }
    }
}
