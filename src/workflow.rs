//! High level workflow orchestration.
//!
//! Wires together fingerprint generation, captcha solving, gatekeeper token
//! acquisition, and carting into one strictly sequential pipeline. The first
//! stage failure halts the run; artifacts produced before the failure are
//! kept in the outcome.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;

use crate::captcha::{CapMonsterClient, CaptchaError, CaptchaSolution};
use crate::cart::{CartClient, CartConfirmation, CartError};
use crate::config::{ConfigError, WorkflowConfig};
use crate::events::{
    EventDispatcher, EventHandler, LoggingHandler, StageCompletedEvent, StageFailedEvent,
    StageStartedEvent, WorkflowCompletedEvent, WorkflowEvent, WorkflowStartedEvent,
};
use crate::fingerprint::{Fingerprint, FingerprintGenerator};
use crate::gatekeeper::{GatekeeperClient, GatekeeperCredential, GatekeeperError};
use crate::transport::{HttpTransport, ReqwestTransport, TransportError};

/// One sequential step of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Challenge,
    Credential,
    Action,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Challenge => "challenge",
            Stage::Credential => "credential",
            Stage::Action => "action",
        };
        f.write_str(name)
    }
}

/// Flattened classification of a workflow error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Protocol,
    Challenge,
    Timeout,
    Downstream,
}

/// High-level error surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("captcha solving failed: {0}")]
    Captcha(#[from] CaptchaError),
    #[error("gatekeeper token request failed: {0}")]
    Gatekeeper(#[from] GatekeeperError),
    #[error("cart submission failed: {0}")]
    Cart(#[from] CartError),
    #[error("solver connectivity check failed: {0}")]
    Preflight(#[source] CaptchaError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Config(_) => ErrorKind::Configuration,
            // A failed connectivity check means the setup is broken, not the run.
            WorkflowError::Preflight(_) => ErrorKind::Configuration,
            WorkflowError::Transport(_) => ErrorKind::Transport,
            WorkflowError::Captcha(err) => match err {
                CaptchaError::Transport(_) => ErrorKind::Transport,
                CaptchaError::Protocol(_) => ErrorKind::Protocol,
                CaptchaError::Service(_) => ErrorKind::Challenge,
                CaptchaError::Timeout { .. } => ErrorKind::Timeout,
            },
            WorkflowError::Gatekeeper(err) => match err {
                GatekeeperError::Transport(_) => ErrorKind::Transport,
                GatekeeperError::Protocol(_) => ErrorKind::Protocol,
                GatekeeperError::Denied { .. } => ErrorKind::Downstream,
            },
            WorkflowError::Cart(err) => match err {
                CartError::Transport(_) => ErrorKind::Transport,
                CartError::Protocol(_) => ErrorKind::Protocol,
                CartError::Rejected { .. } => ErrorKind::Downstream,
            },
        }
    }
}

/// First failure of a run, with the stage it happened in.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: WorkflowError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} failed: {}", self.stage, self.error)
    }
}

/// Result of one workflow run.
///
/// Artifacts are filled in stage order; on failure everything produced up to
/// that point stays populated. A credential obtained before a rejected cart
/// is still reported.
#[derive(Debug)]
pub struct WorkflowOutcome {
    pub fingerprint: Fingerprint,
    pub solution: Option<CaptchaSolution>,
    pub credential: Option<GatekeeperCredential>,
    pub confirmation: Option<CartConfirmation>,
    pub failure: Option<StageFailure>,
}

impl WorkflowOutcome {
    fn new(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            solution: None,
            credential: None,
            confirmation: None,
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        self.failure.as_ref().map(|failure| failure.stage)
    }
}

/// Fluent builder for [`GatekeeperWorkflow`].
pub struct GatekeeperWorkflowBuilder {
    config: WorkflowConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl GatekeeperWorkflowBuilder {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            transport: None,
            handlers: Vec::new(),
        }
    }

    /// Inject a custom transport instead of the reqwest default.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Subscribe an additional event handler to the progress stream.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(self) -> Result<GatekeeperWorkflow, WorkflowError> {
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::browser_like(&self.config.website_url)?),
        };

        let captcha = CapMonsterClient::new(transport.clone(), self.config.api_key.clone())
            .with_base_url(self.config.solver_url.clone())
            .with_config(self.config.captcha.clone());
        let gatekeeper = GatekeeperClient::new(
            transport.clone(),
            self.config.gatekeeper_url.clone(),
            self.config.shop_domain.clone(),
            self.config.ttl_minutes,
        );
        let cart = CartClient::new(transport, self.config.cart_url.clone());

        let mut events = EventDispatcher::new();
        events.register_handler(Arc::new(LoggingHandler));
        for handler in self.handlers {
            events.register_handler(handler);
        }

        Ok(GatekeeperWorkflow {
            config: self.config,
            fingerprints: FingerprintGenerator::new(),
            captcha,
            gatekeeper,
            cart,
            events: Arc::new(events),
        })
    }
}

/// Main workflow orchestrator.
pub struct GatekeeperWorkflow {
    config: WorkflowConfig,
    fingerprints: FingerprintGenerator,
    captcha: CapMonsterClient,
    gatekeeper: GatekeeperClient,
    cart: CartClient,
    events: Arc<EventDispatcher>,
}

impl GatekeeperWorkflow {
    /// Construct a workflow with the default reqwest transport.
    pub fn new(config: WorkflowConfig) -> Result<Self, WorkflowError> {
        Self::builder(config).build()
    }

    /// Obtain a builder to customize transport and event handlers.
    pub fn builder(config: WorkflowConfig) -> GatekeeperWorkflowBuilder {
        GatekeeperWorkflowBuilder::new(config)
    }

    /// Connectivity guard: create one solving task and discard it.
    ///
    /// Meant to run before [`run`](Self::run); a failure here is a setup
    /// problem (bad key, unreachable service), not a workflow failure.
    pub async fn preflight(&self) -> Result<(), WorkflowError> {
        let task = self
            .captcha
            .create_task(&self.config.website_url, &self.config.website_key)
            .await
            .map_err(WorkflowError::Preflight)?;
        log::debug!("preflight task {} discarded", task.id);
        Ok(())
    }

    /// Run the pipeline once: fingerprint, solve, acquire, cart.
    pub async fn run(&self) -> WorkflowOutcome {
        let fingerprint = self.fingerprints.generate();
        self.events
            .dispatch(WorkflowEvent::WorkflowStarted(WorkflowStartedEvent {
                fingerprint: fingerprint.clone(),
                timestamp: Utc::now(),
            }));

        let mut outcome = WorkflowOutcome::new(fingerprint);

        let solution = match self
            .stage(
                Stage::Challenge,
                self.captcha
                    .solve(&self.config.website_url, &self.config.website_key),
            )
            .await
        {
            Ok(solution) => solution,
            Err(error) => return self.finish(outcome, Stage::Challenge, error),
        };
        outcome.solution = Some(solution.clone());

        let credential = match self
            .stage(
                Stage::Credential,
                self.gatekeeper
                    .acquire(&outcome.fingerprint, &solution, &self.config.variant_id),
            )
            .await
        {
            Ok(credential) => credential,
            Err(error) => return self.finish(outcome, Stage::Credential, error),
        };
        outcome.credential = Some(credential.clone());

        let confirmation = match self
            .stage(
                Stage::Action,
                self.cart
                    .submit(&credential, &self.config.variant_id, self.config.quantity),
            )
            .await
        {
            Ok(confirmation) => confirmation,
            Err(error) => return self.finish(outcome, Stage::Action, error),
        };
        outcome.confirmation = Some(confirmation);

        self.complete(outcome)
    }

    async fn stage<T, E>(
        &self,
        stage: Stage,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, WorkflowError>
    where
        E: Into<WorkflowError>,
    {
        self.events
            .dispatch(WorkflowEvent::StageStarted(StageStartedEvent {
                stage,
                timestamp: Utc::now(),
            }));
        let started = Instant::now();

        match fut.await {
            Ok(value) => {
                self.events
                    .dispatch(WorkflowEvent::StageCompleted(StageCompletedEvent {
                        stage,
                        elapsed: started.elapsed(),
                        timestamp: Utc::now(),
                    }));
                Ok(value)
            }
            Err(err) => {
                let error = err.into();
                self.events
                    .dispatch(WorkflowEvent::StageFailed(StageFailedEvent {
                        stage,
                        error: error.to_string(),
                        timestamp: Utc::now(),
                    }));
                Err(error)
            }
        }
    }

    fn finish(
        &self,
        mut outcome: WorkflowOutcome,
        stage: Stage,
        error: WorkflowError,
    ) -> WorkflowOutcome {
        outcome.failure = Some(StageFailure { stage, error });
        self.emit_completed(&outcome);
        outcome
    }

    fn complete(&self, outcome: WorkflowOutcome) -> WorkflowOutcome {
        self.emit_completed(&outcome);
        outcome
    }

    fn emit_completed(&self, outcome: &WorkflowOutcome) {
        self.events
            .dispatch(WorkflowEvent::WorkflowCompleted(WorkflowCompletedEvent {
                success: outcome.is_success(),
                timestamp: Utc::now(),
            }));
    }
}
