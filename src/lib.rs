//! # gatekeeper-rs
//!
//! A Rust client for Turnstile-gated gatekeeper endpoints: it delegates the
//! captcha to an external solving service, exchanges the solved token plus a
//! generated client fingerprint for a short-lived gatekeeper token pair, and
//! uses that pair to cart a gated variant.
//!
//! Each run is one strictly sequential pipeline. Independent runs may execute
//! concurrently, but they share nothing beyond the HTTP transport.
//!
//! ## Example
//!
//! ```no_run
//! use gatekeeper_rs::{GatekeeperWorkflow, WorkflowConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkflowConfig::from_env()?;
//!     let workflow = GatekeeperWorkflow::new(config)?;
//!     let outcome = workflow.run().await;
//!     println!("success: {}", outcome.is_success());
//!     Ok(())
//! }
//! ```

mod workflow;

pub mod captcha;
pub mod cart;
pub mod config;
pub mod events;
pub mod fingerprint;
pub mod gatekeeper;
pub mod session;
pub mod transport;

pub use crate::workflow::{
    ErrorKind,
    GatekeeperWorkflow,
    GatekeeperWorkflowBuilder,
    Stage,
    StageFailure,
    WorkflowError,
    WorkflowOutcome,
};

pub use crate::captcha::{
    CapMonsterClient,
    CaptchaConfig,
    CaptchaError,
    CaptchaSolution,
    ChallengeTask,
    TaskStatus,
};

pub use crate::cart::{CartClient, CartConfirmation, CartError};

pub use crate::config::{ConfigError, WorkflowConfig, WorkflowConfigBuilder};

pub use crate::events::{
    EventDispatcher,
    EventHandler,
    LoggingHandler,
    WorkflowEvent,
};

pub use crate::fingerprint::{Fingerprint, FingerprintGenerator};

pub use crate::gatekeeper::{GatekeeperClient, GatekeeperCredential, GatekeeperError};

pub use crate::session::{SessionError, SessionRecord};

pub use crate::transport::{
    HttpTransport,
    ReqwestTransport,
    TransportError,
    TransportResponse,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
