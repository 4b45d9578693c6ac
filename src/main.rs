//! Binary entry point: run one gatekeeper workflow from environment
//! configuration and persist the session record.

use std::process::ExitCode;

use gatekeeper_rs::{GatekeeperWorkflow, SessionRecord, WorkflowConfig};

const DEFAULT_SESSION_FILE: &str = "session_data.json";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match WorkflowConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("configuration error: {err}");
            return ExitCode::from(2);
        }
    };

    let workflow = match GatekeeperWorkflow::new(config) {
        Ok(workflow) => workflow,
        Err(err) => {
            log::error!("failed to initialize workflow: {err}");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = workflow.preflight().await {
        log::error!("{err}");
        return ExitCode::FAILURE;
    }

    let outcome = workflow.run().await;

    let session_file = std::env::var("GATEKEEPER_SESSION_FILE")
        .unwrap_or_else(|_| DEFAULT_SESSION_FILE.to_string());
    let record = SessionRecord::from_outcome(&outcome);
    if let Err(err) = record.persist(&session_file) {
        log::warn!("could not persist session record to {session_file}: {err}");
    } else {
        log::info!("session record written to {session_file}");
    }

    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
