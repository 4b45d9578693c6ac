//! Client for the CapMonster Cloud solving API.
//!
//! Implements the two-call protocol: `createTask` registers a Turnstile
//! solving job, `getTaskResult` is polled at a fixed interval until the
//! service reports a terminal state or the tick cap is reached.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::sleep;
use url::Url;

use super::{CaptchaConfig, CaptchaError, CaptchaSolution, ChallengeTask, TaskStatus};
use crate::transport::HttpTransport;

const DEFAULT_BASE_URL: &str = "https://api.capsolver.com";
const TASK_TYPE: &str = "AntiTurnstileTaskProxyLess";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    error_id: i64,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    task_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultResponse {
    error_id: i64,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    solution: Option<SolutionPayload>,
}

#[derive(Debug, Deserialize)]
struct SolutionPayload {
    #[serde(default)]
    token: Option<String>,
}

/// CapMonster Cloud adapter.
pub struct CapMonsterClient {
    transport: Arc<dyn HttpTransport>,
    api_key: String,
    base_url: Url,
    config: CaptchaConfig,
}

impl CapMonsterClient {
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
            base_url: Url::parse(DEFAULT_BASE_URL).expect("invalid default solver url"),
            config: CaptchaConfig::default(),
        }
    }

    /// Override the polling discipline.
    pub fn with_config(mut self, config: CaptchaConfig) -> Self {
        self.config = config;
        self
    }

    /// Point the client at a different service endpoint.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Register a Turnstile solving task for the given site.
    pub async fn create_task(
        &self,
        website_url: &Url,
        website_key: &str,
    ) -> Result<ChallengeTask, CaptchaError> {
        let payload = json!({
            "clientKey": self.api_key,
            "task": {
                "type": TASK_TYPE,
                "websiteURL": website_url.as_str(),
                "websiteKey": website_key,
            }
        });

        let response = self
            .transport
            .post_json(&self.endpoint("createTask")?, &payload)
            .await?;
        if !(200..300).contains(&response.status()) {
            return Err(CaptchaError::Protocol(format!(
                "createTask returned status {}",
                response.status()
            )));
        }

        let body: CreateTaskResponse = response
            .json()
            .map_err(|err| CaptchaError::Protocol(format!("createTask body: {err}")))?;

        if body.error_id != 0 {
            return Err(CaptchaError::Service(describe_error(
                body.error_id,
                body.error_description,
            )));
        }

        let task_id = body
            .task_id
            .as_ref()
            .and_then(task_id_string)
            .ok_or_else(|| CaptchaError::Protocol("createTask response missing taskId".into()))?;

        log::debug!("solver task {task_id} created");
        Ok(ChallengeTask::new(task_id))
    }

    /// Poll the task until it reaches a terminal state.
    ///
    /// Each tick is one fixed-interval sleep followed by one status request.
    /// A transport failure on any tick aborts the whole poll; retrying is
    /// the caller's decision, not this client's.
    pub async fn poll_result(
        &self,
        task: &mut ChallengeTask,
    ) -> Result<CaptchaSolution, CaptchaError> {
        task.status = TaskStatus::Processing;
        let endpoint = self.endpoint("getTaskResult")?;

        for poll in 1..=self.config.max_polls {
            sleep(self.config.poll_interval).await;

            let payload = json!({ "clientKey": self.api_key, "taskId": task.id });
            let response = self.transport.post_json(&endpoint, &payload).await?;
            if !(200..300).contains(&response.status()) {
                return Err(CaptchaError::Protocol(format!(
                    "getTaskResult returned status {}",
                    response.status()
                )));
            }

            let body: TaskResultResponse = response
                .json()
                .map_err(|err| CaptchaError::Protocol(format!("getTaskResult body: {err}")))?;

            if body.error_id != 0 {
                task.status = TaskStatus::Failed;
                return Err(CaptchaError::Service(describe_error(
                    body.error_id,
                    body.error_description,
                )));
            }

            let wire_status = body.status.as_deref().unwrap_or("");
            match TaskStatus::from_wire(wire_status) {
                TaskStatus::Ready => {
                    task.status = TaskStatus::Ready;
                    let token = body
                        .solution
                        .and_then(|solution| solution.token)
                        .filter(|token| !token.is_empty());
                    return match token {
                        Some(token) => Ok(CaptchaSolution::new(token)),
                        None => Err(CaptchaError::Protocol(
                            "ready status without solution token".into(),
                        )),
                    };
                }
                TaskStatus::Failed => {
                    task.status = TaskStatus::Failed;
                    return Err(CaptchaError::Service(
                        body.error_description
                            .unwrap_or_else(|| "task failed".into()),
                    ));
                }
                _ => {
                    log::debug!(
                        "solver task {} pending ({poll}/{}, status {wire_status:?})",
                        task.id,
                        self.config.max_polls
                    );
                }
            }
        }

        task.status = TaskStatus::TimedOut;
        Err(CaptchaError::Timeout {
            polls: self.config.max_polls,
        })
    }

    /// Create a task and poll it to completion.
    pub async fn solve(
        &self,
        website_url: &Url,
        website_key: &str,
    ) -> Result<CaptchaSolution, CaptchaError> {
        let mut task = self.create_task(website_url, website_key).await?;
        self.poll_result(&mut task).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, CaptchaError> {
        self.base_url
            .join(path)
            .map_err(|err| CaptchaError::Protocol(format!("invalid solver endpoint: {err}")))
    }
}

fn describe_error(error_id: i64, description: Option<String>) -> String {
    description.unwrap_or_else(|| format!("errorId {error_id}"))
}

// Some deployments return the task id as a JSON number rather than a string.
fn task_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
