//! Agent executors: the thing that actually runs a task's LLM work.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use docdrift_core::config::AgentConfig;
use docdrift_core::errors::AgentError;
use docdrift_core::models::{AgentTask, AgentTaskType};

/// Env var holding the bearer token for [`HttpAgentExecutor`].
pub const API_KEY_ENV: &str = "DOCDRIFT_AGENT_API_KEY";

/// Runs one agent task and returns its raw JSON result. The shape of the
/// result depends on the task type; the result applier validates it.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, task: &AgentTask) -> Result<serde_json::Value, AgentError>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct TaskRequest<'a> {
    task_id: &'a str,
    task_type: AgentTaskType,
    payload: &'a serde_json::Value,
}

/// Posts tasks to `{endpoint}/tasks/{task_type}` and expects the task
/// result as the JSON response body.
pub struct HttpAgentExecutor {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpAgentExecutor {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docdrift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::Provider {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
        })
    }

    /// Executor for `agent.endpoint`; `NotConfigured` when no endpoint is set.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(AgentError::NotConfigured)?;
        Self::new(endpoint, config.effective_timeout())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl AgentExecutor for HttpAgentExecutor {
    async fn execute(&self, task: &AgentTask) -> Result<serde_json::Value, AgentError> {
        let url = format!("{}/tasks/{}", self.endpoint, task.task_type);
        let mut request = self.client.post(&url).json(&TaskRequest {
            task_id: &task.id,
            task_type: task.task_type,
            payload: &task.payload,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Provider {
                    message: format!("request to {url} timed out"),
                }
            } else {
                AgentError::Provider {
                    message: format!("HTTP request failed: {e}"),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| AgentError::InvalidResult {
                message: format!("failed to parse response: {e}"),
            });
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => AgentError::Provider {
                message: format!("HTTP {}: {body}", status.as_u16()),
            },
            s if s.is_server_error() => AgentError::Provider {
                message: format!("HTTP {}: {body}", s.as_u16()),
            },
            s => AgentError::Rejected {
                status: s.as_u16(),
                message: body,
            },
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

impl std::fmt::Debug for HttpAgentExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAgentExecutor")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
