//! Completion callbacks.

use super::errors::{TaskError, TaskResult};
use super::task::Task;
use crate::config::CallbackConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Notifies a task's callback URL once the task completes
#[async_trait]
pub trait CallbackNotifier: Send + Sync {
    async fn notify(&self, task: &Task, url: &str) -> TaskResult<()>;
}

/// POSTs an empty JSON object with `Authorization: Bearer <token>`
#[derive(Clone)]
pub struct HttpCallbackNotifier {
    client: Client,
    auth_token: String,
}

impl std::fmt::Debug for HttpCallbackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCallbackNotifier")
            .field("auth_configured", &!self.auth_token.is_empty())
            .finish()
    }
}

impl HttpCallbackNotifier {
    pub fn new(auth_token: Option<String>, timeout: Duration) -> TaskResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("qtm/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TaskError::callback("<client>", e.to_string()))?;

        Ok(Self {
            client,
            auth_token: auth_token.unwrap_or_default(),
        })
    }

    pub fn from_config(config: &CallbackConfig) -> TaskResult<Self> {
        Self::new(config.auth_token.clone(), Duration::from_millis(config.timeout_ms))
    }
}

#[async_trait]
impl CallbackNotifier for HttpCallbackNotifier {
    async fn notify(&self, _task: &Task, url: &str) -> TaskResult<()> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.auth_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| TaskError::callback(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(TaskError::callback(
                url,
                format!("unexpected status {}", response.status()),
            ));
        }
        Ok(())
    }
}

/// Accepts every notification without sending anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbackNotifier;

#[async_trait]
impl CallbackNotifier for NoopCallbackNotifier {
    async fn notify(&self, _task: &Task, _url: &str) -> TaskResult<()> {
        Ok(())
    }
}
