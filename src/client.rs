//! HTTP client for the IPC bridge of a running scheduler.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crontaber_api::{Envelope, IpcChannel};

#[derive(Debug, Error)]
pub(crate) enum ClientError {
    #[error("Cannot reach the scheduler at {url} (is `crontaber run` active?): {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from the scheduler: {0}")]
    Response(#[from] reqwest::Error),

    /// The scheduler answered with a failed envelope.
    #[error("{0}")]
    Failed(String),
}

/// Calls IPC channels over HTTP.
pub(crate) struct IpcClient {
    base_url: String,
    http: reqwest::Client,
}

impl IpcClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn channel_url(&self, channel: IpcChannel) -> String {
        format!("{}/ipc/{}", self.base_url, channel)
    }

    /// Call a channel and return the envelope's data.
    pub async fn call(&self, channel: IpcChannel, payload: Value) -> Result<Value, ClientError> {
        let url = self.channel_url(channel);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ClientError::Unreachable {
                url: self.base_url.clone(),
                source,
            })?;

        let envelope: Envelope = response.json().await?;
        if envelope.failed {
            return Err(ClientError::Failed(envelope.message));
        }
        Ok(envelope.data.unwrap_or(Value::Null))
    }
}
