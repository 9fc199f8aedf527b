//! HTTP client for the chat backend.

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::stream::{ChunkStream, HttpChunkStream, StreamError};

/// Errors from backend requests.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Session details returned by the init endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub model_id: String,
    #[serde(default)]
    pub embeddings_model_id: Option<String>,
    /// Greeting streamed back on reconnect, already sentinel-tagged.
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    user_input: &'a str,
}

/// Client for the chat backend's HTTP API.
///
/// Requests carry the stored bearer token. The ask call deliberately has no
/// overall timeout: replies stream for as long as the model takes, and only
/// the connection attempt itself is bounded.
pub struct ChatApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ChatApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Resume (or create) the server-side session.
    ///
    /// The server replays conversation memory into context here, so this
    /// call can take minutes on a cold session.
    pub async fn init(&self) -> Result<SessionInfo, ApiError> {
        let response = self
            .client
            .post(self.url("/api/init"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Send one user message and stream back the reply chunks.
    pub async fn ask(&self, user_input: &str) -> Result<HttpChunkStream, ApiError> {
        let response = self
            .client
            .post(self.url("/api/ask"))
            .bearer_auth(&self.token)
            .json(&AskRequest { user_input })
            .send()
            .await?;

        let response = Self::check_status(response).await?;

        let bytes = response
            .bytes_stream()
            .map_ok(|b| b.to_vec())
            .map_err(|e| StreamError::Transport(e.to_string()));

        Ok(ChunkStream::new(Box::pin(bytes)))
    }

    /// Wipe the server-side conversation memory for this account.
    pub async fn erase_memory(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url("/api/erase_memory"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    /// Delete the account and everything stored under it.
    pub async fn delete_account(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url("/api/delete_account"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status { status, body })
    }
}
