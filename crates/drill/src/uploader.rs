//! Upload of finished sessions to a remote save endpoint

use drill_core::{EventLog, SessionResult};
use drill_store::SessionArchive;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("save rejected: {0}")]
    Rejected(String),
}

/// Request body accepted by the save endpoint
#[derive(Debug, Serialize)]
pub struct SavePayload<'a> {
    pub session_result: &'a SessionResult,
    pub event_logs: &'a EventLog,
    pub session_name: &'a str,
    pub session_file_path: Option<&'a Path>,
    pub completed_steps: &'a [i64],
    pub timestamp: &'a str,
}

impl<'a> SavePayload<'a> {
    pub fn new(archive: &'a SessionArchive, stamp: &'a str) -> Self {
        Self {
            session_result: &archive.result,
            event_logs: &archive.event_logs,
            session_name: archive.session_name(),
            session_file_path: archive.script_path.as_deref(),
            completed_steps: &archive.completed_steps,
            timestamp: stamp,
        }
    }
}

/// Response body of the save endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SaveResponse {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
    pub run_file_path: Option<String>,
    pub saved_dir: Option<String>,
}

impl SaveResponse {
    /// Where the server says it put the session
    pub fn location(&self) -> Option<&str> {
        self.run_file_path.as_deref().or(self.saved_dir.as_deref())
    }
}

/// Decide between success and failure from the status and the parsed body
fn interpret(status: StatusCode, body: Option<SaveResponse>) -> Result<SaveResponse, UploadError> {
    match body {
        Some(body) if status.is_success() && body.success => Ok(body),
        Some(SaveResponse {
            error: Some(error), ..
        }) => Err(UploadError::Rejected(error)),
        _ => Err(UploadError::Rejected(format!("HTTP {}", status.as_u16()))),
    }
}

/// Posts finished sessions to the configured endpoint, once, without retry
pub struct Uploader {
    client: Client,
    endpoint: String,
}

impl Uploader {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn upload(
        &self,
        archive: &SessionArchive,
        stamp: &str,
    ) -> Result<SaveResponse, UploadError> {
        debug!(endpoint = %self.endpoint, session_id = %archive.session_id(), "Uploading session");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&SavePayload::new(archive, stamp))
            .send()
            .await?;

        let status = response.status();
        let body = match response.json::<SaveResponse>().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "Unreadable save response");
                None
            }
        };

        let saved = interpret(status, body)?;
        info!(
            endpoint = %self.endpoint,
            location = saved.location().unwrap_or("-"),
            "Session uploaded"
        );
        Ok(saved)
    }
}
