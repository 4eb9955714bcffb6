//! HTTP transport: one JSON POST per operation to `{base_url}/{operation}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{AnalysisError, AnalysisTransport, Operation, TransportResponse};

pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn endpoint(&self, operation: Operation) -> String {
        format!("{}/{}", self.base_url, operation.as_str())
    }

    fn describe(&self, err: reqwest::Error) -> AnalysisError {
        let message = if err.is_timeout() {
            format!(
                "analysis service did not respond within {}s",
                self.timeout.as_secs_f32()
            )
        } else if err.is_connect() {
            format!("could not reach analysis service: {err}")
        } else {
            format!("network request failed: {err}")
        };
        AnalysisError::Transport(message)
    }
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn send(
        &self,
        operation: Operation,
        body: &Value,
    ) -> Result<TransportResponse, AnalysisError> {
        let url = self.endpoint(operation);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.describe(e))?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.describe(e))?;
        debug!("{} answered {} ({} bytes)", operation, status, body.len());

        Ok(TransportResponse { status, body })
    }
}
