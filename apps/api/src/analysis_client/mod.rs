//! Analysis Client: the single point of entry for all calls to the external analysis service.
//!
//! ARCHITECTURAL RULE: No other module may talk to the analysis service directly.
//! Every stage of the workflow goes through `AnalysisClient::invoke`.
//!
//! The client attaches the session's user id, sends exactly one request, and classifies
//! the outcome. It never retries: a failed call surfaces immediately to the workflow.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::SessionIdentity;

pub mod http;
pub mod types;

pub use http::HttpTransport;
pub use types::{Operation, ShapePolicy, StageOutput};

/// Fallback when the service reports failure without a message.
const GENERIC_REMOTE_FAILURE: &str = "request failed";

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No usable response: connection failure, timeout, unreadable or non-JSON body.
    #[error("{0}")]
    Transport(String),

    /// The service answered with `success: false`.
    #[error("{0}")]
    Remote(String),

    #[error("malformed response from {operation}: {message}")]
    MalformedResponse {
        operation: Operation,
        message: String,
    },

    #[error("could not encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Raw answer from a transport: status code plus undecoded body.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Moves one JSON request to the analysis service and brings back the raw response.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    async fn send(
        &self,
        operation: Operation,
        body: &Value,
    ) -> Result<TransportResponse, AnalysisError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl Envelope {
    /// `error.message` when the service sent an object, the string itself when it sent one.
    fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::String(msg) => Some(msg.clone()),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned),
            _ => None,
        }
        .filter(|msg| !msg.trim().is_empty())
    }
}

/// The analysis client used by every workflow session.
///
/// One base client is built at startup; each session gets a copy bound to its identity
/// via [`AnalysisClient::for_session`]. Copies share the transport.
#[derive(Clone)]
pub struct AnalysisClient {
    transport: Arc<dyn AnalysisTransport>,
    shape_policy: ShapePolicy,
    identity: SessionIdentity,
}

impl AnalysisClient {
    pub fn new(transport: Arc<dyn AnalysisTransport>, shape_policy: ShapePolicy) -> Self {
        Self {
            transport,
            shape_policy,
            identity: SessionIdentity::default(),
        }
    }

    pub fn for_session(&self, identity: SessionIdentity) -> Self {
        Self {
            identity,
            ..self.clone()
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Sends `payload` for `operation` and returns the envelope's `data` unchanged.
    pub async fn invoke<P: Serialize>(
        &self,
        operation: Operation,
        payload: &P,
    ) -> Result<Value, AnalysisError> {
        let body = self.request_body(payload)?;
        let user_id = self.identity.user_id();
        let started = Instant::now();

        debug!("Invoking {} for user {}", operation, user_id);
        let outcome = match self.transport.send(operation, &body).await {
            Ok(response) => decode_envelope(operation, &response),
            Err(e) => Err(e),
        };

        let elapsed_ms = started.elapsed().as_millis();
        match &outcome {
            Ok(_) => info!(
                "{} succeeded for user {} in {}ms",
                operation, user_id, elapsed_ms
            ),
            Err(e) => warn!(
                "{} failed for user {} after {}ms: {}",
                operation, user_id, elapsed_ms, e
            ),
        }

        outcome
    }

    /// `invoke` followed by typed decoding of `data` under the configured shape policy.
    pub async fn invoke_typed<P: Serialize, T: StageOutput>(
        &self,
        payload: &P,
    ) -> Result<T, AnalysisError> {
        let data = self.invoke(T::OPERATION, payload).await?;
        types::decode_output(data, self.shape_policy)
    }

    fn request_body<P: Serialize>(&self, payload: &P) -> Result<Value, AnalysisError> {
        let mut body = serde_json::to_value(payload)?;
        match body.as_object_mut() {
            Some(fields) => {
                fields.insert(
                    "userId".to_string(),
                    Value::String(self.identity.user_id().to_string()),
                );
                Ok(body)
            }
            None => Err(AnalysisError::Encode(
                <serde_json::Error as serde::ser::Error>::custom(
                    "payload must serialize to a JSON object",
                ),
            )),
        }
    }
}

/// Classifies a raw response. The status code is informational only: the body decides.
fn decode_envelope(
    operation: Operation,
    response: &TransportResponse,
) -> Result<Value, AnalysisError> {
    let json: Value = serde_json::from_slice(&response.body).map_err(|e| {
        AnalysisError::Transport(format!(
            "analysis service returned an unreadable response (status {}): {e}",
            response.status
        ))
    })?;

    let envelope: Envelope =
        serde_json::from_value(json).map_err(|e| AnalysisError::MalformedResponse {
            operation,
            message: format!("response is not an envelope: {e}"),
        })?;

    match envelope.success {
        Some(true) => envelope.data.ok_or(AnalysisError::MalformedResponse {
            operation,
            message: "success envelope carries no data".to_string(),
        }),
        Some(false) => Err(AnalysisError::Remote(
            envelope
                .error_message()
                .unwrap_or_else(|| GENERIC_REMOTE_FAILURE.to_string()),
        )),
        None => Err(AnalysisError::MalformedResponse {
            operation,
            message: "envelope has no boolean success flag".to_string(),
        }),
    }
}
