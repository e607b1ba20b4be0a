//! Push-delivery envelope.
//!
//! A message bus delivers requests as
//! `{"message":{"data":"<base64 JSON>","messageId":"…"},"subscription":"…"}`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use dbscale_core::{RequestError, RequestResult, ScalingRequest};

#[derive(Debug, Clone, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub data: String,
    #[serde(default)]
    pub message_id: Option<String>,
}

impl PushEnvelope {
    pub fn from_json(bytes: &[u8]) -> RequestResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decode the payload into a validated request.
    pub fn decode(&self) -> RequestResult<ScalingRequest> {
        let payload = STANDARD
            .decode(self.message.data.trim())
            .map_err(|e| RequestError::Malformed(format!("message data is not base64: {e}")))?;
        ScalingRequest::from_json(&payload)
    }
}
