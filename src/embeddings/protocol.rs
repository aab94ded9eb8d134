//! Worker message protocol.
//!
//! Inbound: `{ "text": string }`.
//! Outbound: `{ "status": "progress" | "complete" | "error", ... }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::progress::LoadProgress;
use crate::error::ProtocolError;

/// Text to embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Query text.
    pub text: String,
}

impl EmbeddingRequest {
    /// Create a request.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Validate a raw inbound message.
    ///
    /// # Errors
    ///
    /// Returns an error unless the message is an object whose `text` is a
    /// non-blank string.
    pub fn from_value(message: &Value) -> Result<Self, ProtocolError> {
        let object = message
            .as_object()
            .ok_or_else(|| ProtocolError::Malformed(format!("expected an object, got {}", kind_of(message))))?;

        match object.get("text") {
            None | Some(Value::Null) => Err(ProtocolError::MissingText),
            Some(Value::String(text)) if text.trim().is_empty() => Err(ProtocolError::EmptyText),
            Some(Value::String(text)) => Ok(Self::new(text.clone())),
            Some(other) => Err(ProtocolError::Malformed(format!(
                "'text' must be a string, got {}",
                kind_of(other)
            ))),
        }
    }

    /// Convert to the wire form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "text": self.text })
    }
}

/// Which stage an error response comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The inbound message was invalid.
    Protocol,
    /// The model could not be loaded.
    Load,
    /// Embedding computation failed.
    Inference,
}

/// Message posted from the worker back to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Model load progress.
    Progress {
        /// Loader-defined progress payload.
        progress: LoadProgress,
    },
    /// The embedding for one request.
    Complete {
        /// Embedding as plain floats.
        output: Vec<f32>,
    },
    /// The request could not be served.
    Error {
        /// Failing stage.
        kind: ErrorKind,
        /// Human-readable reason.
        error: String,
    },
}

impl OutboundMessage {
    /// Build an error response.
    pub fn error(kind: ErrorKind, error: impl ToString) -> Self {
        Self::Error {
            kind,
            error: error.to_string(),
        }
    }

    /// The `status` tag.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this message ends a request.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
