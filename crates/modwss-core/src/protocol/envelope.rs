//! Envelope and batch frame (JSON).
//!
//! The envelope stores `context` as `RawValue` to enable lazy parsing by the
//! consumer that requests a specific payload shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{Result, WssError};
use crate::protocol::payload::Payload;

/// One operation-tagged message unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Operation tag (e.g. "device-login").
    pub operation: String,
    /// Payload, stored as raw JSON (lazy parsing). Absent means `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Box<RawValue>>,
}

impl Envelope {
    /// Build an envelope from an already encoded context.
    pub fn new(operation: impl Into<String>, context: Option<Box<RawValue>>) -> Self {
        Self {
            operation: operation.into(),
            context,
        }
    }

    /// Encode a typed payload under its own operation tag.
    pub fn from_payload<P: Payload>(payload: &P) -> Result<Self> {
        let raw = serde_json::value::to_raw_value(payload)
            .map_err(|e| WssError::Unknown(format!("payload encode failed: {e}")))?;
        Ok(Self::new(P::OPERATION, Some(raw)))
    }

    /// Raw JSON text of the context (`null` when absent).
    pub fn context_json(&self) -> &str {
        self.context.as_deref().map_or("null", RawValue::get)
    }

    /// Decode the context into any shape, ignoring the tag.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(self.context_json()).map_err(|e| {
            WssError::UnexpectedMessageShape(format!("{}: {e}", self.operation))
        })
    }

    /// Decode the context as payload `P`, which must match this envelope's tag.
    pub fn decode_as<P: Payload>(&self) -> Result<P> {
        if self.operation != P::OPERATION {
            return Err(WssError::UnexpectedMessageShape(format!(
                "expected operation {}, got {}",
                P::OPERATION,
                self.operation
            )));
        }
        self.decode()
    }
}

/// Wire frame: many envelopes travel together.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Batch {
    pub messages: Vec<Envelope>,
    /// Envelopes dropped by `decode` because they did not parse.
    #[serde(skip)]
    pub skipped: usize,
}

// Envelopes are parsed one by one so a bad one cannot sink its siblings.
#[derive(Deserialize)]
struct RawBatch {
    #[serde(default)]
    messages: Vec<Box<RawValue>>,
}

impl Batch {
    pub fn new(messages: Vec<Envelope>) -> Self {
        Self {
            messages,
            skipped: 0,
        }
    }

    /// Parse a text frame. Fails only when the frame itself is malformed;
    /// malformed envelopes are skipped and counted in `skipped`.
    pub fn decode(frame: &str) -> Result<Self> {
        let raw: RawBatch = serde_json::from_str(frame)
            .map_err(|e| WssError::UnexpectedMessageShape(format!("invalid batch json: {e}")))?;

        let mut batch = Batch::new(Vec::with_capacity(raw.messages.len()));
        for (index, msg) in raw.messages.iter().enumerate() {
            match serde_json::from_str::<Envelope>(msg.get()) {
                Ok(env) => batch.messages.push(env),
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping malformed envelope");
                    batch.skipped += 1;
                }
            }
        }
        Ok(batch)
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| WssError::Unknown(format!("batch encode failed: {e}")))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl IntoIterator for Batch {
    type Item = Envelope;
    type IntoIter = std::vec::IntoIter<Envelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}
