//! Frame Decoding
//!
//! Decodes raw text frames into typed [`StreamMessage`]s. Both stream kinds
//! speak JSON: the market data feed batches messages into arrays tagged with
//! a `"T"` discriminator, the order events feed sends single objects tagged
//! with a `"stream"` discriminator.

use crate::messages::{
    BarMessage, ErrorMessage, QuoteMessage, StreamMessage, SubscriptionMessage, SuccessMessage,
    TradeMessage,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown message type discriminator.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Message carried no recognizable discriminator.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON codec shared by both stream kinds.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into zero or more messages.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON parsing fails or a message cannot be
    /// attributed to a known type. Callers treat this as a skippable
    /// frame, never a connection failure.
    pub fn decode(&self, text: &str) -> Result<Vec<StreamMessage>, CodecError> {
        let trimmed = text.trim();

        if trimmed.starts_with('[') {
            let values: Vec<serde_json::Value> = serde_json::from_str(trimmed)?;
            values.into_iter().map(decode_value).collect()
        } else if trimmed.starts_with('{') {
            let value: serde_json::Value = serde_json::from_str(trimmed)?;
            Ok(vec![decode_value(value)?])
        } else {
            let preview: String = trimmed.chars().take(50).collect();
            Err(CodecError::InvalidFormat(format!(
                "expected JSON array or object, got: {preview}"
            )))
        }
    }

    /// Encode an outbound message to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}

/// Decode one JSON object by its `"T"` or `"stream"` discriminator.
fn decode_value(value: serde_json::Value) -> Result<StreamMessage, CodecError> {
    let discriminator = value
        .get("T")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("stream").and_then(|v| v.as_str()));

    match discriminator {
        Some("success") => {
            let m: SuccessMessage = serde_json::from_value(value)?;
            Ok(StreamMessage::Success(m))
        }
        Some("error") => {
            let m: ErrorMessage = serde_json::from_value(value)?;
            Ok(StreamMessage::Error(m))
        }
        Some("subscription") => {
            let m: SubscriptionMessage = serde_json::from_value(value)?;
            Ok(StreamMessage::Subscription(m))
        }
        Some("t") => {
            let m: TradeMessage = serde_json::from_value(value)?;
            Ok(StreamMessage::Trade(m))
        }
        Some("q") => {
            let m: QuoteMessage = serde_json::from_value(value)?;
            Ok(StreamMessage::Quote(m))
        }
        Some("b") => {
            let m: BarMessage = serde_json::from_value(value)?;
            Ok(StreamMessage::Bar(m))
        }
        Some("authorization") => {
            let m = serde_json::from_value(value)?;
            Ok(StreamMessage::Authorization(m))
        }
        Some("listening") => {
            let m = serde_json::from_value(value)?;
            Ok(StreamMessage::Listening(m))
        }
        Some("trade_updates") => {
            let m = serde_json::from_value(value)?;
            Ok(StreamMessage::OrderUpdate(Box::new(m)))
        }
        Some(other) => Err(CodecError::UnknownMessageType(other.to_string())),
        None => Err(CodecError::InvalidFormat(
            "message has neither a \"T\" nor a \"stream\" field".to_string(),
        )),
    }
}
