//! Messages and message identifiers.

use std::collections::HashMap;

use async_nats::HeaderMap;
use bytes::Bytes;
use serde::Serialize;

use crate::error::Result;

/// A message to publish on a topic.
///
/// The payload is an arbitrary structured value, JSON-encoded to bytes at
/// publish time. Attributes are optional out-of-band routing metadata carried
/// as NATS headers. Messages are ephemeral: the backend assigns a
/// [`MessageId`] on successful publish and nothing is retained locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    payload: serde_json::Value,
    attributes: HashMap<String, String>,
}

impl Message {
    /// Creates a message from any serializable payload.
    pub fn new(payload: &impl Serialize) -> Result<Self> {
        Ok(Self {
            payload: serde_json::to_value(payload)?,
            attributes: HashMap::new(),
        })
    }

    /// Creates a message from a pre-built JSON value.
    pub fn from_value(payload: serde_json::Value) -> Self {
        Self {
            payload,
            attributes: HashMap::new(),
        }
    }

    /// Adds a routing attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns the payload.
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Returns the attributes.
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Encodes the message for transmission: JSON payload bytes plus headers
    /// when any attributes are set.
    pub(crate) fn encode(&self) -> Result<(Option<HeaderMap>, Bytes)> {
        let payload = Bytes::from(serde_json::to_vec(&self.payload)?);

        let headers = if self.attributes.is_empty() {
            None
        } else {
            let mut headers = HeaderMap::new();
            for (key, value) in &self.attributes {
                headers.insert(key.as_str(), value.as_str());
            }
            Some(headers)
        };

        Ok((headers, payload))
    }
}

/// Backend-assigned identifier of a published message.
///
/// Formatted as `<stream>:<sequence>` from the JetStream publish ack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Into)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a message id from a publish ack's stream name and sequence.
    pub fn new(stream: impl AsRef<str>, sequence: u64) -> Self {
        Self(format!("{}:{}", stream.as_ref(), sequence))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_json_payload() {
        let message = Message::from_value(serde_json::json!({ "task": "t-1" }));
        let (headers, payload) = message.encode().unwrap();

        assert!(headers.is_none());
        let decoded: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded, serde_json::json!({ "task": "t-1" }));
    }

    #[test]
    fn attributes_become_headers() {
        let message = Message::from_value(serde_json::json!({}))
            .with_attribute("stage", "render")
            .with_attribute("attempt", "1");

        let (headers, _) = message.encode().unwrap();
        let headers = headers.unwrap();
        assert_eq!(
            headers.get("stage").map(|v| v.as_str()),
            Some("render")
        );
        assert_eq!(headers.get("attempt").map(|v| v.as_str()), Some("1"));
    }

    #[test]
    fn new_serializes_arbitrary_payloads() {
        #[derive(Serialize)]
        struct Done {
            task: &'static str,
            status: &'static str,
        }

        let message = Message::new(&Done {
            task: "t-1",
            status: "DONE",
        })
        .unwrap();

        assert_eq!(message.payload()["status"], "DONE");
    }

    #[test]
    fn message_id_format() {
        let id = MessageId::new("TASK_EVENTS", 42);
        assert_eq!(id.as_str(), "TASK_EVENTS:42");
        assert_eq!(id.to_string(), "TASK_EVENTS:42");
    }
}
