//! Topic handles and the publish seam.

use async_nats::HeaderMap;
use async_nats::jetstream::{self, stream};
use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::message::MessageId;
use crate::{TRACING_TARGET_PUBLISH, TRACING_TARGET_TOPIC};

/// Prefix under which all topic subjects live.
const SUBJECT_PREFIX: &str = "topics";

/// Seam for message publication.
///
/// [`TopicHandle`] is the production implementation; tests substitute fakes to
/// exercise batch semantics without a live server.
#[async_trait]
pub trait PublishTarget: Send + Sync {
    /// Subject messages are published to.
    fn subject(&self) -> &str;

    /// Publishes an encoded message, returning the backend-assigned id.
    async fn publish_raw(&self, headers: Option<HeaderMap>, payload: Bytes) -> Result<MessageId>;
}

/// A resolved topic: a JetStream stream plus the subject to publish on.
///
/// Handles are cheap to clone and remain valid for the process lifetime. A
/// handle is never re-validated against the backend after resolution; a topic
/// name is assumed stable once used.
#[derive(Debug, Clone)]
pub struct TopicHandle {
    jetstream: jetstream::Context,
    name: String,
    stream_name: String,
    subject: String,
}

impl TopicHandle {
    /// Returns the topic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backing stream name.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Resolves a topic, creating the backing stream if it does not exist.
    pub(crate) async fn resolve(jetstream: &jetstream::Context, name: &str) -> Result<Self> {
        let handle = Self::parts(jetstream, name)?;

        match jetstream.get_stream(&handle.stream_name).await {
            Ok(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_TOPIC,
                    topic = %name,
                    stream = %handle.stream_name,
                    "Using existing stream"
                );
                Ok(handle)
            }
            Err(_) => handle.create_stream().await,
        }
    }

    /// Creates the backing stream explicitly.
    pub(crate) async fn create(jetstream: &jetstream::Context, name: &str) -> Result<Self> {
        let handle = Self::parts(jetstream, name)?;
        handle.create_stream().await
    }

    fn parts(jetstream: &jetstream::Context, name: &str) -> Result<Self> {
        validate_topic_name(name)?;
        Ok(Self {
            jetstream: jetstream.clone(),
            name: name.to_string(),
            stream_name: stream_name_for(name),
            subject: subject_for(name),
        })
    }

    async fn create_stream(self) -> Result<Self> {
        let config = stream::Config {
            name: self.stream_name.clone(),
            description: Some(format!("Pipeline topic: {}", self.name)),
            subjects: vec![self.subject.clone()],
            ..Default::default()
        };

        tracing::info!(
            target: TRACING_TARGET_TOPIC,
            topic = %self.name,
            stream = %self.stream_name,
            subject = %self.subject,
            "Creating stream"
        );

        self.jetstream
            .create_stream(config)
            .await
            .map_err(|e| Error::topic(&self.name, e.to_string()))?;

        Ok(self)
    }
}

#[async_trait]
impl PublishTarget for TopicHandle {
    fn subject(&self) -> &str {
        &self.subject
    }

    async fn publish_raw(&self, headers: Option<HeaderMap>, payload: Bytes) -> Result<MessageId> {
        let payload_size = payload.len();

        let ack_future = match headers {
            Some(headers) => {
                self.jetstream
                    .publish_with_headers(self.subject.clone(), headers, payload)
                    .await
            }
            None => self.jetstream.publish(self.subject.clone(), payload).await,
        }
        .map_err(|e| Error::publish(&self.subject, e.to_string()))?;

        let ack = ack_future
            .await
            .map_err(|e| Error::publish(&self.subject, e.to_string()))?;

        let id = MessageId::new(&ack.stream, ack.sequence);
        tracing::debug!(
            target: TRACING_TARGET_PUBLISH,
            subject = %self.subject,
            message_id = %id,
            payload_size = payload_size,
            "Published message"
        );

        Ok(id)
    }
}

/// Validates a topic name.
///
/// Names must be non-empty and limited to ASCII alphanumerics, `-` and `_`,
/// which keeps them clear of NATS subject metacharacters (`.`, `*`, `>`).
pub(crate) fn validate_topic_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_topic(name, "must not be empty"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(Error::invalid_topic(
            name,
            format!("character '{bad}' is not allowed"),
        ));
    }
    Ok(())
}

/// Stream name backing a topic, e.g. `task-events` -> `TASK_EVENTS`.
pub(crate) fn stream_name_for(name: &str) -> String {
    name.to_ascii_uppercase().replace('-', "_")
}

/// Subject a topic publishes on, e.g. `task-events` -> `topics.task-events`.
pub(crate) fn subject_for(name: &str) -> String {
    format!("{SUBJECT_PREFIX}.{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_pass() {
        for name in ["task-events", "render_done", "Tasks01"] {
            assert!(validate_topic_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn invalid_names_fail() {
        for name in ["", "task.events", "task events", "task*", "tasks>", "täsk"] {
            assert!(
                matches!(
                    validate_topic_name(name),
                    Err(Error::InvalidTopic { .. })
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn naming_scheme() {
        assert_eq!(stream_name_for("task-events"), "TASK_EVENTS");
        assert_eq!(subject_for("task-events"), "topics.task-events");
    }
}
