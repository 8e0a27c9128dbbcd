//! Error types for messaging operations.

use std::time::Duration;

/// Result type for all messaging operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for messaging operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Topic name violates the naming rules.
    #[error("invalid topic name '{name}': {reason}")]
    InvalidTopic { name: String, reason: String },

    /// Serialization errors when encoding message payloads.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// NATS client/connection errors.
    #[error("connection error: {0}")]
    Connection(#[from] async_nats::Error),

    /// Operation timeout.
    #[error("operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Topic resolution or creation failed.
    #[error("topic '{topic}' operation failed: {reason}")]
    Topic { topic: String, reason: String },

    /// A single message publication failed.
    #[error("failed to publish to '{subject}': {reason}")]
    Publish { subject: String, reason: String },

    /// A batch publication failed partway through.
    ///
    /// Messages before `index` remain published; publishing has no undo.
    #[error("batch publish failed at message {index} ({published} of {total} published): {source}")]
    Batch {
        /// Zero-based index of the failing message.
        index: usize,
        /// How many messages were published before the failure.
        published: usize,
        /// Total number of messages in the batch.
        total: usize,
        /// The underlying publish failure.
        source: Box<Error>,
    },
}

impl Error {
    /// Creates an invalid topic error.
    pub fn invalid_topic(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTopic {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a topic operation error.
    pub fn topic(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Topic {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Creates a publish error.
    pub fn publish(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Publish {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { timeout: duration }
    }
}
