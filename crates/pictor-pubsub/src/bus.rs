//! The message bus: single and batch publication over resolved topics.

use crate::TRACING_TARGET_PUBLISH;
use crate::client::BusClient;
use crate::error::{Error, Result};
use crate::message::{Message, MessageId};
use crate::registry::TopicRegistry;
use crate::topic::PublishTarget;

/// Publishes pipeline messages to named topics.
///
/// Built on a [`TopicRegistry`]: topics are resolved lazily and cached, and
/// every publish goes through the cached handle. The bus holds no per-message
/// state and never retries; retries are the caller's responsibility.
#[derive(Debug, Clone)]
pub struct MessageBus {
    registry: TopicRegistry,
}

impl MessageBus {
    /// Creates a bus from a connected client.
    pub fn new(client: &BusClient) -> Self {
        Self {
            registry: TopicRegistry::new(client.jetstream().clone()),
        }
    }

    /// Creates a bus from an existing registry, sharing its cache.
    pub fn with_registry(registry: TopicRegistry) -> Self {
        Self { registry }
    }

    /// Returns the underlying topic registry.
    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Publishes one message, returning the backend-assigned id.
    pub async fn publish(&self, topic_name: &str, message: &Message) -> Result<MessageId> {
        let topic = self.registry.resolve(topic_name).await?;
        let (headers, payload) = message.encode()?;
        topic.publish_raw(headers, payload).await
    }

    /// Publishes messages sequentially against one resolved topic handle.
    ///
    /// Returns the message ids in input order. Fail-fast with no rollback:
    /// if message `k` fails, messages `0..k` stay published and the error
    /// reports `k`; the bus does not track which ids were assigned before the
    /// failure.
    pub async fn publish_batch(
        &self,
        topic_name: &str,
        messages: &[Message],
    ) -> Result<Vec<MessageId>> {
        let topic = self.registry.resolve(topic_name).await?;
        let ids = publish_all(&topic, messages).await?;

        tracing::debug!(
            target: TRACING_TARGET_PUBLISH,
            topic = %topic_name,
            count = ids.len(),
            "Published batch"
        );

        Ok(ids)
    }

    /// Explicitly creates a topic (distinct from lazy resolution).
    pub async fn create_topic(&self, topic_name: &str) -> Result<()> {
        self.registry.create(topic_name).await?;
        Ok(())
    }
}

/// Sequential fail-fast publication of a message slice.
pub(crate) async fn publish_all<T>(target: &T, messages: &[Message]) -> Result<Vec<MessageId>>
where
    T: PublishTarget + ?Sized,
{
    let mut ids = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        let outcome = match message.encode() {
            Ok((headers, payload)) => target.publish_raw(headers, payload).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(id) => ids.push(id),
            Err(source) => {
                return Err(Error::Batch {
                    index,
                    published: ids.len(),
                    total: messages.len(),
                    source: Box::new(source),
                });
            }
        }
    }

    Ok(ids)
}
