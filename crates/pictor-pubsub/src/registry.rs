//! Process-wide topic resolution cache.

use std::collections::HashMap;
use std::sync::Arc;

use async_nats::jetstream;
use tokio::sync::RwLock;

use crate::TRACING_TARGET_TOPIC;
use crate::error::Result;
use crate::topic::TopicHandle;

/// Caches resolved topic handles by name for the lifetime of the process.
///
/// Handles are resolved lazily on first use, never evicted and never
/// invalidated. Two tasks resolving the same name concurrently may both
/// construct a handle; the race is harmless (both handles point at the same
/// backend topic) and only one ends up cached.
#[derive(Debug, Clone)]
pub struct TopicRegistry {
    jetstream: jetstream::Context,
    topics: Arc<RwLock<HashMap<String, TopicHandle>>>,
}

impl TopicRegistry {
    /// Creates a registry on top of a JetStream context.
    pub fn new(jetstream: jetstream::Context) -> Self {
        Self {
            jetstream,
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the cached handle for `name`, resolving and caching it first
    /// if necessary.
    pub async fn resolve(&self, name: &str) -> Result<TopicHandle> {
        if let Some(handle) = self.topics.read().await.get(name) {
            return Ok(handle.clone());
        }

        let handle = TopicHandle::resolve(&self.jetstream, name).await?;

        let mut topics = self.topics.write().await;
        let handle = topics
            .entry(name.to_string())
            .or_insert(handle)
            .clone();

        tracing::debug!(
            target: TRACING_TARGET_TOPIC,
            topic = %name,
            cached = topics.len(),
            "Topic resolved"
        );

        Ok(handle)
    }

    /// Explicitly creates a topic and caches its handle.
    pub async fn create(&self, name: &str) -> Result<TopicHandle> {
        let handle = TopicHandle::create(&self.jetstream, name).await?;

        self.topics
            .write()
            .await
            .insert(name.to_string(), handle.clone());

        Ok(handle)
    }

    /// Number of cached topic handles.
    pub async fn cached_len(&self) -> usize {
        self.topics.read().await.len()
    }
}
