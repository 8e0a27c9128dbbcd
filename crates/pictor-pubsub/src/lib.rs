#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for bus client and connection operations.
pub const TRACING_TARGET_CLIENT: &str = "pictor_pubsub::client";

/// Tracing target for topic resolution and registry operations.
pub const TRACING_TARGET_TOPIC: &str = "pictor_pubsub::topic";

/// Tracing target for message publication.
pub const TRACING_TARGET_PUBLISH: &str = "pictor_pubsub::publish";

mod bus;
mod client;
mod error;
mod message;
mod registry;
mod topic;

#[doc(hidden)]
pub mod prelude;

// Re-export async_nats types needed by consumers
pub use async_nats::HeaderMap;
pub use async_nats::jetstream;

pub use bus::MessageBus;
pub use client::{BusClient, BusConfig, BusCredentials};
pub use error::{Error, Result};
pub use message::{Message, MessageId};
pub use registry::TopicRegistry;
pub use topic::{PublishTarget, TopicHandle};
