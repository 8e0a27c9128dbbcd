//! Prelude module for convenient imports.

pub use crate::bus::MessageBus;
pub use crate::client::{BusClient, BusConfig, BusCredentials};
pub use crate::error::{Error, Result};
pub use crate::message::{Message, MessageId};
pub use crate::registry::TopicRegistry;
pub use crate::topic::{PublishTarget, TopicHandle};
