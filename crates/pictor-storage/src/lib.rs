#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod backend;
mod config;
mod error;
mod grant;
mod lifecycle;
mod store;

#[doc(hidden)]
pub mod prelude;

pub use backend::{ObjectMeta, StorageBackend};
pub use config::{BackendKind, SigningConfig, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use grant::{GrantAction, GrantClaims, SignedGrant};
pub use lifecycle::{LifecycleAction, LifecycleCondition, LifecycleRule, RetentionReport};
pub use store::{ObjectStore, ObjectUri, UploadOptions};

/// Tracing target for storage operations.
pub const TRACING_TARGET: &str = "pictor_storage";
