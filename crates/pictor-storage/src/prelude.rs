//! Prelude module for convenient imports.

pub use crate::backend::{ObjectMeta, StorageBackend};
pub use crate::config::{BackendKind, SigningConfig, StorageConfig};
pub use crate::error::{StorageError, StorageResult};
pub use crate::grant::{GrantAction, GrantClaims, SignedGrant};
pub use crate::lifecycle::{LifecycleRule, RetentionReport};
pub use crate::store::{ObjectStore, ObjectUri, UploadOptions};
