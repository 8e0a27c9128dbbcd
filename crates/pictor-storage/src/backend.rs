//! Raw storage backend built on OpenDAL operators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use opendal::{Operator, services};

use crate::TRACING_TARGET;
use crate::config::{BackendKind, StorageConfig};
use crate::error::{StorageError, StorageResult};

/// User metadata key carrying the lifecycle reference timestamp.
pub(crate) const META_CUSTOM_TIME: &str = "custom-time";

/// User metadata key recording the expiration days requested at upload.
pub(crate) const META_EXPIRATION_DAYS: &str = "expiration-days";

/// Unified storage backend that wraps an OpenDAL operator.
///
/// This is the raw transport layer: it performs bucket I/O but applies no
/// gateway validation. Callers go through [`crate::ObjectStore`] instead.
#[derive(Clone)]
pub struct StorageBackend {
    operator: Operator,
    config: StorageConfig,
    /// User metadata for backends without native support. Process-local, like
    /// the in-memory backend's data itself.
    local_meta: Arc<Mutex<HashMap<String, HashMap<String, String>>>>,
}

impl StorageBackend {
    /// Creates a new storage backend from configuration.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let operator = Self::create_operator(&config)?;

        tracing::info!(
            target: TRACING_TARGET,
            backend = %config.backend.scheme(),
            bucket = %config.bucket,
            "Storage backend initialized"
        );

        Ok(Self {
            operator,
            config,
            local_meta: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Returns the configuration for this backend.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the bucket name.
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Writes an object, overwriting any previous content under the same key.
    ///
    /// Content type is applied only where the backend supports it. User
    /// metadata is stored natively where supported, otherwise in the
    /// process-local side table.
    pub async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        user_metadata: Vec<(String, String)>,
    ) -> StorageResult<()> {
        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            size = data.len(),
            content_type = %content_type,
            "Writing object"
        );

        let capability = self.operator.info().full_capability();
        let mut write = self.operator.write_with(key, data);

        if capability.write_with_content_type {
            write = write.content_type(content_type);
        }
        if capability.write_with_user_metadata {
            write = write.user_metadata(user_metadata);
            write.await?;
        } else {
            write.await?;
            self.local_meta
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.to_string(), user_metadata.into_iter().collect());
        }

        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            "Object write complete"
        );

        Ok(())
    }

    /// Reads an object's content.
    pub async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            "Reading object"
        );

        let data = self.operator.read(key).await?.to_vec();

        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            size = data.len(),
            "Object read complete"
        );

        Ok(data)
    }

    /// Deletes an object.
    ///
    /// Deleting an absent key fails with [`StorageError::NotFound`].
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            "Deleting object"
        );

        if !self.operator.exists(key).await? {
            return Err(StorageError::not_found(key));
        }
        self.operator.delete(key).await?;
        self.local_meta
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);

        tracing::info!(
            target: TRACING_TARGET,
            key = %key,
            "Object deleted"
        );

        Ok(())
    }

    /// Checks if an object exists.
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.operator.exists(key).await?)
    }

    /// Gets metadata for an object.
    pub async fn stat(&self, key: &str) -> StorageResult<ObjectMeta> {
        let meta = self.operator.stat(key).await?;

        // Convert chrono DateTime to jiff Timestamp
        let last_modified = meta
            .last_modified()
            .and_then(|dt| jiff::Timestamp::from_second(dt.timestamp()).ok());

        let local = self
            .local_meta
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        let user_value = |name: &str| {
            meta.user_metadata()
                .and_then(|m| m.get(name).cloned())
                .or_else(|| local.as_ref().and_then(|m| m.get(name).cloned()))
        };

        let custom_time =
            user_value(META_CUSTOM_TIME).and_then(|raw| raw.parse::<jiff::Timestamp>().ok());

        let expiration_days =
            user_value(META_EXPIRATION_DAYS).and_then(|raw| raw.parse::<i64>().ok());

        Ok(ObjectMeta {
            size: meta.content_length(),
            content_type: meta.content_type().map(|s| s.to_string()),
            last_modified,
            custom_time,
            expiration_days,
        })
    }

    /// Lists all object keys in the bucket.
    pub async fn list_keys(&self) -> StorageResult<Vec<String>> {
        use futures::TryStreamExt;

        let entries: Vec<_> = self
            .operator
            .lister_with("/")
            .recursive(true)
            .await?
            .try_collect()
            .await?;

        Ok(entries
            .into_iter()
            .filter(|e| e.metadata().is_file())
            .map(|e| e.path().to_string())
            .collect())
    }

    /// Creates an OpenDAL operator based on configuration.
    fn create_operator(config: &StorageConfig) -> StorageResult<Operator> {
        match &config.backend {
            BackendKind::Memory => {
                let builder = services::Memory::default();

                Operator::new(builder)
                    .map(|op| op.finish())
                    .map_err(|e| StorageError::config(e.to_string()))
            }

            #[cfg(feature = "gcs")]
            BackendKind::Gcs { credential_path } => {
                let mut builder = services::Gcs::default().bucket(&config.bucket);

                if let Some(path) = credential_path {
                    builder = builder.credential_path(path);
                }

                Operator::new(builder)
                    .map(|op| op.finish())
                    .map_err(|e| StorageError::config(e.to_string()))
            }

            #[cfg(feature = "s3")]
            BackendKind::S3 {
                region,
                endpoint,
                access_key_id,
                secret_access_key,
            } => {
                let mut builder = services::S3::default().bucket(&config.bucket);

                if let Some(region) = region {
                    builder = builder.region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.endpoint(endpoint);
                }
                if let Some(access_key_id) = access_key_id {
                    builder = builder.access_key_id(access_key_id);
                }
                if let Some(secret_access_key) = secret_access_key {
                    builder = builder.secret_access_key(secret_access_key);
                }

                Operator::new(builder)
                    .map(|op| op.finish())
                    .map_err(|e| StorageError::config(e.to_string()))
            }
        }
    }
}

/// Object metadata as seen by the gateway.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Content type / MIME type, when the backend records one.
    pub content_type: Option<String>,
    /// Last modification time.
    pub last_modified: Option<jiff::Timestamp>,
    /// Lifecycle reference timestamp stamped at upload.
    pub custom_time: Option<jiff::Timestamp>,
    /// Expiration days requested at upload. Retention is governed by the
    /// bucket-level lifecycle rule, not this value.
    pub expiration_days: Option<i64>,
}

impl std::fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageBackend")
            .field("backend", &self.config.backend.scheme())
            .field("bucket", &self.config.bucket)
            .finish()
    }
}
