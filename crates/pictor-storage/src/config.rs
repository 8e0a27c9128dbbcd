//! Storage gateway configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{StorageError, StorageResult};

/// Configuration for the storage gateway.
///
/// Construct one of these at process startup (usually via [`StorageConfig::from_env`])
/// and hand it to [`crate::ObjectStore::new`]. The bucket name is mandatory;
/// construction fails without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding all pipeline artifacts.
    pub bucket: String,
    /// Which storage service backs the bucket.
    pub backend: BackendKind,
    /// Signed grant issuance settings.
    pub signing: SigningConfig,
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum BackendKind {
    /// In-memory backend, used by tests and local development.
    Memory,

    /// Google Cloud Storage.
    #[cfg(feature = "gcs")]
    Gcs {
        /// Path to a service account JSON file. Ambient credentials are used
        /// when absent.
        credential_path: Option<String>,
    },

    /// Amazon S3 compatible storage.
    #[cfg(feature = "s3")]
    S3 {
        region: Option<String>,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    },
}

impl BackendKind {
    /// URI scheme used in canonical object URIs for this backend.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            #[cfg(feature = "gcs")]
            Self::Gcs { .. } => "gs",
            #[cfg(feature = "s3")]
            Self::S3 { .. } => "s3",
        }
    }
}

/// Settings for signed grant issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Shared secret used to sign capability URLs.
    pub key: String,
    /// Base URL under which signed grants are served.
    pub public_base_url: Url,
}

impl StorageConfig {
    /// Creates a configuration for the in-memory backend.
    pub fn memory(bucket: impl Into<String>, signing_key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            backend: BackendKind::Memory,
            signing: SigningConfig {
                key: signing_key.into(),
                public_base_url: default_public_base_url(),
            },
        }
    }

    /// Sets the public base URL for signed grants.
    pub fn with_public_base_url(mut self, base_url: Url) -> Self {
        self.signing.public_base_url = base_url;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// `STORAGE_BUCKET` and `STORAGE_SIGNING_KEY` are required; construction
    /// fails without them. `STORAGE_BACKEND` selects the backend (`memory` when
    /// unset) and `STORAGE_PUBLIC_URL` overrides the signed grant base URL.
    pub fn from_env() -> StorageResult<Self> {
        let bucket = std::env::var("STORAGE_BUCKET")
            .map_err(|_| StorageError::config("STORAGE_BUCKET is not set"))?;
        let key = std::env::var("STORAGE_SIGNING_KEY")
            .map_err(|_| StorageError::config("STORAGE_SIGNING_KEY is not set"))?;

        let public_base_url = match std::env::var("STORAGE_PUBLIC_URL") {
            Ok(raw) => Url::parse(&raw)
                .map_err(|e| StorageError::config(format!("invalid STORAGE_PUBLIC_URL: {e}")))?,
            Err(_) => default_public_base_url(),
        };

        let backend_name =
            std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".to_string());
        let backend = Self::backend_from_env(&backend_name)?;

        Ok(Self {
            bucket,
            backend,
            signing: SigningConfig {
                key,
                public_base_url,
            },
        })
    }

    fn backend_from_env(name: &str) -> StorageResult<BackendKind> {
        match name {
            "memory" => Ok(BackendKind::Memory),
            #[cfg(feature = "gcs")]
            "gcs" => Ok(BackendKind::Gcs {
                credential_path: std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
            }),
            #[cfg(feature = "s3")]
            "s3" => Ok(BackendKind::S3 {
                region: std::env::var("AWS_REGION").ok(),
                endpoint: std::env::var("AWS_ENDPOINT_URL").ok(),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
            }),
            other => Err(StorageError::config(format!(
                "unsupported storage backend '{other}' with current features"
            ))),
        }
    }
}

fn default_public_base_url() -> Url {
    Url::parse("http://127.0.0.1:8080/objects").expect("valid default base URL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_config_scheme() {
        let config = StorageConfig::memory("artifacts", "secret");
        assert_eq!(config.backend.scheme(), "memory");
        assert_eq!(config.bucket, "artifacts");
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = StorageConfig::memory("artifacts", "secret");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: StorageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
