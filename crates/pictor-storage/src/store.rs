//! The object storage gateway.

use jiff::Timestamp;
use url::Url;

use crate::TRACING_TARGET;
use crate::backend::{META_CUSTOM_TIME, META_EXPIRATION_DAYS, ObjectMeta, StorageBackend};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::grant::{GrantAction, GrantClaims, GrantSigner, SignedGrant};
use crate::lifecycle::RESERVED_PREFIX;

/// Default content type applied when the caller does not specify one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Default requested expiration, in days.
pub const DEFAULT_EXPIRATION_DAYS: i64 = 7;

/// Default signed grant validity, in minutes.
pub const DEFAULT_GRANT_MINUTES: i64 = 60;

/// Single point of access to the pipeline's artifact bucket.
///
/// Construct one instance at process startup and share it by reference (or
/// clone it; clones share the underlying backend connection). All inputs are
/// validated here and all backend failures are wrapped in [`StorageError`], so
/// callers never see raw backend error types.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    backend: StorageBackend,
    signer: GrantSigner,
}

/// Options for [`ObjectStore::upload`].
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    /// MIME type recorded with the object.
    pub content_type: String,
    /// Requested expiration in days. Validated (must be non-negative) and
    /// recorded in object metadata, but retention is governed solely by the
    /// bucket-level lifecycle rule; see [`ObjectStore::setup_auto_delete`].
    pub expiration_days: i64,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            expiration_days: DEFAULT_EXPIRATION_DAYS,
        }
    }
}

impl UploadOptions {
    /// Options for an SVG artifact.
    pub fn svg() -> Self {
        Self {
            content_type: "image/svg+xml".to_string(),
            ..Self::default()
        }
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Sets the requested expiration days.
    pub fn with_expiration_days(mut self, days: i64) -> Self {
        self.expiration_days = days;
        self
    }
}

/// Canonical URI identifying a stored object, `<scheme>://<bucket>/<key>`.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Into)]
pub struct ObjectUri(String);

impl ObjectUri {
    /// Returns the URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ObjectStore {
    /// Creates a gateway for the configured bucket.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let signer = GrantSigner::new(config.bucket.clone(), config.signing.clone());
        let backend = StorageBackend::new(config)?;

        Ok(Self { backend, signer })
    }

    /// Returns the bucket name.
    pub fn bucket(&self) -> &str {
        self.backend.bucket()
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Uploads an object, overwriting any previous content under `key`.
    ///
    /// The current instant is stamped as the object's lifecycle reference
    /// timestamp. Returns the canonical URI of the stored object.
    pub async fn upload(
        &self,
        key: &str,
        content: impl Into<Vec<u8>>,
        options: UploadOptions,
    ) -> StorageResult<ObjectUri> {
        let key = validated_key(key)?;
        if options.expiration_days < 0 {
            return Err(StorageError::validation(format!(
                "expiration_days must be non-negative, got {}",
                options.expiration_days
            )));
        }

        let custom_time = Timestamp::now();
        let user_metadata = vec![
            (META_CUSTOM_TIME.to_string(), custom_time.to_string()),
            (
                META_EXPIRATION_DAYS.to_string(),
                options.expiration_days.to_string(),
            ),
        ];

        self.backend
            .put(key, content.into(), &options.content_type, user_metadata)
            .await?;

        let uri = self.uri_for(key);
        tracing::info!(
            target: TRACING_TARGET,
            key = %key,
            uri = %uri,
            content_type = %options.content_type,
            "Object uploaded"
        );

        Ok(uri)
    }

    /// Downloads an object's content.
    ///
    /// Fails with [`StorageError::NotFound`] if the object is absent. Safe to
    /// retry; downloading has no side effect.
    pub async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        let key = validated_key(key)?;
        self.backend.get(key).await
    }

    /// Deletes an object.
    ///
    /// Deleting an absent key is an error, not a silent no-op.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        let key = validated_key(key)?;
        self.backend.delete(key).await
    }

    /// Best-effort existence check.
    ///
    /// Any failure of the underlying check degrades to `false` and is logged,
    /// so callers can branch without handling backend errors. Callers needing
    /// a strong guarantee must use [`Self::download`] or [`Self::delete`] and
    /// interpret their errors.
    pub async fn exists_or_unknown(&self, key: &str) -> bool {
        let key = match validated_key(key) {
            Ok(key) => key,
            Err(_) => return false,
        };

        match self.backend.exists(key).await {
            Ok(exists) => exists,
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    key = %key,
                    error = %err,
                    "Existence check failed, reporting object as absent"
                );
                false
            }
        }
    }

    /// Gets metadata for an object.
    pub async fn metadata(&self, key: &str) -> StorageResult<ObjectMeta> {
        let key = validated_key(key)?;
        self.backend.stat(key).await
    }

    /// Issues a signed capability URL for one object.
    ///
    /// The grant is valid for exactly `expiration_minutes` from issuance and
    /// is scoped to `action`. It cannot be revoked before expiry.
    pub async fn create_signed_grant(
        &self,
        key: &str,
        expiration_minutes: i64,
        action: GrantAction,
    ) -> StorageResult<SignedGrant> {
        let key = validated_key(key)?;
        if expiration_minutes <= 0 {
            return Err(StorageError::validation(format!(
                "expiration_minutes must be positive, got {expiration_minutes}"
            )));
        }

        let grant = self.signer.issue(key, action, expiration_minutes)?;

        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            action = %action,
            expires_at = %grant.expires_at,
            "Signed grant issued"
        );

        Ok(grant)
    }

    /// Verifies a signed grant URL, returning its claims.
    pub fn verify_grant(&self, url: &Url) -> StorageResult<GrantClaims> {
        self.verify_grant_at(url, Timestamp::now())
    }

    /// Verifies a signed grant URL against an explicit instant.
    pub fn verify_grant_at(&self, url: &Url, now: Timestamp) -> StorageResult<GrantClaims> {
        self.signer.verify_at(url, now)
    }

    fn uri_for(&self, key: &str) -> ObjectUri {
        ObjectUri(format!(
            "{}://{}/{}",
            self.backend.config().backend.scheme(),
            self.backend.bucket(),
            key
        ))
    }
}

/// Validates an object key: non-empty, not whitespace-only, and outside the
/// reserved gateway prefix.
fn validated_key(key: &str) -> StorageResult<&str> {
    if key.trim().is_empty() {
        return Err(StorageError::validation("object key must not be empty"));
    }
    if key.starts_with(RESERVED_PREFIX) {
        return Err(StorageError::validation(format!(
            "object keys under '{RESERVED_PREFIX}' are reserved for the gateway"
        )));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn store() -> ObjectStore {
        ObjectStore::new(StorageConfig::memory("artifacts", "test-secret")).unwrap()
    }

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let store = store();
        let uri = store
            .upload("reports/a.bin", vec![1u8, 2, 3, 4], UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(uri.as_str(), "memory://artifacts/reports/a.bin");
        assert_eq!(store.download("reports/a.bin").await.unwrap(), vec![
            1u8, 2, 3, 4
        ]);
    }

    #[tokio::test]
    async fn upload_overwrites_existing_content() {
        let store = store();
        store
            .upload("k", b"old".to_vec(), UploadOptions::default())
            .await
            .unwrap();
        store
            .upload("k", b"new".to_vec(), UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(store.download("k").await.unwrap(), b"new".to_vec());
    }

    #[tokio::test]
    async fn upload_rejects_empty_key() {
        let store = store();
        let err = store
            .upload("", b"data".to_vec(), UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));

        let err = store
            .upload("   ", b"data".to_vec(), UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn reserved_prefix_keys_are_rejected() {
        let store = store();

        let err = store
            .upload(
                ".config/lifecycle.json",
                b"not json".to_vec(),
                UploadOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));

        let err = store.delete(".config/lifecycle.json").await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));

        let err = store.download(".config/anything").await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn upload_rejects_negative_expiration_days() {
        let store = store();
        let err = store
            .upload(
                "k",
                b"data".to_vec(),
                UploadOptions::default().with_expiration_days(-1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn upload_accepts_zero_expiration_days() {
        let store = store();
        store
            .upload(
                "k",
                b"data".to_vec(),
                UploadOptions::default().with_expiration_days(0),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn download_absent_key_is_not_found() {
        let store = store();
        let err = store.download("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_then_exists_is_false() {
        let store = store();
        store
            .upload("gone", b"x".to_vec(), UploadOptions::default())
            .await
            .unwrap();

        store.delete("gone").await.unwrap();
        assert!(!store.exists_or_unknown("gone").await);
    }

    #[tokio::test]
    async fn delete_absent_key_is_an_error() {
        let store = store();
        let err = store.delete("never-uploaded").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn signed_grant_rejects_non_positive_minutes() {
        let store = store();
        let err = store
            .create_signed_grant("k", 0, GrantAction::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));

        let err = store
            .create_signed_grant("k", -5, GrantAction::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn signed_grant_rejects_overflowing_minutes() {
        let store = store();
        let err = store
            .create_signed_grant("k", i64::MAX, GrantAction::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn signed_grant_verifies_through_the_store() {
        let store = store();
        let grant = store
            .create_signed_grant("images/test.svg", 30, GrantAction::Read)
            .await
            .unwrap();

        let claims = store.verify_grant(&grant.url).unwrap();
        assert_eq!(claims.key, "images/test.svg");
        assert_eq!(claims.action, GrantAction::Read);
    }

    #[tokio::test]
    async fn metadata_reports_object_size() {
        let store = store();
        store
            .upload("sized", vec![0u8; 128], UploadOptions::default())
            .await
            .unwrap();

        let meta = store.metadata("sized").await.unwrap();
        assert_eq!(meta.size, 128);
    }

    #[tokio::test]
    async fn svg_artifact_scenario() {
        let store = store();

        let uri = store
            .upload("images/test.svg", b"<svg/>".to_vec(), UploadOptions::svg())
            .await
            .unwrap();
        assert!(uri.as_str().contains("artifacts"));
        assert!(uri.as_str().contains("images/test.svg"));

        assert!(store.exists_or_unknown("images/test.svg").await);
        assert_eq!(
            store.download("images/test.svg").await.unwrap(),
            b"<svg/>".to_vec()
        );

        store.delete("images/test.svg").await.unwrap();
        assert!(!store.exists_or_unknown("images/test.svg").await);
    }
}
