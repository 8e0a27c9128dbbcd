//! Bucket lifecycle policy and retention enforcement.
//!
//! The bucket's lifecycle policy is a JSON manifest stored at a reserved key
//! inside the bucket itself, which keeps policy handling uniform across
//! backends. [`ObjectStore::apply_retention`] enforces the policy by sweeping
//! objects whose lifecycle reference timestamp is older than the rule allows.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET;
use crate::backend::ObjectMeta;
use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Reserved key prefix for gateway-internal objects. Never swept and never
/// reported as pipeline artifacts.
pub(crate) const RESERVED_PREFIX: &str = ".config/";

/// Key of the lifecycle policy manifest.
const LIFECYCLE_MANIFEST_KEY: &str = ".config/lifecycle.json";

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// A bucket-level lifecycle rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRule {
    /// What happens when the condition is met.
    pub action: LifecycleAction,
    /// When the action applies.
    pub condition: LifecycleCondition,
}

impl LifecycleRule {
    /// Rule deleting objects `days` after their lifecycle reference timestamp.
    pub fn delete_after_days(days: u32) -> Self {
        Self {
            action: LifecycleAction::Delete,
            condition: LifecycleCondition {
                days_since_custom_time: Some(days),
            },
        }
    }

    /// Structural check for the delete-by-custom-time shape.
    ///
    /// Deliberately ignores the day count: a rule with a different count still
    /// blocks adding a second rule of the same shape, so repeated
    /// initialization leaves at most one active policy.
    pub fn is_custom_time_deletion(&self) -> bool {
        self.action == LifecycleAction::Delete && self.condition.days_since_custom_time.is_some()
    }
}

/// Lifecycle rule action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// Delete the object.
    Delete,
}

/// Lifecycle rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleCondition {
    /// Age threshold in days, measured from the object's custom timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_since_custom_time: Option<u32>,
}

/// The manifest persisted at [`LIFECYCLE_MANIFEST_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct LifecycleManifest {
    rules: Vec<LifecycleRule>,
}

/// Outcome of a retention sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionReport {
    /// Number of objects examined.
    pub examined: usize,
    /// Keys deleted by the sweep, in list order.
    pub deleted: Vec<String>,
}

impl ObjectStore {
    /// Installs the delete-by-custom-time lifecycle rule on the bucket.
    ///
    /// Idempotent: if a rule of this shape already exists (regardless of its
    /// day count), the call reports success without touching the policy.
    pub async fn setup_auto_delete(&self, days_before_deletion: u32) -> StorageResult<()> {
        if days_before_deletion == 0 {
            return Err(StorageError::validation(
                "days_before_deletion must be positive",
            ));
        }

        let mut manifest = self.load_manifest().await?;
        if manifest.rules.iter().any(LifecycleRule::is_custom_time_deletion) {
            tracing::debug!(
                target: TRACING_TARGET,
                bucket = %self.bucket(),
                "Delete-by-custom-time rule already present, leaving policy unchanged"
            );
            return Ok(());
        }

        manifest
            .rules
            .push(LifecycleRule::delete_after_days(days_before_deletion));
        self.save_manifest(&manifest).await?;

        tracing::info!(
            target: TRACING_TARGET,
            bucket = %self.bucket(),
            days = days_before_deletion,
            "Lifecycle rule installed"
        );

        Ok(())
    }

    /// Returns the bucket's lifecycle rules.
    pub async fn lifecycle_rules(&self) -> StorageResult<Vec<LifecycleRule>> {
        Ok(self.load_manifest().await?.rules)
    }

    /// Enforces the lifecycle policy by deleting expired objects.
    ///
    /// An object's age is measured from its custom timestamp, falling back to
    /// its last-modified time when the backend records no custom timestamp.
    /// Objects with neither are skipped. Reserved gateway keys are never swept.
    pub async fn apply_retention(&self) -> StorageResult<RetentionReport> {
        self.apply_retention_at(Timestamp::now()).await
    }

    /// Enforces the lifecycle policy against an explicit instant.
    pub async fn apply_retention_at(&self, now: Timestamp) -> StorageResult<RetentionReport> {
        let manifest = self.load_manifest().await?;
        let Some(days) = manifest
            .rules
            .iter()
            .filter(|r| r.is_custom_time_deletion())
            .find_map(|r| r.condition.days_since_custom_time)
        else {
            return Ok(RetentionReport::default());
        };

        let mut report = RetentionReport::default();

        for key in self.backend().list_keys().await? {
            if key.starts_with(RESERVED_PREFIX) {
                continue;
            }
            report.examined += 1;

            let meta = match self.backend().stat(&key).await {
                Ok(meta) => meta,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };

            if expired_at(&meta, now, days) {
                self.backend().delete(&key).await?;
                report.deleted.push(key);
            }
        }

        tracing::info!(
            target: TRACING_TARGET,
            bucket = %self.bucket(),
            examined = report.examined,
            deleted = report.deleted.len(),
            "Retention sweep complete"
        );

        Ok(report)
    }

    async fn load_manifest(&self) -> StorageResult<LifecycleManifest> {
        match self.backend().get(LIFECYCLE_MANIFEST_KEY).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                StorageError::config(format!("corrupt lifecycle manifest: {e}"))
            }),
            Err(err) if err.is_not_found() => Ok(LifecycleManifest::default()),
            Err(err) => Err(err),
        }
    }

    async fn save_manifest(&self, manifest: &LifecycleManifest) -> StorageResult<()> {
        let raw = serde_json::to_vec_pretty(manifest)
            .map_err(|e| StorageError::config(format!("lifecycle manifest encoding: {e}")))?;
        self.backend()
            .put(LIFECYCLE_MANIFEST_KEY, raw, "application/json", Vec::new())
            .await
    }
}

/// Whether an object is past the rule's age threshold at `now`.
///
/// The age reference is the custom timestamp, falling back to last-modified.
/// Objects with neither never expire.
fn expired_at(meta: &ObjectMeta, now: Timestamp, days: u32) -> bool {
    let Some(reference) = meta.custom_time.or(meta.last_modified) else {
        return false;
    };
    now.as_second() - reference.as_second() > i64::from(days) * SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::store::UploadOptions;

    fn store() -> ObjectStore {
        ObjectStore::new(StorageConfig::memory("artifacts", "test-secret")).unwrap()
    }

    #[tokio::test]
    async fn setup_auto_delete_rejects_zero_days() {
        let store = store();
        let err = store.setup_auto_delete(0).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn setup_auto_delete_is_idempotent() {
        let store = store();
        store.setup_auto_delete(7).await.unwrap();
        store.setup_auto_delete(7).await.unwrap();

        let rules = store.lifecycle_rules().await.unwrap();
        assert_eq!(rules, vec![LifecycleRule::delete_after_days(7)]);
    }

    #[tokio::test]
    async fn second_rule_with_different_days_is_not_added() {
        let store = store();
        store.setup_auto_delete(7).await.unwrap();
        store.setup_auto_delete(30).await.unwrap();

        let rules = store.lifecycle_rules().await.unwrap();
        assert_eq!(rules, vec![LifecycleRule::delete_after_days(7)]);
    }

    #[tokio::test]
    async fn manifest_cannot_be_replaced_through_uploads() {
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

        store.setup_auto_delete(7).await.unwrap();
        assert_eq!(store.lifecycle_rules().await.unwrap(), vec![
            LifecycleRule::delete_after_days(7)
        ]);
    }

    #[tokio::test]
    async fn retention_sweep_spares_fresh_objects_and_the_manifest() {
        let store = store();
        store.setup_auto_delete(7).await.unwrap();
        store
            .upload("a.svg", b"<svg/>".to_vec(), UploadOptions::svg())
            .await
            .unwrap();
        store
            .upload("b.svg", b"<svg/>".to_vec(), UploadOptions::svg())
            .await
            .unwrap();

        let report = store.apply_retention().await.unwrap();
        assert_eq!(report.examined, 2);
        assert!(report.deleted.is_empty());
        assert!(store.exists_or_unknown("a.svg").await);
        assert!(store.exists_or_unknown("b.svg").await);

        // The policy itself survives the sweep.
        assert_eq!(store.lifecycle_rules().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retention_sweep_deletes_and_reports_aged_objects() {
        let store = store();
        store.setup_auto_delete(7).await.unwrap();
        store
            .upload("old/a.svg", b"<svg/>".to_vec(), UploadOptions::svg())
            .await
            .unwrap();
        store
            .upload("old/b.svg", b"<svg/>".to_vec(), UploadOptions::svg())
            .await
            .unwrap();

        let later =
            Timestamp::from_second(Timestamp::now().as_second() + 8 * SECONDS_PER_DAY).unwrap();
        let report = store.apply_retention_at(later).await.unwrap();

        assert_eq!(report.examined, 2);
        let mut deleted = report.deleted.clone();
        deleted.sort();
        assert_eq!(deleted, vec![
            "old/a.svg".to_string(),
            "old/b.svg".to_string()
        ]);
        assert!(!store.exists_or_unknown("old/a.svg").await);
        assert!(!store.exists_or_unknown("old/b.svg").await);

        // The policy manifest is never swept, however old it gets.
        assert_eq!(store.lifecycle_rules().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retention_sweep_without_policy_does_nothing() {
        let store = store();
        store
            .upload("a.svg", b"<svg/>".to_vec(), UploadOptions::svg())
            .await
            .unwrap();

        let report = store.apply_retention().await.unwrap();
        assert_eq!(report, RetentionReport::default());
    }

    fn meta(
        custom_time: Option<Timestamp>,
        last_modified: Option<Timestamp>,
    ) -> ObjectMeta {
        ObjectMeta {
            size: 1,
            content_type: None,
            last_modified,
            custom_time,
            expiration_days: None,
        }
    }

    #[test]
    fn expiry_falls_back_to_last_modified() {
        let now = Timestamp::now();
        let aged = Timestamp::from_second(now.as_second() - 10 * SECONDS_PER_DAY).unwrap();

        assert!(expired_at(&meta(None, Some(aged)), now, 7));
        assert!(expired_at(&meta(Some(aged), None), now, 7));

        // The custom timestamp wins over last-modified.
        assert!(!expired_at(&meta(Some(now), Some(aged)), now, 7));

        // No reference timestamp means the object never expires.
        assert!(!expired_at(&meta(None, None), now, 7));
    }

    #[test]
    fn structural_match_ignores_day_count() {
        assert!(LifecycleRule::delete_after_days(7).is_custom_time_deletion());
        assert!(LifecycleRule::delete_after_days(30).is_custom_time_deletion());

        let unrelated = LifecycleRule {
            action: LifecycleAction::Delete,
            condition: LifecycleCondition {
                days_since_custom_time: None,
            },
        };
        assert!(!unrelated.is_custom_time_deletion());
    }
}
