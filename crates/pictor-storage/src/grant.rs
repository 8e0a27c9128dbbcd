//! Signed grants: time-boxed, action-scoped capability URLs.
//!
//! A grant is issued by the gateway itself and signed with the configured
//! shared secret (HMAC-SHA256), so issuance is an offline operation that works
//! identically across storage backends. Grants are immutable once issued and
//! cannot be revoked before expiry.

use hmac::{Hmac, Mac};
use jiff::Timestamp;
use sha2::Sha256;
use url::Url;

use crate::config::SigningConfig;
use crate::error::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

const PARAM_ACTION: &str = "action";
const PARAM_EXPIRES: &str = "expires";
const PARAM_SIGNATURE: &str = "signature";

/// Action a signed grant is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum GrantAction {
    /// Download the object.
    #[display("read")]
    Read,
    /// Upload or overwrite the object.
    #[display("write")]
    Write,
    /// Delete the object.
    #[display("delete")]
    Delete,
    /// Start or continue a resumable upload of the object.
    #[display("resumable")]
    ResumableWrite,
}

impl GrantAction {
    /// Returns the action name used in grant URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::ResumableWrite => "resumable",
        }
    }
}

impl std::str::FromStr for GrantAction {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "delete" => Ok(Self::Delete),
            "resumable" => Ok(Self::ResumableWrite),
            other => Err(StorageError::invalid_grant(format!(
                "unknown grant action '{other}'"
            ))),
        }
    }
}

/// A signed capability URL for one object.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedGrant {
    /// The capability URL, valid until `expires_at`.
    pub url: Url,
    /// Action the grant is scoped to.
    pub action: GrantAction,
    /// Instant after which the grant is no longer honored.
    pub expires_at: Timestamp,
}

/// Claims extracted from a verified grant URL.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantClaims {
    /// Object key the grant refers to.
    pub key: String,
    /// Action the grant permits.
    pub action: GrantAction,
    /// Grant expiry.
    pub expires_at: Timestamp,
}

/// Issues and verifies signed grants for one bucket.
#[derive(Clone)]
pub(crate) struct GrantSigner {
    bucket: String,
    signing: SigningConfig,
}

impl std::fmt::Debug for GrantSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantSigner")
            .field("bucket", &self.bucket)
            .field("public_base_url", &self.signing.public_base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl GrantSigner {
    pub(crate) fn new(bucket: impl Into<String>, signing: SigningConfig) -> Self {
        Self {
            bucket: bucket.into(),
            signing,
        }
    }

    /// Issues a grant valid for `expiration_minutes` from now.
    pub(crate) fn issue(
        &self,
        key: &str,
        action: GrantAction,
        expiration_minutes: i64,
    ) -> StorageResult<SignedGrant> {
        let now = Timestamp::now();
        let expires_second = expiration_minutes
            .checked_mul(60)
            .and_then(|seconds| now.as_second().checked_add(seconds))
            .ok_or_else(|| StorageError::validation("grant expiry out of range"))?;
        let expires_at = Timestamp::from_second(expires_second)
            .map_err(|e| StorageError::validation(format!("grant expiry out of range: {e}")))?;

        let signature = self.sign(key, action, expires_at)?;
        let url = self.grant_url(key, action, expires_at, &signature)?;

        Ok(SignedGrant {
            url,
            action,
            expires_at,
        })
    }

    /// Verifies a grant URL against the current time.
    #[allow(dead_code)]
    pub(crate) fn verify(&self, url: &Url) -> StorageResult<GrantClaims> {
        self.verify_at(url, Timestamp::now())
    }

    /// Verifies a grant URL against an explicit instant.
    pub(crate) fn verify_at(&self, url: &Url, now: Timestamp) -> StorageResult<GrantClaims> {
        let key = self.key_from_path(url)?;

        let mut action = None;
        let mut expires = None;
        let mut signature = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                PARAM_ACTION => action = Some(value.parse::<GrantAction>()?),
                PARAM_EXPIRES => expires = Some(value.into_owned()),
                PARAM_SIGNATURE => signature = Some(value.into_owned()),
                _ => {}
            }
        }

        let action = action.ok_or_else(|| StorageError::invalid_grant("missing action"))?;
        let expires = expires.ok_or_else(|| StorageError::invalid_grant("missing expiry"))?;
        let signature = signature.ok_or_else(|| StorageError::invalid_grant("missing signature"))?;

        let expires_second = expires
            .parse::<i64>()
            .map_err(|_| StorageError::invalid_grant("malformed expiry"))?;
        let expires_at = Timestamp::from_second(expires_second)
            .map_err(|_| StorageError::invalid_grant("expiry out of range"))?;

        let signature_bytes = hex::decode(&signature)
            .map_err(|_| StorageError::invalid_grant("malformed signature"))?;

        let mut mac = self.mac()?;
        mac.update(self.canonical(&key, action, expires_at).as_bytes());
        mac.verify_slice(&signature_bytes)
            .map_err(|_| StorageError::invalid_grant("signature mismatch"))?;

        if now > expires_at {
            return Err(StorageError::GrantExpired(expires_at));
        }

        Ok(GrantClaims {
            key,
            action,
            expires_at,
        })
    }

    fn sign(&self, key: &str, action: GrantAction, expires_at: Timestamp) -> StorageResult<String> {
        let mut mac = self.mac()?;
        mac.update(self.canonical(key, action, expires_at).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> StorageResult<HmacSha256> {
        HmacSha256::new_from_slice(self.signing.key.as_bytes())
            .map_err(|e| StorageError::config(format!("invalid signing key: {e}")))
    }

    fn canonical(&self, key: &str, action: GrantAction, expires_at: Timestamp) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            self.bucket,
            key,
            action.as_str(),
            expires_at.as_second()
        )
    }

    fn grant_url(
        &self,
        key: &str,
        action: GrantAction,
        expires_at: Timestamp,
        signature: &str,
    ) -> StorageResult<Url> {
        let mut url = self.signing.public_base_url.clone();

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::config("public base URL cannot be a base"))?;
            segments.pop_if_empty();
            segments.push(&self.bucket);
            for part in key.split('/') {
                segments.push(part);
            }
        }

        url.query_pairs_mut()
            .append_pair(PARAM_ACTION, action.as_str())
            .append_pair(PARAM_EXPIRES, &expires_at.as_second().to_string())
            .append_pair(PARAM_SIGNATURE, signature);

        Ok(url)
    }

    fn key_from_path(&self, url: &Url) -> StorageResult<String> {
        let base_path = self
            .signing
            .public_base_url
            .path()
            .trim_matches('/')
            .to_string();
        let path = url.path().trim_start_matches('/');

        let after_base = if base_path.is_empty() {
            path
        } else {
            path.strip_prefix(&format!("{base_path}/"))
                .ok_or_else(|| StorageError::invalid_grant("URL outside grant namespace"))?
        };

        let key = after_base
            .strip_prefix(&format!("{}/", self.bucket))
            .ok_or_else(|| StorageError::invalid_grant("URL names a different bucket"))?;

        if key.is_empty() {
            return Err(StorageError::invalid_grant("missing object key"));
        }

        Ok(key.to_string())
    }
}
