//! Remote publish boundary
//!
//! The platform API client proper (Graph API and friends) is an external
//! collaborator; the core depends only on the [`PlatformApi`] contract.
//! [`SandboxApi`] is the deterministic in-process stand-in used in tests
//! and development.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    content::post::Platform,
    protocol::error::{DispatchError, DispatchResult},
};

/// Credentials for publishing to one platform on behalf of a user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// OAuth access token
    #[serde(default)]
    pub access_token: String,

    /// Account or page to post as, if not the token's own timeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

impl Credentials {
    /// Create credentials from an access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            account_id: None,
        }
    }

    /// Set the account to post as
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

/// Successful publication on a platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Platform the content landed on
    pub platform: Platform,

    /// The platform's id for the published post
    pub external_id: String,
}

/// Contract with the remote publish collaborator
///
/// Awaited from the async context; the core treats each call as
/// synchronous from its own perspective and applies no retry.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Publish content to a platform
    async fn publish(
        &self,
        credentials: &Credentials,
        text: &str,
        image_reference: Option<&str>,
        platform: Platform,
    ) -> DispatchResult<PublishReceipt>;

    /// Fetch engagement metrics for a published post
    async fn fetch_analytics(
        &self,
        credentials: &Credentials,
        external_id: &str,
    ) -> DispatchResult<HashMap<String, i64>>;
}

/// In-process stand-in for the platform APIs
///
/// Validates tokens and content the way the real boundary would, mints
/// sequential external ids, and records publish calls so tests can observe
/// exactly-once behavior.
#[derive(Debug, Default)]
pub struct SandboxApi {
    counter: AtomicU64,
    published: Mutex<Vec<(Platform, String)>>,
}

impl SandboxApi {
    /// Create a new sandbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of publish calls accepted so far
    pub fn publish_count(&self) -> usize {
        self.published().len()
    }

    /// Accepted publish calls as `(platform, text)` pairs
    pub fn published(&self) -> Vec<(Platform, String)> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn check_token(credentials: &Credentials) -> DispatchResult<()> {
        if credentials.access_token.is_empty() || credentials.access_token == "PLACEHOLDER_TOKEN" {
            return Err(DispatchError::Validation("Invalid access token".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformApi for SandboxApi {
    async fn publish(
        &self,
        credentials: &Credentials,
        text: &str,
        image_reference: Option<&str>,
        platform: Platform,
    ) -> DispatchResult<PublishReceipt> {
        info!(platform = %platform, "Publishing post to sandbox");

        Self::check_token(credentials)?;

        if text.is_empty() && image_reference.is_none() {
            return Err(DispatchError::Validation(
                "Post must contain text or an image".into(),
            ));
        }

        let serial = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((platform, text.to_string()));

        Ok(PublishReceipt {
            platform,
            external_id: format!("{}-sandbox-{}", platform, serial),
        })
    }

    async fn fetch_analytics(
        &self,
        credentials: &Credentials,
        external_id: &str,
    ) -> DispatchResult<HashMap<String, i64>> {
        info!(external_id = %external_id, "Fetching sandbox analytics");

        Self::check_token(credentials)?;

        let mut metrics = HashMap::new();
        metrics.insert("likes".to_string(), 10);
        metrics.insert("comments".to_string(), 2);
        metrics.insert("shares".to_string(), 1);
        metrics.insert("reach".to_string(), 150);
        metrics.insert("impressions".to_string(), 200);
        Ok(metrics)
    }
}
