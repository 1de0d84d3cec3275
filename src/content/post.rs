//! Scheduled post models

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::platform::Credentials;

/// Supported social platforms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Twitter,
    Instagram,
    Linkedin,
}

impl Platform {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "twitter" => Ok(Platform::Twitter),
            "instagram" => Ok(Platform::Instagram),
            "linkedin" => Ok(Platform::Linkedin),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}

/// Error for platform names outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported platform: {0}")]
pub struct UnknownPlatform(pub String);

/// Kinds of social media content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Video,
    Link,
    Mixed,
}

/// Status values for scheduled posts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Created but not yet scheduled
    Draft,

    /// Waiting for its schedule time
    Scheduled,

    /// The publish path delivered it to at least one platform
    Published,

    /// The publish path failed on every platform
    Failed,

    /// Withdrawn before publication
    Canceled,
}

/// Content adapted for a specific platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformContent {
    /// Target platform
    pub platform: Platform,

    /// Platform-specific text content
    pub text: String,

    /// Reference to an image, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,

    /// URL to include, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Formatted hashtags for this post
    #[serde(default)]
    pub hashtags: Vec<String>,

    /// Platform-specific annotations (e.g. a missing-image warning)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

/// Image constraints for a platform
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageRules {
    /// The platform rejects posts without an image
    #[serde(default)]
    pub required: bool,

    /// Maximum number of attached images, if limited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_images: Option<u32>,
}

/// Rules for adapting content to a platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdaptationRules {
    /// Target platform
    pub platform: Platform,

    /// Maximum text length in characters
    pub max_text_length: usize,

    /// Hashtag template; `{}` is replaced with the tag text
    pub hashtag_format: String,

    /// Image constraints
    #[serde(default)]
    pub image: ImageRules,
}

impl AdaptationRules {
    /// Rule table for all supported platforms
    pub fn defaults() -> HashMap<Platform, AdaptationRules> {
        let mut rules = HashMap::new();
        rules.insert(
            Platform::Twitter,
            AdaptationRules {
                platform: Platform::Twitter,
                max_text_length: 280,
                hashtag_format: "#{}".to_string(),
                image: ImageRules {
                    required: false,
                    max_images: Some(4),
                },
            },
        );
        rules.insert(
            Platform::Facebook,
            AdaptationRules {
                platform: Platform::Facebook,
                max_text_length: 5000,
                hashtag_format: "#{}".to_string(),
                image: ImageRules::default(),
            },
        );
        rules.insert(
            Platform::Instagram,
            AdaptationRules {
                platform: Platform::Instagram,
                max_text_length: 2200,
                hashtag_format: "#{}".to_string(),
                image: ImageRules {
                    required: true,
                    max_images: None,
                },
            },
        );
        rules.insert(
            Platform::Linkedin,
            AdaptationRules {
                platform: Platform::Linkedin,
                max_text_length: 3000,
                hashtag_format: "#{}".to_string(),
                image: ImageRules::default(),
            },
        );
        rules
    }
}

/// A post scheduled for publication on one or more platforms
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledPost {
    /// Unique identifier for this post
    pub id: String,

    /// ID of the user who owns this post
    pub user_id: String,

    /// Agent that submitted the scheduling task; receives status updates
    pub origin_agent_id: String,

    /// Original text content
    pub raw_text: String,

    /// Kind of content
    pub content_kind: ContentKind,

    /// Reference to an image, if the content contains one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,

    /// Platforms to publish to
    pub target_platforms: Vec<Platform>,

    /// When to publish this post
    ///
    /// Immutable once a deferred job referencing the post exists;
    /// re-scheduling goes through job replacement.
    pub schedule_time: DateTime<Utc>,

    /// Current status of this post
    pub status: PostStatus,

    /// Content adapted for each platform
    #[serde(default)]
    pub content: HashMap<Platform, PlatformContent>,

    /// IDs of the published posts on each platform
    #[serde(default)]
    pub platform_post_ids: HashMap<Platform, String>,

    /// Per-platform credentials
    #[serde(default)]
    pub credentials: HashMap<Platform, Credentials>,

    /// When this post was created
    pub created_at: DateTime<Utc>,

    /// When this post was last updated
    pub updated_at: DateTime<Utc>,
}

impl ScheduledPost {
    /// Create a new draft post
    pub fn new(
        user_id: impl Into<String>,
        origin_agent_id: impl Into<String>,
        raw_text: impl Into<String>,
        schedule_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            origin_agent_id: origin_agent_id.into(),
            raw_text: raw_text.into(),
            content_kind: ContentKind::Text,
            image_reference: None,
            target_platforms: Vec::new(),
            schedule_time,
            status: PostStatus::Draft,
            content: HashMap::new(),
            platform_post_ids: HashMap::new(),
            credentials: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the target platforms
    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.target_platforms = platforms;
        self
    }

    /// Set the status
    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the per-platform credentials
    pub fn with_credentials(mut self, credentials: HashMap<Platform, Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Bump the update timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
