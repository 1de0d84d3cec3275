//! Scheduled content: post model, per-platform adaptation, and the
//! content scheduling agent

pub mod adapt;
pub mod agent;
pub mod post;

pub use adapt::{adapt, extract_hashtags, format_hashtags, truncate_text};
pub use agent::{ContentScheduler, PostPublisher};
pub use post::{
    AdaptationRules, ContentKind, ImageRules, Platform, PlatformContent, PostStatus,
    ScheduledPost, UnknownPlatform,
};
