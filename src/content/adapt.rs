//! Content adaptation for target platforms
//!
//! Pure functions: no I/O, no shared state. The scheduler stores the
//! adapted output per platform at scheduling time.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;

use super::post::{AdaptationRules, Platform, PlatformContent};

fn hashtag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#(\w+)").expect("hashtag pattern compiles"))
}

/// Extract hashtags from text, without the `#` prefix
pub fn extract_hashtags(text: &str) -> Vec<String> {
    hashtag_pattern()
        .captures_iter(text)
        .map(|captures| captures[1].to_string())
        .collect()
}

/// Format hashtags with a platform template, where `{}` is replaced with
/// the tag text
pub fn format_hashtags(hashtags: &[String], template: &str) -> Vec<String> {
    hashtags
        .iter()
        .map(|tag| template.replace("{}", tag))
        .collect()
}

/// Truncate text to at most `max_chars` characters, cutting at the last
/// whole-word boundary and appending an ellipsis marker
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_chars).collect();
    let cut = match truncated.rfind(' ') {
        Some(index) if index > 0 => truncated[..index].to_string(),
        _ => truncated,
    };

    format!("{}...", cut)
}

/// Adapt raw content for a platform
///
/// Hashtags are pulled out of the body, formatted with the platform
/// template, and re-appended after the (possibly truncated) body. When the
/// formatted hashtags alone exceed the length limit, the body budget falls
/// back to half the limit. A platform that requires an image gets a
/// non-fatal warning annotation when none is present.
pub fn adapt(
    raw_text: &str,
    image_reference: Option<&str>,
    platform: Platform,
    rules: &AdaptationRules,
) -> PlatformContent {
    let hashtags = extract_hashtags(raw_text);
    let formatted = format_hashtags(&hashtags, &rules.hashtag_format);

    let clean_text = hashtag_pattern().replace_all(raw_text, "").trim().to_string();

    let text = if !hashtags.is_empty() {
        let hashtag_text = formatted.join(" ");
        // reserve room for the hashtags plus a separating space
        let budget = match rules
            .max_text_length
            .checked_sub(hashtag_text.chars().count() + 1)
        {
            Some(budget) => budget,
            None => rules.max_text_length / 2,
        };

        let truncated = truncate_text(&clean_text, budget);
        if !truncated.is_empty() && !hashtag_text.is_empty() {
            format!("{} {}", truncated, hashtag_text)
        } else if !truncated.is_empty() {
            truncated
        } else {
            hashtag_text
        }
    } else {
        truncate_text(&clean_text, rules.max_text_length)
    };

    let mut metadata = HashMap::new();
    if rules.image.required && image_reference.is_none() {
        metadata.insert(
            "warning".to_string(),
            json!(format!("{} requires an image for posts", platform)),
        );
    }
    if image_reference.is_some() && rules.image.max_images.unwrap_or(0) > 0 {
        metadata.insert("images_count".to_string(), json!(1));
    }

    PlatformContent {
        platform,
        text,
        image_reference: image_reference.map(str::to_string),
        link: None,
        hashtags: formatted,
        metadata,
    }
}
