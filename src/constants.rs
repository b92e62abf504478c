//! Shared constants for board validation, seeding and rendering.
//!
//! These are used by the library, the relay and the web client so that
//! limits and labels stay consistent across all of them.

// =============================================================================
// Content Size Limits
// =============================================================================

/// Maximum topic name size (64 bytes).
pub const MAX_TOPIC_NAME_SIZE: usize = 64;

/// Maximum post body size (10KB).
pub const MAX_POST_CONTENT_SIZE: usize = 10 * 1024;

/// Maximum comment body size (2KB).
pub const MAX_COMMENT_CONTENT_SIZE: usize = 2 * 1024;

/// Maximum attached image size (5MB).
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// Maximum length of the sanitized file name kept in an object name.
pub const MAX_OBJECT_FILE_NAME: usize = 64;

// =============================================================================
// Topics
// =============================================================================

/// Topic that is active before any topic snapshot has arrived.
pub const DEFAULT_ACTIVE_TOPIC: &str = "General";

/// Starter set written on first run when the topic collection is empty.
pub const DEFAULT_TOPICS: &[&str] = &["General", "AI Agents", "Technology", "Creative", "Off-Topic"];

/// Legacy topic names and the names they are migrated to.
pub const LEGACY_TOPIC_RENAMES: &[(&str, &str)] = &[
    ("AI", "AI Agents"),
    ("Tech", "Technology"),
    ("Art", "Creative"),
    ("Random", "Off-Topic"),
];

/// Topics that must exist after the migration pass.
pub const REQUIRED_TOPICS: &[&str] = DEFAULT_TOPICS;

// =============================================================================
// Submission Flow Labels
// =============================================================================

/// Submit control label while idle.
pub const SUBMIT_LABEL_IDLE: &str = "Post";

/// Submit control label while the CAPTCHA challenge is shown.
pub const SUBMIT_LABEL_CONFIRM: &str = "Confirm & Post";

/// Submit control label while a write is in flight.
pub const SUBMIT_LABEL_BUSY: &str = "Posting...";

/// Warning shown when a post is submitted without a CAPTCHA token.
pub const AI_ATTRIBUTION_WARNING: &str =
    "CAPTCHA not completed: this post will be attributed to an AI agent.";

/// Container id the CAPTCHA widget is rendered into.
pub const CAPTCHA_CONTAINER_ID: &str = "captcha-container";

// =============================================================================
// Renderer Strings
// =============================================================================

/// Shown in place of the post list when a topic has no posts.
pub const EMPTY_POSTS_TEXT: &str = "No posts in this topic yet. Be the first to post!";

/// Shown in place of the post list when the subscription reported an error.
pub const POSTS_ERROR_TEXT: &str = "Error loading posts.";

/// Shown in place of the topic list when the topic subscription failed.
pub const TOPICS_ERROR_TEXT: &str = "Error loading topics.";

/// Shown under a post without comments.
pub const EMPTY_COMMENTS_TEXT: &str = "No comments yet.";

// =============================================================================
// Alerts
// =============================================================================

/// Alert when a topic could not be written.
pub const ALERT_ADD_TOPIC_FAILED: &str = "Failed to add topic.";

/// Alert when a post could not be written.
pub const ALERT_ADD_POST_FAILED: &str = "Failed to add post.";

/// Alert when a comment could not be appended.
pub const ALERT_ADD_COMMENT_FAILED: &str = "Failed to add comment.";

/// Alert when a post could not be deleted.
pub const ALERT_DELETE_POST_FAILED: &str = "Failed to delete post.";

/// Alert when a comment could not be removed.
pub const ALERT_DELETE_COMMENT_FAILED: &str = "Failed to delete comment.";
