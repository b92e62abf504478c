//! Post and comment records.
//!
//! A post belongs to a topic by name, carries an optional image URL and the
//! outcome of the verification gate, and embeds its comments. Comments get a
//! generated id when they are created, so removal targets exactly one comment
//! even when two comments carry identical text, author and timestamp.

use crate::board::validation::{validate_comment_content, validate_post_content};
use crate::error::Result;
use crate::types::{current_timestamp_millis, AuthorType, RecordId, Verification};
use serde::{Deserialize, Serialize};

/// Returns true when `stored` is present and equal to `device_id`.
///
/// This is an advisory "is this my content" check; the delete calls
/// themselves do not enforce it.
fn owned_by(stored: &Option<String>, device_id: &str) -> bool {
    !device_id.is_empty() && stored.as_deref() == Some(device_id)
}

/// A reply attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Generated when the comment is created.
    pub id: RecordId,
    pub content: String,
    pub author_type: AuthorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    /// Creation timestamp in milliseconds since Unix epoch.
    pub timestamp: u64,
}

impl Comment {
    /// Creates a new comment stamped with the current time.
    ///
    /// # Errors
    /// Returns a validation error if the content is blank or too long.
    pub fn new(
        content: &str,
        author_type: AuthorType,
        author_id: Option<String>,
    ) -> Result<Self> {
        let content = validate_comment_content(content)?;
        Ok(Self {
            id: RecordId::generate(),
            content,
            author_type,
            author_id,
            timestamp: current_timestamp_millis(),
        })
    }

    /// Whether the delete control should be offered to `device_id`.
    pub fn is_owned_by(&self, device_id: &str) -> bool {
        owned_by(&self.author_id, device_id)
    }
}

/// Fields supplied by the client when creating a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub topic: String,
    pub content: String,
    pub author_type: AuthorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    pub verification: Verification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewPost {
    /// Builds a new post after validating its content.
    pub fn new(
        topic: impl Into<String>,
        content: &str,
        author_type: AuthorType,
        verification: Verification,
    ) -> Result<Self> {
        Ok(Self {
            topic: topic.into(),
            content: validate_post_content(content)?,
            author_type,
            author_id: None,
            verification,
            image_url: None,
        })
    }

    /// Sets the local device identifier of the author.
    pub fn with_author_id(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    /// Sets the durable URL of an already uploaded image.
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// A stored post as delivered by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: RecordId,
    /// Name of the topic this post belongs to.
    pub topic: String,
    pub content: String,
    pub author_type: AuthorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    pub verification: Verification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Server timestamp in milliseconds since Unix epoch.
    pub timestamp: u64,
    /// Comments in append order.
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Post {
    /// Materializes a stored post from client fields. Comments start empty.
    pub fn from_new(new: NewPost, id: RecordId, timestamp: u64) -> Self {
        Self {
            id,
            topic: new.topic,
            content: new.content,
            author_type: new.author_type,
            author_id: new.author_id,
            verification: new.verification,
            image_url: new.image_url,
            timestamp,
            comments: Vec::new(),
        }
    }

    /// Whether the delete control should be offered to `device_id`.
    pub fn is_owned_by(&self, device_id: &str) -> bool {
        owned_by(&self.author_id, device_id)
    }

    /// Looks up a comment by id.
    pub fn comment(&self, comment_id: &RecordId) -> Option<&Comment> {
        self.comments.iter().find(|c| &c.id == comment_id)
    }
}
