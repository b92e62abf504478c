//! Synchronous input validation.
//!
//! Everything here runs before any remote call. A rejected input never reaches
//! the document store or the object store.

use crate::constants::{
    MAX_COMMENT_CONTENT_SIZE, MAX_IMAGE_SIZE, MAX_OBJECT_FILE_NAME, MAX_POST_CONTENT_SIZE,
    MAX_TOPIC_NAME_SIZE,
};
use crate::error::{BoardError, Result};

/// Trims post content and checks it is non-empty and within limits.
pub fn validate_post_content(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(BoardError::validation("Please select a topic and enter post content."));
    }
    if content.len() > MAX_POST_CONTENT_SIZE {
        return Err(BoardError::validation(format!(
            "Post content exceeds maximum size of {} bytes",
            MAX_POST_CONTENT_SIZE
        )));
    }
    Ok(content.to_string())
}

/// Trims comment content and checks it is non-empty and within limits.
pub fn validate_comment_content(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(BoardError::validation("Please enter a comment."));
    }
    if content.len() > MAX_COMMENT_CONTENT_SIZE {
        return Err(BoardError::validation(format!(
            "Comment exceeds maximum size of {} bytes",
            MAX_COMMENT_CONTENT_SIZE
        )));
    }
    Ok(content.to_string())
}

/// Trims a topic name and checks it is non-empty and within limits.
///
/// Names are case-sensitive; no normalization beyond trimming is applied.
pub fn validate_topic_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BoardError::validation("Please enter a topic name."));
    }
    if name.len() > MAX_TOPIC_NAME_SIZE {
        return Err(BoardError::validation(format!(
            "Topic name exceeds maximum size of {} bytes",
            MAX_TOPIC_NAME_SIZE
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(BoardError::validation(
            "Topic name cannot contain control characters",
        ));
    }
    Ok(name.to_string())
}

/// Checks an image attachment before upload.
pub fn validate_image(bytes: &[u8], content_type: &str) -> Result<()> {
    if bytes.is_empty() {
        return Err(BoardError::validation("Image file is empty"));
    }
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(BoardError::validation(format!(
            "Image exceeds maximum size of {} bytes",
            MAX_IMAGE_SIZE
        )));
    }
    if !content_type.starts_with("image/") {
        return Err(BoardError::validation(format!(
            "Unsupported attachment type: {}",
            content_type
        )));
    }
    Ok(())
}

/// Reduces a user-supplied file name to `[A-Za-z0-9._-]`, keeping the tail
/// (and therefore the extension) when it is too long.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = if cleaned.len() > MAX_OBJECT_FILE_NAME {
        &cleaned[cleaned.len() - MAX_OBJECT_FILE_NAME..]
    } else {
        &cleaned
    };
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_content() {
        assert_eq!(validate_post_content(" Hello ").unwrap(), "Hello");
        assert!(validate_post_content("").is_err());
        assert!(validate_post_content("\n\t ").is_err());
        assert!(validate_post_content(&"x".repeat(MAX_POST_CONTENT_SIZE + 1)).is_err());
    }

    #[test]
    fn test_topic_name_is_case_sensitive_and_trimmed() {
        assert_eq!(validate_topic_name("  General ").unwrap(), "General");
        assert_eq!(validate_topic_name("general").unwrap(), "general");
        assert!(validate_topic_name("   ").is_err());
        assert!(validate_topic_name("bad\u{7}name").is_err());
    }

    #[test]
    fn test_image_checks() {
        assert!(validate_image(b"\x89PNG", "image/png").is_ok());
        assert!(validate_image(b"", "image/png").is_err());
        assert!(validate_image(b"text", "text/plain").is_err());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("cat photo.png"), "cat_photo.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\pics\\dog.jpg"), "dog.jpg");
        assert_eq!(sanitize_file_name("..."), "upload");
        let long = format!("{}.png", "a".repeat(100));
        let cleaned = sanitize_file_name(&long);
        assert_eq!(cleaned.len(), MAX_OBJECT_FILE_NAME);
        assert!(cleaned.ends_with(".png"));
    }
}
