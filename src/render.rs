//! View renderer.
//!
//! Pure functions from snapshots to view models, plus askama templates that
//! turn the view models into HTML. Nothing here remembers a previous render:
//! every call rebuilds the whole topic list or post list from its inputs, so
//! a live update is just another call with the newer snapshot.

use crate::board::{BoardState, Comment, Post, Snapshot, Topic};
use crate::constants::{
    CAPTCHA_CONTAINER_ID, EMPTY_COMMENTS_TEXT, EMPTY_POSTS_TEXT, POSTS_ERROR_TEXT,
    SUBMIT_LABEL_BUSY, TOPICS_ERROR_TEXT,
};
use crate::error::{BoardError, Result};
use crate::types::format_timestamp;
use askama::Template;

/// One topic button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicItem {
    pub name: String,
    pub active: bool,
}

/// The topic list, or the error shown in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicListView {
    pub items: Vec<TopicItem>,
    pub error: Option<&'static str>,
}

/// A comment under a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentView {
    pub id: String,
    pub content: String,
    pub author_label: &'static str,
    pub author_type: &'static str,
    pub timestamp_display: String,
    pub can_delete: bool,
}

/// A post with its comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostView {
    pub id: String,
    pub content: String,
    pub author_label: &'static str,
    pub author_type: &'static str,
    pub verification: &'static str,
    pub badge: &'static str,
    pub timestamp_display: String,
    pub image_url: Option<String>,
    pub can_delete: bool,
    pub comments: Vec<CommentView>,
    pub empty_comments_text: &'static str,
}

/// The post list, or the message shown in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostListView {
    pub posts: Vec<PostView>,
    /// Shown instead of `posts` when set.
    pub message: Option<&'static str>,
    pub is_error: bool,
}

/// Builds the topic list for `active`.
pub fn topic_list(topics: &Snapshot<Topic>, active: &str) -> TopicListView {
    match topics {
        Snapshot::Ready(list) => TopicListView {
            items: list
                .iter()
                .map(|t| TopicItem {
                    name: t.name.clone(),
                    active: t.name == active,
                })
                .collect(),
            error: None,
        },
        Snapshot::Loading => TopicListView {
            items: Vec::new(),
            error: None,
        },
        Snapshot::Failed(_) => TopicListView {
            items: Vec::new(),
            error: Some(TOPICS_ERROR_TEXT),
        },
    }
}

fn comment_view(comment: &Comment, viewer: &str) -> CommentView {
    CommentView {
        id: comment.id.to_string(),
        content: comment.content.clone(),
        author_label: comment.author_type.label(),
        author_type: comment.author_type.as_str(),
        timestamp_display: format_timestamp(comment.timestamp),
        can_delete: comment.is_owned_by(viewer),
    }
}

fn post_view(post: &Post, viewer: &str) -> PostView {
    PostView {
        id: post.id.to_string(),
        content: post.content.clone(),
        author_label: post.author_type.label(),
        author_type: post.author_type.as_str(),
        verification: post.verification.as_str(),
        badge: post.verification.badge(),
        timestamp_display: format_timestamp(post.timestamp),
        image_url: post.image_url.clone(),
        can_delete: post.is_owned_by(viewer),
        comments: post.comments.iter().map(|c| comment_view(c, viewer)).collect(),
        empty_comments_text: EMPTY_COMMENTS_TEXT,
    }
}

/// Builds the post list as seen by the device `viewer`.
///
/// Delete controls are offered only on records `viewer` authored.
pub fn post_list(posts: &Snapshot<Post>, viewer: &str) -> PostListView {
    match posts {
        Snapshot::Ready(list) if list.is_empty() => PostListView {
            posts: Vec::new(),
            message: Some(EMPTY_POSTS_TEXT),
            is_error: false,
        },
        Snapshot::Ready(list) => PostListView {
            posts: list.iter().map(|p| post_view(p, viewer)).collect(),
            message: None,
            is_error: false,
        },
        Snapshot::Loading => PostListView {
            posts: Vec::new(),
            message: None,
            is_error: false,
        },
        Snapshot::Failed(_) => PostListView {
            posts: Vec::new(),
            message: Some(POSTS_ERROR_TEXT),
            is_error: true,
        },
    }
}

/// Full board page.
#[derive(Template)]
#[template(path = "board.html")]
pub struct BoardTemplate {
    pub csrf_token: String,
    pub active_topic: String,
    pub theme_class: String,
    pub topics: TopicListView,
    pub posts: PostListView,
    pub submit_label: &'static str,
    pub submit_disabled: bool,
    pub busy_label: &'static str,
    pub captcha_visible: bool,
    pub captcha_container: &'static str,
    pub captcha_site_key: String,
    pub alert: Option<String>,
    pub draft_content: String,
    pub version: &'static str,
}

/// Post list fragment pushed on live updates.
#[derive(Template)]
#[template(path = "posts.html")]
pub struct PostsFragmentTemplate {
    pub csrf_token: String,
    pub posts: PostListView,
}

/// Per-request inputs that are not part of [`BoardState`].
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub csrf_token: String,
    pub viewer: String,
    pub captcha_site_key: String,
    /// One-shot alert from the previous action.
    pub alert: Option<String>,
    /// Post text kept while the challenge is showing.
    pub draft: String,
}

fn render_template(template: &impl Template) -> Result<String> {
    template
        .render()
        .map_err(|e| BoardError::serialization(format!("Template rendering failed: {}", e)))
}

/// Renders the whole board for `state` and the latest post snapshot.
pub fn render_board(
    state: &BoardState,
    posts: &Snapshot<Post>,
    context: PageContext,
) -> Result<String> {
    let template = BoardTemplate {
        csrf_token: context.csrf_token,
        active_topic: state.active_topic.clone(),
        theme_class: state.theme_class(),
        topics: topic_list(&state.topics, &state.active_topic),
        posts: post_list(posts, &context.viewer),
        submit_label: state.submit_label(),
        submit_disabled: state.submitting,
        busy_label: SUBMIT_LABEL_BUSY,
        captcha_visible: state.captcha_visible(),
        captcha_container: CAPTCHA_CONTAINER_ID,
        captcha_site_key: context.captcha_site_key,
        alert: context.alert,
        draft_content: context.draft,
        version: crate::VERSION,
    };
    render_template(&template)
}

/// Renders only the post list.
pub fn render_posts_fragment(
    posts: &Snapshot<Post>,
    viewer: &str,
    csrf_token: &str,
) -> Result<String> {
    let template = PostsFragmentTemplate {
        csrf_token: csrf_token.to_string(),
        posts: post_list(posts, viewer),
    };
    render_template(&template)
}
