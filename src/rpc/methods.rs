//! Board method names and their parameter/result shapes.
//!
//! Shared by the relay (server side) and [`crate::remote::RpcDocumentStore`]
//! (client side) so both ends agree on the wire format.

use crate::board::{Comment, NewPost};
use crate::types::RecordId;
use serde::{Deserialize, Serialize};

pub const TOPIC_LIST: &str = "topic.list";
pub const TOPIC_INSERT: &str = "topic.insert";
pub const TOPIC_RENAME: &str = "topic.rename";
pub const POST_INSERT: &str = "post.insert";
pub const POST_DELETE: &str = "post.delete";
pub const POST_QUERY: &str = "post.query";
pub const COMMENT_APPEND: &str = "comment.append";
pub const COMMENT_REMOVE: &str = "comment.remove";
pub const OBJECT_STORE: &str = "object.store";
pub const RELAY_HEALTH: &str = "relay.health";
pub const RELAY_STATS: &str = "relay.stats";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicInsertParams {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRenameParams {
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostInsertParams {
    pub post: NewPost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostIdParams {
    pub id: RecordId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostQueryParams {
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentAppendParams {
    pub post_id: RecordId,
    pub comment: Comment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRemoveParams {
    pub post_id: RecordId,
    pub comment_id: RecordId,
}

/// Object upload; `data` is standard base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreParams {
    pub name: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreResult {
    pub url: String,
}

/// Acknowledgement for writes that return nothing else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub const OK: Ack = Ack { ok: true };
}
