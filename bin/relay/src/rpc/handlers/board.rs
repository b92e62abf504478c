//! Topic, post and comment RPC handlers.
//!
//! The relay stores what it is given. Content checks happen on the client
//! before a write is issued.

use super::{board_error, parse_params, to_json};
use serde_json::Value;
use topicboard::remote::DocumentStore;
use topicboard::rpc::methods::{
    Ack, CommentAppendParams, CommentRemoveParams, PostIdParams, PostInsertParams,
    PostQueryParams, TopicInsertParams, TopicRenameParams,
};
use topicboard::rpc::RpcError;
use tracing::info;

pub async fn handle_topic_list(store: &dyn DocumentStore) -> Result<Value, RpcError> {
    let topics = store.list_topics().await.map_err(board_error)?;
    to_json(topics)
}

pub async fn handle_topic_insert(
    store: &dyn DocumentStore,
    params: Value,
) -> Result<Value, RpcError> {
    let params: TopicInsertParams = parse_params(params)?;
    let topic = store.insert_topic(&params.name).await.map_err(board_error)?;
    info!("topic.insert: {} ({})", topic.name, topic.id.short());
    to_json(topic)
}

pub async fn handle_topic_rename(
    store: &dyn DocumentStore,
    params: Value,
) -> Result<Value, RpcError> {
    let params: TopicRenameParams = parse_params(params)?;
    store
        .rename_topic(&params.id, &params.name)
        .await
        .map_err(board_error)?;
    info!("topic.rename: {} -> {}", params.id.short(), params.name);
    to_json(Ack::OK)
}

pub async fn handle_post_insert(
    store: &dyn DocumentStore,
    params: Value,
) -> Result<Value, RpcError> {
    let params: PostInsertParams = parse_params(params)?;
    let post = store.insert_post(params.post).await.map_err(board_error)?;
    info!("post.insert: {} in {}", post.id.short(), post.topic);
    to_json(post)
}

pub async fn handle_post_delete(
    store: &dyn DocumentStore,
    params: Value,
) -> Result<Value, RpcError> {
    let params: PostIdParams = parse_params(params)?;
    store.delete_post(&params.id).await.map_err(board_error)?;
    info!("post.delete: {}", params.id.short());
    to_json(Ack::OK)
}

pub async fn handle_post_query(
    store: &dyn DocumentStore,
    params: Value,
) -> Result<Value, RpcError> {
    let params: PostQueryParams = parse_params(params)?;
    let posts = store.query_posts(&params.topic).await.map_err(board_error)?;
    to_json(posts)
}

pub async fn handle_comment_append(
    store: &dyn DocumentStore,
    params: Value,
) -> Result<Value, RpcError> {
    let params: CommentAppendParams = parse_params(params)?;
    let comment_id = params.comment.id;
    store
        .append_comment(&params.post_id, params.comment)
        .await
        .map_err(board_error)?;
    info!(
        "comment.append: {} on {}",
        comment_id.short(),
        params.post_id.short()
    );
    to_json(Ack::OK)
}

pub async fn handle_comment_remove(
    store: &dyn DocumentStore,
    params: Value,
) -> Result<Value, RpcError> {
    let params: CommentRemoveParams = parse_params(params)?;
    store
        .remove_comment(&params.post_id, &params.comment_id)
        .await
        .map_err(board_error)?;
    info!(
        "comment.remove: {} from {}",
        params.comment_id.short(),
        params.post_id.short()
    );
    to_json(Ack::OK)
}
