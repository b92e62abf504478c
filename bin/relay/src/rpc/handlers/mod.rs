//! RPC handler modules.

mod board;
mod object;
mod system;

use super::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use topicboard::rpc::methods::{
    COMMENT_APPEND, COMMENT_REMOVE, OBJECT_STORE, POST_DELETE, POST_INSERT, POST_QUERY,
    RELAY_HEALTH, RELAY_STATS, TOPIC_INSERT, TOPIC_LIST, TOPIC_RENAME,
};
use topicboard::rpc::{RpcError, RpcServerRequest, RpcServerResponse};
use topicboard::BoardError;
use tracing::{instrument, warn};

// Re-export RpcServerRequest and RpcServerResponse as the local names.
type RpcRequest = RpcServerRequest;
type RpcResponse = RpcServerResponse;

// =============================================================================
// Helper Functions
// =============================================================================

/// Parses JSON-RPC parameters into a typed struct.
#[inline]
pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(e.to_string()))
}

/// Converts a serializable value to JSON, mapping errors to RPC errors.
#[inline]
pub fn to_json<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(e.to_string()))
}

/// Whether `method` changes stored documents.
fn is_write(method: &str) -> bool {
    matches!(
        method,
        TOPIC_INSERT | TOPIC_RENAME | POST_INSERT | POST_DELETE | COMMENT_APPEND | COMMENT_REMOVE
    )
}

/// Maps a store error onto the wire.
pub fn board_error(err: BoardError) -> RpcError {
    RpcError::from_board_error(&err)
}

// =============================================================================
// Main RPC Handler
// =============================================================================

/// Runs one request against the relay state.
pub async fn dispatch(state: &AppState, request: RpcRequest) -> RpcResponse {
    if let Err(reason) = request.validate() {
        state.counters.record(true);
        return RpcResponse::error(request.id, RpcError::invalid_request(reason));
    }

    let documents = &state.documents;
    let params = request.params;
    let result = match request.method.as_str() {
        // Topic methods
        TOPIC_LIST => board::handle_topic_list(documents).await,
        TOPIC_INSERT => board::handle_topic_insert(documents, params).await,
        TOPIC_RENAME => board::handle_topic_rename(documents, params).await,

        // Post methods
        POST_INSERT => board::handle_post_insert(documents, params).await,
        POST_DELETE => board::handle_post_delete(documents, params).await,
        POST_QUERY => board::handle_post_query(documents, params).await,
        COMMENT_APPEND => board::handle_comment_append(documents, params).await,
        COMMENT_REMOVE => board::handle_comment_remove(documents, params).await,

        // Object methods
        OBJECT_STORE => object::handle_store(&state.objects, params).await,

        // System methods
        RELAY_HEALTH => system::handle_health(),
        RELAY_STATS => system::handle_stats(state),

        _ => Err(RpcError::method_not_found(&request.method)),
    };

    state.counters.record(result.is_err());
    if result.is_ok() && is_write(&request.method) {
        state.persist();
    }
    match result {
        Ok(value) => RpcResponse::success(request.id, value),
        Err(error) => {
            warn!("{} failed: {}", request.method, error);
            RpcResponse::error(request.id, error)
        }
    }
}

#[instrument(skip(state, request))]
pub async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> impl IntoResponse {
    (StatusCode::OK, Json(dispatch(&state, request).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use serde_json::json;
    use tempfile::TempDir;
    use topicboard::board::{NewPost, Post, Topic};
    use topicboard::constants::MAX_IMAGE_SIZE;
    use crate::persistence::DocumentPersistence;
    use topicboard::remote::{DocumentStore, FileObjectStore, MemoryDocumentStore};
    use topicboard::types::{AuthorType, Verification};

    fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let objects = FileObjectStore::new(dir.path(), "http://relay.test").unwrap();
        (AppState::new(MemoryDocumentStore::new(), objects), dir)
    }

    fn request(method: &str, params: Value) -> RpcRequest {
        RpcServerRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Some(json!(1)),
        }
    }

    async fn call(state: &AppState, method: &str, params: Value) -> Result<Value, RpcError> {
        let response = dispatch(state, request(method, params)).await;
        match response.error {
            Some(error) => Err(error),
            None => Ok(response.result.unwrap()),
        }
    }

    #[tokio::test]
    async fn test_rejects_wrong_version() {
        let (state, _dir) = test_state();
        let mut req = request(TOPIC_LIST, json!({}));
        req.jsonrpc = "1.0".to_string();
        let response = dispatch(&state, req).await;
        assert_eq!(response.error.unwrap().code, RpcError::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (state, _dir) = test_state();
        let err = call(&state, "topic.drop", json!({})).await.unwrap_err();
        assert_eq!(err.code, RpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_topic_roundtrip_and_rename() {
        let (state, _dir) = test_state();
        let first: Topic =
            serde_json::from_value(call(&state, TOPIC_INSERT, json!({"name": "General"})).await.unwrap())
                .unwrap();
        call(&state, TOPIC_INSERT, json!({"name": "Tech"}))
            .await
            .unwrap();
        call(
            &state,
            TOPIC_RENAME,
            json!({"id": first.id, "name": "Main"}),
        )
        .await
        .unwrap();

        let topics: Vec<Topic> =
            serde_json::from_value(call(&state, TOPIC_LIST, json!({})).await.unwrap()).unwrap();
        let names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Main", "Tech"]);
    }

    #[tokio::test]
    async fn test_post_and_comment_flow() {
        let (state, _dir) = test_state();
        let new = NewPost::new("General", "hello", AuthorType::Human, Verification::HumanVerified)
            .unwrap();
        let post: Post = serde_json::from_value(
            call(&state, POST_INSERT, json!({ "post": new }))
                .await
                .unwrap(),
        )
        .unwrap();
        assert!(post.comments.is_empty());

        let comment =
            topicboard::board::Comment::new("reply", AuthorType::AiAgent, None).unwrap();
        call(
            &state,
            COMMENT_APPEND,
            json!({"post_id": post.id, "comment": comment}),
        )
        .await
        .unwrap();

        let posts: Vec<Post> = serde_json::from_value(
            call(&state, POST_QUERY, json!({"topic": "General"}))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(posts[0].comments.len(), 1);

        call(
            &state,
            COMMENT_REMOVE,
            json!({"post_id": post.id, "comment_id": comment.id}),
        )
        .await
        .unwrap();
        call(&state, POST_DELETE, json!({"id": post.id}))
            .await
            .unwrap();
        assert_eq!(state.documents.counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_missing_post_maps_to_not_found() {
        let (state, _dir) = test_state();
        let comment =
            topicboard::board::Comment::new("reply", AuthorType::Human, None).unwrap();
        let err = call(
            &state,
            COMMENT_APPEND,
            json!({"post_id": topicboard::types::RecordId::generate(), "comment": comment}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, RpcError::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let (state, _dir) = test_state();
        let err = call(&state, TOPIC_INSERT, json!({"title": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_object_store_writes_file() {
        let (state, dir) = test_state();
        let data = base64::engine::general_purpose::STANDARD.encode(b"png-bytes");
        let result = call(
            &state,
            OBJECT_STORE,
            json!({"name": "posts/abc-cat.png", "data": data}),
        )
        .await
        .unwrap();
        assert_eq!(result["url"], "http://relay.test/objects/posts/abc-cat.png");
        assert_eq!(
            std::fs::read(dir.path().join("posts/abc-cat.png")).unwrap(),
            b"png-bytes"
        );
    }

    #[tokio::test]
    async fn test_object_store_rejects_bad_input() {
        let (state, _dir) = test_state();
        let err = call(&state, OBJECT_STORE, json!({"name": "a.png", "data": "!!!"}))
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcError::INVALID_PARAMS);

        let data = base64::engine::general_purpose::STANDARD.encode(b"x");
        let err = call(
            &state,
            OBJECT_STORE,
            json!({"name": "../escape.png", "data": data}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, RpcError::VALIDATION_FAILED);

        let huge = base64::engine::general_purpose::STANDARD.encode(vec![0u8; MAX_IMAGE_SIZE + 1]);
        let err = call(&state, OBJECT_STORE, json!({"name": "big.png", "data": huge}))
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcError::RESOURCE_EXHAUSTED);
    }

    #[tokio::test]
    async fn test_health_and_stats() {
        let (state, _dir) = test_state();
        let health = call(&state, RELAY_HEALTH, json!({})).await.unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["service"], "topicboard-relay");

        call(&state, TOPIC_INSERT, json!({"name": "General"}))
            .await
            .unwrap();
        let _ = call(&state, "nope", json!({})).await;

        let stats = call(&state, RELAY_STATS, json!({})).await.unwrap();
        assert_eq!(stats["documents"]["topics"], 1);
        assert_eq!(stats["documents"]["posts"], 0);
        // health, insert, nope (the stats call records after it reports)
        assert_eq!(stats["requests"]["total"], 3);
        assert_eq!(stats["requests"]["failed"], 1);
    }

    #[tokio::test]
    async fn test_writes_are_persisted() {
        let dir = TempDir::new().unwrap();
        let objects = FileObjectStore::new(dir.path().join("objects"), "http://relay.test").unwrap();
        let persistence = DocumentPersistence::with_data_dir(dir.path()).unwrap();
        let state = AppState::new(persistence.load().unwrap(), objects)
            .with_persistence(persistence);

        call(&state, TOPIC_INSERT, json!({"name": "General"}))
            .await
            .unwrap();
        let new = NewPost::new("General", "survives", AuthorType::Human, Verification::HumanVerified)
            .unwrap();
        call(&state, POST_INSERT, json!({ "post": new }))
            .await
            .unwrap();
        call(&state, POST_QUERY, json!({"topic": "General"}))
            .await
            .unwrap();

        let restarted = DocumentPersistence::with_data_dir(dir.path())
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(restarted.counts(), (1, 1));
        let posts = restarted.query_posts("General").await.unwrap();
        assert_eq!(posts[0].content, "survives");
    }
}
