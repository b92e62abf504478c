//! JSON-RPC 2.0 clients for the relay's document and object services.
//!
//! Mutations and queries map one-to-one onto relay methods. The relay has no
//! push channel, so subscriptions poll: a background task re-queries on an
//! interval and invokes the listener only when the snapshot differs from the
//! last one delivered. The first tick fires immediately, which delivers the
//! initial snapshot. Cancelling the subscription aborts the task.

use super::{DocumentStore, ObjectStore, SnapshotListener, Subscription};
use crate::board::{Comment, NewPost, Post, Topic};
use crate::error::{BoardError, Result};
use crate::rpc::methods::{self, *};
use crate::rpc::{RpcRequest, RpcResponse};
use crate::types::RecordId;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default relay server URL.
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3001";

/// Default subscription poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// HTTP transport shared by the document and object clients.
#[derive(Debug)]
struct RpcTransport {
    client: Client,
    endpoint: String,
    request_id: AtomicU64,
}

impl RpcTransport {
    fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/rpc", base_url.trim_end_matches('/')),
            request_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: impl Serialize,
    ) -> Result<T> {
        let request = RpcRequest::new(method, params, self.next_id());
        debug!(method, id = request.id, "rpc call");

        let response: RpcResponse = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| BoardError::remote(format!("HTTP request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| BoardError::remote(format!("Invalid response from relay: {}", e)))?;

        response.into_typed_result()
    }
}

/// Polls `fetch` on an interval and forwards changed snapshots.
fn spawn_poller<T, F, Fut>(
    label: String,
    interval: Duration,
    listener: SnapshotListener<T>,
    fetch: F,
) -> Subscription
where
    T: PartialEq + Clone + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send,
{
    let task_label = label.clone();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut last: Option<Vec<T>> = None;
        let mut failing = false;
        loop {
            ticker.tick().await;
            match fetch().await {
                Ok(snapshot) => {
                    failing = false;
                    if last.as_ref() != Some(&snapshot) {
                        listener(Ok(snapshot.clone()));
                        last = Some(snapshot);
                    }
                }
                Err(e) => {
                    warn!("{}: poll failed: {}", task_label, e);
                    if !failing {
                        listener(Err(e));
                    }
                    failing = true;
                    last = None;
                }
            }
        }
    });
    Subscription::new(label, move || handle.abort())
}

/// [`DocumentStore`] backed by the relay's JSON-RPC API.
#[derive(Debug, Clone)]
pub struct RpcDocumentStore {
    transport: Arc<RpcTransport>,
    poll_interval: Duration,
}

impl RpcDocumentStore {
    /// Creates a client for the relay at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self::with_poll_interval(base_url, DEFAULT_POLL_INTERVAL)
    }

    /// Creates a client with a custom subscription poll interval.
    pub fn with_poll_interval(base_url: &str, poll_interval: Duration) -> Self {
        Self {
            transport: Arc::new(RpcTransport::new(base_url)),
            poll_interval,
        }
    }

    /// Relay JSON-RPC endpoint.
    pub fn endpoint(&self) -> &str {
        &self.transport.endpoint
    }

    /// Checks whether the relay answers its health method.
    pub async fn health_check(&self) -> bool {
        #[derive(serde::Deserialize)]
        struct Health {
            status: String,
        }
        match self
            .transport
            .call::<Health>(methods::RELAY_HEALTH, serde_json::json!({}))
            .await
        {
            Ok(h) => h.status == "ok",
            Err(e) => {
                warn!("Relay health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl DocumentStore for RpcDocumentStore {
    async fn list_topics(&self) -> Result<Vec<Topic>> {
        self.transport
            .call(TOPIC_LIST, serde_json::json!({}))
            .await
    }

    #[instrument(skip(self))]
    async fn insert_topic(&self, name: &str) -> Result<Topic> {
        self.transport
            .call(
                TOPIC_INSERT,
                TopicInsertParams {
                    name: name.to_string(),
                },
            )
            .await
    }

    #[instrument(skip(self))]
    async fn rename_topic(&self, id: &RecordId, new_name: &str) -> Result<()> {
        let _: Ack = self
            .transport
            .call(
                TOPIC_RENAME,
                TopicRenameParams {
                    id: *id,
                    name: new_name.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    async fn watch_topics(&self, listener: SnapshotListener<Topic>) -> Result<Subscription> {
        let store = self.clone();
        Ok(spawn_poller(
            "topics".to_string(),
            self.poll_interval,
            listener,
            move || {
                let store = store.clone();
                async move { store.list_topics().await }
            },
        ))
    }

    #[instrument(skip(self, post), fields(topic = %post.topic))]
    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        self.transport
            .call(POST_INSERT, PostInsertParams { post })
            .await
    }

    #[instrument(skip(self))]
    async fn delete_post(&self, id: &RecordId) -> Result<()> {
        let _: Ack = self
            .transport
            .call(POST_DELETE, PostIdParams { id: *id })
            .await?;
        Ok(())
    }

    #[instrument(skip(self, comment))]
    async fn append_comment(&self, post_id: &RecordId, comment: Comment) -> Result<()> {
        let _: Ack = self
            .transport
            .call(
                COMMENT_APPEND,
                CommentAppendParams {
                    post_id: *post_id,
                    comment,
                },
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_comment(&self, post_id: &RecordId, comment_id: &RecordId) -> Result<()> {
        let _: Ack = self
            .transport
            .call(
                COMMENT_REMOVE,
                CommentRemoveParams {
                    post_id: *post_id,
                    comment_id: *comment_id,
                },
            )
            .await?;
        Ok(())
    }

    async fn query_posts(&self, topic: &str) -> Result<Vec<Post>> {
        self.transport
            .call(
                POST_QUERY,
                PostQueryParams {
                    topic: topic.to_string(),
                },
            )
            .await
    }

    async fn watch_posts(
        &self,
        topic: &str,
        listener: SnapshotListener<Post>,
    ) -> Result<Subscription> {
        let store = self.clone();
        let topic = topic.to_string();
        Ok(spawn_poller(
            format!("posts:{}", topic),
            self.poll_interval,
            listener,
            move || {
                let store = store.clone();
                let topic = topic.clone();
                async move { store.query_posts(&topic).await }
            },
        ))
    }
}

/// [`ObjectStore`] backed by the relay's `object.store` method.
#[derive(Debug, Clone)]
pub struct RpcObjectStore {
    transport: Arc<RpcTransport>,
}

impl RpcObjectStore {
    /// Creates a client for the relay at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            transport: Arc::new(RpcTransport::new(base_url)),
        }
    }
}

#[async_trait]
impl ObjectStore for RpcObjectStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn store(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<String> {
        let params = ObjectStoreParams {
            name: suggested_name.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
        };
        let result: ObjectStoreResult = self.transport.call(OBJECT_STORE, params).await?;
        Ok(result.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_endpoint_normalization() {
        let store = RpcDocumentStore::new("http://relay.example:3001/");
        assert_eq!(store.endpoint(), "http://relay.example:3001/rpc");
    }

    #[test]
    fn test_request_ids_increment() {
        let transport = RpcTransport::new(DEFAULT_RELAY_URL);
        assert_eq!(transport.next_id(), 1);
        assert_eq!(transport.next_id(), 2);
    }

    #[tokio::test]
    async fn test_poller_delivers_only_changes() {
        let seen: Arc<Mutex<Vec<Result<Vec<u32>>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: SnapshotListener<u32> = Arc::new(move |s| sink.lock().unwrap().push(s));

        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let sub = spawn_poller(
            "test".to_string(),
            Duration::from_millis(5),
            listener,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n {
                        0 | 1 => Ok(vec![1]),
                        2 => Err(BoardError::remote("down")),
                        _ => Ok(vec![1, 2]),
                    }
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        sub.unsubscribe();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].as_ref().unwrap(), &vec![1]);
        assert!(seen[1].is_err());
        assert_eq!(seen[2].as_ref().unwrap(), &vec![1, 2]);
    }
}
