//! Seams to the hosted services the board delegates to.
//!
//! The board never owns authoritative copies of its records. Persistence,
//! querying, change notification and file storage all sit behind the traits
//! in this module:
//!
//! - [`DocumentStore`]: topic and post collections with live subscriptions
//! - [`ObjectStore`]: durable storage for uploaded images
//!
//! Implementations:
//!
//! - [`MemoryDocumentStore`] / [`MemoryObjectStore`]: in-process, used by
//!   tests, by the relay, and by the web client in embedded mode
//! - [`FileObjectStore`]: files under a directory, served by URL
//! - [`RpcDocumentStore`] / [`RpcObjectStore`]: JSON-RPC 2.0 clients for the
//!   relay, with polling-based subscriptions

mod memory;
mod objects;
mod rpc_store;

pub use memory::{DocumentSnapshot, ListenerStats, MemoryDocumentStore};
pub use objects::{FileObjectStore, MemoryObjectStore};
pub use rpc_store::{RpcDocumentStore, RpcObjectStore};

use crate::board::{Comment, NewPost, Post, Topic};
use crate::error::Result;
use crate::types::RecordId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with the latest ordered snapshot on every remote change.
///
/// An `Err` delivery means the subscription itself failed; the listener
/// should render an error in place of the list.
pub type SnapshotListener<T> = Arc<dyn Fn(Result<Vec<T>>) + Send + Sync>;

/// Handle to a live subscription.
///
/// Cancelling is idempotent: the underlying cancel hook runs at most once,
/// either on [`Subscription::unsubscribe`] or when the handle is dropped.
pub struct Subscription {
    label: String,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Creates a subscription handle with a cancel hook.
    pub fn new(label: impl Into<String>, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            label: label.into(),
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Describes what this subscription listens to (for logs).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns true until the subscription has been cancelled.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Cancels the subscription.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            tracing::debug!(subscription = %self.label, "unsubscribing");
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Remote document database holding the topic and post collections.
///
/// Concurrent-write semantics belong to the implementation; the board
/// assumes last-writer-wins and never merges.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All topics ordered by creation time ascending.
    async fn list_topics(&self) -> Result<Vec<Topic>>;

    /// Inserts a topic stamped with the server time.
    async fn insert_topic(&self, name: &str) -> Result<Topic>;

    /// Renames an existing topic.
    async fn rename_topic(&self, id: &RecordId, new_name: &str) -> Result<()>;

    /// Subscribes to the full topic list (creation time ascending).
    ///
    /// The current snapshot is delivered right away, then again after every
    /// change.
    async fn watch_topics(&self, listener: SnapshotListener<Topic>) -> Result<Subscription>;

    /// Inserts a post with an empty comment list.
    async fn insert_post(&self, post: NewPost) -> Result<Post>;

    /// Deletes a post. Deleting a missing post succeeds.
    async fn delete_post(&self, id: &RecordId) -> Result<()>;

    /// Appends a comment unless a comment with the same id is already present.
    async fn append_comment(&self, post_id: &RecordId, comment: Comment) -> Result<()>;

    /// Removes the comment with this id, if present.
    async fn remove_comment(&self, post_id: &RecordId, comment_id: &RecordId) -> Result<()>;

    /// Posts whose topic equals `topic`, newest first.
    async fn query_posts(&self, topic: &str) -> Result<Vec<Post>>;

    /// Subscribes to the posts of one topic (newest first).
    async fn watch_posts(
        &self,
        topic: &str,
        listener: SnapshotListener<Post>,
    ) -> Result<Subscription>;
}

/// Remote object storage for uploaded images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `suggested_name` and returns a durable URL.
    async fn store(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<String>;
}

/// Shared document store handle.
pub type SharedDocumentStore = Arc<dyn DocumentStore>;

/// Shared object store handle.
pub type SharedObjectStore = Arc<dyn ObjectStore>;
