//! Live post list for the active topic.
//!
//! [`PostFeed`] holds at most one post subscription. Switching topics cancels
//! the previous subscription before installing the next one, and every
//! delivered snapshot replaces the in-memory list wholesale. Mutations are
//! pass-throughs to the document store: nothing is applied locally, so a
//! failed call leaves the feed exactly as it was and the next delivery
//! carries the committed result.

use crate::board::post::{Comment, NewPost, Post};
use crate::error::Result;
use crate::remote::{SharedDocumentStore, SnapshotListener, Subscription};
use crate::types::{AuthorType, RecordId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

/// Latest state of a live list.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<T> {
    /// No delivery yet.
    Loading,
    /// Latest delivered list, in the store's order.
    Ready(Vec<T>),
    /// The subscription reported an error.
    Failed(String),
}

impl<T> Snapshot<T> {
    /// Converts a listener delivery.
    pub fn from_delivery(delivery: Result<Vec<T>>) -> Self {
        match delivery {
            Ok(items) => Snapshot::Ready(items),
            Err(e) => Snapshot::Failed(e.to_string()),
        }
    }

    /// The delivered items, if any.
    pub fn items(&self) -> Option<&[T]> {
        match self {
            Snapshot::Ready(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Snapshot::Failed(_))
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Snapshot::Loading
    }
}

/// State shared with the subscription listener.
struct FeedShared {
    snapshot: RwLock<Snapshot<Post>>,
    /// Bumped on every topic switch; deliveries tagged with an older value are
    /// dropped.
    generation: AtomicU64,
    changes: watch::Sender<u64>,
}

impl FeedShared {
    fn publish(&self, snapshot: Snapshot<Post>) {
        *self.snapshot.write().unwrap_or_else(|p| p.into_inner()) = snapshot;
        self.changes.send_modify(|version| *version += 1);
    }
}

/// Post list of the active topic, kept live by a single subscription.
pub struct PostFeed {
    store: SharedDocumentStore,
    topic: Option<String>,
    subscription: Option<Subscription>,
    shared: Arc<FeedShared>,
}

impl PostFeed {
    /// Creates a feed with no active topic.
    pub fn new(store: SharedDocumentStore) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            store,
            topic: None,
            subscription: None,
            shared: Arc::new(FeedShared {
                snapshot: RwLock::new(Snapshot::Loading),
                generation: AtomicU64::new(0),
                changes,
            }),
        }
    }

    /// Topic currently subscribed to.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Makes `topic` the subscribed topic.
    ///
    /// Returns `false` without touching the subscription when `topic` is
    /// already active. Otherwise the previous subscription is cancelled
    /// once and exactly one new subscription is installed.
    #[instrument(skip(self))]
    pub async fn switch_topic(&mut self, topic: &str) -> Result<bool> {
        if self.topic.as_deref() == Some(topic) && self.subscription.is_some() {
            return Ok(false);
        }

        if let Some(previous) = self.subscription.take() {
            debug!("Cancelling {}", previous.label());
            previous.unsubscribe();
        }
        self.topic = Some(topic.to_string());

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.publish(Snapshot::Loading);

        let shared = Arc::clone(&self.shared);
        let listener: SnapshotListener<Post> = Arc::new(move |delivery| {
            if shared.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Err(e) = &delivery {
                error!("Error listening for posts: {}", e);
            }
            shared.publish(Snapshot::from_delivery(delivery));
        });

        match self.store.watch_posts(topic, listener).await {
            Ok(subscription) => {
                info!("Subscribed to posts in {}", topic);
                self.subscription = Some(subscription);
                Ok(true)
            }
            Err(e) => {
                error!("Failed to subscribe to posts in {}: {}", topic, e);
                self.shared.publish(Snapshot::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Cancels the active subscription, if any.
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Latest delivered snapshot.
    pub fn snapshot(&self) -> Snapshot<Post> {
        self.shared
            .snapshot
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Looks up a post in the latest snapshot.
    pub fn post(&self, id: &RecordId) -> Option<Post> {
        self.shared
            .snapshot
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .items()
            .and_then(|posts| posts.iter().find(|p| &p.id == id).cloned())
    }

    /// Number of live [`changes`](Self::changes) receivers.
    pub fn observers(&self) -> usize {
        self.shared.changes.receiver_count()
    }

    /// Receiver whose value changes on every delivery.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.changes.subscribe()
    }

    /// Writes a new post.
    #[instrument(skip(self, post), fields(topic = %post.topic))]
    pub async fn create_post(&self, post: NewPost) -> Result<Post> {
        self.store.insert_post(post).await.map_err(|e| {
            error!("Error creating post: {}", e);
            e
        })
    }

    /// Deletes a post by id.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, post_id: &RecordId) -> Result<()> {
        self.store.delete_post(post_id).await.map_err(|e| {
            error!("Error deleting post: {}", e);
            e
        })
    }

    /// Appends a new comment to a post and returns it.
    #[instrument(skip(self, content))]
    pub async fn add_comment(
        &self,
        post_id: &RecordId,
        content: &str,
        author_type: AuthorType,
        author_id: Option<String>,
    ) -> Result<Comment> {
        let comment = Comment::new(content, author_type, author_id)?;
        self.store
            .append_comment(post_id, comment.clone())
            .await
            .map_err(|e| {
                error!("Error adding comment: {}", e);
                e
            })?;
        Ok(comment)
    }

    /// Removes one comment by id.
    #[instrument(skip(self))]
    pub async fn remove_comment(&self, post_id: &RecordId, comment_id: &RecordId) -> Result<()> {
        self.store
            .remove_comment(post_id, comment_id)
            .await
            .map_err(|e| {
                error!("Error deleting comment: {}", e);
                e
            })
    }
}

impl Drop for PostFeed {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PostFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostFeed")
            .field("topic", &self.topic)
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{DocumentStore, MemoryDocumentStore};
    use crate::types::Verification;

    fn feed() -> (PostFeed, MemoryDocumentStore) {
        let memory = MemoryDocumentStore::new();
        (PostFeed::new(Arc::new(memory.clone())), memory)
    }

    fn new_post(topic: &str, content: &str) -> NewPost {
        NewPost::new(topic, content, AuthorType::Human, Verification::HumanVerified).unwrap()
    }

    fn contents(feed: &PostFeed) -> Vec<String> {
        feed.snapshot()
            .items()
            .unwrap()
            .iter()
            .map(|p| p.content.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_switch_topic_replaces_subscription() {
        let (mut feed, memory) = feed();
        assert!(feed.switch_topic("General").await.unwrap());
        assert!(feed.switch_topic("Creative").await.unwrap());

        let stats = memory.listener_stats();
        assert_eq!(stats.post_listeners, 1);
        assert_eq!(stats.post_subscriptions_opened, 2);
        assert_eq!(stats.post_subscriptions_closed, 1);
    }

    #[tokio::test]
    async fn test_reselecting_topic_is_noop() {
        let (mut feed, memory) = feed();
        feed.switch_topic("General").await.unwrap();
        assert!(!feed.switch_topic("General").await.unwrap());
        assert_eq!(memory.listener_stats().post_subscriptions_opened, 1);
    }

    #[tokio::test]
    async fn test_snapshot_follows_remote_changes() {
        let (mut feed, memory) = feed();
        let mut changes = feed.changes();
        feed.switch_topic("General").await.unwrap();
        assert!(feed.snapshot().items().unwrap().is_empty());

        memory.insert_post(new_post("General", "one")).await.unwrap();
        memory.insert_post(new_post("Other", "skip")).await.unwrap();
        memory.insert_post(new_post("General", "two")).await.unwrap();
        assert_eq!(contents(&feed), vec!["two", "one"]);
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();

        feed.switch_topic("Other").await.unwrap();
        assert_eq!(contents(&feed), vec!["skip"]);
        assert!(changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_snapshot_unchanged() {
        let (mut feed, memory) = feed();
        feed.switch_topic("General").await.unwrap();
        feed.create_post(new_post("General", "kept")).await.unwrap();

        memory.set_unavailable(true);
        assert!(feed.create_post(new_post("General", "lost")).await.is_err());
        assert_eq!(contents(&feed), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_error_delivery_marks_snapshot_failed() {
        let (mut feed, memory) = feed();
        memory.set_unavailable(true);
        feed.switch_topic("General").await.unwrap();
        assert!(feed.snapshot().is_failed());
    }

    #[tokio::test]
    async fn test_comments_added_and_removed_by_id() {
        let (mut feed, _) = feed();
        feed.switch_topic("General").await.unwrap();
        let post = feed.create_post(new_post("General", "p")).await.unwrap();

        let first = feed
            .add_comment(&post.id, "same", AuthorType::Human, Some("dev".into()))
            .await
            .unwrap();
        let second = feed
            .add_comment(&post.id, "same", AuthorType::Human, Some("dev".into()))
            .await
            .unwrap();
        feed.remove_comment(&post.id, &first.id).await.unwrap();

        let remaining = feed.post(&post.id).unwrap().comments;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second.id);
    }

    #[tokio::test]
    async fn test_drop_cancels_subscription() {
        let (mut feed, memory) = feed();
        feed.switch_topic("General").await.unwrap();
        drop(feed);
        assert_eq!(memory.listener_stats().post_listeners, 0);
    }
}
