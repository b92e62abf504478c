//! In-process document store.
//!
//! Keeps topics and posts in memory and notifies subscribers synchronously
//! after every committed change. Writes are last-writer-wins; there is no
//! merge logic. Snapshots are delivered in commit order because commit and
//! delivery happen under the same commit lock.
//!
//! Listeners must not call back into the store from inside the callback.

use super::{DocumentStore, SnapshotListener, Subscription};
use crate::board::{Comment, NewPost, Post, Topic};
use crate::error::{BoardError, Result};
use crate::types::{current_timestamp_millis, RecordId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, instrument};

/// Subscription bookkeeping, exposed for tests and stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ListenerStats {
    /// Topic listeners currently installed.
    pub topic_listeners: usize,
    /// Post listeners currently installed.
    pub post_listeners: usize,
    /// Post subscriptions ever opened.
    pub post_subscriptions_opened: usize,
    /// Post subscriptions ever closed.
    pub post_subscriptions_closed: usize,
}

/// Stored documents of a [`MemoryDocumentStore`], for saving and reloading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub topics: Vec<Topic>,
    /// Posts in insertion order.
    pub posts: Vec<Post>,
}

#[derive(Default)]
struct MemoryState {
    topics: Vec<Topic>,
    /// Posts in insertion order.
    posts: Vec<Post>,
    topic_listeners: HashMap<u64, SnapshotListener<Topic>>,
    post_listeners: HashMap<u64, (String, SnapshotListener<Post>)>,
    next_listener_id: u64,
    last_timestamp: u64,
    unavailable: bool,
    stats: ListenerStats,
}

impl MemoryState {
    /// Server clock: strictly increasing so ordering by timestamp is total.
    fn next_timestamp(&mut self) -> u64 {
        let now = current_timestamp_millis().max(self.last_timestamp + 1);
        self.last_timestamp = now;
        now
    }

    fn next_listener_id(&mut self) -> u64 {
        self.next_listener_id += 1;
        self.next_listener_id
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(BoardError::remote("document service unavailable"));
        }
        Ok(())
    }

    fn sorted_topics(&self) -> Vec<Topic> {
        let mut topics = self.topics.clone();
        topics.sort_by_key(|t| t.created_at);
        topics
    }

    fn posts_for(&self, topic: &str) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .rev()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        posts
    }

    fn post_mut(&mut self, id: &RecordId) -> Result<&mut Post> {
        self.posts
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| BoardError::not_found(format!("post {}", id)))
    }
}

struct Shared {
    state: Mutex<MemoryState>,
    /// Held across a mutation and its notification fan-out.
    commit: Mutex<()>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn commit(&self) -> MutexGuard<'_, ()> {
        self.commit.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn notify_topics(&self) {
        let (snapshot, listeners): (Vec<Topic>, Vec<SnapshotListener<Topic>>) = {
            let state = self.state();
            (
                state.sorted_topics(),
                state.topic_listeners.values().cloned().collect(),
            )
        };
        for listener in listeners {
            listener(Ok(snapshot.clone()));
        }
    }

    fn notify_posts(&self, topic: &str) {
        let (snapshot, listeners): (Vec<Post>, Vec<SnapshotListener<Post>>) = {
            let state = self.state();
            (
                state.posts_for(topic),
                state
                    .post_listeners
                    .values()
                    .filter(|(t, _)| t == topic)
                    .map(|(_, l)| l.clone())
                    .collect(),
            )
        };
        for listener in listeners {
            listener(Ok(snapshot.clone()));
        }
    }
}

/// In-memory [`DocumentStore`].
#[derive(Clone)]
pub struct MemoryDocumentStore {
    shared: Arc<Shared>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MemoryState::default()),
                commit: Mutex::new(()),
            }),
        }
    }

    /// Creates a store holding `snapshot`. The server clock resumes after the
    /// newest stored timestamp.
    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Self {
        let last_timestamp = snapshot
            .topics
            .iter()
            .map(|t| t.created_at)
            .chain(snapshot.posts.iter().map(|p| p.timestamp))
            .max()
            .unwrap_or(0);
        let state = MemoryState {
            topics: snapshot.topics,
            posts: snapshot.posts,
            last_timestamp,
            ..MemoryState::default()
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                commit: Mutex::new(()),
            }),
        }
    }

    /// Copy of the stored documents.
    pub fn export(&self) -> DocumentSnapshot {
        let state = self.shared.state();
        DocumentSnapshot {
            topics: state.topics.clone(),
            posts: state.posts.clone(),
        }
    }

    /// Makes every call fail with a remote error until switched back.
    /// New subscriptions receive an error delivery.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.state().unavailable = unavailable;
    }

    /// Current subscription bookkeeping.
    pub fn listener_stats(&self) -> ListenerStats {
        let state = self.shared.state();
        ListenerStats {
            topic_listeners: state.topic_listeners.len(),
            post_listeners: state.post_listeners.len(),
            ..state.stats
        }
    }

    /// Number of stored topics and posts.
    pub fn counts(&self) -> (usize, usize) {
        let state = self.shared.state();
        (state.topics.len(), state.posts.len())
    }

    fn weak(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (topics, posts) = self.counts();
        f.debug_struct("MemoryDocumentStore")
            .field("topics", &topics)
            .field("posts", &posts)
            .finish()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let state = self.shared.state();
        state.check_available()?;
        Ok(state.sorted_topics())
    }

    #[instrument(skip(self))]
    async fn insert_topic(&self, name: &str) -> Result<Topic> {
        let _commit = self.shared.commit();
        let topic = {
            let mut state = self.shared.state();
            state.check_available()?;
            let topic = Topic {
                id: RecordId::generate(),
                name: name.to_string(),
                created_at: state.next_timestamp(),
            };
            state.topics.push(topic.clone());
            topic
        };
        info!("topic inserted: {} ({})", topic.name, topic.id.short());
        self.shared.notify_topics();
        Ok(topic)
    }

    #[instrument(skip(self))]
    async fn rename_topic(&self, id: &RecordId, new_name: &str) -> Result<()> {
        let _commit = self.shared.commit();
        {
            let mut state = self.shared.state();
            state.check_available()?;
            let topic = state
                .topics
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| BoardError::not_found(format!("topic {}", id)))?;
            info!("topic renamed: {} -> {}", topic.name, new_name);
            topic.name = new_name.to_string();
        }
        self.shared.notify_topics();
        Ok(())
    }

    async fn watch_topics(&self, listener: SnapshotListener<Topic>) -> Result<Subscription> {
        let _commit = self.shared.commit();
        let (id, initial) = {
            let mut state = self.shared.state();
            let id = state.next_listener_id();
            state.topic_listeners.insert(id, listener.clone());
            let initial = match state.check_available() {
                Ok(()) => Ok(state.sorted_topics()),
                Err(e) => Err(e),
            };
            (id, initial)
        };
        listener(initial);

        let weak = self.weak();
        Ok(Subscription::new("topics", move || {
            if let Some(shared) = weak.upgrade() {
                shared.state().topic_listeners.remove(&id);
            }
        }))
    }

    #[instrument(skip(self, post), fields(topic = %post.topic))]
    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let _commit = self.shared.commit();
        let stored = {
            let mut state = self.shared.state();
            state.check_available()?;
            let timestamp = state.next_timestamp();
            let stored = Post::from_new(post, RecordId::generate(), timestamp);
            state.posts.push(stored.clone());
            stored
        };
        info!("post inserted: {} in {}", stored.id.short(), stored.topic);
        self.shared.notify_posts(&stored.topic);
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn delete_post(&self, id: &RecordId) -> Result<()> {
        let _commit = self.shared.commit();
        let removed_topic = {
            let mut state = self.shared.state();
            state.check_available()?;
            let idx = state.posts.iter().position(|p| &p.id == id);
            idx.map(|i| state.posts.remove(i).topic)
        };
        match removed_topic {
            Some(topic) => {
                info!("post deleted: {}", id.short());
                self.shared.notify_posts(&topic);
            }
            None => debug!("delete of missing post {} ignored", id.short()),
        }
        Ok(())
    }

    #[instrument(skip(self, comment), fields(comment = %comment.id.short()))]
    async fn append_comment(&self, post_id: &RecordId, comment: Comment) -> Result<()> {
        let _commit = self.shared.commit();
        let topic = {
            let mut state = self.shared.state();
            state.check_available()?;
            let post = state.post_mut(post_id)?;
            if post.comments.iter().any(|c| c.id == comment.id) {
                debug!("comment already present, append is a no-op");
                return Ok(());
            }
            post.comments.push(comment);
            post.topic.clone()
        };
        self.shared.notify_posts(&topic);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_comment(&self, post_id: &RecordId, comment_id: &RecordId) -> Result<()> {
        let _commit = self.shared.commit();
        let topic = {
            let mut state = self.shared.state();
            state.check_available()?;
            let post = state.post_mut(post_id)?;
            let before = post.comments.len();
            post.comments.retain(|c| &c.id != comment_id);
            if post.comments.len() == before {
                return Ok(());
            }
            post.topic.clone()
        };
        self.shared.notify_posts(&topic);
        Ok(())
    }

    async fn query_posts(&self, topic: &str) -> Result<Vec<Post>> {
        let state = self.shared.state();
        state.check_available()?;
        Ok(state.posts_for(topic))
    }

    async fn watch_posts(
        &self,
        topic: &str,
        listener: SnapshotListener<Post>,
    ) -> Result<Subscription> {
        let _commit = self.shared.commit();
        let (id, initial) = {
            let mut state = self.shared.state();
            let id = state.next_listener_id();
            state
                .post_listeners
                .insert(id, (topic.to_string(), listener.clone()));
            state.stats.post_subscriptions_opened += 1;
            let initial = match state.check_available() {
                Ok(()) => Ok(state.posts_for(topic)),
                Err(e) => Err(e),
            };
            (id, initial)
        };
        listener(initial);

        let weak = self.weak();
        Ok(Subscription::new(format!("posts:{}", topic), move || {
            if let Some(shared) = weak.upgrade() {
                let mut state = shared.state();
                if state.post_listeners.remove(&id).is_some() {
                    state.stats.post_subscriptions_closed += 1;
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthorType, Verification};
    use std::sync::Mutex as StdMutex;

    fn new_post(topic: &str, content: &str) -> NewPost {
        NewPost::new(topic, content, AuthorType::Human, Verification::HumanVerified).unwrap()
    }

    fn collecting<T: Clone + Send + 'static>(
    ) -> (SnapshotListener<T>, Arc<StdMutex<Vec<Result<Vec<T>>>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: SnapshotListener<T> = Arc::new(move |snapshot| {
            sink.lock().unwrap().push(snapshot);
        });
        (listener, seen)
    }

    #[tokio::test]
    async fn test_topics_ordered_by_creation() {
        let store = MemoryDocumentStore::new();
        store.insert_topic("General").await.unwrap();
        store.insert_topic("Creative").await.unwrap();
        store.insert_topic("AI Agents").await.unwrap();

        let names: Vec<String> = store
            .list_topics()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["General", "Creative", "AI Agents"]);
    }

    #[tokio::test]
    async fn test_posts_newest_first_and_filtered() {
        let store = MemoryDocumentStore::new();
        store.insert_post(new_post("General", "first")).await.unwrap();
        store.insert_post(new_post("Creative", "elsewhere")).await.unwrap();
        store.insert_post(new_post("General", "second")).await.unwrap();

        let posts = store.query_posts("General").await.unwrap();
        let contents: Vec<&str> = posts.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "first"]);
        assert!(posts[0].timestamp > posts[1].timestamp);
    }

    #[tokio::test]
    async fn test_watch_delivers_initial_and_changes() {
        let store = MemoryDocumentStore::new();
        let (listener, seen) = collecting::<Post>();
        let sub = store.watch_posts("General", listener).await.unwrap();

        store.insert_post(new_post("General", "hello")).await.unwrap();
        store.insert_post(new_post("Creative", "not mine")).await.unwrap();

        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert!(seen[0].as_ref().unwrap().is_empty());
            assert_eq!(seen[1].as_ref().unwrap()[0].content, "hello");
        }

        sub.unsubscribe();
        store.insert_post(new_post("General", "after")).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);

        let stats = store.listener_stats();
        assert_eq!(stats.post_listeners, 0);
        assert_eq!(stats.post_subscriptions_opened, 1);
        assert_eq!(stats.post_subscriptions_closed, 1);
    }

    #[tokio::test]
    async fn test_comment_append_is_unique_by_id() {
        let store = MemoryDocumentStore::new();
        let post = store.insert_post(new_post("General", "p")).await.unwrap();
        let comment = Comment::new("nice", AuthorType::Human, None).unwrap();

        store.append_comment(&post.id, comment.clone()).await.unwrap();
        store.append_comment(&post.id, comment.clone()).await.unwrap();
        let posts = store.query_posts("General").await.unwrap();
        assert_eq!(posts[0].comments.len(), 1);

        store.remove_comment(&post.id, &comment.id).await.unwrap();
        let posts = store.query_posts("General").await.unwrap();
        assert!(posts[0].comments.is_empty());
    }

    #[tokio::test]
    async fn test_identical_comments_removed_individually() {
        let store = MemoryDocumentStore::new();
        let post = store.insert_post(new_post("General", "p")).await.unwrap();
        let first = Comment::new("same", AuthorType::Human, Some("d".into())).unwrap();
        let mut second = first.clone();
        second.id = RecordId::generate();

        store.append_comment(&post.id, first.clone()).await.unwrap();
        store.append_comment(&post.id, second.clone()).await.unwrap();
        store.remove_comment(&post.id, &second.id).await.unwrap();

        let posts = store.query_posts("General").await.unwrap();
        assert_eq!(posts[0].comments, vec![first]);
    }

    #[tokio::test]
    async fn test_comment_on_missing_post_is_not_found() {
        let store = MemoryDocumentStore::new();
        let comment = Comment::new("x", AuthorType::Human, None).unwrap();
        let err = store
            .append_comment(&RecordId::generate(), comment)
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = MemoryDocumentStore::new();
        store.set_unavailable(true);
        assert!(store.insert_topic("General").await.is_err());
        assert_eq!(store.counts(), (0, 0));

        let (listener, seen) = collecting::<Topic>();
        let _sub = store.watch_topics(listener).await.unwrap();
        assert!(seen.lock().unwrap()[0].is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_post_succeeds() {
        let store = MemoryDocumentStore::new();
        assert!(store.delete_post(&RecordId::generate()).await.is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_reload_keeps_documents_and_clock() {
        let store = MemoryDocumentStore::new();
        store.insert_topic("General").await.unwrap();
        let post = store.insert_post(new_post("General", "kept")).await.unwrap();
        store
            .append_comment(&post.id, Comment::new("reply", AuthorType::Human, None).unwrap())
            .await
            .unwrap();

        let snapshot = store.export();
        let reloaded = MemoryDocumentStore::from_snapshot(snapshot.clone());
        assert_eq!(reloaded.export(), snapshot);
        assert_eq!(reloaded.listener_stats(), ListenerStats::default());

        let later = reloaded.insert_post(new_post("General", "new")).await.unwrap();
        assert!(later.timestamp > post.timestamp);
        let posts = reloaded.query_posts("General").await.unwrap();
        assert_eq!(posts[0].content, "new");
        assert_eq!(posts[1].comments.len(), 1);
    }
}
