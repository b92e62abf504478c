//! Explicit board application state and the event handlers that drive it.
//!
//! [`BoardState`] is everything the UI would otherwise keep in free-floating
//! variables: the active topic, the latest topic list, the submission phase
//! and the in-flight flag. [`BoardClient`] owns one state object together with
//! the topic subscription and the post feed, and exposes one method per user
//! action.

use crate::board::feed::{PostFeed, Snapshot};
use crate::board::post::Comment;
use crate::board::submission::{PostDraft, SubmissionController, SubmissionPhase, SubmitStep};
use crate::board::topic::{Topic, TopicStore};
use crate::constants::{
    DEFAULT_ACTIVE_TOPIC, SUBMIT_LABEL_BUSY, SUBMIT_LABEL_CONFIRM, SUBMIT_LABEL_IDLE,
};
use crate::error::{BoardError, Result};
use crate::identity::DeviceIdentity;
use crate::remote::{SharedDocumentStore, SnapshotListener, Subscription};
use crate::types::{AuthorType, RecordId};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

/// CSS class applied to the board for `topic`.
///
/// `"AI Agents"` becomes `theme-ai-agents`.
pub fn theme_class(topic: &str) -> String {
    let slug: String = topic
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    format!("theme-{}", slug)
}

/// Local UI state of one board view.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardState {
    pub active_topic: String,
    pub topics: Snapshot<Topic>,
    pub phase: SubmissionPhase,
    /// True while a post write is in flight.
    pub submitting: bool,
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardState {
    pub fn new() -> Self {
        Self {
            active_topic: DEFAULT_ACTIVE_TOPIC.to_string(),
            topics: Snapshot::Loading,
            phase: SubmissionPhase::Idle,
            submitting: false,
        }
    }

    /// Applies a topic delivery and returns true if the active topic changed.
    ///
    /// If the active topic is missing from a delivered list the first topic
    /// becomes active, or `"General"` when the list is empty. A failed
    /// delivery keeps the current selection.
    pub fn apply_topics(&mut self, topics: Snapshot<Topic>) -> bool {
        let fallback = match &topics {
            Snapshot::Ready(list) if !list.iter().any(|t| t.name == self.active_topic) => Some(
                list.first()
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| DEFAULT_ACTIVE_TOPIC.to_string()),
            ),
            _ => None,
        };
        self.topics = topics;
        match fallback {
            Some(name) if name != self.active_topic => {
                debug!("Active topic {} gone, falling back to {}", self.active_topic, name);
                self.active_topic = name;
                true
            }
            _ => false,
        }
    }

    /// Theme class for the active topic.
    pub fn theme_class(&self) -> String {
        theme_class(&self.active_topic)
    }

    /// Label of the submit control.
    pub fn submit_label(&self) -> &'static str {
        if self.submitting {
            SUBMIT_LABEL_BUSY
        } else if self.phase.is_awaiting() {
            SUBMIT_LABEL_CONFIRM
        } else {
            SUBMIT_LABEL_IDLE
        }
    }

    /// Whether the CAPTCHA challenge is shown.
    pub fn captcha_visible(&self) -> bool {
        self.phase.is_awaiting()
    }

    /// Whether the active topic is in a delivered topic list.
    ///
    /// False while loading or after a failed delivery, so nothing is posted
    /// under a topic that may not exist.
    pub fn active_topic_exists(&self) -> bool {
        matches!(
            &self.topics,
            Snapshot::Ready(list) if list.iter().any(|t| t.name == self.active_topic)
        )
    }

    /// Whether `name` is in the latest topic list. True while loading.
    pub fn knows_topic(&self, name: &str) -> bool {
        match &self.topics {
            Snapshot::Ready(list) => list.iter().any(|t| t.name == name),
            _ => true,
        }
    }
}

/// Latest topic delivery plus a change counter.
struct TopicMirror {
    snapshot: RwLock<Snapshot<Topic>>,
    changes: watch::Sender<u64>,
}

/// One user's board: state, topic subscription and post feed.
pub struct BoardClient {
    topics: TopicStore,
    feed: PostFeed,
    submissions: SubmissionController,
    device_id: String,
    state: BoardState,
    mirror: Arc<TopicMirror>,
    topic_subscription: Option<Subscription>,
}

impl BoardClient {
    pub fn new(
        documents: SharedDocumentStore,
        submissions: SubmissionController,
        identity: &dyn DeviceIdentity,
    ) -> Result<Self> {
        let (changes, _) = watch::channel(0);
        Ok(Self {
            topics: TopicStore::new(documents.clone()),
            feed: PostFeed::new(documents),
            submissions,
            device_id: identity.device_id()?,
            state: BoardState::new(),
            mirror: Arc::new(TopicMirror {
                snapshot: RwLock::new(Snapshot::Loading),
                changes,
            }),
            topic_subscription: None,
        })
    }

    /// Subscribes to topics and to the posts of the active topic.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.topic_subscription.is_none() {
            let mirror = Arc::clone(&self.mirror);
            let listener: SnapshotListener<Topic> = Arc::new(move |delivery| {
                if let Err(e) = &delivery {
                    error!("Error listening for topics: {}", e);
                }
                *mirror.snapshot.write().unwrap_or_else(|p| p.into_inner()) =
                    Snapshot::from_delivery(delivery);
                mirror.changes.send_modify(|v| *v += 1);
            });
            self.topic_subscription = Some(self.topics.watch(listener).await?);
        }
        self.sync().await
    }

    /// Applies the latest topic delivery and keeps the feed on the active
    /// topic.
    pub async fn sync(&mut self) -> Result<()> {
        let topics = self
            .mirror
            .snapshot
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if self.state.apply_topics(topics) {
            self.submissions.cancel(&mut self.state);
        }
        let active = self.state.active_topic.clone();
        self.feed.switch_topic(&active).await?;
        Ok(())
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn feed(&self) -> &PostFeed {
        &self.feed
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Receiver bumped on every topic delivery.
    pub fn topic_changes(&self) -> watch::Receiver<u64> {
        self.mirror.changes.subscribe()
    }

    /// Receiver bumped on every post delivery.
    pub fn post_changes(&self) -> watch::Receiver<u64> {
        self.feed.changes()
    }

    /// Whether any topic or post change receiver is still alive.
    pub fn has_observers(&self) -> bool {
        self.mirror.changes.receiver_count() > 0 || self.feed.observers() > 0
    }

    /// Makes `name` the active topic. A pending challenge is abandoned.
    #[instrument(skip(self))]
    pub async fn select_topic(&mut self, name: &str) -> Result<()> {
        if name == self.state.active_topic {
            return Ok(());
        }
        if !self.state.knows_topic(name) {
            return Err(BoardError::not_found(format!("topic {}", name)));
        }
        self.submissions.cancel(&mut self.state);
        self.state.active_topic = name.to_string();
        info!("Active topic: {}", name);
        self.feed.switch_topic(name).await?;
        Ok(())
    }

    /// Creates a topic. The new topic is not selected automatically.
    pub async fn add_topic(&mut self, name: &str) -> Result<Topic> {
        let topic = self.topics.add_topic(name).await?;
        self.sync().await?;
        Ok(topic)
    }

    /// One press of the post form's submit control.
    pub async fn submit_post(&mut self, draft: PostDraft) -> Result<SubmitStep> {
        self.submissions
            .submit(
                &mut self.state,
                &self.feed,
                draft,
                Some(self.device_id.clone()),
            )
            .await
    }

    /// Abandons a pending challenge without posting.
    pub fn cancel_submission(&mut self) {
        self.submissions.cancel(&mut self.state);
    }

    /// Comments on a post in the active topic.
    pub async fn add_comment(
        &self,
        post_id: &RecordId,
        content: &str,
        author_type: AuthorType,
    ) -> Result<Comment> {
        self.feed
            .add_comment(post_id, content, author_type, Some(self.device_id.clone()))
            .await
    }

    /// Deletes a post this device authored.
    ///
    /// The ownership check happens here, on the client; the store deletes
    /// whatever id it is given.
    pub async fn delete_post(&self, post_id: &RecordId) -> Result<()> {
        let post = self
            .feed
            .post(post_id)
            .ok_or_else(|| BoardError::not_found(format!("post {}", post_id)))?;
        if !post.is_owned_by(&self.device_id) {
            return Err(BoardError::validation("You can only delete your own posts."));
        }
        self.feed.delete_post(post_id).await
    }

    /// Removes a comment this device authored.
    pub async fn remove_comment(&self, post_id: &RecordId, comment_id: &RecordId) -> Result<()> {
        let post = self
            .feed
            .post(post_id)
            .ok_or_else(|| BoardError::not_found(format!("post {}", post_id)))?;
        let comment = post
            .comment(comment_id)
            .ok_or_else(|| BoardError::not_found(format!("comment {}", comment_id)))?;
        if !comment.is_owned_by(&self.device_id) {
            return Err(BoardError::validation(
                "You can only delete your own comments.",
            ));
        }
        self.feed.remove_comment(post_id, comment_id).await
    }

    /// Cancels both subscriptions.
    pub fn close(&mut self) {
        self.cancel_submission();
        if let Some(subscription) = self.topic_subscription.take() {
            subscription.unsubscribe();
        }
        self.feed.close();
    }
}

impl std::fmt::Debug for BoardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardClient")
            .field("device_id", &self.device_id)
            .field("state", &self.state)
            .field("feed", &self.feed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::FormCaptcha;
    use crate::identity::StaticDeviceIdentity;
    use crate::remote::{DocumentStore, MemoryDocumentStore, MemoryObjectStore};

    fn topic(name: &str) -> Topic {
        Topic {
            id: RecordId::generate(),
            name: name.to_string(),
            created_at: 0,
        }
    }

    async fn client(memory: &MemoryDocumentStore, device: &str) -> BoardClient {
        let submissions = SubmissionController::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(FormCaptcha::new()),
            "site-key",
        );
        let mut client = BoardClient::new(
            Arc::new(memory.clone()),
            submissions,
            &StaticDeviceIdentity::new(device),
        )
        .unwrap();
        client.start().await.unwrap();
        client
    }

    #[test]
    fn test_theme_class() {
        assert_eq!(theme_class("General"), "theme-general");
        assert_eq!(theme_class("AI Agents"), "theme-ai-agents");
        assert_eq!(theme_class("Off-Topic"), "theme-off-topic");
    }

    #[test]
    fn test_active_topic_fallback() {
        let mut state = BoardState::new();
        assert_eq!(state.active_topic, "General");

        assert!(state.apply_topics(Snapshot::Ready(vec![topic("Creative"), topic("Tech")])));
        assert_eq!(state.active_topic, "Creative");

        assert!(!state.apply_topics(Snapshot::Ready(vec![topic("Tech"), topic("Creative")])));
        assert_eq!(state.active_topic, "Creative");

        assert!(state.apply_topics(Snapshot::Ready(vec![])));
        assert_eq!(state.active_topic, "General");

        assert!(!state.apply_topics(Snapshot::Failed("down".into())));
        assert_eq!(state.active_topic, "General");
    }

    #[tokio::test]
    async fn test_select_topic_switches_feed_and_resets_phase() {
        let memory = MemoryDocumentStore::new();
        memory.insert_topic("General").await.unwrap();
        memory.insert_topic("Creative").await.unwrap();
        let mut client = client(&memory, "dev").await;

        client.submit_post(PostDraft::new("Hello")).await.unwrap();
        assert!(client.state().captcha_visible());

        client.select_topic("Creative").await.unwrap();
        assert_eq!(client.state().phase, SubmissionPhase::Idle);
        assert_eq!(client.feed().topic(), Some("Creative"));
        assert_eq!(client.state().theme_class(), "theme-creative");

        let stats = memory.listener_stats();
        assert_eq!(stats.post_listeners, 1);
        assert_eq!(stats.post_subscriptions_closed, 1);

        assert!(client.select_topic("Nope").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        let memory = MemoryDocumentStore::new();
        memory.insert_topic("General").await.unwrap();
        let mut mine = client(&memory, "dev-a").await;
        let theirs = client(&memory, "dev-b").await;

        mine.submit_post(PostDraft::new("Hello")).await.unwrap();
        let SubmitStep::Posted { post, .. } =
            mine.submit_post(PostDraft::new("Hello")).await.unwrap()
        else {
            panic!("expected a post");
        };

        assert!(theirs.delete_post(&post.id).await.is_err());
        assert_eq!(memory.counts().1, 1);

        mine.delete_post(&post.id).await.unwrap();
        assert_eq!(memory.counts().1, 0);
    }

    #[tokio::test]
    async fn test_comment_removal_requires_ownership() {
        let memory = MemoryDocumentStore::new();
        memory.insert_topic("General").await.unwrap();
        let mut mine = client(&memory, "dev-a").await;
        let theirs = client(&memory, "dev-b").await;

        mine.submit_post(PostDraft::new("Hello")).await.unwrap();
        mine.submit_post(PostDraft::new("Hello")).await.unwrap();
        let post_id = mine.feed().snapshot().items().unwrap()[0].id;

        let comment = theirs
            .add_comment(&post_id, "Nice", AuthorType::AiAgent)
            .await
            .unwrap();
        assert!(mine.remove_comment(&post_id, &comment.id).await.is_err());
        theirs.remove_comment(&post_id, &comment.id).await.unwrap();
        assert!(mine.feed().post(&post_id).unwrap().comments.is_empty());
    }

    #[tokio::test]
    async fn test_new_topic_visible_after_add() {
        let memory = MemoryDocumentStore::new();
        memory.insert_topic("General").await.unwrap();
        let mut client = client(&memory, "dev").await;

        client.add_topic("Music").await.unwrap();
        let names: Vec<String> = client
            .state()
            .topics
            .items()
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["General", "Music"]);
        assert_eq!(client.state().active_topic, "General");
    }
}
