//! Two-step post submission.
//!
//! The first submit of a valid draft only reveals the CAPTCHA challenge. The
//! second submit reads the widget's token and writes the post: a non-empty
//! token attributes it to a human, anything else to an AI agent with a
//! warning. The gate is client-trusted and never checks the token with a
//! verification service.
//!
//! ```text
//! Idle --submit--> AwaitingVerification --submit--> Idle (post written)
//!   ^                      |
//!   +---- topic change ----+
//! ```

use crate::board::feed::PostFeed;
use crate::board::post::{NewPost, Post};
use crate::board::state::BoardState;
use crate::board::validation::{sanitize_file_name, validate_image, validate_post_content};
use crate::captcha::{SharedCaptcha, WidgetHandle};
use crate::constants::{AI_ATTRIBUTION_WARNING, CAPTCHA_CONTAINER_ID, SUBMIT_LABEL_CONFIRM};
use crate::error::{BoardError, Result};
use crate::remote::SharedObjectStore;
use crate::types::{AuthorType, Verification};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Where the submission flow currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubmissionPhase {
    #[default]
    Idle,
    /// The challenge is shown; the next submit writes the post.
    AwaitingVerification { widget: WidgetHandle },
}

impl SubmissionPhase {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, SubmissionPhase::AwaitingVerification { .. })
    }
}

/// An image picked for upload with the post.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Object name the image is stored under.
    pub fn object_name(&self) -> String {
        format!("posts/{}-{}", Uuid::new_v4(), sanitize_file_name(&self.file_name))
    }
}

/// Contents of the post form.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub content: String,
    pub image: Option<ImageUpload>,
}

impl PostDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageUpload) -> Self {
        self.image = Some(image);
        self
    }
}

/// Result of one submit.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitStep {
    /// The challenge was revealed and the submit control relabeled.
    ChallengeShown { button_label: &'static str },
    /// The post was written.
    Posted {
        post: Post,
        warning: Option<&'static str>,
    },
}

/// Drives [`SubmissionPhase`] for a [`BoardState`].
#[derive(Clone)]
pub struct SubmissionController {
    objects: SharedObjectStore,
    captcha: SharedCaptcha,
    site_key: String,
}

impl SubmissionController {
    pub fn new(
        objects: SharedObjectStore,
        captcha: SharedCaptcha,
        site_key: impl Into<String>,
    ) -> Self {
        Self {
            objects,
            captcha,
            site_key: site_key.into(),
        }
    }

    /// Handles one press of the submit control.
    ///
    /// The active topic must be in a delivered topic list on both presses.
    /// Validation failures leave `state` untouched. Once the write has
    /// started, any failure returns the flow to `Idle` with nothing written.
    #[instrument(skip_all, fields(topic = %state.active_topic))]
    pub async fn submit(
        &self,
        state: &mut BoardState,
        feed: &PostFeed,
        draft: PostDraft,
        author_id: Option<String>,
    ) -> Result<SubmitStep> {
        if state.submitting {
            return Err(BoardError::validation("A post is already being submitted."));
        }
        let content = validate_post_content(&draft.content)?;
        if state.active_topic.trim().is_empty() || !state.active_topic_exists() {
            return Err(BoardError::validation(
                "Please select a topic and enter post content.",
            ));
        }
        if let Some(image) = &draft.image {
            validate_image(&image.bytes, &image.content_type)?;
        }

        let widget = match state.phase.clone() {
            SubmissionPhase::Idle => {
                let widget = self.captcha.render(CAPTCHA_CONTAINER_ID, &self.site_key)?;
                state.phase = SubmissionPhase::AwaitingVerification { widget };
                return Ok(SubmitStep::ChallengeShown {
                    button_label: SUBMIT_LABEL_CONFIRM,
                });
            }
            SubmissionPhase::AwaitingVerification { widget } => widget,
        };

        let (author_type, verification, warning) = match self.captcha.response(&widget) {
            Some(_) => (AuthorType::Human, Verification::HumanVerified, None),
            None => {
                warn!("{}", AI_ATTRIBUTION_WARNING);
                (
                    AuthorType::AiAgent,
                    Verification::AiFailedHumanTest,
                    Some(AI_ATTRIBUTION_WARNING),
                )
            }
        };

        state.submitting = true;
        let written = self
            .write_post(
                state,
                feed,
                &content,
                draft.image,
                author_type,
                verification,
                author_id,
            )
            .await;
        state.submitting = false;
        self.captcha.reset(&widget);
        state.phase = SubmissionPhase::Idle;

        let post = written?;
        info!("Post {} written ({})", post.id.short(), post.verification);
        Ok(SubmitStep::Posted { post, warning })
    }

    #[allow(clippy::too_many_arguments)]
    async fn write_post(
        &self,
        state: &BoardState,
        feed: &PostFeed,
        content: &str,
        image: Option<ImageUpload>,
        author_type: AuthorType,
        verification: Verification,
        author_id: Option<String>,
    ) -> Result<Post> {
        let mut post = NewPost::new(
            state.active_topic.clone(),
            content,
            author_type,
            verification,
        )?;
        if let Some(author_id) = author_id {
            post = post.with_author_id(author_id);
        }

        // The upload must finish before the record exists.
        if let Some(image) = image {
            let name = image.object_name();
            let url = self.objects.store(image.bytes, &name).await.map_err(|e| {
                error!("Image upload failed, post not created: {}", e);
                e
            })?;
            post = post.with_image_url(url);
        }

        feed.create_post(post).await
    }

    /// Abandons a pending challenge, e.g. when the user changes topic.
    pub fn cancel(&self, state: &mut BoardState) {
        if let SubmissionPhase::AwaitingVerification { widget } =
            std::mem::take(&mut state.phase)
        {
            self.captcha.reset(&widget);
        }
    }
}

impl std::fmt::Debug for SubmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionController")
            .field("site_key", &self.site_key)
            .finish()
    }
}
