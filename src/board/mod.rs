//! The board domain: topics, posts, comments and the flows that change them.
//!
//! - `topic`: topic records and the topic store (seeding, migration)
//! - `post`: post and comment records
//! - `feed`: the live post list of the active topic
//! - `submission`: the two-step post submission flow
//! - `state`: explicit UI state and per-user event handlers
//! - `validation`: synchronous input checks

pub mod feed;
pub mod post;
pub mod state;
pub mod submission;
pub mod topic;
pub mod validation;

pub use feed::{PostFeed, Snapshot};
pub use post::{Comment, NewPost, Post};
pub use state::{theme_class, BoardClient, BoardState};
pub use submission::{
    ImageUpload, PostDraft, SubmissionController, SubmissionPhase, SubmitStep,
};
pub use topic::{MigrationPlan, MigrationReport, Topic, TopicStore};
