//! # Topicboard
//!
//! A topic-based bulletin board client. Users create topics, post under a
//! topic with an optional image, and comment on posts. A client-side CAPTCHA
//! gate decides whether a post is attributed to a human or to an AI agent.
//!
//! The board owns no authoritative data. Persistence, queries, change
//! notification and file storage are delegated to a document store and an
//! object store (see [`remote`]); the board keeps a few pieces of UI state,
//! subscribes to snapshots and re-renders on every change.
//!
//! ## Layout
//!
//! - [`board`]: topics, posts, comments, the live post feed, the submission
//!   flow and the explicit UI state
//! - [`remote`]: document and object store seams with in-memory, file and
//!   JSON-RPC implementations
//! - [`render`]: snapshot-to-HTML rendering
//! - [`captcha`], [`identity`]: the CAPTCHA widget and device identity
//!   collaborators
//! - [`rpc`]: JSON-RPC 2.0 types shared with the relay
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topicboard::board::{BoardClient, PostDraft, SubmissionController, TopicStore};
//! use topicboard::captcha::FormCaptcha;
//! use topicboard::identity::StaticDeviceIdentity;
//! use topicboard::remote::{MemoryDocumentStore, MemoryObjectStore};
//! # async fn demo() -> topicboard::Result<()> {
//! let documents = Arc::new(MemoryDocumentStore::new());
//! TopicStore::new(documents.clone()).initialize_defaults(true).await?;
//!
//! let submissions = SubmissionController::new(
//!     Arc::new(MemoryObjectStore::new()),
//!     Arc::new(FormCaptcha::new()),
//!     "site-key",
//! );
//! let mut client =
//!     BoardClient::new(documents, submissions, &StaticDeviceIdentity::new("device-1"))?;
//! client.start().await?;
//!
//! // First press shows the challenge, second press posts.
//! client.submit_post(PostDraft::new("Hello")).await?;
//! client.submit_post(PostDraft::new("Hello")).await?;
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod captcha;
pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod remote;
pub mod render;
pub mod rpc;
pub mod types;

pub use error::{BoardError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
