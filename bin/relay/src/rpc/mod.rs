//! Unified JSON-RPC 2.0 handler for the relay server.
//!
//! Provides a single `/rpc` endpoint for all board operations:
//!
//! ## Topic Methods
//! - `topic.list` - All topics, oldest first
//! - `topic.insert` - Insert a topic stamped with the relay clock
//! - `topic.rename` - Rename a topic by id
//!
//! ## Post Methods
//! - `post.insert` - Insert a post with an empty comment list
//! - `post.delete` - Delete a post by id
//! - `post.query` - Posts of one topic, newest first
//! - `comment.append` - Append a comment to a post
//! - `comment.remove` - Remove a comment from a post
//!
//! ## Object Methods
//! - `object.store` - Store a base64 upload and return its URL
//!
//! ## System Methods
//! - `relay.health` - Health check
//! - `relay.stats` - Server statistics

mod handlers;
mod state;

pub use handlers::{dispatch, handle_rpc};
pub use state::AppState;
