//! System-related RPC handlers.

use super::to_json;
use crate::rpc::state::AppState;
use serde_json::Value;
use topicboard::rpc::RpcError;

pub fn handle_health() -> Result<Value, RpcError> {
    Ok(serde_json::json!({
        "status": "ok",
        "service": "topicboard-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn handle_stats(state: &AppState) -> Result<Value, RpcError> {
    let (topics, posts) = state.documents.counts();
    let listeners = to_json(state.documents.listener_stats())?;

    Ok(serde_json::json!({
        "documents": {
            "topics": topics,
            "posts": posts,
            "listeners": listeners
        },
        "requests": {
            "total": state.counters.requests(),
            "failed": state.counters.failures()
        },
        "uptime_secs": state.counters.uptime_secs()
    }))
}
