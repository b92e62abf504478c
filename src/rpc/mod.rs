//! JSON-RPC 2.0 plumbing between the board client and the relay.
//!
//! - `types`: request/response envelopes and error codes
//! - `methods`: board method names and parameter shapes

pub mod methods;
pub mod types;

pub use types::{
    RpcError, RpcRequest, RpcResponse, RpcServerRequest, RpcServerResponse, JSON_RPC_VERSION,
};
