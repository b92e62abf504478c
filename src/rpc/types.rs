//! JSON-RPC 2.0 envelope types.
//!
//! ## Client side
//!
//! - [`RpcRequest`]: outgoing request
//! - [`RpcResponse`]: incoming response, converted into a board [`Result`]
//!
//! ## Server side
//!
//! - [`RpcServerRequest`]: incoming request (method is owned)
//! - [`RpcServerResponse`]: outgoing response
//!
//! [`RpcError`] carries the standard codes plus the board's application codes
//! in the -32000 range.

use crate::error::{BoardError, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 protocol version.
pub const JSON_RPC_VERSION: &str = "2.0";

/// Outgoing JSON-RPC request.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
    pub id: u64,
}

impl RpcRequest {
    /// Builds a request; params that fail to serialize become `null`.
    pub fn new(method: &'static str, params: impl Serialize, id: u64) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            method,
            params: serde_json::to_value(params).unwrap_or(Value::Null),
            id,
        }
    }
}

/// Incoming JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

impl RpcResponse {
    /// Extracts the result, mapping an error object onto [`BoardError`].
    pub fn into_result(self) -> Result<Value> {
        if let Some(err) = self.error {
            return Err(err.into_board_error());
        }
        self.result
            .ok_or_else(|| BoardError::remote("Empty RPC result"))
    }

    /// Extracts and deserializes the result.
    pub fn into_typed_result<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.into_result()?;
        serde_json::from_value(value).map_err(|e| {
            BoardError::serialization(format!("Failed to parse RPC result: {}", e))
        })
    }
}

/// Incoming JSON-RPC request on the server.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcServerRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Option<Value>,
}

impl RpcServerRequest {
    /// Checks the protocol version and method name.
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.jsonrpc != JSON_RPC_VERSION {
            return Err("Invalid JSON-RPC version");
        }
        if self.method.is_empty() {
            return Err("Method name required");
        }
        Ok(())
    }

    /// Parses params into a concrete type.
    pub fn parse_params<T: DeserializeOwned>(&self) -> std::result::Result<T, RpcError> {
        serde_json::from_value(self.params.clone())
            .map_err(|e| RpcError::invalid_params(e.to_string()))
    }
}

/// Outgoing JSON-RPC response on the server.
#[derive(Debug, Clone, Serialize)]
pub struct RpcServerResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

impl RpcServerResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Invalid JSON was received (-32700).
    pub const PARSE_ERROR: i32 = -32700;
    /// Not a valid request object (-32600).
    pub const INVALID_REQUEST: i32 = -32600;
    /// Unknown method (-32601).
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Bad method parameters (-32602).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error (-32603).
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Record not found (-32001).
    pub const NOT_FOUND: i32 = -32001;
    /// Input rejected by validation (-32002).
    pub const VALIDATION_FAILED: i32 = -32002;
    /// Store refused the write (-32004).
    pub const RESOURCE_EXHAUSTED: i32 = -32004;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, msg)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            Self::METHOD_NOT_FOUND,
            format!("Method '{}' not found", method),
        )
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, msg)
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(Self::NOT_FOUND, msg)
    }

    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self::new(Self::VALIDATION_FAILED, msg)
    }

    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::new(Self::RESOURCE_EXHAUSTED, msg)
    }

    /// Maps a board error onto the wire.
    pub fn from_board_error(err: &BoardError) -> Self {
        match err {
            BoardError::NotFound(msg) => Self::not_found(msg.clone()),
            BoardError::Validation(msg) => Self::validation_failed(msg.clone()),
            BoardError::DuplicateTopic(name) => {
                Self::validation_failed(format!("Topic already exists: {}", name))
            }
            other => Self::internal_error(other.to_string()),
        }
    }

    /// Maps a wire error back onto the board error type.
    pub fn into_board_error(self) -> BoardError {
        match self.code {
            Self::NOT_FOUND => BoardError::NotFound(self.message),
            Self::VALIDATION_FAILED | Self::INVALID_PARAMS => BoardError::Validation(self.message),
            _ => BoardError::remote(format!("RPC error {}: {}", self.code, self.message)),
        }
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(result: Option<Value>, error: Option<RpcError>) -> RpcResponse {
        RpcResponse {
            jsonrpc: "2.0".to_string(),
            result,
            error,
            id: Some(Value::from(1)),
        }
    }

    #[test]
    fn test_request_serialization() {
        let request = RpcRequest::new("topic.list", serde_json::json!({}), 7);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"topic.list\""));
        assert!(json.contains("\"id\":7"));
    }

    #[test]
    fn test_error_codes_map_to_board_errors() {
        let err = response(None, Some(RpcError::not_found("post x")))
            .into_result()
            .unwrap_err();
        assert!(matches!(err, BoardError::NotFound(_)));

        let err = response(None, Some(RpcError::validation_failed("blank")))
            .into_result()
            .unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));

        let err = response(None, Some(RpcError::internal_error("boom")))
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains("-32603"));
    }

    #[test]
    fn test_missing_result_is_remote_error() {
        let err = response(None, None).into_result().unwrap_err();
        assert!(matches!(err, BoardError::Remote(_)));
    }

    #[test]
    fn test_server_request_validation() {
        let mut req = RpcServerRequest {
            jsonrpc: "2.0".to_string(),
            method: "topic.list".to_string(),
            params: Value::Null,
            id: None,
        };
        assert!(req.validate().is_ok());
        req.jsonrpc = "1.0".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_server_response_omits_absent_fields() {
        let ok = RpcServerResponse::success(None, Value::from("done"));
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("\"error\""));

        let err = RpcServerResponse::error(None, RpcError::method_not_found("nope"));
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("-32601"));
        assert!(!json.contains("\"result\""));
    }

    #[test]
    fn test_board_error_round_trip_kind() {
        let wire = RpcError::from_board_error(&BoardError::DuplicateTopic("General".into()));
        assert_eq!(wire.code, RpcError::VALIDATION_FAILED);
        assert!(matches!(wire.into_board_error(), BoardError::Validation(_)));
    }
}
