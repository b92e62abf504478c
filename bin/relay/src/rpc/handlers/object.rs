//! Object upload RPC handler.

use super::{board_error, parse_params, to_json};
use base64::Engine;
use serde_json::Value;
use topicboard::constants::MAX_IMAGE_SIZE;
use topicboard::remote::ObjectStore;
use topicboard::rpc::methods::{ObjectStoreParams, ObjectStoreResult};
use topicboard::rpc::RpcError;
use tracing::info;

pub async fn handle_store(objects: &dyn ObjectStore, params: Value) -> Result<Value, RpcError> {
    let params: ObjectStoreParams = parse_params(params)?;

    // Bound the encoded length before decoding.
    if params.data.len() > MAX_IMAGE_SIZE / 3 * 4 + 4 {
        return Err(RpcError::resource_exhausted("Object too large"));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&params.data)
        .map_err(|_| RpcError::invalid_params("Invalid base64 in data"))?;

    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(RpcError::resource_exhausted("Object too large"));
    }

    let size = bytes.len();
    let url = objects
        .store(bytes, &params.name)
        .await
        .map_err(board_error)?;
    info!("object.store: {} ({} bytes)", params.name, size);

    to_json(ObjectStoreResult { url })
}
