//! Topicboard Relay Server
//!
//! Hosts the document store and object storage behind a single JSON-RPC 2.0
//! endpoint so several `topicboard-web` instances can share one board.
//! Documents are saved to `documents.json` in the data directory after every
//! write and reloaded on start. Uploaded objects are written to its
//! `objects/` subdirectory and served under `/objects`.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (localhost:3001)
//! topicboard-relay
//!
//! # Run on custom address
//! topicboard-relay --bind 0.0.0.0:8080
//!
//! # Enable debug logging
//! RUST_LOG=debug topicboard-relay
//!
//! # Store data elsewhere and advertise a public URL for objects
//! TOPICBOARD_RELAY_DATA=/var/lib/topicboard \
//! TOPICBOARD_RELAY_PUBLIC_URL=https://relay.example.com topicboard-relay
//! ```

mod persistence;
mod rpc;

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use persistence::DocumentPersistence;
use rpc::AppState;
use std::path::PathBuf;
use tokio::net::TcpListener;
use topicboard::constants::MAX_IMAGE_SIZE;
use topicboard::remote::FileObjectStore;
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "127.0.0.1:3001";
const DEFAULT_DATA_DIR: &str = "topicboard_relay_data";

/// Object subdirectory inside the data directory.
const OBJECTS_DIR: &str = "objects";
const ENV_DATA_DIR: &str = "TOPICBOARD_RELAY_DATA";
const ENV_PUBLIC_URL: &str = "TOPICBOARD_RELAY_PUBLIC_URL";

/// Largest accepted request body: a maximal image after base64 plus envelope.
const MAX_BODY_SIZE: usize = MAX_IMAGE_SIZE / 3 * 4 + 64 * 1024;

/// Builds the relay router.
pub fn app(state: AppState) -> Router {
    let objects = ServeDir::new(state.objects.root().to_path_buf());
    Router::new()
        .route("/rpc", post(rpc::handle_rpc))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
        .nest_service("/objects", objects)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topicboard_relay=info,tower_http=debug".into()),
        )
        .init();

    // Parse command line args
    let bind_addr = std::env::args()
        .nth(1)
        .filter(|arg| arg == "--bind")
        .and_then(|_| std::env::args().nth(2))
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    let data_dir = PathBuf::from(
        std::env::var(ENV_DATA_DIR).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
    );
    let public_url =
        std::env::var(ENV_PUBLIC_URL).unwrap_or_else(|_| format!("http://{}", bind_addr));

    let persistence = DocumentPersistence::with_data_dir(&data_dir)?;
    let documents = persistence.load()?;
    let objects = FileObjectStore::new(data_dir.join(OBJECTS_DIR), public_url.as_str())?;
    let state = AppState::new(documents, objects).with_persistence(persistence);
    info!("Relay state initialized in {:?}", data_dir);

    let app = app(state);

    // Start server
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Topicboard Relay Server running on http://{}", bind_addr);
    info!("");
    info!("JSON-RPC Endpoint:");
    info!("  POST   /rpc                   - topic.*, post.*, comment.*, object.store");
    info!("                                  relay.health, relay.stats");
    info!("");
    info!("Object Endpoint:");
    info!("  GET    /objects/<name>        - Uploaded files (public URL {})", public_url);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use topicboard::remote::MemoryDocumentStore;
    use tower::ServiceExt;

    fn test_app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let objects = FileObjectStore::new(dir.path(), "http://relay.test").unwrap();
        (app(AppState::new(MemoryDocumentStore::new(), objects)), dir)
    }

    #[tokio::test]
    async fn test_rpc_route_answers_health() {
        let (app, _dir) = test_app();
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "relay.health",
            "params": {},
            "id": 7
        });
        let response = app
            .oneshot(
                Request::post("/rpc")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["result"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_objects_are_served() {
        let (app, dir) = test_app();
        std::fs::create_dir_all(dir.path().join("posts")).unwrap();
        std::fs::write(dir.path().join("posts/a.png"), b"img").unwrap();

        let response = app
            .oneshot(Request::get("/objects/posts/a.png").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"img");
    }
}
