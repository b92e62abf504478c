//! Web server binary for Topicboard - serves the board to browsers.
//!
//! Runs against a relay (`TOPICBOARD_RELAY_URL`) or, when none is set, an
//! embedded in-memory document store with uploads written under
//! `TOPICBOARD_DATA_DIR/objects`.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use topicboard::board::TopicStore;
use topicboard::config::BoardConfig;
use topicboard::constants::MAX_IMAGE_SIZE;
use topicboard::remote::{
    FileObjectStore, MemoryDocumentStore, RpcDocumentStore, RpcObjectStore, SharedDocumentStore,
    SharedObjectStore,
};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod csrf;
mod handlers;
mod session;
use csrf::CsrfStore;
use session::BoardSessions;

/// How often idle board clients are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Board clients idle this long are closed.
const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Multipart limit: one maximal image plus the text fields.
const MAX_UPLOAD_BODY: usize = MAX_IMAGE_SIZE + 64 * 1024;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub csrf_store: CsrfStore,
    pub boards: BoardSessions,
    pub config: Arc<BoardConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("csrf_store", &"CsrfStore { ... }")
            .field("boards", &self.boards)
            .field("config", &self.config)
            .finish()
    }
}

/// Background task that closes board clients of abandoned sessions.
async fn session_sweep_task(app_state: AppState) {
    let mut interval_timer = tokio::time::interval(SESSION_SWEEP_INTERVAL);

    loop {
        interval_timer.tick().await;

        for session_id in app_state.boards.sweep(SESSION_IDLE_TIMEOUT).await {
            app_state.csrf_store.remove(&session_id);
        }
    }
}

/// Picks the document and object stores for `config`.
async fn connect_stores(
    config: &BoardConfig,
) -> Result<(SharedDocumentStore, SharedObjectStore), Box<dyn std::error::Error>> {
    match &config.relay_url {
        Some(url) => {
            info!("Using relay server at: {}", url);
            let documents = RpcDocumentStore::with_poll_interval(url, config.poll_interval);
            if !documents.health_check().await {
                warn!("Relay at {} did not answer the health check", url);
            }
            Ok((Arc::new(documents), Arc::new(RpcObjectStore::new(url))))
        }
        None => {
            info!("No relay configured, using the embedded store");
            let objects = FileObjectStore::new(config.objects_dir(), config.public_url.as_str())?;
            info!("Uploads stored in: {:?}", objects.root());
            Ok((Arc::new(MemoryDocumentStore::new()), Arc::new(objects)))
        }
    }
}

/// Builds the router with sessions and security headers.
pub fn app(app_state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(app_state.config.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_name("topicboard-session")
        .with_http_only(true);

    let mut router = Router::new()
        .route("/", get(handlers::board_page))
        .route("/health", get(handlers::health))
        .route("/events", get(handlers::events))
        .route("/topics", post(handlers::add_topic))
        .route("/topics/select", post(handlers::select_topic))
        .route(
            "/posts",
            post(handlers::create_post).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        )
        .route("/posts/:post_id/delete", post(handlers::delete_post))
        .route("/posts/:post_id/comments", post(handlers::add_comment))
        .route(
            "/posts/:post_id/comments/:comment_id/delete",
            post(handlers::remove_comment),
        );

    // Uploads are served from here only in embedded mode; the relay serves
    // its own objects.
    if app_state.config.relay_url.is_none() {
        router = router.nest_service("/objects", ServeDir::new(app_state.config.objects_dir()));
    }

    router
        .layer(session_layer)
        // Security headers to prevent common attacks
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topicboard=info,topicboard_web=info,tower_http=debug".into()),
        )
        .init();

    let config = BoardConfig::from_env()?;
    let (documents, objects) = connect_stores(&config).await?;

    // Seed and migrate topics once per process; a failure leaves the board
    // usable with whatever topics exist.
    match TopicStore::new(documents.clone())
        .initialize_defaults(config.migrate_topics)
        .await
    {
        Ok((_, report)) => {
            if !report.is_noop() {
                info!(
                    "Topic migration renamed {} and added {} topic(s)",
                    report.renamed, report.added
                );
            }
        }
        Err(e) => error!("Failed to initialize topics: {}", e),
    }

    if config.secure_cookies {
        info!("Secure cookies enabled - cookies will only be sent over HTTPS");
    } else {
        warn!("Secure cookies disabled - set TOPICBOARD_SECURE_COOKIES=true for production");
    }

    let bind = config.bind;
    let app_state = AppState {
        csrf_store: CsrfStore::new(),
        boards: BoardSessions::new(documents, objects, config.captcha_site_key.clone()),
        config: Arc::new(config),
    };

    tokio::spawn(session_sweep_task(app_state.clone()));

    let listener = TcpListener::bind(bind).await?;
    info!("Topicboard Web Interface running on http://{}", bind);

    axum::serve(listener, app(app_state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = BoardConfig {
            data_dir: dir.path().to_path_buf(),
            ..BoardConfig::default()
        };
        let (documents, objects) = connect_stores(&config).await.unwrap();
        TopicStore::new(documents.clone())
            .initialize_defaults(true)
            .await
            .unwrap();
        let state = AppState {
            csrf_store: CsrfStore::new(),
            boards: BoardSessions::new(documents, objects, config.captcha_site_key.clone()),
            config: Arc::new(config),
        };
        (app(state), dir)
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn csrf_from(html: &str) -> String {
        let marker = "name=\"csrf_token\" value=\"";
        let start = html.find(marker).unwrap() + marker.len();
        let end = html[start..].find('"').unwrap();
        html[start..start + end].to_string()
    }

    fn cookie_from(response: &Response<Body>) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    fn form_post(uri: &str, cookie: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_board_page_renders_default_topics() {
        let (app, _dir) = test_app().await;
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::X_FRAME_OPTIONS).unwrap(),
            "DENY"
        );
        let html = body_text(response).await;
        assert!(html.contains("theme-general"));
        assert!(html.contains("AI Agents"));
        assert!(html.contains("No posts in this topic yet."));
    }

    #[tokio::test]
    async fn test_forms_require_csrf_token() {
        let (app, _dir) = test_app().await;
        let first = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = cookie_from(&first);

        let response = app
            .oneshot(form_post(
                "/topics",
                &cookie,
                "csrf_token=wrong&name=Music".to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_add_and_select_topic() {
        let (app, _dir) = test_app().await;
        let first = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = cookie_from(&first);
        let token = csrf_from(&body_text(first).await);

        let response = app
            .clone()
            .oneshot(form_post(
                "/topics",
                &cookie,
                format!("csrf_token={}&name=Music", token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app
            .clone()
            .oneshot(form_post(
                "/topics/select",
                &cookie,
                format!("csrf_token={}&name=Music", token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let page = app
            .clone()
            .oneshot(
                Request::get("/")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let html = body_text(page).await;
        assert!(html.contains("theme-music"));

        // Adding the same name again surfaces the duplicate alert.
        app.clone()
            .oneshot(form_post(
                "/topics",
                &cookie,
                format!("csrf_token={}&name=Music", token),
            ))
            .await
            .unwrap();
        let page = app
            .oneshot(
                Request::get("/")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(body_text(page).await.contains("This topic already exists!"));
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = test_app().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("topicboard-web"));
    }
}
