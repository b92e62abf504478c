//! Per-browser-session board clients.
//!
//! Every browser session gets its own [`BoardClient`] with its own topic
//! and post subscriptions, keyed by the session id. The device id used for
//! ownership checks lives in the session itself.

use axum::http::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use topicboard::board::{BoardClient, ImageUpload, SubmissionController};
use topicboard::captcha::{FormCaptcha, SharedCaptcha};
use topicboard::identity::{generate_device_id, StaticDeviceIdentity};
use topicboard::remote::{SharedDocumentStore, SharedObjectStore};
use topicboard::Result;
use tower_sessions::Session;
use tracing::{debug, error, info};

const DEVICE_ID_KEY: &str = "device_id";
const ALERT_KEY: &str = "alert";

/// A board client plus the post form contents kept between the two presses
/// of the submit control.
pub struct BoardSession {
    pub client: BoardClient,
    pub draft: String,
    pub pending_image: Option<ImageUpload>,
}

impl BoardSession {
    /// Forgets the kept form contents.
    pub fn clear_draft(&mut self) {
        self.draft.clear();
        self.pending_image = None;
    }
}

pub type SharedBoardSession = Arc<Mutex<BoardSession>>;

struct Entry {
    board: SharedBoardSession,
    last_seen: Instant,
}

/// Board clients by session id.
#[derive(Clone)]
pub struct BoardSessions {
    documents: SharedDocumentStore,
    objects: SharedObjectStore,
    captcha: Arc<FormCaptcha>,
    site_key: String,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl BoardSessions {
    pub fn new(
        documents: SharedDocumentStore,
        objects: SharedObjectStore,
        site_key: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            objects,
            captcha: Arc::new(FormCaptcha::new()),
            site_key: site_key.into(),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The widget registry shared by all sessions' submission flows.
    pub fn captcha(&self) -> &FormCaptcha {
        &self.captcha
    }

    /// Returns the session's board, starting a new client on first use.
    pub async fn open(&self, session_id: &str, device_id: &str) -> Result<SharedBoardSession> {
        {
            let mut entries = self.entries.lock().await;
            if let Some(entry) = entries.get_mut(session_id) {
                entry.last_seen = Instant::now();
                return Ok(entry.board.clone());
            }
        }

        let submissions = SubmissionController::new(
            self.objects.clone(),
            self.captcha.clone() as SharedCaptcha,
            self.site_key.clone(),
        );
        let mut client = BoardClient::new(
            self.documents.clone(),
            submissions,
            &StaticDeviceIdentity::new(device_id),
        )?;
        client.start().await?;
        debug!("Started board client for session {}", session_id);

        let mut entries = self.entries.lock().await;
        let entry = entries.entry(session_id.to_string()).or_insert_with(|| Entry {
            board: Arc::new(Mutex::new(BoardSession {
                client,
                draft: String::new(),
                pending_image: None,
            })),
            last_seen: Instant::now(),
        });
        Ok(entry.board.clone())
    }

    /// Closes clients idle for longer than `idle` and returns their session ids.
    ///
    /// A client still streaming events to a browser, or busy with a request,
    /// counts as seen now.
    pub async fn sweep(&self, idle: Duration) -> Vec<String> {
        let expired: Vec<(String, SharedBoardSession)> = {
            let mut entries = self.entries.lock().await;
            let mut ids = Vec::new();
            for (id, entry) in entries.iter_mut() {
                if entry.last_seen.elapsed() < idle {
                    continue;
                }
                let in_use = entry
                    .board
                    .try_lock()
                    .map_or(true, |board| board.client.has_observers());
                if in_use {
                    entry.last_seen = Instant::now();
                } else {
                    ids.push(id.clone());
                }
            }
            ids.into_iter()
                .filter_map(|id| entries.remove(&id).map(|entry| (id, entry.board)))
                .collect()
        };

        for (_, board) in &expired {
            board.lock().await.client.close();
        }
        if !expired.is_empty() {
            info!("Closed {} idle board session(s)", expired.len());
        }
        expired.into_iter().map(|(id, _)| id).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl std::fmt::Debug for BoardSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardSessions")
            .field("site_key", &self.site_key)
            .field("captcha", &self.captcha)
            .finish()
    }
}

/// Returns the device id stored in the session, creating one if needed.
pub async fn session_device_id(session: &Session) -> std::result::Result<String, StatusCode> {
    let existing = session.get::<String>(DEVICE_ID_KEY).await.map_err(|e| {
        error!("Failed to read device id: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = generate_device_id();
    session.insert(DEVICE_ID_KEY, &id).await.map_err(|e| {
        error!("Failed to store device id: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(id)
}

/// Queues an alert for the next page render.
pub async fn set_alert(session: &Session, message: impl Into<String>) {
    if let Err(e) = session.insert(ALERT_KEY, message.into()).await {
        error!("Failed to store alert: {:?}", e);
    }
}

/// Takes the queued alert, if any.
pub async fn take_alert(session: &Session) -> Option<String> {
    session.remove::<String>(ALERT_KEY).await.unwrap_or_else(|e| {
        error!("Failed to read alert: {:?}", e);
        None
    })
}
