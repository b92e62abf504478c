//! CSRF protection for the board's forms.
//!
//! Tokens are per session and checked on every state-changing request.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tower_sessions::Session;
use tracing::{debug, error};
use uuid::Uuid;

/// CSRF tokens by session id.
#[derive(Clone, Debug, Default)]
pub struct CsrfStore {
    tokens: Arc<RwLock<HashMap<String, String>>>,
}

impl CsrfStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new CSRF token for the session
    pub fn generate_token(&self, session_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(session_id.to_string(), token.clone());
        token
    }

    /// Returns the token already issued to the session, if any.
    pub fn existing_token(&self, session_id: &str) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(session_id)
            .cloned()
    }

    /// Validate a CSRF token for the session
    pub fn validate_token(&self, session_id: &str, token: &str) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(session_id)
            .is_some_and(|stored| stored == token)
    }

    /// Forgets the token of an expired session.
    pub fn remove(&self, session_id: &str) {
        self.tokens
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(session_id);
    }
}

/// Returns the session id, creating and saving the session if needed.
pub async fn ensure_session_id(session: &Session) -> Result<String, StatusCode> {
    if let Some(id) = session.id() {
        return Ok(id.to_string());
    }

    debug!("Creating new session");
    session.insert("initialized", true).await.map_err(|e| {
        error!("Failed to initialize session: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    // Save the session so it gets an ID
    session.save().await.map_err(|e| {
        error!("Failed to save session: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match session.id() {
        Some(id) => {
            debug!("New session created: {}", id);
            Ok(id.to_string())
        }
        None => {
            error!("Failed to get session ID after initialization and save");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Get or create a CSRF token for the current session
pub async fn get_csrf_token(
    session: &Session,
    csrf_store: &CsrfStore,
) -> Result<String, StatusCode> {
    let session_id = ensure_session_id(session).await?;

    if let Some(existing_token) = csrf_store.existing_token(&session_id) {
        return Ok(existing_token);
    }

    debug!("Generating new CSRF token for session {}", session_id);
    Ok(csrf_store.generate_token(&session_id))
}

/// Validate a raw CSRF token (multipart forms)
pub fn validate_csrf_token(session: &Session, csrf_store: &CsrfStore, token: &str) -> bool {
    match session.id() {
        Some(id) => csrf_store.validate_token(&id.to_string(), token),
        None => false,
    }
}

/// Form data wrapper that includes CSRF token validation
#[derive(Debug, Deserialize, Serialize)]
pub struct CsrfProtectedForm<T> {
    pub csrf_token: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> CsrfProtectedForm<T> {
    /// Validate the CSRF token
    pub fn validate(&self, session: &Session, csrf_store: &CsrfStore) -> bool {
        validate_csrf_token(session, csrf_store, &self.csrf_token)
    }
}

/// Form carrying nothing but the CSRF token (delete buttons).
#[derive(Debug, Deserialize)]
pub struct CsrfOnlyForm {
    pub csrf_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_per_session() {
        let store = CsrfStore::new();
        let a = store.generate_token("session-a");
        let b = store.generate_token("session-b");
        assert_ne!(a, b);
        assert!(store.validate_token("session-a", &a));
        assert!(!store.validate_token("session-a", &b));
        assert!(!store.validate_token("session-c", &a));
    }

    #[test]
    fn test_remove_invalidates() {
        let store = CsrfStore::new();
        let token = store.generate_token("s");
        assert_eq!(store.existing_token("s"), Some(token.clone()));
        store.remove("s");
        assert!(!store.validate_token("s", &token));
    }
}
