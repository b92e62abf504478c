//! CAPTCHA widget collaborator.
//!
//! The board never verifies tokens with a server. It only asks the widget
//! whether it produced a non-empty response at submission time, which is
//! enough to choose the post's attribution.

use crate::error::{BoardError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Handle to a rendered widget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WidgetHandle {
    id: u64,
    container: String,
    site_key: String,
}

impl WidgetHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Element id the widget was rendered into.
    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn site_key(&self) -> &str {
        &self.site_key
    }
}

/// A challenge widget that yields a response token once solved.
pub trait CaptchaWidget: Send + Sync {
    /// Renders a challenge into `container`.
    fn render(&self, container: &str, site_key: &str) -> Result<WidgetHandle>;

    /// The widget's current token. `None` when unsolved or empty.
    fn response(&self, widget: &WidgetHandle) -> Option<String>;

    /// Returns the widget to its unsolved state.
    fn reset(&self, widget: &WidgetHandle);
}

/// Shared widget handle.
pub type SharedCaptcha = Arc<dyn CaptchaWidget>;

/// Widget whose token arrives with a submitted form.
///
/// The browser renders the challenge; the web client passes the token it
/// posts back through [`FormCaptcha::record_response`] before asking the
/// submission controller to continue. Resetting a widget forgets it.
#[derive(Debug, Clone, Default)]
pub struct FormCaptcha {
    next_id: Arc<AtomicU64>,
    responses: Arc<RwLock<HashMap<u64, Option<String>>>>,
}

impl FormCaptcha {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the token posted for `widget`. Unknown handles are rejected.
    pub fn record_response(&self, widget: &WidgetHandle, token: Option<&str>) -> Result<()> {
        let mut responses = self.responses.write().unwrap_or_else(|p| p.into_inner());
        match responses.get_mut(&widget.id) {
            Some(slot) => {
                *slot = token.map(str::trim).filter(|t| !t.is_empty()).map(String::from);
                Ok(())
            }
            None => Err(BoardError::captcha(format!(
                "Unknown widget {}",
                widget.id
            ))),
        }
    }

    /// Number of widgets currently rendered.
    pub fn active_widgets(&self) -> usize {
        self.responses.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl CaptchaWidget for FormCaptcha {
    fn render(&self, container: &str, site_key: &str) -> Result<WidgetHandle> {
        if site_key.is_empty() {
            return Err(BoardError::captcha("Missing site key"));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.responses
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id, None);
        debug!("Rendered CAPTCHA widget {} into #{}", id, container);
        Ok(WidgetHandle {
            id,
            container: container.to_string(),
            site_key: site_key.to_string(),
        })
    }

    fn response(&self, widget: &WidgetHandle) -> Option<String> {
        self.responses
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&widget.id)
            .cloned()
            .flatten()
    }

    fn reset(&self, widget: &WidgetHandle) {
        self.responses
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&widget.id);
    }
}
