//! Web client configuration, read from `TOPICBOARD_*` environment variables.

use crate::error::{BoardError, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_BIND: &str = "TOPICBOARD_BIND";
pub const ENV_RELAY_URL: &str = "TOPICBOARD_RELAY_URL";
pub const ENV_DATA_DIR: &str = "TOPICBOARD_DATA_DIR";
pub const ENV_PUBLIC_URL: &str = "TOPICBOARD_PUBLIC_URL";
pub const ENV_CAPTCHA_SITE_KEY: &str = "TOPICBOARD_CAPTCHA_SITE_KEY";
pub const ENV_POLL_INTERVAL_MS: &str = "TOPICBOARD_POLL_INTERVAL_MS";
pub const ENV_MIGRATE_TOPICS: &str = "TOPICBOARD_MIGRATE_TOPICS";
pub const ENV_SECURE_COOKIES: &str = "TOPICBOARD_SECURE_COOKIES";

const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_DATA_DIR: &str = "topicboard_data";
const DEFAULT_PUBLIC_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_CAPTCHA_SITE_KEY: &str = "topicboard-demo-site-key";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Settings for `topicboard-web`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub bind: SocketAddr,
    /// Relay base URL. `None` runs against an embedded in-memory store.
    pub relay_url: Option<String>,
    /// Uploaded objects live under `<data_dir>/objects` in embedded mode.
    pub data_dir: PathBuf,
    /// Base of object URLs in embedded mode.
    pub public_url: String,
    pub captcha_site_key: String,
    pub poll_interval: Duration,
    pub migrate_topics: bool,
    pub secure_cookies: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            relay_url: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            captcha_site_key: DEFAULT_CAPTCHA_SITE_KEY.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            migrate_topics: true,
            secure_cookies: false,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

impl BoardConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_text = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_text.parse().map_err(|e| {
            BoardError::config(format!("{} '{}' is not an address: {}", ENV_BIND, bind_text, e))
        })?;

        let poll_interval = match lookup(ENV_POLL_INTERVAL_MS) {
            Some(ms) => {
                let ms: u64 = ms.parse().map_err(|_| {
                    BoardError::config(format!("{} must be milliseconds", ENV_POLL_INTERVAL_MS))
                })?;
                if ms == 0 {
                    return Err(BoardError::config(format!(
                        "{} must be positive",
                        ENV_POLL_INTERVAL_MS
                    )));
                }
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        };

        Ok(Self {
            bind,
            relay_url: lookup(ENV_RELAY_URL).filter(|u| !u.trim().is_empty()),
            data_dir: lookup(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            public_url: lookup(ENV_PUBLIC_URL).unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string()),
            captcha_site_key: lookup(ENV_CAPTCHA_SITE_KEY)
                .unwrap_or_else(|| DEFAULT_CAPTCHA_SITE_KEY.to_string()),
            poll_interval,
            migrate_topics: lookup(ENV_MIGRATE_TOPICS).map_or(true, |v| parse_flag(&v)),
            secure_cookies: lookup(ENV_SECURE_COOKIES).map_or(false, |v| parse_flag(&v)),
        })
    }

    /// Directory for uploaded objects in embedded mode.
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<BoardConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BoardConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]).unwrap(), BoardConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            (ENV_BIND, "0.0.0.0:8080"),
            (ENV_RELAY_URL, "http://relay:3001"),
            (ENV_POLL_INTERVAL_MS, "250"),
            (ENV_MIGRATE_TOPICS, "false"),
            (ENV_SECURE_COOKIES, "1"),
        ])
        .unwrap();
        assert_eq!(cfg.bind.port(), 8080);
        assert_eq!(cfg.relay_url.as_deref(), Some("http://relay:3001"));
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert!(!cfg.migrate_topics);
        assert!(cfg.secure_cookies);
        assert_eq!(cfg.objects_dir(), PathBuf::from("topicboard_data/objects"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            config(&[(ENV_BIND, "nowhere")]),
            Err(BoardError::Config(_))
        ));
        assert!(config(&[(ENV_POLL_INTERVAL_MS, "0")]).is_err());
        assert!(config(&[(ENV_POLL_INTERVAL_MS, "soon")]).is_err());
    }

    #[test]
    fn test_blank_relay_url_means_embedded() {
        assert_eq!(config(&[(ENV_RELAY_URL, "  ")]).unwrap().relay_url, None);
    }
}
