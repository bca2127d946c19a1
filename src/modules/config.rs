use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Contents of `console.toml`. Every field has a default so an empty file
/// (or no file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub login_path: String,
    pub logout_path: String,
    /// `name=value` cookie sent with every request, e.g. the admin session.
    pub session_cookie: Option<String>,
    pub language: String,
    pub translations_file: Option<String>,
    pub schemas_file: Option<String>,
    pub history_limit: usize,
    pub http: HttpConfig,
    pub timings: Timings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Timings {
    pub poll_interval_ms: u64,
    pub notice_visible_ms: u64,
    pub notice_fade_ms: u64,
    pub search_debounce_ms: u64,
    pub rating_debounce_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            api_prefix: "/admin/api".to_string(),
            login_path: "/admin/login".to_string(),
            logout_path: "/admin/logout".to_string(),
            session_cookie: None,
            language: "en".to_string(),
            translations_file: None,
            schemas_file: None,
            history_limit: 50,
            http: HttpConfig::default(),
            timings: Timings::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            retry_delay_ms: 1000,
            timeout_secs: 30,
            user_agent: "crawler-console/0.1".to_string(),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            notice_visible_ms: 3000,
            notice_fade_ms: 300,
            search_debounce_ms: 300,
            rating_debounce_ms: 500,
        }
    }
}

impl ConsoleConfig {
    /// `{api_prefix}{path}` with exactly one slash between the two.
    pub fn api_path(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_prefix.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl HttpConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Timings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn notice_visible(&self) -> Duration {
        Duration::from_millis(self.notice_visible_ms)
    }

    pub fn notice_fade(&self) -> Duration {
        Duration::from_millis(self.notice_fade_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn rating_debounce(&self) -> Duration {
        Duration::from_millis(self.rating_debounce_ms)
    }
}
