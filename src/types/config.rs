use crate::error::HarnessError;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:9000";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_operator")]
    pub user: String,
    #[serde(default = "default_operator")]
    pub password: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            user: default_operator(),
            password: default_operator(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_operator() -> String {
    "admin".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    pub max_polls: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_polls: None,
            timeout_secs: None,
        }
    }
}

fn default_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_testdata")]
    pub testdata: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            testdata: default_testdata(),
        }
    }
}

fn default_testdata() -> String {
    "testdata".to_string()
}

/// Effective polling limits after defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_polls: Option<u32>,
    pub timeout: Option<Duration>,
}

impl HarnessConfig {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll.interval_ms),
            max_polls: self.poll.max_polls,
            timeout: self.poll.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        let url = self.server.url.trim();
        if url.is_empty() {
            return Err(HarnessError::ConfigParse(
                "server.url cannot be empty".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(HarnessError::ConfigParse(format!(
                "server.url must be an http(s) URL: {url}"
            )));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(HarnessError::ConfigParse(
                "server.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.poll.interval_ms == 0 {
            return Err(HarnessError::ConfigParse(
                "poll.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.poll.max_polls == Some(0) {
            return Err(HarnessError::ConfigParse(
                "poll.max_polls must be greater than 0".to_string(),
            ));
        }
        if self.poll.timeout_secs == Some(0) {
            return Err(HarnessError::ConfigParse(
                "poll.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.paths.testdata.trim().is_empty() {
            return Err(HarnessError::ConfigParse(
                "paths.testdata cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
