//! Blocking HTTP access to the analysis server.
//!
//! Everything that talks to the server goes through [`HttpGet`] so the
//! poller and the measures check can run against scripted responses.

use crate::error::{HarnessError, Result};
use crate::types::config::ServerConfig;
use std::time::Duration;

pub trait HttpGet {
    /// Returns the response body. Non-2xx statuses are not errors; the
    /// server reports most failures in the JSON body.
    fn get(&self, url: &str) -> Result<String>;
}

pub struct SonarClient {
    client: reqwest::blocking::Client,
    user: String,
    password: String,
}

impl SonarClient {
    pub fn new(server: &ServerConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarnessError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            user: server.user.clone(),
            password: server.password.clone(),
        })
    }
}

impl HttpGet for SonarClient {
    fn get(&self, url: &str) -> Result<String> {
        tracing::debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .map_err(|e| HarnessError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url, %status, "non-success response");
        }
        response.text().map_err(|e| HarnessError::Http(e.to_string()))
    }
}
