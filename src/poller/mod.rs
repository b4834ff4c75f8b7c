//! Waits for the server-side background task that processes an uploaded
//! analysis report.

use crate::error::{HarnessError, Result};
use crate::http::HttpGet;
use crate::logscan::reader;
use crate::types::config::PollSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

const TASK_QUERY: &str = "task?id";
const LOGS_QUERY: &str = "logs?taskId";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Other(String),
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => Self::Pending,
            "IN_PROGRESS" => Self::InProgress,
            "SUCCESS" => Self::Success,
            "FAILED" => Self::Failed,
            _ => Self::Other(value),
        }
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Other(value) => value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    task: Option<TaskBody>,
}

#[derive(Debug, Deserialize)]
struct TaskBody {
    status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(String),
    /// The analysis log named no background task.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: TaskOutcome,
    pub polls: u32,
    pub server_log: Option<PathBuf>,
}

/// `<logpath>.server`, where the task's server-side log is kept.
pub fn server_log_copy_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.as_os_str().to_os_string();
    name.push(".server");
    PathBuf::from(name)
}

pub fn server_logs_url(task_url: &str) -> String {
    task_url.replace(TASK_QUERY, LOGS_QUERY)
}

fn parse_status(body: &str) -> Option<TaskStatus> {
    match serde_json::from_str::<TaskEnvelope>(body) {
        Ok(envelope) => envelope.task.map(|task| task.status),
        Err(error) => {
            tracing::debug!(%error, "task response is not a task document");
            None
        }
    }
}

pub struct TaskPoller<'a, H: HttpGet + ?Sized> {
    http: &'a H,
    settings: PollSettings,
}

impl<'a, H: HttpGet + ?Sized> TaskPoller<'a, H> {
    pub fn new(http: &'a H, settings: PollSettings) -> Self {
        Self { http, settings }
    }

    /// Reads the analysis log, finds the task URL and polls it. A log
    /// without a task URL, or one that cannot be read, is skipped.
    pub fn wait_for_analysis(&self, log_path: &Path) -> Result<PollReport> {
        tracing::info!(log = %log_path.display(), "reading analysis log");
        let url = match reader::read_log_lines(log_path) {
            Ok(lines) => reader::extract_task_url(&lines),
            Err(error) => {
                tracing::warn!(log = %log_path.display(), %error, "analysis log unreadable");
                String::new()
            }
        };
        tracing::info!(url = %url, "background task");

        if url.is_empty() {
            return Ok(PollReport {
                outcome: TaskOutcome::Skipped,
                polls: 0,
                server_log: None,
            });
        }
        self.poll(&url, log_path)
    }

    /// Polls `url` until the task reaches a terminal status, then stores the
    /// task's server log next to `log_path` whatever the outcome. A server
    /// log that cannot be stored leaves `server_log` empty.
    pub fn poll(&self, url: &str, log_path: &Path) -> Result<PollReport> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        let terminal = loop {
            if self.limit_reached(polls, started) {
                break None;
            }
            if polls > 0 {
                std::thread::sleep(self.settings.interval);
            }
            polls += 1;

            let body = self.http.get(url)?;
            if body.trim().is_empty() {
                tracing::info!(poll = polls, "current status: no response");
                continue;
            }
            let Some(status) = parse_status(&body) else {
                tracing::info!(poll = polls, "current status: ?");
                continue;
            };
            tracing::info!(poll = polls, status = status.as_str(), "current status");

            match status {
                TaskStatus::Success => break Some(TaskOutcome::Success),
                TaskStatus::Failed => {
                    break Some(TaskOutcome::Failed(format!(
                        "BACKGROUND TASK AS FAILED. CHECK SERVER : {}",
                        server_log_copy_path(log_path).display()
                    )))
                }
                TaskStatus::Pending | TaskStatus::InProgress | TaskStatus::Other(_) => {}
            }
        };

        let server_log = match self.store_server_log(url, log_path) {
            Ok(path) => Some(path),
            Err(error) => {
                tracing::warn!(%error, "cannot store background task log");
                None
            }
        };
        match terminal {
            Some(outcome) => Ok(PollReport {
                outcome,
                polls,
                server_log,
            }),
            None => Err(HarnessError::PollTimeout { polls }),
        }
    }

    fn limit_reached(&self, polls: u32, started: Instant) -> bool {
        if self.settings.max_polls.is_some_and(|max| polls >= max) {
            return true;
        }
        polls > 0
            && self
                .settings
                .timeout
                .is_some_and(|timeout| started.elapsed() + self.settings.interval > timeout)
    }

    fn store_server_log(&self, url: &str, log_path: &Path) -> Result<PathBuf> {
        let body = self.http.get(&server_logs_url(url))?;
        let path = server_log_copy_path(log_path);
        std::fs::write(&path, body)?;
        Ok(path)
    }
}
