use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("path does not exist: {0}")]
    PathNotFound(String),

    #[error("invalid log pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("{0}")]
    MeasuresUnavailable(String),

    #[error("{0}")]
    TaskFailed(String),

    #[error("background task still running after {polls} poll(s)")]
    PollTimeout { polls: u32 },

    #[error("measures differ:\n{0}")]
    MeasureMismatch(String),

    #[error("{0}")]
    BadLogLines(String),

    #[error("{0}")]
    AssertionFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Assertion-style failures map to the "check failed" exit code rather
    /// than a runtime failure.
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            Self::TaskFailed(_)
                | Self::MeasureMismatch(_)
                | Self::BadLogLines(_)
                | Self::AssertionFailed(_)
                | Self::MeasuresUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
