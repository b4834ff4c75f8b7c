pub mod json;
pub mod palette;
pub mod text;

use crate::error::HarnessError;
use crate::logscan::ClassificationResult;
use serde::Serialize;
use std::path::Path;

pub use palette::Palette;

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

/// A log scan together with the file it came from.
#[derive(Debug, Clone, Serialize)]
pub struct LogReport {
    pub log: String,
    pub clean: bool,
    #[serde(flatten)]
    pub result: ClassificationResult,
}

impl LogReport {
    pub fn new(log: &Path, result: ClassificationResult) -> Self {
        Self {
            log: log.display().to_string(),
            clean: result.is_clean(),
            result,
        }
    }

    /// The failure raised when a log that should be clean is not.
    pub fn into_check(self) -> Result<(), HarnessError> {
        if self.clean {
            Ok(())
        } else {
            Err(HarnessError::BadLogLines(text::bad_lines_message(
                &self,
                &Palette::plain(),
            )))
        }
    }
}

pub fn render(
    report: &LogReport,
    format: OutputFormat,
    palette: &Palette,
) -> Result<String, HarnessError> {
    match format {
        OutputFormat::Json => json::to_json(report).map_err(HarnessError::Json),
        OutputFormat::Text => Ok(text::to_text(report, palette)),
    }
}
