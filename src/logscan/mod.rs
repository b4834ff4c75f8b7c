//! Classification of analysis and server log lines.
//!
//! Every pattern here is anchored at the start of the line, so a line
//! counts as an error only if the whole prefix up to ` ERROR ` sits on
//! that line. Lines suppressed by the ignore pattern never count.

pub mod reader;

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;

static ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.* ERROR .*").expect("error pattern is valid"));

static WARN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.* WARN .*").expect("warn pattern is valid"));

/// Server startup chatter that is logged at WARN level but is harmless.
static BENIGN_WARN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:.*H2 database should.*|.*Starting search|.*Starting web)")
        .expect("benign warning pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineClass {
    Error,
    Warning,
    WarningIgnored,
    Normal,
}

/// Caller-supplied alternatives, compiled into one prefix-anchored regex.
#[derive(Debug, Clone)]
pub struct IgnorePattern {
    regex: Regex,
}

impl IgnorePattern {
    /// Builds the pattern from text holding one alternative per line.
    /// Blank lines are dropped. Returns `Ok(None)` when nothing is left.
    pub fn from_lines(text: &str) -> Result<Option<Self>, regex::Error> {
        let alternatives = text
            .split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>();
        if alternatives.is_empty() {
            return Ok(None);
        }
        Self::new(&alternatives.join("|")).map(Some)
    }

    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})"))?;
        Ok(Self { regex })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub offending: Vec<String>,
    pub errors: usize,
    pub warnings: usize,
    /// Set when the log itself could not be read; rendered as one
    /// synthetic error line instead of failing the scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_failure: Option<String>,
}

impl ClassificationResult {
    pub fn is_clean(&self) -> bool {
        self.offending.is_empty() && self.read_failure.is_none()
    }

    /// Offending lines followed by the synthetic read failure, if any.
    pub fn report_lines(&self) -> Vec<&str> {
        self.offending
            .iter()
            .map(String::as_str)
            .chain(self.read_failure.as_deref())
            .collect()
    }
}

pub fn classify_line(line: &str, ignore: Option<&IgnorePattern>) -> LineClass {
    let ignored = ignore.is_some_and(|pattern| pattern.matches(line));
    if ERROR_RE.is_match(line) {
        if ignored {
            LineClass::Normal
        } else {
            LineClass::Error
        }
    } else if WARN_RE.is_match(line) {
        if ignored || BENIGN_WARN_RE.is_match(line) {
            LineClass::WarningIgnored
        } else {
            LineClass::Warning
        }
    } else {
        LineClass::Normal
    }
}

pub fn analyse_lines<I, S>(lines: I, ignore: Option<&IgnorePattern>) -> ClassificationResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = ClassificationResult::default();
    for line in lines {
        let line = line.as_ref();
        match classify_line(line, ignore) {
            LineClass::Error => {
                result.errors += 1;
                result.offending.push(line.to_string());
            }
            LineClass::Warning => {
                result.warnings += 1;
                result.offending.push(line.to_string());
            }
            LineClass::WarningIgnored | LineClass::Normal => {}
        }
    }
    result
}

/// Scans a log file. An unreadable file degrades into a result carrying
/// the I/O error text; it never fails.
pub fn analyse_log(path: &Path, ignore: Option<&IgnorePattern>) -> ClassificationResult {
    match reader::read_log_lines(path) {
        Ok(lines) => analyse_lines(&lines, ignore),
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "log could not be read");
            ClassificationResult {
                read_failure: Some(format!("{}: {}", path.display(), error)),
                ..ClassificationResult::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    const ERROR_LINE: &str = "12:00:01.123 ERROR - Unable to parse file foo.cpp";
    const WARN_LINE: &str = "12:00:01.456 WARN  - Cannot find include bar.h";
    const INFO_LINE: &str = "12:00:01.789 INFO  - Sensor CxxSquidSensor done";

    #[test]
    fn classify_line_detects_error_warning_and_normal() {
        assert_eq!(classify_line(ERROR_LINE, None), LineClass::Error);
        assert_eq!(
            classify_line("2016.01.01 12:00:00 WARN  web[o.s.s.a] Cannot", None),
            LineClass::Warning
        );
        assert_eq!(classify_line(INFO_LINE, None), LineClass::Normal);
        assert_eq!(classify_line("", None), LineClass::Normal);
    }

    #[test]
    fn classify_line_requires_spaces_around_level() {
        assert_eq!(classify_line("ERROR at start", None), LineClass::Normal);
        assert_eq!(classify_line("x ERRORS y", None), LineClass::Normal);
        assert_eq!(classify_line("x WARNING y", None), LineClass::Normal);
    }

    #[test]
    fn classify_line_suppresses_benign_startup_warnings() {
        for line in [
            "2016.01.01 12:00:00 WARN  es[o.e.node] H2 database should be used for evaluation only",
            "2016.01.01 12:00:00 WARN  app[o.s.p.m.Monitor] Starting search",
            "2016.01.01 12:00:00 WARN  app[o.s.p.m.Monitor] Starting web",
        ] {
            assert_eq!(classify_line(line, None), LineClass::WarningIgnored, "{line}");
        }
    }

    #[test]
    fn benign_warning_match_allows_trailing_text() {
        let line = "12:00 WARN  app Starting web server";
        assert_eq!(classify_line(line, None), LineClass::WarningIgnored);
    }

    #[test]
    fn ignore_pattern_suppresses_errors_and_warnings() {
        let ignore = IgnorePattern::from_lines(".*Unable to parse.*\n\n.*Cannot find include.*\n")
            .expect("pattern should compile")
            .expect("pattern should not be empty");

        assert_eq!(classify_line(ERROR_LINE, Some(&ignore)), LineClass::Normal);
        assert_eq!(
            classify_line(WARN_LINE, Some(&ignore)),
            LineClass::WarningIgnored
        );

        let result = analyse_lines([ERROR_LINE, WARN_LINE, INFO_LINE], Some(&ignore));
        assert!(result.is_clean());
    }

    #[test]
    fn ignore_pattern_is_prefix_anchored() {
        let ignore = IgnorePattern::new("Unable").expect("pattern should compile");
        assert_eq!(classify_line(ERROR_LINE, Some(&ignore)), LineClass::Error);

        let ignore = IgnorePattern::new("12:00:01").expect("pattern should compile");
        assert_eq!(classify_line(ERROR_LINE, Some(&ignore)), LineClass::Normal);
    }

    #[test]
    fn ignore_pattern_from_blank_text_is_none() {
        assert!(IgnorePattern::from_lines("\n\n")
            .expect("blank text should not fail")
            .is_none());
    }

    #[test]
    fn ignore_pattern_rejects_invalid_regex() {
        assert!(IgnorePattern::from_lines("(unclosed").is_err());
    }

    #[test]
    fn analyse_lines_keeps_original_order_and_counts() {
        let lines = [INFO_LINE, WARN_LINE, ERROR_LINE, INFO_LINE, WARN_LINE];
        let result = analyse_lines(lines, None);

        assert_eq!(result.offending, vec![WARN_LINE, ERROR_LINE, WARN_LINE]);
        assert_eq!(result.errors, 1);
        assert_eq!(result.warnings, 2);
        assert!(result.read_failure.is_none());
    }

    #[test]
    fn analyse_log_reads_file() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("_project_.log");
        fs::write(&path, format!("{INFO_LINE}\n{ERROR_LINE}\n")).expect("log should write");

        let result = analyse_log(&path, None);
        assert_eq!(result.errors, 1);
        assert_eq!(result.offending, vec![ERROR_LINE]);
    }

    #[test]
    fn analyse_log_degrades_to_synthetic_line_when_unreadable() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("missing.log");

        let result = analyse_log(&path, None);
        assert!(result.offending.is_empty());
        assert_eq!(result.errors, 0);
        assert_eq!(result.warnings, 0);
        assert!(!result.is_clean());

        let lines = result.report_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("missing.log"));
    }

    fn log_line() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(ERROR_LINE.to_string()),
            Just(WARN_LINE.to_string()),
            Just(INFO_LINE.to_string()),
            Just("12:00 WARN  app Starting web".to_string()),
            "[a-zA-Z0-9 .:-]{0,40}",
        ]
    }

    proptest! {
        #[test]
        fn counts_always_match_offending_lines(lines in prop::collection::vec(log_line(), 0..40)) {
            let result = analyse_lines(&lines, None);
            prop_assert_eq!(result.errors + result.warnings, result.offending.len());
        }

        #[test]
        fn classification_is_deterministic(lines in prop::collection::vec(log_line(), 0..40)) {
            let ignore = IgnorePattern::from_lines(".*Cannot find.*").unwrap();
            let first = analyse_lines(&lines, ignore.as_ref());
            let second = analyse_lines(&lines, ignore.as_ref());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn ignored_lines_never_count(lines in prop::collection::vec(log_line(), 0..40)) {
            let ignore = IgnorePattern::new(".*").unwrap();
            let result = analyse_lines(&lines, Some(&ignore));
            prop_assert!(result.offending.is_empty());
            prop_assert_eq!(result.errors + result.warnings, 0);
        }
    }
}
