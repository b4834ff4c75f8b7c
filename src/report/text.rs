use super::{LogReport, Palette};

pub fn bad_lines_message(report: &LogReport, palette: &Palette) -> String {
    let mut output = String::new();
    output.push_str("Found following errors and/or warnings lines in the logfile:\n");
    for line in report.result.report_lines() {
        output.push_str(&format!("{}{}{}\n", palette.red, line, palette.reset));
    }
    output.push_str(&format!("For details see {}", report.log));
    output
}

pub fn to_text(report: &LogReport, palette: &Palette) -> String {
    if report.clean {
        return format!(
            "{} {}: no error/warning messages",
            palette.ok(),
            report.log
        );
    }

    format!(
        "{} {} ({} error(s), {} warning(s))\n{}",
        palette.failed(),
        report.log,
        report.result.errors,
        report.result.warnings,
        bad_lines_message(report, palette)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logscan::{analyse_lines, ClassificationResult};
    use std::path::Path;

    #[test]
    fn clean_report_is_one_line() {
        let report = LogReport::new(Path::new("_p_.log"), ClassificationResult::default());
        assert_eq!(
            to_text(&report, &Palette::plain()),
            "OK _p_.log: no error/warning messages"
        );
    }

    #[test]
    fn bad_lines_message_lists_lines_and_log() {
        let result = analyse_lines(["a ERROR b", "ok", "c WARN d"], None);
        let report = LogReport::new(Path::new("_p_.log"), result);

        let message = bad_lines_message(&report, &Palette::plain());
        assert_eq!(
            message,
            "Found following errors and/or warnings lines in the logfile:\n\
             a ERROR b\n\
             c WARN d\n\
             For details see _p_.log"
        );

        let rendered = to_text(&report, &Palette::plain());
        assert!(rendered.starts_with("FAILED _p_.log (1 error(s), 1 warning(s))"));
    }

    #[test]
    fn read_failure_is_listed_as_bad_line() {
        let result = ClassificationResult {
            read_failure: Some("_p_.log: No such file or directory".to_string()),
            ..ClassificationResult::default()
        };
        let report = LogReport::new(Path::new("_p_.log"), result);
        assert!(!report.clean);
        assert!(bad_lines_message(&report, &Palette::plain())
            .contains("No such file or directory"));
    }

    #[test]
    fn into_check_fails_for_dirty_log() {
        let result = analyse_lines(["a ERROR b"], None);
        let err = LogReport::new(Path::new("x.log"), result)
            .into_check()
            .expect_err("dirty log should fail");
        assert!(err.to_string().contains("For details see x.log"));
    }
}
