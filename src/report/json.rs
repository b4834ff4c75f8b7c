use super::LogReport;

pub fn to_json(report: &LogReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
