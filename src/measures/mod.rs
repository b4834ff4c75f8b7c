//! Comparison of expected project measures against what the server reports.

use crate::error::{HarnessError, Result};
use crate::http::HttpGet;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Order of the values in a "test related metrics" list.
pub const TEST_METRICS_ORDER: [&str; 6] = [
    "tests",
    "test_failures",
    "test_errors",
    "skipped_tests",
    "test_success_density",
    "test_execution_time",
];

/// Literal used in scenarios to expect that a metric has no value.
pub const ABSENT_LITERAL: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expected {
    Value(f64),
    Absent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Measured {
    /// A numeric value together with the text the server reported.
    Value { value: f64, raw: String },
    /// Reported with an explicit `null` value.
    Null,
    /// Not reported at all.
    Missing,
    Unparsable(String),
}

impl Measured {
    fn matches(&self, expected: Expected) -> bool {
        match (expected, self) {
            (Expected::Value(want), Measured::Value { value, .. }) => want == *value,
            (Expected::Absent, Measured::Missing | Measured::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Measured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value { raw, .. } => f.write_str(raw),
            Self::Null | Self::Missing => f.write_str(ABSENT_LITERAL),
            Self::Unparsable(raw) => f.write_str(raw),
        }
    }
}

pub type ExpectedSet = BTreeMap<String, Expected>;
pub type MeasuredSet = BTreeMap<String, Measured>;

pub fn parse_expected_value(raw: &str) -> Result<Expected> {
    let raw = raw.trim();
    if raw == ABSENT_LITERAL {
        return Ok(Expected::Absent);
    }
    raw.parse::<f64>()
        .map(Expected::Value)
        .map_err(|_| HarnessError::ConfigParse(format!("invalid expected metric value: {raw}")))
}

pub fn expected_from_pairs<I, K, V>(pairs: I) -> Result<ExpectedSet>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|(key, value)| Ok::<_, HarnessError>((key.into(), parse_expected_value(value.as_ref())?)))
        .collect()
}

/// Parses `tests, failures, errors, skipped, density, time`. The execution
/// time varies between runs and is not compared.
pub fn expected_test_metrics(values: &str) -> Result<ExpectedSet> {
    let parsed = values.split(',').map(str::trim).collect::<Vec<_>>();
    if parsed.len() != TEST_METRICS_ORDER.len() {
        return Err(HarnessError::ConfigParse(format!(
            "expected {} test metric values, found {}",
            TEST_METRICS_ORDER.len(),
            parsed.len()
        )));
    }
    expected_from_pairs(
        TEST_METRICS_ORDER
            .iter()
            .copied()
            .zip(parsed)
            .take(TEST_METRICS_ORDER.len() - 1),
    )
}

pub fn expected_violations(count: f64) -> ExpectedSet {
    ExpectedSet::from([("violations".to_string(), Expected::Value(count))])
}

fn measured_value(value: &Value) -> Measured {
    match value {
        Value::Null => Measured::Null,
        Value::Number(number) => match number.as_f64() {
            Some(value) => Measured::Value {
                value,
                raw: number.to_string(),
            },
            None => Measured::Unparsable(number.to_string()),
        },
        Value::String(text) => match text.trim().parse::<f64>() {
            Ok(value) => Measured::Value {
                value,
                raw: text.trim().to_string(),
            },
            Err(_) => Measured::Unparsable(text.clone()),
        },
        other => Measured::Unparsable(other.to_string()),
    }
}

/// Reads `[0].msr[]` of a resources response. A resource without `msr`
/// has no measures.
pub fn parse_measures(body: &str) -> Result<MeasuredSet> {
    let json: Value = serde_json::from_str(body)?;
    let resource = json.get(0).ok_or_else(|| {
        HarnessError::MeasuresUnavailable(format!("no resource in measures response: {body}"))
    })?;

    let mut measured = MeasuredSet::new();
    if let Some(msr) = resource.get("msr").and_then(Value::as_array) {
        for measure in msr {
            let Some(key) = measure.get("key").and_then(Value::as_str) else {
                continue;
            };
            let value = measure.get("val").map_or(Measured::Null, measured_value);
            measured.insert(key.to_string(), value);
        }
    }
    Ok(measured)
}

pub fn measures_url(server_url: &str, project: &str, metrics: &[&str]) -> String {
    format!(
        "{}/api/resources?resource={}&metrics={}",
        server_url.trim_end_matches('/'),
        project,
        metrics.join(",")
    )
}

pub fn fetch_measures<H: HttpGet + ?Sized>(
    http: &H,
    server_url: &str,
    project: &str,
    metrics: &[&str],
) -> Result<MeasuredSet> {
    let url = measures_url(server_url, project, metrics);
    tracing::info!(url = %url, "querying measures");
    let body = http.get(&url).map_err(|error| match error {
        HarnessError::Http(details) => HarnessError::MeasuresUnavailable(format!(
            "cannot query the metrics, details: {details}"
        )),
        other => other,
    })?;
    parse_measures(&body)
}

/// One line per expected metric whose measured value differs, in metric
/// name order.
pub fn diff_measures(expected: &ExpectedSet, measured: &MeasuredSet) -> Vec<String> {
    expected
        .iter()
        .filter_map(|(metric, want)| {
            let got = measured.get(metric).unwrap_or(&Measured::Missing);
            (!got.matches(*want)).then(|| format!("\t{metric} is actually {got}"))
        })
        .collect()
}

pub fn assert_measures<H: HttpGet + ?Sized>(
    http: &H,
    server_url: &str,
    project: &str,
    expected: &ExpectedSet,
) -> Result<()> {
    let metrics = expected.keys().map(String::as_str).collect::<Vec<_>>();
    let measured = fetch_measures(http, server_url, project, &metrics)?;
    let diff = diff_measures(expected, &measured);
    if diff.is_empty() {
        Ok(())
    } else {
        Err(HarnessError::MeasureMismatch(diff.join("\n")))
    }
}
