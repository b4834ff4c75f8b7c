//! Scenario files: run one analysis command against a sample project and
//! check its outcome.

use crate::error::{HarnessError, Result};
use crate::http::HttpGet;
use crate::logscan::reader::{self, ServerLogTail};
use crate::logscan::{self, IgnorePattern};
use crate::measures::{self, ExpectedSet};
use crate::poller::{TaskOutcome, TaskPoller};
use crate::report::LogReport;
use crate::types::config::HarnessConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub project: String,
    pub command: String,
    #[serde(default)]
    pub expect: Expectations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitExpectation {
    Success,
    Breaks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Expectations {
    pub exit: Option<ExitExpectation>,
    #[serde(default)]
    pub background_task: bool,
    #[serde(default)]
    pub log_clean: bool,
    pub log_ignore: Option<String>,
    #[serde(default)]
    pub server_log_clean: bool,
    pub log_contains: Option<String>,
    pub violations: Option<f64>,
    pub metrics: Option<BTreeMap<String, toml::Value>>,
    pub test_metrics: Option<String>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| HarnessError::ConfigParse(format!("{}: {}", path.display(), e)))
    }
}

fn expected_metrics(table: &BTreeMap<String, toml::Value>) -> Result<ExpectedSet> {
    let pairs = table
        .iter()
        .map(|(metric, value)| {
            let raw = match value {
                toml::Value::String(text) => text.clone(),
                toml::Value::Integer(number) => number.to_string(),
                toml::Value::Float(number) => number.to_string(),
                other => {
                    return Err(HarnessError::ConfigParse(format!(
                        "metric {metric} must be a number or \"None\", found {other}"
                    )))
                }
            };
            Ok((metric.clone(), raw))
        })
        .collect::<Result<Vec<_>>>()?;
    measures::expected_from_pairs(pairs)
}

/// State shared by the steps of one scenario. Steps run one after the
/// other, so nothing here is synchronized.
#[derive(Debug)]
pub struct StepContext {
    pub project: String,
    pub project_dir: PathBuf,
    pub log: PathBuf,
    pub exit_code: Option<i32>,
    server_log: Option<ServerLogTail>,
}

impl StepContext {
    pub fn for_project(testdata: &Path, project: &str, log_dir: &Path) -> Result<Self> {
        let project_dir = testdata.join(project);
        if !project_dir.is_dir() {
            return Err(HarnessError::PathNotFound(project_dir.display().to_string()));
        }
        Ok(Self {
            project: project.to_string(),
            project_dir,
            log: log_dir.join(format!("_{project}_.log")),
            exit_code: None,
            server_log: None,
        })
    }

    /// Starts following today's server log. Any previous tail is closed
    /// first. A log that cannot be opened leaves the server log unchecked.
    pub fn follow_server_log(&mut self, server_home: Option<&Path>) {
        self.server_log = None;
        let Some(home) = server_home else {
            return;
        };
        let path = reader::todays_server_log(home);
        match ServerLogTail::open(&path) {
            Ok(tail) => self.server_log = Some(tail),
            Err(error) => {
                tracing::warn!(log = %path.display(), %error, "server log not followed");
            }
        }
    }

    /// Runs `command` through the shell in the project directory, sending
    /// stdout and stderr to the step's log file.
    pub fn run_command(&mut self, command: &str, server_home: Option<&Path>) -> Result<i32> {
        self.follow_server_log(server_home);

        let log = File::create(&self.log)?;
        let stderr = log.try_clone()?;
        tracing::info!(command, dir = %self.project_dir.display(), "running analysis");
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.project_dir)
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .status()?;

        let code = status.code().unwrap_or(-1);
        self.exit_code = Some(code);
        Ok(code)
    }

    pub fn check_exit(&self, expectation: ExitExpectation) -> Result<()> {
        let code = self.exit_code.unwrap_or(-1);
        match expectation {
            ExitExpectation::Success if code != 0 => Err(HarnessError::AssertionFailed(format!(
                "Exit code is {code}, but should be zero"
            ))),
            ExitExpectation::Breaks if code == 0 => Err(HarnessError::AssertionFailed(format!(
                "Exit code is {code}, but should be non zero"
            ))),
            _ => Ok(()),
        }
    }

    pub fn check_log(&self, ignore: Option<&IgnorePattern>) -> Result<()> {
        LogReport::new(&self.log, logscan::analyse_log(&self.log, ignore)).into_check()
    }

    /// Checks the server log lines written since the command started. Passes
    /// when no server log is being followed.
    pub fn check_server_log(&mut self) -> Result<()> {
        let Some(tail) = self.server_log.as_mut() else {
            return Ok(());
        };
        let lines = tail.read_new_lines()?;
        LogReport::new(tail.path(), logscan::analyse_lines(&lines, None)).into_check()
    }

    pub fn check_log_contains(&self, pattern: &str) -> Result<()> {
        if reader::contains_line_matching(&self.log, pattern)? {
            Ok(())
        } else {
            Err(HarnessError::AssertionFailed(format!(
                "no line of {} matches {pattern}",
                self.log.display()
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub project: String,
    pub log: PathBuf,
    pub exit_code: i32,
    pub checks: Vec<CheckResult>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.failure.is_none())
    }
}

pub struct ScenarioRunner<'a, H: HttpGet + ?Sized> {
    http: &'a H,
    config: &'a HarnessConfig,
    testdata: PathBuf,
    log_dir: PathBuf,
    server_home: Option<PathBuf>,
}

impl<'a, H: HttpGet + ?Sized> ScenarioRunner<'a, H> {
    pub fn new(http: &'a H, config: &'a HarnessConfig, root: &Path) -> Self {
        Self {
            http,
            config,
            testdata: root.join(&config.paths.testdata),
            log_dir: root.to_path_buf(),
            server_home: reader::server_home(),
        }
    }

    pub fn with_server_home(mut self, server_home: Option<PathBuf>) -> Self {
        self.server_home = server_home;
        self
    }

    pub fn run(&self, scenario: &Scenario) -> Result<ScenarioReport> {
        let mut ctx = StepContext::for_project(&self.testdata, &scenario.project, &self.log_dir)?;
        let ignore = scenario
            .expect
            .log_ignore
            .as_deref()
            .map(IgnorePattern::from_lines)
            .transpose()?
            .flatten();
        let exit_code = ctx.run_command(&scenario.command, self.server_home.as_deref())?;

        let expect = &scenario.expect;
        let mut checks = Vec::new();
        let mut record = |name: &'static str, outcome: Result<()>| {
            let failure = outcome.err().map(|error| error.to_string());
            tracing::info!(check = name, passed = failure.is_none(), "check finished");
            checks.push(CheckResult { name, failure });
        };

        if let Some(exit) = expect.exit {
            record("exit code", ctx.check_exit(exit));
        }
        if expect.background_task {
            record("background task", self.check_background_task(&ctx.log));
        }
        if expect.log_clean {
            record("analysis log", ctx.check_log(ignore.as_ref()));
        }
        if expect.server_log_clean {
            record("server log", ctx.check_server_log());
        }
        if let Some(pattern) = &expect.log_contains {
            record("log line", ctx.check_log_contains(pattern));
        }
        if let Some(count) = expect.violations {
            record(
                "violations",
                self.check_measures(&ctx.project, &measures::expected_violations(count)),
            );
        }
        if let Some(table) = &expect.metrics {
            record(
                "metrics",
                expected_metrics(table).and_then(|set| self.check_measures(&ctx.project, &set)),
            );
        }
        if let Some(values) = &expect.test_metrics {
            record(
                "test metrics",
                measures::expected_test_metrics(values)
                    .and_then(|set| self.check_measures(&ctx.project, &set)),
            );
        }

        Ok(ScenarioReport {
            project: ctx.project,
            log: ctx.log,
            exit_code,
            checks,
        })
    }

    fn check_background_task(&self, log: &Path) -> Result<()> {
        let report = TaskPoller::new(self.http, self.config.poll_settings()).wait_for_analysis(log)?;
        match report.outcome {
            TaskOutcome::Failed(message) => Err(HarnessError::TaskFailed(message)),
            TaskOutcome::Success | TaskOutcome::Skipped => Ok(()),
        }
    }

    fn check_measures(&self, project: &str, expected: &ExpectedSet) -> Result<()> {
        measures::assert_measures(self.http, &self.config.server.url, project, expected)
    }
}
