mod cli;
mod config;
mod error;
mod http;
mod logscan;
mod measures;
mod poller;
mod report;
mod scenario;
mod types;

use crate::error::HarnessError;
use crate::http::SonarClient;
use crate::logscan::IgnorePattern;
use crate::poller::{TaskOutcome, TaskPoller};
use crate::report::{LogReport, Palette};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const CHECK_FAILED: i32 = 1;
    pub const RUNTIME_FAILURE: i32 = 3;
}

const INDENT: &str = "    ";

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::INFO,
        (false, _) => LevelFilter::DEBUG,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_ignore(path: Option<&Path>) -> Result<Option<IgnorePattern>, HarnessError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)?;
    Ok(IgnorePattern::from_lines(&text)?)
}

fn resolve_home(home: Option<PathBuf>) -> Result<PathBuf, HarnessError> {
    home.or_else(logscan::reader::server_home).ok_or_else(|| {
        HarnessError::ConfigParse(format!(
            "server home unknown: pass --home or set {}",
            logscan::reader::SERVER_HOME_ENV
        ))
    })
}

fn output_format(format: &cli::ReportFormat) -> report::OutputFormat {
    match format {
        cli::ReportFormat::Text => report::OutputFormat::Text,
        cli::ReportFormat::Json => report::OutputFormat::Json,
    }
}

fn print_log_report(
    log_report: LogReport,
    format: &cli::ReportFormat,
    palette: &Palette,
) -> Result<i32, HarnessError> {
    println!("{}", report::render(&log_report, output_format(format), palette)?);
    if log_report.clean {
        Ok(exit_code::SUCCESS)
    } else {
        Ok(exit_code::CHECK_FAILED)
    }
}

fn parse_expectations(cmd: &cli::MeasuresCommand) -> Result<measures::ExpectedSet, HarnessError> {
    let mut expected = measures::ExpectedSet::new();
    if let Some(values) = &cmd.test_metrics {
        expected.extend(measures::expected_test_metrics(values)?);
    }
    let pairs = cmd
        .expect
        .iter()
        .map(|entry| {
            entry.split_once('=').ok_or_else(|| {
                HarnessError::ConfigParse(format!("expected METRIC=VALUE, found {entry}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    expected.extend(measures::expected_from_pairs(
        pairs.into_iter().map(|(metric, value)| (metric.trim(), value)),
    )?);

    if expected.is_empty() {
        return Err(HarnessError::ConfigParse(
            "no expected measures: pass --expect or --test-metrics".to_string(),
        ));
    }
    Ok(expected)
}

fn run(cli: cli::Cli, palette: &Palette) -> Result<i32, HarnessError> {
    match cli.command {
        cli::Commands::CheckLog(cmd) => {
            let ignore = load_ignore(cmd.ignore_file.as_deref())?;
            let result = logscan::analyse_log(&cmd.log, ignore.as_ref());
            print_log_report(LogReport::new(&cmd.log, result), &cmd.format, palette)
        }
        cli::Commands::ServerLog(cmd) => {
            let home = resolve_home(cmd.server.home)?;
            let ignore = load_ignore(cmd.ignore_file.as_deref())?;
            let log = logscan::reader::todays_server_log(&home);
            let result = logscan::analyse_log(&log, ignore.as_ref());
            print_log_report(LogReport::new(&log, result), &cmd.format, palette)
        }
        cli::Commands::Wait(cmd) => {
            if !cmd.log.exists() {
                return Err(HarnessError::PathNotFound(cmd.log.display().to_string()));
            }
            let loaded = config::load_config(&cmd.root)?;
            let client = SonarClient::new(&loaded.server, loaded.request_timeout())?;
            println!(
                "{INDENT}{}",
                palette.emphasize(&format!("Read Log : {}", cmd.log.display()))
            );

            let poll = TaskPoller::new(&client, loaded.poll_settings()).wait_for_analysis(&cmd.log)?;
            match poll.outcome {
                TaskOutcome::Skipped => {
                    println!("{INDENT}no background task found in log");
                    Ok(exit_code::SUCCESS)
                }
                TaskOutcome::Success => {
                    println!(
                        "{INDENT}background task {} after {} poll(s)",
                        palette.ok(),
                        poll.polls
                    );
                    if let Some(path) = poll.server_log {
                        println!("{INDENT}server log: {}", path.display());
                    }
                    Ok(exit_code::SUCCESS)
                }
                TaskOutcome::Failed(message) => Err(HarnessError::TaskFailed(message)),
            }
        }
        cli::Commands::Measures(cmd) => {
            let expected = parse_expectations(&cmd)?;
            let loaded = config::load_config(&cmd.root)?;
            let client = SonarClient::new(&loaded.server, loaded.request_timeout())?;
            measures::assert_measures(&client, &loaded.server.url, &cmd.project, &expected)?;
            println!("{INDENT}measures of {} ... {}", cmd.project, palette.ok());
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::Run(cmd) => {
            let loaded = config::load_config(&cmd.root)?;
            let parsed = scenario::Scenario::load(&cmd.scenario)?;
            let client = SonarClient::new(&loaded.server, loaded.request_timeout())?;
            let outcome = scenario::ScenarioRunner::new(&client, &loaded, &cmd.root)
                .with_server_home(cmd.server.home.or_else(logscan::reader::server_home))
                .run(&parsed)?;

            println!(
                "scenario {} (exit code {}, log {})",
                outcome.project,
                outcome.exit_code,
                outcome.log.display()
            );
            for check in &outcome.checks {
                match &check.failure {
                    None => println!("{INDENT}{} ... {}", check.name, palette.ok()),
                    Some(failure) => {
                        println!("{INDENT}{} ... {}", check.name, palette.failed());
                        for line in failure.lines() {
                            println!("{INDENT}{INDENT}{line}");
                        }
                    }
                }
            }

            if outcome.passed() {
                Ok(exit_code::SUCCESS)
            } else {
                Ok(exit_code::CHECK_FAILED)
            }
        }
        cli::Commands::CleanupLogs(cmd) => {
            let home = resolve_home(cmd.home)?;
            let removed = logscan::reader::cleanup_logs(&home)?;
            println!(
                "{INDENT}cleaning logs ... {} ({removed} removed)",
                palette.ok()
            );
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::DumpLogs(cmd) => {
            let home = resolve_home(cmd.home)?;
            println!("{INDENT}print logs ... ");
            println!("{}", logscan::reader::dump_logs(&home)?);
            Ok(exit_code::SUCCESS)
        }
    }
}

fn main() {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let palette = Palette::detect();

    match run(cli, &palette) {
        Ok(code) => {
            if code != 0 {
                std::process::exit(code);
            }
        }
        Err(e) if e.is_check_failure() => {
            eprintln!("{}: {}", palette.failed(), e);
            std::process::exit(exit_code::CHECK_FAILED);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(exit_code::RUNTIME_FAILURE);
        }
    }
}
