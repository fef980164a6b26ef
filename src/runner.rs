//! Job runner
//!
//! Runs a [`JobConfig`] end to end: normalize the commands, compile the
//! conditions, drive the retry loop and shape the outcome into a report
//! matching the `stdout` / `stdout_lines` / `failed_conditions` layout that
//! automation pipelines consume.

use std::fmt;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use crate::command::normalize;
use crate::config::JobConfig;
use crate::engine::{RetryScheduler, Sleeper, ThreadSleeper};
use crate::error::RunError;
use crate::executor::CommandExecutor;
use crate::output::to_lines;
use crate::parser::parse_conditions;
use crate::state::RetryState;

/// Successful outcome of a job
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Always false: running show commands changes nothing
    pub changed: bool,
    /// Raw output of each command on the last attempt
    pub stdout: Vec<String>,
    /// `stdout` split into lines
    pub stdout_lines: Vec<Vec<String>>,
    /// Commands dropped in check mode
    pub warnings: Vec<String>,
    /// Number of attempts made
    #[serde(skip)]
    pub attempts: u32,
}

/// Failed outcome of a job, with the warnings gathered before the failure
#[derive(Debug)]
pub struct Failure {
    pub error: RunError,
    pub warnings: Vec<String>,
}

impl Failure {
    fn new(error: RunError, warnings: Vec<String>) -> Self {
        Self { error, warnings }
    }

    /// JSON form: `failed`, `msg`, `failed_conditions` (when conditions
    /// were unmet) and `warnings`.
    pub fn to_json(&self) -> Value {
        let msg = if self.error.is_unsatisfied() {
            self.error.message.clone()
        } else {
            self.error.to_string()
        };
        let mut out = json!({
            "changed": false,
            "failed": true,
            "msg": msg,
            "warnings": self.warnings,
        });
        if self.error.is_unsatisfied() {
            out["failed_conditions"] = json!(self.error.failed_conditions);
        }
        out
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Runs jobs against one executor
pub struct Runner<E, S = ThreadSleeper> {
    executor: E,
    sleeper: S,
}

impl<E: CommandExecutor> Runner<E> {
    pub fn new(executor: E) -> Self {
        Self::with_sleeper(executor, ThreadSleeper)
    }
}

impl<E: CommandExecutor, S: Sleeper> Runner<E, S> {
    pub fn with_sleeper(executor: E, sleeper: S) -> Self {
        Self { executor, sleeper }
    }

    /// Run a job to completion.
    ///
    /// Malformed commands or conditions fail before anything is dispatched.
    pub fn run(&mut self, job: &JobConfig) -> Result<Report, Failure> {
        let normalized = normalize(&job.commands, job.check_mode, &job.read_only_prefix)
            .map_err(|e| Failure::new(e, Vec::new()))?;
        let warnings = normalized.warnings;

        let conditions = match parse_conditions(job.wait_for.as_slice()) {
            Ok(c) => c,
            Err(e) => return Err(Failure::new(e, warnings)),
        };

        debug!(
            commands = normalized.commands.len(),
            conditions = conditions.len(),
            retries = job.retries,
            policy = %job.match_policy,
            "starting job"
        );

        let mut state = RetryState::new(job.retries, job.interval_duration(), job.match_policy, conditions);
        let mut scheduler = RetryScheduler::with_sleeper(&mut self.executor, &mut self.sleeper);
        let results = match scheduler.run(&normalized.commands, &mut state) {
            Ok(r) => r,
            Err(e) => return Err(Failure::new(e, warnings)),
        };

        Ok(Report {
            changed: false,
            stdout_lines: to_lines(&results),
            stdout: results,
            warnings,
            attempts: state.attempts,
        })
    }

    /// Give back the executor
    pub fn into_executor(self) -> E {
        self.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::command::Command;
    use crate::error::ErrorKind;

    #[derive(Default)]
    struct Echo {
        batches: Vec<Vec<String>>,
    }

    impl CommandExecutor for Echo {
        fn dispatch(&mut self, commands: &[Command]) -> Result<Vec<String>, RunError> {
            self.batches.push(commands.iter().map(|c| c.text.clone()).collect());
            Ok(commands.iter().map(|c| format!("{}\noutput", c.text)).collect())
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&mut self, _duration: Duration) {}
    }

    #[test]
    fn test_report_shape() {
        let mut runner = Runner::with_sleeper(Echo::default(), NoSleep);
        let report = runner.run(&JobConfig::new(["show version"])).unwrap();
        assert_eq!(report.stdout, vec!["show version\noutput"]);
        assert_eq!(report.stdout_lines, vec![vec!["show version", "output"]]);
        assert_eq!(report.attempts, 1);

        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["changed"], json!(false));
        assert!(v.get("attempts").is_none());
    }

    #[test]
    fn test_check_mode_drops_and_warns() {
        let mut job = JobConfig::new(["write memory"]);
        job.check_mode = true;
        let mut runner = Runner::with_sleeper(Echo::default(), NoSleep);
        let report = runner.run(&job).unwrap();
        assert!(report.stdout.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(runner.into_executor().batches.is_empty());
    }

    #[test]
    fn test_bad_condition_fails_before_dispatch() {
        let mut job = JobConfig::new(["show version"]);
        job.wait_for = vec!["result[0] approximately 3".into()];
        let mut runner = Runner::with_sleeper(Echo::default(), NoSleep);
        let failure = runner.run(&job).unwrap_err();
        assert_eq!(failure.error.kind, ErrorKind::ConditionSyntax);
        assert!(runner.into_executor().batches.is_empty());
    }

    #[test]
    fn test_failure_json() {
        let mut job = JobConfig::new(["show interfaces"]);
        job.wait_for = vec!["result[0] contains Loopback0".into()];
        job.retries = 1;
        let mut runner = Runner::with_sleeper(Echo::default(), NoSleep);
        let failure = runner.run(&job).unwrap_err();
        let v = failure.to_json();
        assert_eq!(v["failed"], json!(true));
        assert_eq!(v["msg"], json!("One or more conditional statements have not been satisfied"));
        assert_eq!(v["failed_conditions"], json!(["result[0] contains Loopback0"]));
        assert_eq!(runner.into_executor().batches.len(), 2);
    }

    #[test]
    fn test_non_condition_failure_json_has_no_failed_conditions() {
        let failure = Failure::new(RunError::transport("connection refused"), vec!["w".into()]);
        let v = failure.to_json();
        assert_eq!(v["msg"], json!("connection refused"));
        assert!(v.get("failed_conditions").is_none());
        assert_eq!(v["warnings"], json!(["w"]));
    }
}
