//! Job configuration
//!
//! A job names the commands to run, the conditions to wait for and the retry
//! settings. Jobs are read from TOML or JSON files; every field except
//! `commands` has a default.
//!
//! ```toml
//! commands = ["show system", "show interfaces"]
//! wait_for = ["result[0] contains MES", "result[1] contains Loopback0"]
//! match = "all"
//! retries = 9
//! interval = 1
//! ```

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Deserializer, Serialize};
use crate::command::{CommandSpec, DEFAULT_READ_ONLY_PREFIX};
use crate::error::RunError;
use crate::state::MatchPolicy;

/// One invocation's configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Commands to send; a single string is accepted for one command
    #[serde(deserialize_with = "one_or_many")]
    pub commands: Vec<CommandSpec>,

    /// Conditions on the command output
    #[serde(default, alias = "waitfor", deserialize_with = "opt_one_or_many")]
    pub wait_for: Vec<String>,

    #[serde(default, rename = "match")]
    pub match_policy: MatchPolicy,

    /// Attempts after the first one
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Seconds between attempts
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Only run read-only commands
    #[serde(default, alias = "dry_run")]
    pub check_mode: bool,

    /// Prefix identifying read-only commands
    #[serde(default = "default_read_only_prefix")]
    pub read_only_prefix: String,
}

fn default_retries() -> u32 {
    9
}

fn default_interval() -> u64 {
    1
}

fn default_read_only_prefix() -> String {
    DEFAULT_READ_ONLY_PREFIX.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(v: OneOrMany<T>) -> Self {
        match v {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    OneOrMany::deserialize(deserializer).map(Vec::from)
}

fn opt_one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<OneOrMany<T>>::deserialize(deserializer)?
        .map(Vec::from)
        .unwrap_or_default())
}

impl JobConfig {
    /// A job with the given commands and every other field at its default
    pub fn new<I, C>(commands: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CommandSpec>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            wait_for: Vec::new(),
            match_policy: MatchPolicy::default(),
            retries: default_retries(),
            interval: default_interval(),
            check_mode: false,
            read_only_prefix: default_read_only_prefix(),
        }
    }

    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, RunError> {
        toml::from_str(s).map_err(|e| RunError::config(format!("invalid job: {}", e)))
    }

    pub fn from_json_str(s: &str) -> Result<Self, RunError> {
        serde_json::from_str(s).map_err(|e| RunError::config(format!("invalid job: {}", e)))
    }

    /// Load a job file; the format follows the extension (`.toml` or `.json`).
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RunError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(RunError::config(format!(
                "unsupported job file {}: expected .toml or .json",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let job = JobConfig::from_toml_str(r#"commands = "show version""#).unwrap();
        assert_eq!(job.commands, vec![CommandSpec::Text("show version".into())]);
        assert!(job.wait_for.is_empty());
        assert_eq!(job.match_policy, MatchPolicy::All);
        assert_eq!(job.retries, 9);
        assert_eq!(job.interval, 1);
        assert!(!job.check_mode);
        assert_eq!(job.read_only_prefix, "show");
        assert_eq!(job, JobConfig::new(["show version"]));
    }

    #[test]
    fn test_full_toml() {
        let job = JobConfig::from_toml_str(r#"
            waitfor = "result[0] contains MES"
            match = "any"
            retries = 3
            interval = 5
            dry_run = true

            [[commands]]
            command = "write"
            prompt = "Overwrite file [startup-config].... (Y/N)[N] ?"
            answer = "y"
        "#).unwrap();
        assert_eq!(job.wait_for, vec!["result[0] contains MES"]);
        assert_eq!(job.match_policy, MatchPolicy::Any);
        assert_eq!(job.retries, 3);
        assert_eq!(job.interval_duration(), Duration::from_secs(5));
        assert!(job.check_mode);
        assert!(matches!(job.commands[0], CommandSpec::Descriptor(_)));
    }

    #[test]
    fn test_json_mixed_commands() {
        let job = JobConfig::from_json_str(r#"{
            "commands": ["show system", {"command": "show interfaces", "output": "text"}],
            "wait_for": null
        }"#).unwrap();
        assert_eq!(job.commands.len(), 2);
        assert!(job.wait_for.is_empty());
    }

    #[test]
    fn test_invalid_jobs() {
        assert!(JobConfig::from_toml_str(r#"wait_for = ["result[0] eq 1"]"#).is_err());
        assert!(JobConfig::from_toml_str(r#"commands = "show x"
match = "most""#).is_err());
        assert!(JobConfig::from_toml_str(r#"commands = "show x"
retries = -1"#).is_err());
        assert!(JobConfig::from_toml_str(r#"commands = "show x"
provider = "ssh""#).is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("job.toml");
        std::fs::write(&toml_path, "commands = [\"show clock\"]\nretries = 0\n").unwrap();
        assert_eq!(JobConfig::load(&toml_path).unwrap().retries, 0);

        let json_path = dir.path().join("job.json");
        let mut f = std::fs::File::create(&json_path).unwrap();
        writeln!(f, r#"{{"commands": "show clock", "interval": 2}}"#).unwrap();
        assert_eq!(JobConfig::load(&json_path).unwrap().interval, 2);

        let other = dir.path().join("job.yaml");
        std::fs::write(&other, "commands: show clock").unwrap();
        assert!(JobConfig::load(&other).is_err());
        assert!(JobConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
