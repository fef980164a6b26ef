//! Command specifications and normalization
//!
//! A job lists commands either as plain strings or as descriptors carrying
//! prompt/answer details. Normalization turns both into [`Command`] records,
//! validating descriptors against a strict schema, and drops mutating commands when
//! running in check mode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use crate::error::{ErrorKind, RunError};

/// Verb prefix that marks a command as read-only
pub const DEFAULT_READ_ONLY_PREFIX: &str = "show";

/// A canonical command sent to the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    /// The literal command line
    #[serde(rename = "command")]
    pub text: String,
    /// Text to send when `prompt` shows up in the output
    pub answer: Option<String>,
    /// Pattern in device output that needs an interactive answer
    pub prompt: Option<String>,
    /// Whether the answer is followed by a line terminator
    pub newline: bool,
    /// Send without waiting for a response
    #[serde(rename = "sendonly")]
    pub send_only: bool,
    /// With several prompts, whether all must be matched before proceeding
    pub check_all: bool,
    /// Output formatting hint for the executor
    #[serde(rename = "output")]
    pub output_hint: Option<String>,
}

impl Command {
    /// A command with only its text set
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            answer: None,
            prompt: None,
            newline: true,
            send_only: false,
            check_all: false,
            output_hint: None,
        }
    }

    /// Attach a prompt and the answer to give it
    pub fn with_prompt(mut self, prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self.answer = Some(answer.into());
        self
    }

    /// Whether the command starts with the given read-only verb
    pub fn is_read_only(&self, prefix: &str) -> bool {
        self.text.starts_with(prefix)
    }

    fn validate(&self) -> Result<(), RunError> {
        if self.text.trim().is_empty() {
            return Err(RunError::new(ErrorKind::InvalidCommand, "command text must not be empty"));
        }
        if !self.send_only && self.prompt.is_some() != self.answer.is_some() {
            return Err(RunError::new(
                ErrorKind::InvalidCommand,
                "prompt and answer must be given together",
            ).with_command(&self.text));
        }
        Ok(())
    }
}

/// A raw command entry as written by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// Plain command line
    Text(String),
    /// Structured descriptor, validated during normalization
    Descriptor(Map<String, Value>),
}

impl From<&str> for CommandSpec {
    fn from(s: &str) -> Self {
        CommandSpec::Text(s.to_string())
    }
}

impl From<String> for CommandSpec {
    fn from(s: String) -> Self {
        CommandSpec::Text(s)
    }
}

impl From<&Command> for CommandSpec {
    fn from(cmd: &Command) -> Self {
        let opt = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);
        let mut map = Map::new();
        map.insert("command".into(), Value::String(cmd.text.clone()));
        map.insert("prompt".into(), opt(&cmd.prompt));
        map.insert("answer".into(), opt(&cmd.answer));
        map.insert("newline".into(), Value::Bool(cmd.newline));
        map.insert("sendonly".into(), Value::Bool(cmd.send_only));
        map.insert("check_all".into(), Value::Bool(cmd.check_all));
        map.insert("output".into(), opt(&cmd.output_hint));
        CommandSpec::Descriptor(map)
    }
}

/// Result of normalization: the commands to dispatch plus check-mode warnings
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub commands: Vec<Command>,
    pub warnings: Vec<String>,
}

/// Turn raw command entries into canonical commands.
///
/// Order is preserved. With `check_mode` set, every command not starting with
/// `read_only_prefix` is dropped and one warning is collected for it.
pub fn normalize(
    specs: &[CommandSpec],
    check_mode: bool,
    read_only_prefix: &str,
) -> Result<Normalized, RunError> {
    let mut out = Normalized::default();

    for spec in specs {
        let cmd = match spec {
            CommandSpec::Text(text) => Command::new(text.as_str()),
            CommandSpec::Descriptor(map) => from_descriptor(map)?,
        };
        cmd.validate()?;

        if check_mode && !cmd.is_read_only(read_only_prefix) {
            debug!(command = %cmd.text, "dropping non read-only command in check mode");
            out.warnings.push(format!(
                "Only {} commands are supported when using check mode, not executing {}",
                read_only_prefix, cmd.text
            ));
            continue;
        }
        out.commands.push(cmd);
    }

    Ok(out)
}

/// Descriptor fields as written by the caller
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Descriptor {
    command: String,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default = "default_newline")]
    newline: bool,
    #[serde(default)]
    sendonly: bool,
    #[serde(default)]
    check_all: bool,
    #[serde(default)]
    output: Option<String>,
}

fn default_newline() -> bool {
    true
}

fn from_descriptor(map: &Map<String, Value>) -> Result<Command, RunError> {
    let d: Descriptor = serde_json::from_value(Value::Object(map.clone())).map_err(|e| {
        RunError::new(ErrorKind::InvalidCommand, format!("invalid command descriptor: {}", e))
    })?;

    Ok(Command {
        text: d.command,
        answer: d.answer,
        prompt: d.prompt,
        newline: d.newline,
        send_only: d.sendonly,
        check_all: d.check_all,
        output_hint: d.output,
    })
}
