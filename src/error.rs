//! Run errors

use std::fmt;

/// Fixed message reported when retries run out with conditions still pending.
pub const UNSATISFIED_MESSAGE: &str = "One or more conditional statements have not been satisfied";

/// The kind of run error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A `wait_for` entry could not be parsed
    ConditionSyntax,
    /// A condition referenced a result that does not exist
    IndexOutOfRange,
    /// Retries were exhausted with conditions still pending
    ConditionsUnsatisfied,
    /// The executor failed to deliver a command or read its output
    Transport,
    /// A command descriptor is malformed
    InvalidCommand,
    /// Job configuration is invalid or unreadable
    Config,
    /// IO error
    Io,
}

/// A run error with optional condition/command context
#[derive(Debug)]
pub struct RunError {
    pub kind: ErrorKind,
    pub message: String,
    /// Raw text of the condition involved, if any
    pub condition: Option<String>,
    /// Text of the command involved, if any
    pub command: Option<String>,
    /// Raw text of every condition still pending (ConditionsUnsatisfied only)
    pub failed_conditions: Vec<String>,
}

impl RunError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            condition: None,
            command: None,
            failed_conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, raw: impl Into<String>) -> Self {
        self.condition = Some(raw.into());
        self
    }

    pub fn with_command(mut self, cmd: impl Into<String>) -> Self {
        self.command = Some(cmd.into());
        self
    }

    pub fn syntax(raw: &str, msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConditionSyntax, msg).with_condition(raw)
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, msg)
    }

    pub fn unsatisfied(failed_conditions: Vec<String>) -> Self {
        let mut err = Self::new(ErrorKind::ConditionsUnsatisfied, UNSATISFIED_MESSAGE);
        err.failed_conditions = failed_conditions;
        err
    }

    pub fn is_unsatisfied(&self) -> bool {
        self.kind == ErrorKind::ConditionsUnsatisfied
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref cond) = self.condition {
            write!(f, "{:?}: ", cond)?;
        } else if let Some(ref cmd) = self.command {
            write!(f, "{}: ", cmd)?;
        }
        write!(f, "{}", self.message)?;
        if !self.failed_conditions.is_empty() {
            write!(f, " (failed: {})", self.failed_conditions.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {}

impl From<std::io::Error> for RunError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_condition() {
        let err = RunError::syntax("result[x] eq 1", "missing result index");
        assert_eq!(err.to_string(), "\"result[x] eq 1\": missing result index");
    }

    #[test]
    fn test_display_unsatisfied() {
        let err = RunError::unsatisfied(vec!["result[1] contains Loopback0".into()]);
        assert!(err.is_unsatisfied());
        assert_eq!(
            err.to_string(),
            "One or more conditional statements have not been satisfied (failed: result[1] contains Loopback0)"
        );
    }
}
