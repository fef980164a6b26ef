//! Retry loop state
//!
//! Holds the mutable state of one invocation: how many retries are left, the
//! wait between attempts, the match policy and the conditions not yet satisfied.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::conditions::ConditionExpr;

/// How the declared conditions combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Every condition must hold, possibly on different attempts
    #[default]
    All,
    /// One condition holding on an attempt is enough
    Any,
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(MatchPolicy::All),
            "any" => Ok(MatchPolicy::Any),
            other => Err(format!("invalid match policy {:?}: expected all or any", other)),
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchPolicy::All => "all",
            MatchPolicy::Any => "any",
        })
    }
}

/// Where the retry loop stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Succeeded,
    Failed,
}

/// Mutable state of the retry loop, owned by the engine
#[derive(Debug)]
pub struct RetryState {
    /// Retries left after the current attempt
    pub remaining: u32,
    /// Wait between attempts
    pub interval: Duration,
    pub policy: MatchPolicy,
    /// Conditions not yet satisfied, in declaration order
    pub pending: Vec<ConditionExpr>,
    pub phase: Phase,
    /// Attempts dispatched so far
    pub attempts: u32,
}

impl RetryState {
    pub fn new(retries: u32, interval: Duration, policy: MatchPolicy, conditions: Vec<ConditionExpr>) -> Self {
        Self {
            remaining: retries,
            interval,
            policy,
            pending: conditions,
            phase: Phase::Running,
            attempts: 0,
        }
    }

    /// Raw text of every pending condition, in declaration order
    pub fn pending_raw(&self) -> Vec<String> {
        self.pending.iter().map(|c| c.raw().to_string()).collect()
    }

    pub fn is_done(&self) -> bool {
        self.phase != Phase::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_condition;

    #[test]
    fn test_match_policy_from_str() {
        assert_eq!("all".parse::<MatchPolicy>().unwrap(), MatchPolicy::All);
        assert_eq!("any".parse::<MatchPolicy>().unwrap(), MatchPolicy::Any);
        assert!("some".parse::<MatchPolicy>().is_err());
        assert_eq!(MatchPolicy::default(), MatchPolicy::All);
    }

    #[test]
    fn test_new_state_is_running() {
        let conds = vec![
            parse_condition("result[0] contains a").unwrap(),
            parse_condition("result[1] contains b").unwrap(),
        ];
        let state = RetryState::new(3, Duration::from_secs(1), MatchPolicy::All, conds);
        assert_eq!(state.phase, Phase::Running);
        assert!(!state.is_done());
        assert_eq!(state.pending_raw(), vec!["result[0] contains a", "result[1] contains b"]);
    }
}
