//! emx-netcmd: run CLI commands against a device and wait for conditions
//!
//! Sends a batch of commands through a [`CommandExecutor`] and blocks until
//! a set of declared conditions over the output hold, re-issuing the batch
//! between waits until the retries run out.
//!
//! # Overview
//!
//! ```text
//! commands ──► normalize ──► dispatch ──► evaluate pending ──► report
//!                               ▲                │
//!                               └── sleep ◄──────┘  (retries left, conditions unmet)
//! ```
//!
//! # Conditions
//!
//! ```text
//! result[0] contains MES
//! result[1] not contains Loopback0
//! result[2] >= 3
//! result[0] matches ^Vlan \d+ is up$
//! result[3].interfaces[0].state eq 'up'
//! ```
//!
//! | Operator | Meaning |
//! |----------|---------|
//! | `eq` `==` | equal (numeric when both sides are numbers) |
//! | `neq` `ne` `!=` | not equal |
//! | `gt` `>` `ge` `>=` | greater / greater or equal |
//! | `lt` `<` `le` `<=` | less / less or equal |
//! | `contains` | substring |
//! | `not contains` | no substring |
//! | `matches` | regex match anywhere (multi-line) |
//!
//! Any operator may be preceded by `not`.
//!
//! # Match policy
//!
//! - `all` - every condition must hold; each may hold on a different attempt
//! - `any` - stop on the first attempt where one condition holds
//!
//! # Example
//!
//! ```rust,no_run
//! use emx_netcmd::{JobConfig, ProcessExecutor, Runner};
//!
//! let mut job = JobConfig::new(["show system"]);
//! job.wait_for = vec!["result[0] contains MES".into()];
//!
//! let mut runner = Runner::new(ProcessExecutor::from_command_line("ssh -T admin@sw1")?);
//! let report = runner.run(&job)?;
//! println!("{:?}", report.stdout_lines);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod command;
mod conditions;
mod config;
mod engine;
mod error;
mod executor;
mod output;
mod parser;
mod runner;
mod state;

pub use command::{normalize, Command, CommandSpec, Normalized, DEFAULT_READ_ONLY_PREFIX};
pub use conditions::{evaluate, ConditionExpr, Operand, Operator, PathSegment};
pub use config::JobConfig;
pub use engine::{RetryScheduler, Sleeper, ThreadSleeper};
pub use error::{ErrorKind, RunError, UNSATISFIED_MESSAGE};
pub use executor::{CommandExecutor, ProcessExecutor};
pub use output::to_lines;
pub use parser::{parse_condition, parse_conditions};
pub use runner::{Failure, Report, Runner};
pub use state::{MatchPolicy, Phase, RetryState};
