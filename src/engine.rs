//! Retry engine
//!
//! The [`RetryScheduler`] drives one invocation: dispatch every command,
//! evaluate the conditions still pending against the fresh results, and
//! either stop or sleep and try again until the retries run out.
//!
//! ```text
//!            ┌──────────── sleep(interval), remaining -= 1 ◄───────┐
//!            ▼                                                     │
//!   dispatch ──► evaluate pending ──► pending empty? ── yes ──► Succeeded
//!                                          │ no
//!                                          ▼
//!                                   remaining == 0? ── yes ──► Failed
//!                                          │ no
//!                                          └───────────────────────┘
//! ```
//!
//! Transport errors and bad condition references abort the loop at once;
//! only unmet conditions are retried.

use std::time::Duration;
use tracing::{debug, info, warn};
use crate::command::Command;
use crate::error::{ErrorKind, RunError};
use crate::executor::CommandExecutor;
use crate::state::{MatchPolicy, Phase, RetryState};

/// The wait between attempts.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &mut S {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Re-issues a command batch until the pending conditions are satisfied
/// or the retries are exhausted.
pub struct RetryScheduler<E, S = ThreadSleeper> {
    executor: E,
    sleeper: S,
}

impl<E: CommandExecutor> RetryScheduler<E> {
    pub fn new(executor: E) -> Self {
        Self::with_sleeper(executor, ThreadSleeper)
    }
}

impl<E: CommandExecutor, S: Sleeper> RetryScheduler<E, S> {
    pub fn with_sleeper(executor: E, sleeper: S) -> Self {
        Self { executor, sleeper }
    }

    /// Run the loop to completion.
    ///
    /// On success returns the results of the last attempt. When retries run
    /// out, fails with `ConditionsUnsatisfied` listing the pending conditions
    /// in declaration order.
    pub fn run(&mut self, commands: &[Command], state: &mut RetryState) -> Result<Vec<String>, RunError> {
        check_indices(commands, state)?;

        loop {
            state.attempts += 1;
            let results = self.dispatch(commands, state.attempts)?;

            evaluate_pending(state, &results)?;

            if state.pending.is_empty() {
                state.phase = Phase::Succeeded;
                info!(attempts = state.attempts, "all conditions satisfied");
                return Ok(results);
            }

            if state.remaining == 0 {
                state.phase = Phase::Failed;
                let failed = state.pending_raw();
                warn!(attempts = state.attempts, failed = ?failed, "retries exhausted");
                return Err(RunError::unsatisfied(failed));
            }

            debug!(
                pending = state.pending.len(),
                remaining = state.remaining,
                interval = ?state.interval,
                "conditions not met, waiting before retry"
            );
            self.sleeper.sleep(state.interval);
            state.remaining -= 1;
        }
    }

    fn dispatch(&mut self, commands: &[Command], attempt: u32) -> Result<Vec<String>, RunError> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        debug!(attempt, commands = commands.len(), "dispatching");
        let results = self.executor.dispatch(commands)?;
        if results.len() != commands.len() {
            return Err(RunError::transport(format!(
                "executor returned {} result(s) for {} command(s)",
                results.len(),
                commands.len()
            )));
        }
        Ok(results)
    }

    /// Give back the executor
    pub fn into_executor(self) -> E {
        self.executor
    }
}

/// Reject conditions that point past the last command before anything is sent.
fn check_indices(commands: &[Command], state: &RetryState) -> Result<(), RunError> {
    match state.pending.iter().find(|c| c.result_index() >= commands.len()) {
        Some(cond) => Err(RunError::new(
            ErrorKind::IndexOutOfRange,
            format!(
                "result[{}] is out of range: only {} command(s) will be run",
                cond.result_index(),
                commands.len()
            ),
        )
        .with_condition(cond.raw())),
        None => Ok(()),
    }
}

/// One evaluation pass in declaration order; `pending` only shrinks.
fn evaluate_pending(state: &mut RetryState, results: &[String]) -> Result<(), RunError> {
    let mut i = 0;
    while i < state.pending.len() {
        if state.pending[i].evaluate(results)? {
            debug!(condition = %state.pending[i].raw(), "condition satisfied");
            match state.policy {
                MatchPolicy::Any => {
                    state.pending.clear();
                    return Ok(());
                }
                MatchPolicy::All => {
                    state.pending.remove(i);
                    continue;
                }
            }
        }
        i += 1;
    }
    Ok(())
}
