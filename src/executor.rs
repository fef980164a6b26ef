//! Command executors
//!
//! The engine never talks to a device itself: it hands each batch of commands
//! to a [`CommandExecutor`] and gets back one raw output per command.
//! [`ProcessExecutor`] is the built-in transport, running a local program
//! (a shell, `ssh`, a vendor CLI wrapper) once per command.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command as ProcessCommand, Stdio};
use tracing::debug;
use crate::command::Command;
use crate::error::RunError;

/// Sends commands to a device and returns their raw output.
pub trait CommandExecutor {
    /// Run every command in order and return one output per command, in the
    /// same order. Any failure aborts the whole batch.
    fn dispatch(&mut self, commands: &[Command]) -> Result<Vec<String>, RunError>;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &mut E {
    fn dispatch(&mut self, commands: &[Command]) -> Result<Vec<String>, RunError> {
        (**self).dispatch(commands)
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for Box<E> {
    fn dispatch(&mut self, commands: &[Command]) -> Result<Vec<String>, RunError> {
        (**self).dispatch(commands)
    }
}

/// Runs each command through a local program.
///
/// The command text is passed as the last argument, so `sh -c` runs it
/// locally and `ssh admin@sw1` runs it on a remote host. When a command has
/// an answer, it is written to the program's stdin up front (followed by a
/// newline unless `newline` is false). Send-only commands have their output
/// discarded and yield an empty string.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    cwd: Option<PathBuf>,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            cwd: None,
        }
    }

    /// `sh -c <command>`
    pub fn shell() -> Self {
        Self::new("sh", vec!["-c".into()])
    }

    /// Build from a program line such as `ssh -T admin@sw1`.
    ///
    /// Words are split on whitespace; `'...'` and `"..."` keep their contents
    /// together, so `ssh -o "ProxyJump a b" sw1` yields three arguments.
    pub fn from_command_line(line: &str) -> Result<Self, RunError> {
        let mut words = split_words(line)?.into_iter();
        let program = words.next().ok_or_else(|| RunError::config("empty transport command"))?;
        Ok(Self::new(program, words.collect()))
    }

    /// Set an environment variable for every spawned process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run the program from this directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn run_one(&self, cmd: &Command) -> Result<String, RunError> {
        let resolved = look_path(&self.program)
            .map_err(|e| RunError::transport(e).with_command(&cmd.text))?;

        let mut proc = ProcessCommand::new(&resolved);
        proc.args(&self.args).arg(&cmd.text);
        for (k, v) in &self.env {
            proc.env(k, v);
        }
        if let Some(ref dir) = self.cwd {
            proc.current_dir(dir);
        }
        proc.stdin(if cmd.answer.is_some() { Stdio::piped() } else { Stdio::null() });
        proc.stdout(if cmd.send_only { Stdio::null() } else { Stdio::piped() });
        proc.stderr(Stdio::piped());

        debug!(program = %self.program, command = %cmd.text, "spawning");
        let mut child = proc.spawn().map_err(|e| {
            RunError::transport(format!("failed to execute '{}': {}", self.program, e))
                .with_command(&cmd.text)
        })?;

        if let (Some(answer), Some(mut stdin)) = (cmd.answer.as_ref(), child.stdin.take()) {
            let mut data = answer.clone();
            if cmd.newline {
                data.push('\n');
            }
            // A program that exits without reading its input is not an error.
            match stdin.write_all(data.as_bytes()) {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(RunError::transport(format!("failed to send answer: {}", e))
                        .with_command(&cmd.text));
                }
                _ => {}
            }
        }

        let output = child.wait_with_output().map_err(|e| {
            RunError::transport(e.to_string()).with_command(&cmd.text)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RunError::transport(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim_end()
            ))
            .with_command(&cmd.text));
        }

        if cmd.send_only {
            return Ok(String::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl CommandExecutor for ProcessExecutor {
    fn dispatch(&mut self, commands: &[Command]) -> Result<Vec<String>, RunError> {
        commands.iter().map(|cmd| self.run_one(cmd)).collect()
    }
}

/// Look up an executable by name on PATH.
/// Split a program line into words. Quotes group text (with no escapes
/// inside them) and may sit next to unquoted text in the same word.
fn split_words(line: &str) -> Result<Vec<String>, RunError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some(other) => current.push(other),
                        None => {
                            return Err(RunError::config(format!(
                                "unterminated quote in transport command: {}",
                                line
                            )))
                        }
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn look_path(command: &str) -> Result<PathBuf, String> {
    if command.contains(std::path::MAIN_SEPARATOR) || command.contains('/') {
        return Ok(PathBuf::from(command));
    }

    let path_env = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path_env) {
        if dir.as_os_str().is_empty() {
            continue;
        }

        #[cfg(windows)]
        {
            let pathext = std::env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
            for ext in pathext.split(';') {
                let path = dir.join(format!("{}{}", command, ext.to_lowercase()));
                if path.is_file() {
                    return Ok(path);
                }
            }
        }

        #[cfg(not(windows))]
        {
            use std::os::unix::fs::PermissionsExt;
            let path = dir.join(command);
            if let Ok(meta) = std::fs::metadata(&path) {
                if meta.is_file() && meta.permissions().mode() & 0o111 != 0 {
                    return Ok(path);
                }
            }
        }
    }

    Err(format!("executable not found: {}", command))
}
