use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::types::{Result, ScoutError};

/// Captured result of a tool run. A non-zero exit code is data, not an
/// error; callers decide whether to skip, log, or surface it.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout split into trimmed, non-empty lines. The lexicon tool's
    /// output format.
    pub fn lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Runs external analysis executables and waits for completion.
///
/// Only a failure to launch the program, or exceeding the configured
/// timeout, is an error. The timeout exists so a hung tool cannot stall a
/// refresh indefinitely; timing out kills the child.
#[derive(Debug, Clone, Default)]
pub struct ToolInvoker {
    timeout: Option<Duration>,
}

impl ToolInvoker {
    pub fn new() -> Self {
        Self { timeout: None }
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub async fn invoke<S>(&self, program: impl AsRef<OsStr>, args: impl IntoIterator<Item = S>) -> Result<ToolOutput>
    where
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let name = program.to_string_lossy().into_owned();

        let result = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, result)
                .await
                .map_err(|_| ScoutError::Timeout {
                    program: name.clone(),
                    seconds: limit.as_secs(),
                })?,
            None => result.await,
        }
        .map_err(|source| ScoutError::Launch {
            program: name.clone(),
            source,
        })?;

        let code = output.status.code().unwrap_or(-1);
        debug!(program = %name, code, "tool finished");

        Ok(ToolOutput {
            code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
