// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Subprocess execution behind a patchable function target.

use std::io;
use std::process::Command;
use std::sync::LazyLock;

use decoy_core::{func, Func, Target};
use thiserror::Error;
use tracing::debug;

/// Error type for command execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The program could not be found.
    #[error("command `{0}` not found")]
    NotFound(String),
    /// The program ran and failed, or could not be started.
    #[error("command `{cmd}` failed: {message}")]
    Failed {
        /// Program name.
        cmd: String,
        /// Exit status or spawn error, plus captured output.
        message: String,
    },
}

/// Arguments of the exec target: program and its arguments.
pub type ExecArgs = (String, Vec<String>);

/// Function value stored in [`EXEC`].
pub type ExecFn = Func<ExecArgs, Result<String, ExecError>>;

/// Patchable command runner; defaults to spawning the real process.
pub static EXEC: LazyLock<Target<ExecFn>> =
    LazyLock::new(|| Target::function("exec::run", func(|(cmd, args): ExecArgs| spawn(&cmd, &args))));

fn spawn(cmd: &str, args: &[String]) -> Result<String, ExecError> {
    let output = Command::new(cmd).args(args).output().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ExecError::NotFound(cmd.to_owned()),
        _ => ExecError::Failed {
            cmd: cmd.to_owned(),
            message: e.to_string(),
        },
    })?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if output.status.success() {
        Ok(combined)
    } else {
        Err(ExecError::Failed {
            cmd: cmd.to_owned(),
            message: format!("{}: {combined}", output.status),
        })
    }
}

/// Runs `cmd` with `args` through [`EXEC`] and returns its combined output.
pub fn run(cmd: &str, args: &[&str]) -> Result<String, ExecError> {
    debug!(cmd, ?args, patched = EXEC.is_patched(), "exec");
    EXEC.call((cmd.to_owned(), args.iter().map(|a| (*a).to_owned()).collect()))
}
