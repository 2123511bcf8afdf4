//! Command execution
//!
//! This module runs resolved commands through the shell. Output of the
//! child is forwarded live; only announcements go through the [`Ui`].
//!
//! [`Ui`]: crate::ui::Ui

use crate::config::Command;
use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{Context, Interrupt};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// How often a running child is checked for exit or interruption
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Execute a command in the given context
///
/// The command is announced before it runs. A failure is announced as well
/// and returned. A command with nothing to execute is skipped silently.
pub fn execute_command(cmd: &Command, ctx: &Context) -> ExecutionResult<()> {
    if cmd.exec.is_empty() {
        return Ok(());
    }

    ctx.ui.print_command(&cmd.print);

    if ctx.dry_run {
        debug!(command = %cmd.exec, "dry run, not spawning");
        return Ok(());
    }

    let result = run_live(cmd, ctx);
    if let Err(e) = &result {
        ctx.ui.print_command_error(e);
    }
    result
}

fn run_live(cmd: &Command, ctx: &Context) -> ExecutionResult<()> {
    let mut command = shell_command(&cmd.exec, ctx);
    if !cmd.dir.is_empty() {
        command.current_dir(resolve_dir(&cmd.dir, &ctx.config_dir()));
    }

    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    debug!(command = %cmd.exec, dir = %cmd.dir, "spawning");
    let child = command.spawn()?;
    let status = wait_interruptible(child, &ctx.interrupt)?;
    check_status(status)
}

/// Check if a command succeeds (for when conditions)
///
/// Output is discarded. Runs even in dry-run mode.
pub fn check_command(cmd_str: &str, ctx: &Context) -> ExecutionResult<bool> {
    let mut command = shell_command(cmd_str, ctx);
    command
        .current_dir(ctx.config_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let child = command.spawn()?;
    let status = wait_interruptible(child, &ctx.interrupt)?;
    trace!(command = cmd_str, success = status.success(), "checked condition");
    Ok(status.success())
}

/// Run a command and return its trimmed standard output
///
/// Used for computed option defaults. Standard error is forwarded.
pub fn capture_command(cmd_str: &str, ctx: &Context) -> ExecutionResult<String> {
    let mut child = shell_command(cmd_str, ctx)
        .current_dir(ctx.config_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    // Drain stdout while waiting so a full pipe cannot block the child
    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        })
    });

    let status = wait_interruptible(child, &ctx.interrupt)?;
    let stdout = match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| ExecutionError::Io(io::Error::other("stdout reader panicked")))??,
        None => Vec::new(),
    };

    check_status(status)?;
    Ok(String::from_utf8_lossy(&stdout).trim().to_string())
}

fn shell_command(exec: &str, ctx: &Context) -> StdCommand {
    let mut command = StdCommand::new(ctx.shell());
    command.arg("-c").arg(exec);
    command
}

/// Absolute working directory for a command's `dir`, relative to `base`
pub fn resolve_dir(dir: &str, base: &Path) -> PathBuf {
    let path = Path::new(dir);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Wait for the child, killing it once an interrupt is seen
///
/// A terminal interrupt reaches the child too, so it may exit before the
/// flag is observed. A child that dies by signal gets one more poll interval
/// for the handler to run.
fn wait_interruptible(mut child: Child, interrupt: &Interrupt) -> ExecutionResult<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            if status.code().is_none() && !interrupt.is_triggered() {
                thread::sleep(POLL_INTERVAL);
            }
            if interrupt.is_triggered() {
                debug!(status = %status, "child exited during interrupt");
                return Err(ExecutionError::Interrupted);
            }
            return Ok(status);
        }

        if interrupt.is_triggered() {
            debug!(pid = child.id(), "interrupted, killing child");
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecutionError::Interrupted);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn check_status(status: ExitStatus) -> ExecutionResult<()> {
    if status.success() {
        return Ok(());
    }

    if let Some(code) = status.code() {
        return Err(ExecutionError::ExitStatus(code));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(ExecutionError::Signal(signal));
        }
    }

    Err(ExecutionError::Terminated)
}
