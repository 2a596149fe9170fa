//! Helper binaries located via `PATH`

use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

/// Absolute path of `program`, `None` when it is not on `PATH`.
pub(crate) fn find_binary(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Run `program` to completion, killing it once `timeout` elapses.
pub(crate) fn run(program: &str, args: &[&str], timeout: Duration) -> io::Result<ExitStatus> {
    let path = find_binary(program).ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("{} not found in PATH", program))
    })?;

    let mut child = Command::new(path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    match child.wait_timeout(timeout)? {
        Some(status) => Ok(status),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{} did not finish within {:?}", program, timeout),
            ))
        }
    }
}

/// Like [`run`], but a non-zero exit is an error too.
pub(crate) fn run_checked(program: &str, args: &[&str], timeout: Duration) -> io::Result<()> {
    let status = run(program, args, timeout)?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "{} {} exited with {}",
            program,
            args.join(" "),
            status
        )))
    }
}

/// Async counterpart of [`run_checked`] for background tasks.
pub(crate) async fn run_checked_async(
    program: PathBuf,
    args: &[&str],
    timeout: Duration,
) -> io::Result<()> {
    let mut child = tokio::process::Command::new(&program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let status = tokio::time::timeout(timeout, child.wait())
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "helper timed out"))??;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "{} exited with {}",
            program.display(),
            status
        )))
    }
}
