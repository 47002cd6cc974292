//! Child-process harness with deadlined pipes.
//!
//! Every read and write on the child's standard streams, and the final
//! reap, is bounded by one absolute wall-clock deadline fixed at spawn
//! time. A stuck child therefore surfaces as a distinguished deadline
//! error instead of hanging the run.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

/// Grace period between abandoning a child and force-killing it.
pub const KILL_GRACE: Duration = Duration::from_millis(50);

/// Errors surfaced by harness I/O.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The per-test wall-clock deadline expired during the operation.
    #[error("time limit exceeded")]
    DeadlineExceeded,
    /// Any other I/O failure on a child pipe or the final reap.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// A running program under test and its three pipes.
#[derive(Debug)]
pub struct Put {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    stderr: ChildStderr,
    deadline: Instant,
}

/// Run `op` against the absolute deadline.
async fn deadlined<F, T>(deadline: Instant, op: F) -> HarnessResult<T>
where
    F: std::future::Future<Output = io::Result<T>>,
{
    match time::timeout_at(deadline, op).await {
        Ok(result) => result.map_err(HarnessError::from),
        Err(_) => Err(HarnessError::DeadlineExceeded),
    }
}

impl Put {
    /// Spawn `argv` with `test_path` appended as one extra argument.
    ///
    /// All three standard streams are piped; `deadline` bounds every
    /// subsequent operation on them.
    pub fn spawn(argv: &[String], test_path: &Path, deadline: Instant) -> io::Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::other("empty program argv"))?;

        let mut child = Command::new(program)
            .args(args)
            .arg(test_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        debug!(pid = ?child.id(), program = %program, "spawned program under test");

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("missing stdout pipe"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("missing stderr pipe"))?;

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
            deadline,
        })
    }

    /// Write all of `data` to the child's stdin.
    pub async fn write_stdin(&mut self, data: &[u8]) -> HarnessResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::other("stdin already closed"))?;
        deadlined(self.deadline, stdin.write_all(data)).await
    }

    /// Close the child's stdin so it observes end of file. Idempotent.
    pub async fn close_stdin(&mut self) -> HarnessResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            deadlined(self.deadline, stdin.shutdown()).await?;
        }
        Ok(())
    }

    /// One read from the child's stdout into `buf`; `Ok(0)` is end of
    /// stream.
    pub async fn read_stdout(&mut self, buf: &mut [u8]) -> HarnessResult<usize> {
        deadlined(self.deadline, self.stdout.read(buf)).await
    }

    /// One read from the child's stderr into `buf`; `Ok(0)` is end of
    /// stream.
    pub async fn read_stderr(&mut self, buf: &mut [u8]) -> HarnessResult<usize> {
        deadlined(self.deadline, self.stderr.read(buf)).await
    }

    /// Reap the child and return its exit code.
    ///
    /// Stdin is dropped first so a child still reading cannot deadlock the
    /// reap. A signal-terminated child reports code -1.
    pub async fn wait(&mut self) -> HarnessResult<i32> {
        drop(self.stdin.take());
        let status = deadlined(self.deadline, self.child.wait()).await?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Tear the child down without blocking the caller.
    ///
    /// All pipes close immediately. A detached task gives the child
    /// [`KILL_GRACE`] to exit on its own, then force-kills and reaps it,
    /// so no zombie outlives the run.
    pub fn abandon(self) {
        let Self {
            mut child,
            stdin,
            stdout,
            stderr,
            ..
        } = self;
        drop(stdin);
        drop(stdout);
        drop(stderr);

        tokio::spawn(async move {
            time::sleep(KILL_GRACE).await;
            match child.try_wait() {
                Ok(Some(status)) => debug!(%status, "abandoned child exited on its own"),
                Ok(None) => {
                    if let Err(err) = child.kill().await {
                        warn!(error = %err, "failed to kill abandoned child");
                    }
                }
                Err(err) => warn!(error = %err, "failed to poll abandoned child"),
            }
        });
    }
}
