//! Per-test execution: walking one script against one child process.
//!
//! The engine pre-counts the script's input directives so the child's
//! stdin can be closed the moment the last scripted write has been issued,
//! independently of any pending output match. Each expect directive drives
//! the incremental matcher: pipe reads happen only while the actual bytes
//! are still a strict prefix of the expected bytes, and residue from a
//! matched read stays buffered for the next directive of the same stream.
//!
//! Diagnostics stream to the driver's stderr as they are detected; in
//! verbose mode each directive is echoed to the driver's stdout before it
//! is handled. The returned outcome only feeds the run summary.

use std::io::{self, Write};
use std::path::Path;

use bstr::ByteSlice;
use tokio::time::Instant;
use tracing::debug;

use invigilate_core::matcher::{self, MatchStep};
use invigilate_core::script::{Directive, Script};
use invigilate_core::TestOutcome;

use crate::cli::Config;
use crate::harness::{HarnessError, Put};

/// Scratch buffer size for pipe reads.
const READ_BUF: usize = 65536;

/// Size of the probe read for unscripted bytes after the last directive.
const RESIDUAL_PROBE: usize = 64;

/// Which child stream an expect directive matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Out,
    Err,
}

impl StreamKind {
    /// Label used in incorrect/incomplete diagnostics.
    const fn what(self) -> &'static str {
        match self {
            Self::Out => "test output",
            Self::Err => "test error output",
        }
    }

    /// Label used when the residual probe itself fails.
    const fn residual_what(self) -> &'static str {
        match self {
            Self::Out => "output error",
            Self::Err => "output problem",
        }
    }
}

/// How a finished case leaves the child process behind.
enum Verdict {
    /// The child was reaped (or the reap itself failed); nothing to tear
    /// down.
    Done(TestOutcome),
    /// The child may still be running and must be torn down in the
    /// background.
    Abandon(TestOutcome),
}

/// Run one test case against `program`.
pub async fn run_case(
    path: &Path,
    content: &[u8],
    program: &[String],
    config: &Config,
) -> TestOutcome {
    let script = Script::parse(content, &config.comment);
    let deadline = Instant::now() + config.limit;
    debug!(
        path = %path.display(),
        directives = script.directives().len(),
        inputs = script.input_count(),
        "running test case"
    );

    if config.verbose {
        println!();
        println!("{}", path.display());
    }

    let mut put = match Put::spawn(program, path, deadline) {
        Ok(put) => put,
        Err(err) => {
            eprintln!("{}: {err}", path.display());
            return TestOutcome::Fail;
        }
    };

    let mut case = Case {
        path,
        verbose: config.verbose,
        out_buf: Vec::new(),
        err_buf: Vec::new(),
        scratch: vec![0; READ_BUF],
        saw_err_directive: false,
    };

    match case.execute(&script, &mut put).await {
        Verdict::Done(outcome) => outcome,
        Verdict::Abandon(outcome) => {
            put.abandon();
            outcome
        }
    }
}

/// State of one test case while its script is being walked.
struct Case<'a> {
    path: &'a Path,
    verbose: bool,
    /// Unmatched bytes already read from the child's stdout.
    out_buf: Vec<u8>,
    /// Unmatched bytes already read from the child's stderr.
    err_buf: Vec<u8>,
    scratch: Vec<u8>,
    saw_err_directive: bool,
}

impl Case<'_> {
    async fn execute(&mut self, script: &Script, put: &mut Put) -> Verdict {
        let mut remaining_inputs = script.input_count() as i64;

        for directive in script.directives() {
            // The child observes EOF as soon as its last scripted input
            // has been written, regardless of pending output matches.
            if remaining_inputs == 0 {
                if let Err(err) = put.close_stdin().await {
                    return self.fail_io("closing test input", &err);
                }
                remaining_inputs = -1;
            }

            if self.verbose {
                echo_directive(directive);
            }

            match directive {
                Directive::Input(data) => {
                    remaining_inputs -= 1;
                    if let Err(err) = put.write_stdin(data).await {
                        return self.fail_io("writing to test input", &err);
                    }
                }
                Directive::ExpectOut(want) => {
                    if let Some(verdict) = self.expect(put, StreamKind::Out, want).await {
                        return verdict;
                    }
                }
                Directive::ExpectErr(want) => {
                    self.saw_err_directive = true;
                    if let Some(verdict) = self.expect(put, StreamKind::Err, want).await {
                        return verdict;
                    }
                }
            }
        }

        if remaining_inputs > 0 {
            // The pre-count and the walk disagree; abort the case loudly
            // rather than leave the child waiting on input.
            self.diag(&format!(
                "internal error: {remaining_inputs} scripted input writes were never issued"
            ));
            return Verdict::Abandon(TestOutcome::Error);
        }
        if remaining_inputs == 0 {
            // The script's last directive was an input (or there were no
            // directives at all), so the in-loop closure never fired.
            if let Err(err) = put.close_stdin().await {
                return self.fail_io("closing test input", &err);
            }
        }

        if let Some(verdict) = self.check_residual(put, StreamKind::Out).await {
            return verdict;
        }
        if let Some(verdict) = self.check_residual(put, StreamKind::Err).await {
            return verdict;
        }

        let code = match put.wait().await {
            Ok(code) => code,
            Err(err @ HarnessError::DeadlineExceeded) => {
                self.diag(&err.to_string());
                return Verdict::Abandon(TestOutcome::Fail);
            }
            Err(HarnessError::Io(err)) => {
                self.diag(&err.to_string());
                return Verdict::Done(TestOutcome::Fail);
            }
        };
        debug!(path = %self.path.display(), code, "child exited");

        if self.saw_err_directive {
            if code == 0 {
                self.diag("produced error output but exit code was 0");
                return Verdict::Done(TestOutcome::Fail);
            }
        } else if code != 0 {
            self.diag(&format!("exit code {code}"));
            return Verdict::Done(TestOutcome::Fail);
        }

        Verdict::Done(TestOutcome::Pass)
    }

    /// Match `want` against the next bytes of the given stream.
    ///
    /// `None` means the directive matched; otherwise the failure verdict,
    /// already reported.
    async fn expect(&mut self, put: &mut Put, stream: StreamKind, want: &[u8]) -> Option<Verdict> {
        let mut eof = false;
        loop {
            let actual = match stream {
                StreamKind::Out => &self.out_buf,
                StreamKind::Err => &self.err_buf,
            };
            match matcher::step(want, actual) {
                MatchStep::Matched => {
                    match stream {
                        StreamKind::Out => self.out_buf.drain(..want.len()),
                        StreamKind::Err => self.err_buf.drain(..want.len()),
                    };
                    return None;
                }
                MatchStep::Diverged => {
                    self.diag(&format!("incorrect {}", stream.what()));
                    diag_bytes("expected: ", want);
                    diag_bytes("  actual: ", matcher::first_line(actual));
                    return Some(Verdict::Abandon(TestOutcome::Fail));
                }
                MatchStep::NeedMore => {
                    if eof {
                        self.diag(&format!("incomplete {}", stream.what()));
                        diag_bytes("expected: ", want);
                        diag_bytes("  actual: ", actual);
                        return Some(Verdict::Abandon(TestOutcome::Fail));
                    }
                    let read = match stream {
                        StreamKind::Out => put.read_stdout(&mut self.scratch).await,
                        StreamKind::Err => put.read_stderr(&mut self.scratch).await,
                    };
                    match read {
                        Ok(0) => eof = true,
                        Ok(n) => match stream {
                            StreamKind::Out => self.out_buf.extend_from_slice(&self.scratch[..n]),
                            StreamKind::Err => self.err_buf.extend_from_slice(&self.scratch[..n]),
                        },
                        Err(err) => {
                            return Some(
                                self.fail_io(&format!("reading {}", stream.what()), &err),
                            );
                        }
                    }
                }
            }
        }
    }

    /// Report any bytes the child produced beyond its script.
    ///
    /// When the stream's buffer is empty, one short probe read checks for
    /// late unscripted data; end of stream is the expected result.
    async fn check_residual(&mut self, put: &mut Put, stream: StreamKind) -> Option<Verdict> {
        let nothing_buffered = match stream {
            StreamKind::Out => self.out_buf.is_empty(),
            StreamKind::Err => self.err_buf.is_empty(),
        };
        if nothing_buffered {
            let read = match stream {
                StreamKind::Out => put.read_stdout(&mut self.scratch[..RESIDUAL_PROBE]).await,
                StreamKind::Err => put.read_stderr(&mut self.scratch[..RESIDUAL_PROBE]).await,
            };
            match read {
                Ok(n) => match stream {
                    StreamKind::Out => self.out_buf.extend_from_slice(&self.scratch[..n]),
                    StreamKind::Err => self.err_buf.extend_from_slice(&self.scratch[..n]),
                },
                Err(err) => return Some(self.fail_io(stream.residual_what(), &err)),
            }
        }

        let residual = match stream {
            StreamKind::Out => &self.out_buf,
            StreamKind::Err => &self.err_buf,
        };
        if !residual.is_empty() {
            let label = match stream {
                StreamKind::Out => "extra output",
                StreamKind::Err => "extra error output",
            };
            diag_bytes(&format!("{}: {label}: ", self.path.display()), residual);
            return Some(Verdict::Abandon(TestOutcome::Fail));
        }
        None
    }

    /// Report an I/O failure and decide the verdict. Deadline expiry is
    /// the single `time limit exceeded` message; everything else names the
    /// operation that failed.
    fn fail_io(&self, what: &str, err: &HarnessError) -> Verdict {
        match err {
            HarnessError::DeadlineExceeded => self.diag("time limit exceeded"),
            HarnessError::Io(err) => self.diag(&format!("{what}: {err}")),
        }
        Verdict::Abandon(TestOutcome::Fail)
    }

    /// One diagnostic line on the driver's stderr, prefixed with the test
    /// path.
    fn diag(&self, message: &str) {
        eprintln!("{}: {message}", self.path.display());
    }
}

/// Write one diagnostic line of raw bytes to stderr, supplying the
/// trailing newline when the bytes lack one.
fn diag_bytes(prefix: &str, bytes: &[u8]) {
    let mut line = Vec::with_capacity(prefix.len() + bytes.len() + 1);
    line.extend_from_slice(prefix.as_bytes());
    line.extend_from_slice(bytes);
    if !line.ends_with_str("\n") {
        line.push(b'\n');
    }
    let _ = io::stderr().lock().write_all(&line);
}

/// Mirror one directive to the driver's stdout: the marker byte, the raw
/// payload, and a newline when the payload lacks one.
fn echo_directive(directive: &Directive) {
    let payload = directive.payload();
    let mut line = Vec::with_capacity(payload.len() + 2);
    line.push(directive.marker());
    line.extend_from_slice(payload);
    if !line.ends_with_str("\n") {
        line.push(b'\n');
    }
    let _ = io::stdout().lock().write_all(&line);
}
