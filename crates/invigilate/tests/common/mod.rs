//! Shared fixtures for driver integration tests.
//!
//! Each test builds an isolated `tempfile` tree holding test case files
//! and small shell scripts standing in for the program under test, then
//! drives the compiled binary directly.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Path of the compiled driver binary.
pub const BIN: &str = env!("CARGO_BIN_EXE_invigilate");

/// A disposable tree of test case files and PUT scripts.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create fixture dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a test case file and return its path.
    pub fn test_case(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create case dir");
        }
        fs::write(&path, content).expect("write test case");
        path
    }

    /// Write an executable shell script acting as the program under test.
    pub fn put_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write put script");
        let mut perms = fs::metadata(&path).expect("stat put script").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod put script");
        path
    }
}

/// Run the driver binary with the given arguments.
pub fn run_driver<S: AsRef<std::ffi::OsStr>>(args: &[S]) -> Output {
    Command::new(BIN).args(args).output().expect("run driver")
}

pub fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// The last non-empty stderr line, which is where the run summary lands.
pub fn last_stderr_line(output: &Output) -> String {
    stderr_text(output)
        .lines()
        .last()
        .unwrap_or_default()
        .to_string()
}
