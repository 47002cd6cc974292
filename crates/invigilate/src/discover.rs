//! Locating and loading test cases.
//!
//! Discovery runs on a blocking thread concurrently with execution and
//! feeds jobs over a bounded channel; the channel closing is how the run
//! loop learns the tree is exhausted. Roots are inspected with `lstat`
//! semantics: a regular file is used whatever its name, a directory is
//! walked recursively for regular files carrying the configured extension,
//! and anything else is reported as an error job. File contents are read
//! here so the engine never touches the filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use tokio::sync::mpsc::Sender;
use tracing::debug;
use walkdir::WalkDir;

/// Capacity of the discovery-to-engine channel.
pub const JOB_BUFFER: usize = 10;

/// One test case to run, or the problem that prevented loading it.
///
/// An `Err` content is reported as an infrastructure error, not as a test
/// failure; the program under test is never started for it.
#[derive(Debug)]
pub struct TestJob {
    /// Path of the test case file as discovered.
    pub path: PathBuf,
    /// Raw file contents, or the error to report in their place.
    pub content: anyhow::Result<Vec<u8>>,
}

/// Walk `roots` and send one job per test case.
///
/// Blocks on the channel when the engine falls behind; returns early when
/// the receiving side has gone away.
pub fn find_tests(roots: &[PathBuf], extension: &str, tx: &Sender<TestJob>) {
    for root in roots {
        if !send_root(root, extension, tx) {
            debug!("job channel closed, abandoning discovery");
            return;
        }
    }
}

/// Feed every test case under one root; false when the channel is closed.
fn send_root(root: &Path, extension: &str, tx: &Sender<TestJob>) -> bool {
    let meta = match root.symlink_metadata() {
        Ok(meta) => meta,
        Err(err) => {
            let content = Err(anyhow::Error::new(err).context(root.display().to_string()));
            return send(tx, root.to_path_buf(), content);
        }
    };

    if meta.is_file() {
        return send(tx, root.to_path_buf(), load(root));
    }
    if !meta.is_dir() {
        let content = Err(anyhow!(
            "{} is neither a regular file nor a directory",
            root.display()
        ));
        return send(tx, root.to_path_buf(), content);
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let ok = match entry {
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                send(tx, path, Err(anyhow::Error::new(err)))
            }
            Ok(entry) if entry.file_type().is_file() => {
                if entry.file_name().to_string_lossy().ends_with(extension) {
                    let path = entry.path().to_path_buf();
                    let content = load(&path);
                    send(tx, path, content)
                } else {
                    true
                }
            }
            Ok(_) => true,
        };
        if !ok {
            return false;
        }
    }
    true
}

fn load(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn send(tx: &Sender<TestJob>, path: PathBuf, content: anyhow::Result<Vec<u8>>) -> bool {
    debug!(path = %path.display(), ok = content.is_ok(), "discovered test case");
    tx.blocking_send(TestJob { path, content }).is_ok()
}
