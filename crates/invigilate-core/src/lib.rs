//! Core model for the invigilate test driver.
//!
//! A test case file embeds, in specially marked comment lines, a complete
//! script of the standard input a program under test should receive and the
//! standard output and standard error it must produce. This crate holds the
//! pure, synchronous half of the driver:
//!
//! - [`script`]: the directive model and the parser that extracts an
//!   ordered script from raw file bytes,
//! - [`matcher`]: the incremental prefix matcher that decides, byte by
//!   byte, whether a stream has matched, diverged, or simply not caught up
//!   yet,
//! - [`outcome`]: per-test outcomes and the run-level tally.
//!
//! All process and pipe I/O lives in the `invigilate` binary crate.

pub mod matcher;
pub mod outcome;
pub mod script;

pub use matcher::{first_line, step, MatchStep};
pub use outcome::{RunSummary, TestOutcome};
pub use script::{Directive, Script};
