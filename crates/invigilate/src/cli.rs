//! Command line surface of the driver.
//!
//! The invocation shape is `invigilate [options] program -- files`: the
//! trailing arguments are captured verbatim and split at the last `--`
//! into the argv of the program under test and the list of test roots.
//! Flag parsing stops at the first trailing argument, so the program's own
//! flags pass through untouched.

use std::time::Duration;

use clap::Parser;

/// Usage text, printed to stderr on request (`-h`) and on usage errors.
const USAGE: &str = "
Usage: invigilate [options] program -- files

Program invigilate runs a number of test cases against a single program.

The arguments between the last option and the \"--\" describe the program
to be tested.

The arguments after \"--\" list files containing test cases. When one of
these arguments refers to a directory, the directory is searched
recursively for regular files with the extension given by the -e option;
those become test cases. Test case files listed directly on the command
line are used whatever their extension.

The program being tested is run once for each test case. Its command line
is the \"program\" part of the invigilate arguments followed by one
additional argument, the path of the test case file.

The expected results of a test case are described in comments embedded in
the test file. A line beginning with \"#>\" names text that must appear on
the standard output; \"#!\", text that must appear on the standard error
output; and \"#<\", text that is supplied to the standard input. All are
produced or consumed in the order in which they appear in the file. The -c
option selects another comment delimiter instead of \"#\"; the delimiter
must always sit at the beginning of a line.

Options:

  -c string
        comment delimiter for expected input and output (default \"#\")
  -e string
        test case files have this extension (default \".test\")
  -h    print this help information
  -t duration
        time limit for individual test cases (default 2s)
  -v    show verbose output
";

/// Print the usage text to stderr.
pub fn print_usage() {
    eprint!("{USAGE}");
}

/// Parsed command line.
#[derive(Debug, Parser)]
#[command(name = "invigilate", disable_help_flag = true)]
pub struct Cli {
    /// Comment delimiter for expected input and output.
    #[arg(short = 'c', value_name = "string", default_value = "#")]
    pub comment: String,

    /// Extension of test case files found when searching directories.
    #[arg(short = 'e', value_name = "string", default_value = ".test")]
    pub extension: String,

    /// Print the usage text and exit.
    #[arg(short = 'h', long = "help")]
    pub help: bool,

    /// Wall-clock time limit for each test case.
    #[arg(short = 't', value_name = "duration", default_value = "2s", value_parser = parse_limit)]
    pub limit: Duration,

    /// Echo each directive to stdout as it is handled.
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Program argv, `--`, then test files and directories.
    #[arg(value_name = "program -- files", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Immutable run configuration derived from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directive prefix bytes required at column 0.
    pub comment: Vec<u8>,
    /// Extension filter applied while walking directories.
    pub extension: String,
    /// Per-test wall-clock limit.
    pub limit: Duration,
    /// Whether to echo directives to stdout.
    pub verbose: bool,
}

impl Cli {
    /// Build the run configuration, consuming the option fields.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            comment: self.comment.clone().into_bytes(),
            extension: self.extension.clone(),
            limit: self.limit,
            verbose: self.verbose,
        }
    }
}

/// Split the trailing arguments at the last `--` into the program argv and
/// the list of test roots. Without a `--`, both halves are empty.
#[must_use]
pub fn split_args(args: &[String]) -> (Vec<String>, Vec<String>) {
    let mut split = None;
    for (k, arg) in args.iter().enumerate() {
        if arg == "--" {
            split = Some(k);
        }
    }
    match split {
        Some(k) => (args[..k].to_vec(), args[k + 1..].to_vec()),
        None => (Vec::new(), Vec::new()),
    }
}

/// Parse a duration literal such as `2s`, `.7s`, `250ms`, `1m` or `1h`.
/// The number may be fractional with or without a leading digit.
fn parse_limit(value: &str) -> Result<Duration, String> {
    let split = value
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| format!("missing unit in duration {value:?}"))?;
    let (number, unit) = value.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration {value:?}"))?;
    let seconds = match unit {
        "ms" => number / 1000.0,
        "s" => number,
        "m" => number * 60.0,
        "h" => number * 3600.0,
        _ => return Err(format!("unknown unit {unit:?} in duration {value:?}")),
    };
    Duration::try_from_secs_f64(seconds).map_err(|_| format!("invalid duration {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_limit_units() {
        assert_eq!(parse_limit("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_limit("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_limit("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_limit("2h"), Ok(Duration::from_secs(7200)));
    }

    #[test]
    fn test_parse_limit_fractional_seconds() {
        // The original accepts limits like ".7s" and ".3s" for cases that
        // finish in about half a second.
        assert_eq!(parse_limit(".7s"), Ok(Duration::from_secs_f64(0.7)));
        assert_eq!(parse_limit(".3s"), Ok(Duration::from_secs_f64(0.3)));
        assert_eq!(parse_limit("0.5s"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_limit("1.5m"), Ok(Duration::from_secs(90)));
    }

    #[test]
    fn test_parse_limit_rejects_bad_input() {
        assert!(parse_limit("2").is_err());
        assert!(parse_limit("s").is_err());
        assert!(parse_limit(".s").is_err());
        assert!(parse_limit("1.2.3s").is_err());
        assert!(parse_limit("2x").is_err());
        assert!(parse_limit("").is_err());
    }

    #[test]
    fn test_split_at_separator() {
        let (program, roots) = split_args(&strings(&["prog", "-x", "--", "a", "b"]));
        assert_eq!(program, strings(&["prog", "-x"]));
        assert_eq!(roots, strings(&["a", "b"]));
    }

    #[test]
    fn test_last_separator_wins() {
        let (program, roots) = split_args(&strings(&["prog", "--", "mid", "--", "case"]));
        assert_eq!(program, strings(&["prog", "--", "mid"]));
        assert_eq!(roots, strings(&["case"]));
    }

    #[test]
    fn test_missing_separator_leaves_both_empty() {
        let (program, roots) = split_args(&strings(&["prog", "case"]));
        assert!(program.is_empty());
        assert!(roots.is_empty());
    }

    #[test]
    fn test_cli_captures_trailing_args_verbatim() {
        let cli = Cli::try_parse_from(["invigilate", "-v", "-c", "//", "prog", "-x", "--", "t1"])
            .expect("parse");
        assert!(cli.verbose);
        assert_eq!(cli.comment, "//");
        assert_eq!(cli.args, strings(&["prog", "-x", "--", "t1"]));
    }

    #[test]
    fn test_option_scanning_stops_at_the_program_name() {
        // A flag the driver itself defines belongs to the program under
        // test once the program name has been seen, the way running
        // `invigilate /usr/bin/awk -f -- sum.test` hands `-f` to awk.
        let cli = Cli::try_parse_from(["invigilate", "prog", "-v", "--", "t1"]).expect("parse");
        assert!(!cli.verbose);
        assert_eq!(cli.args, strings(&["prog", "-v", "--", "t1"]));

        let cli = Cli::try_parse_from(["invigilate", "prog", "-c", "x", "-t", "9s", "--", "t1"])
            .expect("parse");
        assert_eq!(cli.comment, "#");
        assert_eq!(cli.limit, Duration::from_secs(2));
        assert_eq!(cli.args, strings(&["prog", "-c", "x", "-t", "9s", "--", "t1"]));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["invigilate", "prog", "--", "case"]).expect("parse");
        assert_eq!(cli.comment, "#");
        assert_eq!(cli.extension, ".test");
        assert_eq!(cli.limit, Duration::from_secs(2));
        assert!(!cli.verbose);
        assert!(!cli.help);
    }
}
