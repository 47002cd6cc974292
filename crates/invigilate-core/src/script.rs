//! Test-script model and parser.
//!
//! A line of a test case file scripts one unit of I/O when it starts with
//! the comment prefix immediately followed by a marker byte: `<` for bytes
//! to feed the child's stdin, `>` for bytes that must appear next on its
//! stdout, `!` for bytes that must appear next on its stderr. Every other
//! line is opaque to the driver (but still reaches the program under test,
//! which receives the file path as its final argument).

/// One scripted I/O step extracted from a test file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Bytes to write to the child's stdin.
    Input(Vec<u8>),
    /// Bytes that must appear next on the child's stdout.
    ExpectOut(Vec<u8>),
    /// Bytes that must appear next on the child's stderr.
    ExpectErr(Vec<u8>),
}

impl Directive {
    /// The marker byte that introduced this directive in the file.
    #[must_use]
    pub const fn marker(&self) -> u8 {
        match self {
            Self::Input(_) => b'<',
            Self::ExpectOut(_) => b'>',
            Self::ExpectErr(_) => b'!',
        }
    }

    /// The raw payload, including the trailing newline when the source
    /// line had one. The final line of a file may lack it.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self {
            Self::Input(data) | Self::ExpectOut(data) | Self::ExpectErr(data) => data,
        }
    }
}

/// The ordered directive sequence of one test case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    directives: Vec<Directive>,
}

impl Script {
    /// Parse `content` using `comment` as the directive prefix.
    ///
    /// The input is split on `\n` with the newline retained as part of each
    /// line. A line contributes a directive when it starts with `comment`,
    /// is at least `comment.len() + 2` bytes long, and the byte after the
    /// prefix is one of the three markers. The payload is every byte after
    /// the marker, taken literally; no escapes are interpreted.
    #[must_use]
    pub fn parse(content: &[u8], comment: &[u8]) -> Self {
        let mut directives = Vec::new();
        for line in content.split_inclusive(|&b| b == b'\n') {
            if !line.starts_with(comment) || line.len() < comment.len() + 2 {
                continue;
            }
            let data = line[comment.len() + 1..].to_vec();
            match line[comment.len()] {
                b'<' => directives.push(Directive::Input(data)),
                b'>' => directives.push(Directive::ExpectOut(data)),
                b'!' => directives.push(Directive::ExpectErr(data)),
                _ => {}
            }
        }
        Self { directives }
    }

    /// The directives in file order.
    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Number of [`Directive::Input`] steps. The child's stdin is closed
    /// as soon as this many writes have been issued.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.directives
            .iter()
            .filter(|d| matches!(d, Directive::Input(_)))
            .count()
    }

    /// Whether the script contains no directives at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}
