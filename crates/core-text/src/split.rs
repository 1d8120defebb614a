//! Splitting raw content into line contents and choosing a line-break policy.
//!
//! Each produced line keeps its `\n` terminator (the final line has none when
//! the content does not end in a newline). A `\r` directly before the
//! terminator, or at the very end of an unterminated final line, is removed
//! and counted. When the counted lines make up strictly more than
//! `CRLF_RATIO_THRESHOLD` of all lines the buffer is saved with CRLF.
//!
//! Empty content yields exactly one empty line.

/// Fraction of `\r`-terminated lines above which CRLF is chosen.
pub const CRLF_RATIO_THRESHOLD: f64 = 0.4;

/// Line-break policy used when writing the buffer back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Linebreak {
    #[default]
    Lf,
    CrLf,
}

impl Linebreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            Linebreak::Lf => "\n",
            Linebreak::CrLf => "\r\n",
        }
    }
}

/// Output of `split_lines`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitLines {
    /// Line contents with `\r` stripped, `\n` retained.
    pub lines: Vec<String>,
    pub linebreak: Linebreak,
    /// Lines whose `\r` was stripped.
    pub cr_stripped: usize,
}

pub fn split_lines(content: &str) -> SplitLines {
    let mut lines = Vec::new();
    let mut cr_stripped = 0usize;

    if content.is_empty() {
        lines.push(String::new());
    } else {
        let mut rest = content;
        while !rest.is_empty() {
            let (raw, tail) = match rest.find('\n') {
                Some(i) => rest.split_at(i + 1),
                None => (rest, ""),
            };
            let (body, terminator) = match raw.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (raw, ""),
            };
            let line = match body.strip_suffix('\r') {
                Some(stripped) => {
                    cr_stripped += 1;
                    let mut s = String::with_capacity(stripped.len() + terminator.len());
                    s.push_str(stripped);
                    s.push_str(terminator);
                    s
                }
                None => raw.to_string(),
            };
            lines.push(line);
            rest = tail;
        }
    }

    let linebreak = if cr_stripped as f64 / lines.len() as f64 > CRLF_RATIO_THRESHOLD {
        Linebreak::CrLf
    } else {
        Linebreak::Lf
    };

    SplitLines {
        lines,
        linebreak,
        cr_stripped,
    }
}
