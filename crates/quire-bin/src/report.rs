//! One summary line per loaded file.

use core_state::{Digest, Loaded};
use core_syntax::Language;
use core_text::{Linebreak, display_width, right_pad};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: Option<PathBuf>,
    pub language: Language,
    pub lines: usize,
    pub linebreak: Linebreak,
    /// Widest line in columns, terminator included.
    pub max_display_width: usize,
    pub blank_lines: usize,
    pub digest: Option<Digest>,
}

impl FileReport {
    /// Summarize `loaded`. Touches every line, so layouts the pool has not
    /// reached yet are computed here.
    pub fn build(loaded: &Loaded, with_digest: bool) -> Self {
        let moment = &loaded.moment;
        let mut max_display_width = 0;
        let mut blank_lines = 0;
        for line in moment.lines() {
            max_display_width = max_display_width.max(line.display_width());
            if line.all_space() {
                blank_lines += 1;
            }
        }
        Self {
            path: moment.file_info().map(|info| info.path.clone()),
            language: moment.language(),
            lines: moment.num_lines(),
            linebreak: loaded.linebreak,
            max_display_width,
            blank_lines,
            digest: with_digest.then(|| moment.sum()),
        }
    }

    fn label(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "<memory>".to_string(),
        }
    }

    fn fields(&self) -> String {
        let linebreak = match self.linebreak {
            Linebreak::Lf => "lf",
            Linebreak::CrLf => "crlf",
        };
        let mut out = format!(
            "{}\tlines={}\tlinebreak={}\twidth={}\tblank={}",
            self.language, self.lines, linebreak, self.max_display_width, self.blank_lines
        );
        if let Some(digest) = &self.digest {
            out.push_str(&format!("\tsum={digest}"));
        }
        out
    }
}

/// One line per report with the path column padded to the widest path in
/// display columns, so wide-rune names still line up.
pub fn aligned(reports: &[FileReport]) -> Vec<String> {
    let labels: Vec<String> = reports.iter().map(FileReport::label).collect();
    let width = labels.iter().map(|l| display_width(l)).max().unwrap_or(0);
    labels
        .iter()
        .zip(reports)
        .map(|(label, report)| format!("{}  {}", right_pad(label, ' ', width), report.fields()))
        .collect()
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.label(), self.fields())
    }
}
