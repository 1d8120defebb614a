//! Whitespace and width lints published through the hint cache, and the
//! gutter styler that surfaces them in rendered rows.

use core_hints::{HintCache, HintProvider, HintSink};
use core_render::{Cell, CellFlags, RowContext, RowStyler};
use core_state::Moment;
use std::sync::{Arc, PoisonError, RwLock};

pub const TRAILING_WHITESPACE: &str = "trailing-whitespace";
pub const MIXED_INDENT: &str = "mixed-indent";
pub const LONG_LINE: &str = "long-line";

/// Lints every line of the watched Moments once per collection cycle.
pub struct LineLint {
    moments: RwLock<Vec<Arc<Moment>>>,
    max_width: usize,
}

impl LineLint {
    pub fn new(moments: Vec<Arc<Moment>>, max_width: usize) -> Self {
        Self {
            moments: RwLock::new(moments),
            max_width,
        }
    }

    /// Replace the watched set. Hints for Moments no longer watched are
    /// pruned by the next cycle.
    pub fn watch(&self, moments: Vec<Arc<Moment>>) {
        *self.moments.write().unwrap_or_else(PoisonError::into_inner) = moments;
    }

    fn lint(&self, content: &str, display_width: usize) -> Vec<String> {
        let body = content.strip_suffix('\n').unwrap_or(content);
        let mut hints = Vec::new();
        if body.ends_with([' ', '\t']) {
            hints.push(TRAILING_WHITESPACE.to_string());
        }
        let indent: String = body.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
        if indent.contains(' ') && indent.contains('\t') {
            hints.push(MIXED_INDENT.to_string());
        }
        let terminator = usize::from(body.len() != content.len());
        if display_width.saturating_sub(terminator) > self.max_width {
            hints.push(LONG_LINE.to_string());
        }
        hints
    }
}

impl HintProvider for LineLint {
    fn collect(&self, sink: &mut HintSink<'_>) {
        let moments = self.moments.read().unwrap_or_else(PoisonError::into_inner);
        for moment in moments.iter() {
            for (idx, line) in moment.lines().iter().enumerate() {
                let hints = self.lint(line.content(), line.display_width());
                if !hints.is_empty() {
                    sink.add(moment.id(), idx, hints);
                }
            }
        }
    }
}

/// Emphasizes the gutter of rows whose line carries a published hint.
pub struct LintGutter {
    hints: Arc<HintCache>,
}

impl LintGutter {
    pub fn new(hints: Arc<HintCache>) -> Self {
        Self { hints }
    }
}

impl RowStyler for LintGutter {
    fn style(&self, ctx: &RowContext<'_>, cells: &mut [Cell]) {
        let Some(line) = ctx.line else {
            return;
        };
        if self.hints.hints_for(ctx.moment.id(), line).is_some() {
            for cell in &mut cells[..ctx.content_start] {
                cell.flags |= CellFlags::EMPHASIS;
            }
        }
    }
}
