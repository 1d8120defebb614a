//! Per-line layout: one `Cell` per rune with widths and offsets in four units.
//!
//! A `Line` is created with raw content only. Its `LineLayout` is computed the
//! first time anyone asks for it (a renderer, a pool worker, a Moment
//! position lookup) and is immutable afterwards. Concurrent first callers
//! block on the single in-flight computation; no caller ever recomputes.
//!
//! Offsets per cell (all start at zero, all non-decreasing):
//! - `byte_offset`: UTF-8 bytes before this rune.
//! - `rune_offset`: runes before this rune.
//! - `utf16_offset`: UTF-16 code units before this rune.
//! - `display_offset`: display columns before this rune, tabs expanded.
//!
//! After the layout is stored every registered `LineObserver` is notified
//! exactly once.

use crate::width::rune_width;
use core_config::LayoutConfig;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// Layout record for one rune.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub rune: char,
    /// Number of bytes in the UTF-8 encoding.
    pub len: usize,
    /// Visual width without padding (1 or 2).
    pub width: usize,
    /// Visual width with tab padding applied.
    pub display_width: usize,
    pub display_offset: usize,
    pub rune_offset: usize,
    pub byte_offset: usize,
    pub utf16_offset: usize,
}

/// Derived, immutable layout of a line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineLayout {
    pub cells: Vec<Cell>,
    pub runes: Vec<char>,
    pub display_width: usize,
    pub all_space: bool,
    /// Display column of the first non-whitespace rune.
    pub non_space_display_offset: Option<usize>,
    pub byte_len: usize,
    pub utf16_len: usize,
}

/// Notified once per line, right after its layout is stored.
pub trait LineObserver: Send + Sync {
    fn line_initialized(&self, line: &Line);
}

/// Shared layout parameters and observers for every line of a buffer.
pub struct LayoutEnv {
    config: LayoutConfig,
    observers: Vec<Arc<dyn LineObserver>>,
}

impl LayoutEnv {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LineObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for LayoutEnv {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl fmt::Debug for LayoutEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutEnv")
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}

pub struct Line {
    content: String,
    env: Arc<LayoutEnv>,
    layout: OnceLock<LineLayout>,
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Line")
            .field("len", &self.content.len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Line {
    pub fn new(content: impl Into<String>, env: Arc<LayoutEnv>) -> Self {
        Self {
            content: content.into(),
            env,
            layout: OnceLock::new(),
        }
    }

    /// Raw content including the `\n` terminator when present.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn env(&self) -> &Arc<LayoutEnv> {
        &self.env
    }

    pub fn is_initialized(&self) -> bool {
        self.layout.get().is_some()
    }

    /// Compute-or-wait access to the layout.
    pub fn layout(&self) -> &LineLayout {
        let mut computed_here = false;
        let layout = self.layout.get_or_init(|| {
            computed_here = true;
            compute_layout(&self.content, self.env.config)
        });
        if computed_here {
            trace!(
                target: "text.layout",
                cells = layout.cells.len(),
                display_width = layout.display_width,
                "line_initialized"
            );
            for observer in &self.env.observers {
                observer.line_initialized(self);
            }
        }
        layout
    }

    /// Idempotent initialization hook used by the worker pool.
    pub fn init(&self) {
        self.layout();
    }

    pub fn cells(&self) -> &[Cell] {
        &self.layout().cells
    }

    pub fn runes(&self) -> &[char] {
        &self.layout().runes
    }

    pub fn display_width(&self) -> usize {
        self.layout().display_width
    }

    pub fn all_space(&self) -> bool {
        self.layout().all_space
    }

    pub fn non_space_display_offset(&self) -> Option<usize> {
        self.layout().non_space_display_offset
    }

    /// Leading whitespace runes up to the first non-whitespace display column.
    /// Blank lines have no indent.
    pub fn indent(&self) -> String {
        let layout = self.layout();
        let Some(limit) = layout.non_space_display_offset else {
            return String::new();
        };
        layout
            .cells
            .iter()
            .take_while(|cell| cell.display_offset < limit)
            .map(|cell| cell.rune)
            .collect()
    }

    /// Byte offset of the rune at `rune_offset`, or the line's byte length
    /// when the offset is past the last rune.
    pub fn byte_offset_of_rune(&self, rune_offset: usize) -> usize {
        let layout = self.layout();
        layout
            .cells
            .get(rune_offset)
            .map(|c| c.byte_offset)
            .unwrap_or(layout.byte_len)
    }
}

fn compute_layout(content: &str, config: LayoutConfig) -> LineLayout {
    let runes: Vec<char> = content.chars().collect();
    let mut cells = Vec::with_capacity(runes.len());
    let mut all_space = true;
    let mut non_space_display_offset = None;
    let mut display_offset = 0usize;
    let mut byte_offset = 0usize;
    let mut utf16_offset = 0usize;

    for (rune_offset, &rune) in runes.iter().enumerate() {
        let width = rune_width(rune);
        let display_width = if rune == '\t' && config.expand_tabs {
            config.tab_width
        } else {
            width
        };
        let len = rune.len_utf8();
        cells.push(Cell {
            rune,
            len,
            width,
            display_width,
            display_offset,
            rune_offset,
            byte_offset,
            utf16_offset,
        });
        if !rune.is_whitespace() {
            all_space = false;
            if non_space_display_offset.is_none() {
                non_space_display_offset = Some(display_offset);
            }
        }
        display_offset += display_width;
        byte_offset += len;
        utf16_offset += rune.len_utf16();
    }

    LineLayout {
        cells,
        runes,
        display_width: display_offset,
        all_space,
        non_space_display_offset,
        byte_len: byte_offset,
        utf16_len: utf16_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn env(tab_width: usize, expand_tabs: bool) -> Arc<LayoutEnv> {
        LayoutEnv::new(LayoutConfig {
            tab_width,
            expand_tabs,
        })
        .into_shared()
    }

    #[test]
    fn tab_expands_from_column_one_to_five() {
        let line = Line::new("a\tb\n", env(4, true));
        let offsets: Vec<usize> = line.cells().iter().map(|c| c.display_offset).collect();
        assert_eq!(&offsets[..3], &[0, 1, 5]);
        assert_eq!(line.cells()[1].width, 1);
        assert_eq!(line.cells()[1].display_width, 4);
        assert_eq!(line.non_space_display_offset(), Some(0));
    }

    #[test]
    fn tab_without_expansion_keeps_intrinsic_width() {
        let line = Line::new("\tx", env(8, false));
        assert_eq!(line.cells()[0].display_width, 1);
        assert_eq!(line.non_space_display_offset(), Some(1));
    }

    #[test]
    fn wide_rune_offsets() {
        let line = Line::new("漢a", env(4, true));
        let c = line.cells();
        assert_eq!(c[0].width, 2);
        assert_eq!(c[1].display_offset, 2);
        assert_eq!(c[1].byte_offset, 3);
        assert_eq!(c[1].utf16_offset, 1);
        assert_eq!(line.display_width(), 3);
    }

    #[test]
    fn astral_rune_counts_two_utf16_units() {
        let line = Line::new("😀x", env(4, true));
        let c = line.cells();
        assert_eq!(c[0].len, 4);
        assert_eq!(c[1].utf16_offset, 2);
        assert_eq!(line.layout().utf16_len, 3);
    }

    #[test]
    fn whitespace_flags() {
        let blank = Line::new("  \t\n", env(4, true));
        assert!(blank.all_space());
        assert_eq!(blank.non_space_display_offset(), None);
        assert_eq!(blank.indent(), "");

        let empty = Line::new("", env(4, true));
        assert!(empty.all_space());
        assert!(empty.cells().is_empty());

        let indented = Line::new("  \tfoo\n", env(4, true));
        assert!(!indented.all_space());
        assert_eq!(indented.non_space_display_offset(), Some(6));
        assert_eq!(indented.indent(), "  \t");
    }

    #[test]
    fn non_space_offset_is_first_only() {
        let line = Line::new(" a b", env(4, true));
        assert_eq!(line.non_space_display_offset(), Some(1));
    }

    #[test]
    fn byte_offset_of_rune_clamps_to_len() {
        let line = Line::new("é漢\n", env(4, true));
        assert_eq!(line.byte_offset_of_rune(0), 0);
        assert_eq!(line.byte_offset_of_rune(1), 2);
        assert_eq!(line.byte_offset_of_rune(99), "é漢\n".len());
    }

    struct Counter(AtomicUsize);

    impl LineObserver for Counter {
        fn line_initialized(&self, line: &Line) {
            assert!(line.is_initialized());
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn concurrent_init_computes_once_and_notifies_once() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let env = LayoutEnv::new(LayoutConfig::default())
            .with_observer(counter.clone())
            .into_shared();
        let line = Arc::new(Line::new("fn main() {}\n".repeat(200), env));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let line = line.clone();
                std::thread::spawn(move || line.layout().clone())
            })
            .collect();
        let layouts: Vec<LineLayout> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for l in &layouts {
            assert_eq!(l, &layouts[0]);
        }
        line.init();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
