//! Frame grid, viewport fingerprint cache and the default text row renderer.
//!
//! A `Frame` is a row-major grid of `Cell`s. Wide runes occupy a leader cell
//! followed by continuation cells (width 0); emission consumers print leaders
//! only.
//!
//! Invariants:
//! - Leader: width >= 1, `text` non-empty.
//! - Continuation: width == 0, `text` empty, directly after its leader.
//! - Every row of a frame holds exactly `width` cells.
//!
//! Rendering flow:
//! 1. The caller describes the visible state as a `Fingerprint` (moment id,
//!    size, focus, scroll and cursor position).
//! 2. `RenderCache::render` returns the previous frame untouched when the
//!    fingerprint is equal; otherwise every row is rendered as an independent
//!    job on the worker pool and joined before the frame is assembled.
//! 3. `TextRowRenderer` is the stock row function: gutter, horizontally
//!    scrolled content with truncation markers, tab padding, blank fill, and
//!    then registered `RowStyler`s over its own row.
//!
//! Hints and other state outside the fingerprint are not tracked; callers
//! react to `Event::RenderRequested` by calling `RenderCache::invalidate`.

use bitflags::bitflags;

pub mod cache;
pub mod row;
pub mod viewport;

pub use cache::{Fingerprint, RenderCache, RenderStats};
pub use row::{RowContext, RowStyler, TextRowRenderer};
pub use viewport::Viewport;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u8 {
        const REVERSE      = 0b0000_0001; // reverse-video (software cursor)
        const CURSOR       = 0b0000_0010; // cell under the cursor
        const GUTTER       = 0b0000_0100; // line number column
        const CURRENT_LINE = 0b0000_1000; // row holding the cursor
        const MARKER       = 0b0001_0000; // '<' / '>' truncation markers
        const EMPHASIS     = 0b0010_0000; // free for stylers (hints, matches)
        const UNDERLINE    = 0b0100_0000;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Printable text for leader cells. Empty for continuation cells.
    pub text: String,
    /// Visual width in columns. `0` designates a continuation cell.
    pub width: u8,
    pub flags: CellFlags,
}

impl Cell {
    #[inline]
    pub fn leader(c: char, width: usize, flags: CellFlags) -> Self {
        Self {
            text: c.to_string(),
            width: width.clamp(1, u8::MAX as usize) as u8,
            flags,
        }
    }

    #[inline]
    pub fn continuation(flags: CellFlags) -> Self {
        Self {
            text: String::new(),
            width: 0,
            flags,
        }
    }

    #[inline]
    pub fn blank(flags: CellFlags) -> Self {
        Self::leader(' ', 1, flags)
    }

    #[inline]
    pub fn is_leader(&self) -> bool {
        self.width > 0
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank(CellFlags::empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u16,
    pub height: u16,
    pub cells: Vec<Cell>,
}

impl Frame {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    /// Assemble a frame from per-row output. Short rows are blank filled and
    /// long rows truncated so the grid stays rectangular.
    pub fn from_rows(width: u16, height: u16, rows: Vec<Vec<Cell>>) -> Self {
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        let mut rows = rows.into_iter();
        for _ in 0..height {
            let mut row = rows.next().unwrap_or_default();
            row.resize(width as usize, Cell::default());
            cells.extend(row);
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn row(&self, y: u16) -> &[Cell] {
        if y >= self.height {
            return &[];
        }
        let start = y as usize * self.width as usize;
        &self.cells[start..start + self.width as usize]
    }

    /// Leader text of a row concatenated (testing / diagnostics).
    pub fn row_text(&self, y: u16) -> String {
        self.row(y)
            .iter()
            .filter(|c| c.is_leader())
            .map(|c| c.text.as_str())
            .collect()
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        self.row(y).get(x as usize)
    }
}
