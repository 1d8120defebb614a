//! Default text row renderer and row style hooks.

use crate::cache::Fingerprint;
use crate::viewport::Viewport;
use crate::{Cell, CellFlags};
use core_state::Moment;
use std::fmt;
use std::sync::Arc;

/// What a styler may look at while styling one row.
pub struct RowContext<'a> {
    pub moment: &'a Moment,
    /// Buffer line shown on this row, `None` past the end of the buffer.
    pub line: Option<usize>,
    pub row: u16,
    /// Index of the first content cell (cells before it are gutter).
    pub content_start: usize,
    /// Display column shown at `content_start`.
    pub first_col: usize,
}

/// Registered style resolver. Runs once per rendered row, possibly on a pool
/// worker, and may only touch the cells it is handed.
pub trait RowStyler: Send + Sync {
    fn style(&self, ctx: &RowContext<'_>, cells: &mut [Cell]);
}

/// Renders rows of one Moment through a viewport.
#[derive(Clone)]
pub struct TextRowRenderer {
    moment: Arc<Moment>,
    viewport: Viewport,
    cursor_line: usize,
    cursor_col: usize,
    focused: bool,
    stylers: Arc<[Arc<dyn RowStyler>]>,
}

impl fmt::Debug for TextRowRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextRowRenderer")
            .field("moment", &self.moment.id())
            .field("viewport", &self.viewport)
            .field("cursor", &(self.cursor_line, self.cursor_col))
            .field("focused", &self.focused)
            .field("stylers", &self.stylers.len())
            .finish()
    }
}

impl TextRowRenderer {
    pub fn new(moment: Arc<Moment>, viewport: Viewport) -> Self {
        Self {
            moment,
            viewport,
            cursor_line: 0,
            cursor_col: 0,
            focused: true,
            stylers: Arc::from(Vec::new()),
        }
    }

    /// Cursor position as buffer line and display column.
    pub fn with_cursor(mut self, line: usize, col: usize) -> Self {
        self.cursor_line = line;
        self.cursor_col = col;
        self
    }

    pub fn with_focus(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn with_stylers(mut self, stylers: Arc<[Arc<dyn RowStyler>]>) -> Self {
        self.stylers = stylers;
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            moment: self.moment.id(),
            width: self.viewport.width,
            height: self.viewport.height,
            focused: self.focused,
            scroll_line: self.viewport.first_line,
            scroll_col: self.viewport.first_col,
            cursor_line: self.cursor_line,
            cursor_col: self.cursor_col,
        }
    }

    /// Exactly `viewport.width` cells for screen row `row`.
    pub fn render_row(&self, row: u16) -> Vec<Cell> {
        let vp = &self.viewport;
        let line_idx = vp.first_line + row as usize;
        let current = line_idx == self.cursor_line;
        let row_flags = if current {
            CellFlags::CURRENT_LINE
        } else {
            CellFlags::empty()
        };
        let line = self.moment.line(line_idx);

        let gutter = vp.gutter_width() as usize;
        let mut cells = Vec::with_capacity(vp.width as usize);
        cells.extend(
            self.gutter_label(line_idx, current, line.is_some())
                .chars()
                .take(gutter)
                .map(|c| Cell::leader(c, 1, CellFlags::GUTTER | row_flags)),
        );
        cells.resize(gutter, Cell::blank(CellFlags::GUTTER | row_flags));

        let content_w = vp.content_width();
        let mut content = vec![Cell::blank(row_flags); content_w];
        if let Some(line) = line {
            let all = line.cells();
            let mut skip = vp.first_col;
            let mut start = 0;
            while skip > 0 && start < all.len() {
                skip = skip.saturating_sub(all[start].display_width);
                start += 1;
            }
            let left_truncated = start > 0;
            let mut x = 0usize;
            for cell in &all[start..] {
                // The terminator never counts toward overflow.
                if cell.rune == '\n' {
                    break;
                }
                if x >= content_w {
                    if content_w > 0 {
                        put_marker(&mut content, content_w - 1, '>', row_flags);
                    }
                    break;
                }
                if left_truncated && x == 0 {
                    put_marker(&mut content, 0, '<', row_flags);
                } else if !cell.rune.is_control() {
                    let w = cell.width.min(content_w - x);
                    content[x] = Cell::leader(cell.rune, w, row_flags);
                    for slot in content.iter_mut().skip(x + 1).take(w.saturating_sub(1)) {
                        *slot = Cell::continuation(row_flags);
                    }
                }
                // Tabs and other control runes stay blank across their
                // display width.
                x += cell.display_width;
            }
        }

        if self.focused && current && self.cursor_col >= vp.first_col {
            if let Some(cell) = content.get_mut(self.cursor_col - vp.first_col) {
                cell.flags |= CellFlags::CURSOR | CellFlags::REVERSE;
            }
        }

        cells.extend(content);
        let ctx = RowContext {
            moment: &self.moment,
            line: (line_idx < self.moment.num_lines()).then_some(line_idx),
            row,
            content_start: gutter,
            first_col: vp.first_col,
        };
        for styler in self.stylers.iter() {
            styler.style(&ctx, &mut cells);
        }
        cells
    }

    fn gutter_label(&self, line_idx: usize, current: bool, exists: bool) -> String {
        let w = self.viewport.number_width() + 1;
        if current {
            format!("{:>w$} ", line_idx + 1)
        } else if exists {
            format!("{:<w$} ", line_idx.abs_diff(self.cursor_line))
        } else {
            String::new()
        }
    }
}

/// Place a one-column marker at `idx`, blanking any wide rune it would split.
fn put_marker(content: &mut [Cell], idx: usize, marker: char, row_flags: CellFlags) {
    if !content[idx].is_leader() {
        let mut j = idx;
        while j > 0 && !content[j].is_leader() {
            j -= 1;
        }
        for slot in &mut content[j..idx] {
            *slot = Cell::blank(row_flags);
        }
    }
    content[idx] = Cell::leader(marker, 1, CellFlags::MARKER | row_flags);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_state::Loader;
    use core_text::{LayoutConfig, LayoutEnv};

    fn moment(text: &str) -> Arc<Moment> {
        let env = LayoutEnv::new(LayoutConfig {
            tab_width: 4,
            expand_tabs: true,
        })
        .into_shared();
        Loader::new(env).from_bytes(text.as_bytes()).moment
    }

    fn text(cells: &[Cell]) -> String {
        cells
            .iter()
            .filter(|c| c.is_leader())
            .map(|c| c.text.as_str())
            .collect()
    }

    #[test]
    fn gutter_shows_absolute_on_cursor_line_and_relative_elsewhere() {
        let r = TextRowRenderer::new(moment("a\nb\nc\n"), Viewport::new(10, 4)).with_cursor(1, 0);
        // number width 1, gutter 3
        assert_eq!(text(&r.render_row(0)), "1  a      ");
        assert_eq!(text(&r.render_row(1)), " 2 b      ");
        assert_eq!(text(&r.render_row(2)), "1  c      ");
        // past the end: blank gutter and content
        assert_eq!(text(&r.render_row(3)), "          ");
        assert!(r.render_row(1)[0].flags.contains(CellFlags::GUTTER | CellFlags::CURRENT_LINE));
    }

    #[test]
    fn tabs_expand_and_wide_runes_continue() {
        let r = TextRowRenderer::new(moment("\t漢x\n"), Viewport::new(12, 1));
        let row = r.render_row(0);
        assert_eq!(row.len(), 12);
        // gutter 3, tab 4 blanks, 漢 leader + continuation, x
        assert_eq!(row[7].text, "漢");
        assert_eq!(row[8].width, 0);
        assert_eq!(row[9].text, "x");
        assert_eq!(text(&row), " 1     漢x   ");
    }

    #[test]
    fn truncation_markers_on_both_edges() {
        let mut vp = Viewport::new(8, 1);
        vp.first_col = 2;
        let r = TextRowRenderer::new(moment("abcdefghij\n"), vp).with_focus(false);
        let row = r.render_row(0);
        // content width 5: '<' replaces 'c', '>' replaces 'g' in the last column
        assert_eq!(text(&row[3..]), "<def>");
        let row = TextRowRenderer::new(moment("abcdefghij\n"), vp).render_row(0);
        assert_eq!(row[3].text, "<");
        assert!(row[3].flags.contains(CellFlags::MARKER));

        let r = TextRowRenderer::new(moment("abcdefghij\n"), Viewport::new(8, 1));
        let row = r.render_row(0);
        assert_eq!(text(&row[3..]), "abcd>");
        assert!(row[7].flags.contains(CellFlags::MARKER));
    }

    #[test]
    fn exact_fit_line_has_no_overflow_marker() {
        let r = TextRowRenderer::new(moment("abcde\n"), Viewport::new(8, 1)).with_focus(false);
        let row = r.render_row(0);
        assert_eq!(text(&row[3..]), "abcde");
        assert!(!row.iter().any(|c| c.flags.contains(CellFlags::MARKER)));
    }

    #[test]
    fn right_marker_never_splits_a_wide_rune() {
        // content width 5: "abc" then 漢 at columns 3-4, 'd' overflows
        let r = TextRowRenderer::new(moment("abc漢d\n"), Viewport::new(8, 1)).with_focus(false);
        let row = r.render_row(0);
        assert_eq!(text(&row[3..]), "abc >");
        assert_eq!(row.iter().map(|c| c.width as usize).sum::<usize>(), 8);
    }

    #[test]
    fn cursor_cell_is_marked_only_when_focused() {
        let m = moment("hello\n");
        let r = TextRowRenderer::new(m.clone(), Viewport::new(10, 1)).with_cursor(0, 2);
        let row = r.render_row(0);
        assert!(row[3 + 2].flags.contains(CellFlags::CURSOR | CellFlags::REVERSE));
        let row = r.clone().with_focus(false).render_row(0);
        assert!(row.iter().all(|c| !c.flags.contains(CellFlags::CURSOR)));
    }

    #[test]
    fn stylers_see_their_row_only() {
        struct EvenRows;
        impl RowStyler for EvenRows {
            fn style(&self, ctx: &RowContext<'_>, cells: &mut [Cell]) {
                if ctx.line.is_some_and(|l| l % 2 == 0) {
                    for c in &mut cells[ctx.content_start..] {
                        c.flags |= CellFlags::EMPHASIS;
                    }
                }
            }
        }
        let stylers: Arc<[Arc<dyn RowStyler>]> = Arc::from(vec![Arc::new(EvenRows) as Arc<dyn RowStyler>]);
        let r = TextRowRenderer::new(moment("a\nb\n"), Viewport::new(6, 3)).with_stylers(stylers);
        assert!(r.render_row(0)[3].flags.contains(CellFlags::EMPHASIS));
        assert!(!r.render_row(0)[0].flags.contains(CellFlags::EMPHASIS));
        assert!(!r.render_row(1)[3].flags.contains(CellFlags::EMPHASIS));
        assert!(!r.render_row(2)[3].flags.contains(CellFlags::EMPHASIS));
    }
}
