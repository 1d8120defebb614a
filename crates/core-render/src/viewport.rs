//! Visible window into a Moment.
//!
//! * `first_line` / `first_col` are the scroll position (buffer line index and
//!   display column of the leftmost content column).
//! * `width` / `height` are the full view size including the gutter.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    pub first_line: usize,
    pub first_col: usize,
    pub width: u16,
    pub height: u16,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            first_line: 0,
            first_col: 0,
            width,
            height,
        }
    }

    /// Digits needed for the widest line number shown in this window.
    pub fn number_width(&self) -> usize {
        let digits = |n: usize| n.checked_ilog10().map_or(1, |d| d as usize + 1);
        digits(self.first_line).max(digits(self.first_line + self.height as usize))
    }

    /// Gutter columns: numbers plus one padding column on each side of the
    /// right-aligned current line number.
    pub fn gutter_width(&self) -> u16 {
        (self.number_width() + 2).min(self.width as usize) as u16
    }

    pub fn content_width(&self) -> usize {
        (self.width - self.gutter_width()) as usize
    }

    /// Scroll the least amount needed to bring the cursor into view.
    pub fn follow_cursor(&mut self, cursor_line: usize, cursor_col: usize) {
        let height = self.height.max(1) as usize;
        if cursor_line < self.first_line {
            self.first_line = cursor_line;
        } else if cursor_line >= self.first_line + height {
            self.first_line = cursor_line + 1 - height;
        }
        let width = self.content_width().max(1);
        if cursor_col < self.first_col {
            self.first_col = cursor_col;
        } else if cursor_col >= self.first_col + width {
            self.first_col = cursor_col + 1 - width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gutter_grows_with_line_numbers() {
        let mut vp = Viewport::new(40, 10);
        assert_eq!(vp.number_width(), 2);
        assert_eq!(vp.gutter_width(), 4);
        vp.first_line = 995;
        assert_eq!(vp.number_width(), 4);
        assert_eq!(vp.content_width(), 34);
    }

    #[test]
    fn follow_cursor_scrolls_minimally() {
        let mut vp = Viewport::new(20, 5);
        vp.follow_cursor(7, 0);
        assert_eq!(vp.first_line, 3);
        vp.follow_cursor(4, 0);
        assert_eq!(vp.first_line, 3);
        vp.follow_cursor(1, 0);
        assert_eq!(vp.first_line, 1);
        // content width 20 - 3 = 17
        vp.follow_cursor(1, 30);
        assert_eq!(vp.first_col, 14);
        vp.follow_cursor(1, 2);
        assert_eq!(vp.first_col, 2);
    }
}
