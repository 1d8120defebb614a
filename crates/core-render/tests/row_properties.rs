//! Property-based tests for the text row renderer.

use core_render::{Cell, RenderCache, TextRowRenderer, Viewport};
use core_state::Loader;
use core_text::LayoutEnv;
use proptest::prelude::*;

fn content_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z \t漢é😀]{0,30}\n", 1..12).prop_map(|v| v.concat())
}

fn columns(row: &[Cell]) -> usize {
    row.iter().map(|c| c.width as usize).sum()
}

proptest! {
    // Every row is exactly `width` cells wide, and leader widths plus
    // continuations cover exactly `width` columns.
    #[test]
    fn rows_are_exactly_view_width(
        text in content_strategy(),
        width in 6u16..50,
        height in 1u16..12,
        first_line in 0usize..8,
        first_col in 0usize..20,
        cursor_line in 0usize..12,
        cursor_col in 0usize..40,
    ) {
        let moment = Loader::new(LayoutEnv::default().into_shared()).from_bytes(text.as_bytes()).moment;
        let mut vp = Viewport::new(width, height);
        vp.first_line = first_line;
        vp.first_col = first_col;
        let r = TextRowRenderer::new(moment, vp).with_cursor(cursor_line, cursor_col);
        for row in 0..height {
            let cells = r.render_row(row);
            prop_assert_eq!(cells.len(), width as usize);
            prop_assert_eq!(columns(&cells), width as usize);
        }
    }

    // The cached frame matches a direct render row for row.
    #[test]
    fn cached_frame_matches_direct_rows(text in content_strategy(), width in 6u16..40, height in 1u16..10) {
        let moment = Loader::new(LayoutEnv::default().into_shared()).from_bytes(text.as_bytes()).moment;
        let r = TextRowRenderer::new(moment, Viewport::new(width, height));
        let cache = RenderCache::new();
        let frame = cache.render_text(&r, None);
        for row in 0..height {
            let direct = r.render_row(row);
            prop_assert_eq!(frame.row(row), direct.as_slice());
        }
        let again = cache.render_text(&r, None);
        prop_assert!(std::sync::Arc::ptr_eq(&frame, &again));
    }
}
