//! Plain-text preview of the first rows of a Moment.
//!
//! Each previewer owns one render cache (one view). Hint changes are not part
//! of the frame fingerprint, so `on_event` drops the cached frame whenever a
//! render is requested.

use crate::lint::LintGutter;
use core_events::Event;
use core_hints::HintCache;
use core_render::{CellFlags, Frame, RenderCache, RenderStats, RowStyler, TextRowRenderer, Viewport};
use core_state::Moment;
use core_workers::WorkerPool;
use std::sync::Arc;
use tracing::trace;

pub struct Previewer {
    cache: RenderCache,
    stylers: Arc<[Arc<dyn RowStyler>]>,
    width: u16,
    height: u16,
    cursor: usize,
}

impl Previewer {
    pub fn new(hints: Arc<HintCache>, width: u16, height: u16) -> Self {
        Self {
            cache: RenderCache::new(),
            stylers: Arc::from(vec![Arc::new(LintGutter::new(hints)) as Arc<dyn RowStyler>]),
            width,
            height,
            cursor: 0,
        }
    }

    /// Place the cursor on line `line`; the window scrolls just enough to
    /// show it.
    pub fn with_cursor(mut self, line: usize) -> Self {
        self.cursor = line;
        self
    }

    pub fn on_event(&self, event: &Event) {
        if matches!(event, Event::RenderRequested | Event::HintsChanged { .. }) {
            trace!(target: "render.preview", ?event, "frame_invalidated");
            self.cache.invalidate();
        }
    }

    pub fn frame(&self, moment: &Arc<Moment>, pool: Option<&WorkerPool>) -> Arc<Frame> {
        let mut viewport = Viewport::new(self.width, self.height);
        viewport.follow_cursor(self.cursor, 0);
        let renderer = TextRowRenderer::new(moment.clone(), viewport)
            .with_cursor(self.cursor, 0)
            .with_focus(false)
            .with_stylers(self.stylers.clone());
        self.cache.render_text(&renderer, pool)
    }

    /// Rendered rows as text, prefixed with `*` when the row's line is hinted.
    pub fn lines(&self, moment: &Arc<Moment>, pool: Option<&WorkerPool>) -> Vec<String> {
        let frame = self.frame(moment, pool);
        (0..frame.height)
            .map(|y| {
                let hinted = frame
                    .cell(0, y)
                    .is_some_and(|c| c.flags.contains(CellFlags::EMPHASIS));
                let mark = if hinted { '*' } else { ' ' };
                format!("{mark}{}", frame.row_text(y).trim_end())
            })
            .collect()
    }

    pub fn stats(&self) -> RenderStats {
        self.cache.stats()
    }
}
