//! Fingerprint keyed frame cache.
//!
//! One frame is kept per cache (one cache per view). A render call whose
//! fingerprint equals the stored one returns the stored `Arc<Frame>` without
//! recomputing or allocating. Any difference re-renders every row.

use crate::row::TextRowRenderer;
use crate::{Cell, Frame};
use core_state::MomentId;
use core_workers::WorkerPool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, trace};

/// Render-relevant summary of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub moment: MomentId,
    pub width: u16,
    pub height: u16,
    pub focused: bool,
    pub scroll_line: usize,
    pub scroll_col: usize,
    pub cursor_line: usize,
    pub cursor_col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    pub hits: u64,
    pub misses: u64,
    pub last_render_ns: u64,
}

#[derive(Default)]
pub struct RenderCache {
    last: Mutex<Option<(Fingerprint, Arc<Frame>)>>,
    hits: AtomicU64,
    misses: AtomicU64,
    last_render_ns: AtomicU64,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached frame for `fp`, or render `fp.height` rows with
    /// `row` and cache the result. With a pool, rows run as parallel jobs
    /// joined before assembly; without one they run in order on this thread.
    pub fn render<F>(&self, fp: Fingerprint, pool: Option<&WorkerPool>, row: F) -> Arc<Frame>
    where
        F: Fn(u16) -> Vec<Cell> + Send + Sync + 'static,
    {
        if let Some(frame) = self.cached(&fp) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(target: "render.cache", moment = %fp.moment, "frame_reused");
            return frame;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let start = Instant::now();
        let rows: Vec<Vec<Cell>> = match pool {
            Some(pool) => pool.run_rows(fp.height as usize, move |r| row(r as u16)),
            None => (0..fp.height).map(&row).collect(),
        };
        let frame = Arc::new(Frame::from_rows(fp.width, fp.height, rows));
        let elapsed = start.elapsed().as_nanos() as u64;
        self.last_render_ns.store(elapsed, Ordering::Relaxed);
        debug!(
            target: "render.cache",
            moment = %fp.moment,
            width = fp.width,
            height = fp.height,
            parallel = pool.is_some(),
            elapsed_ns = elapsed,
            "frame_rendered"
        );

        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some((fp, frame.clone()));
        frame
    }

    /// Render through a `TextRowRenderer`, keyed by its fingerprint.
    pub fn render_text(&self, renderer: &TextRowRenderer, pool: Option<&WorkerPool>) -> Arc<Frame> {
        let renderer = renderer.clone();
        self.render(renderer.fingerprint(), pool, move |row| renderer.render_row(row))
    }

    /// Drop the cached frame so the next render recomputes.
    pub fn invalidate(&self) {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn stats(&self) -> RenderStats {
        RenderStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            last_render_ns: self.last_render_ns.load(Ordering::Relaxed),
        }
    }

    fn cached(&self, fp: &Fingerprint) -> Option<Arc<Frame>> {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match &*last {
            Some((cached, frame)) if cached == fp => Some(frame.clone()),
            _ => None,
        }
    }
}
