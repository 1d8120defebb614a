//! Text primitives: rune widths, per-line layout and line splitting.
//!
//! Everything here is a leaf: no knowledge of Moments, segments or caches.
//! Widths are rune based (one `Cell` per Unicode scalar value); grapheme
//! clustering is left to the renderer.

pub mod line;
pub mod split;
pub mod width;

pub use line::{Cell, LayoutEnv, Line, LineLayout, LineObserver};
pub use split::{Linebreak, SplitLines, split_lines};
pub use width::{RuneWidthCache, display_width, right_pad, rune_width};

// Re-exported so downstream crates can build a `LayoutEnv` without a direct config dependency.
pub use core_config::LayoutConfig;
