//! Pieces of the `quire` command that are worth testing on their own: per-file
//! reports, the line lint hint provider and the preview renderer.

pub mod lint;
pub mod preview;
pub mod report;

pub use lint::{LineLint, LintGutter};
pub use preview::Previewer;
pub use report::FileReport;
