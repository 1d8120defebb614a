//! Document state: immutable Moments, loading, and segment digests.
//!
//! Versioning:
//! - A `Moment` is one immutable version of a buffer. Edits produce a new
//!   Moment via `Moment::successor`, which links back to its predecessor and
//!   reuses the predecessor's `Arc<Line>` values for unchanged lines.
//! - Ids come from a process-wide atomic counter and strictly increase in
//!   construction order, so they double as a stable sort key for caches keyed
//!   by `(MomentId, line)`.
//! - Whole-buffer views (`content`, `lower_content`, `bytes`) and the syntax
//!   tree are computed lazily behind once-guards. Concurrent first callers
//!   block on the in-flight computation; nothing is ever computed twice.
//!
//! Syntax resources:
//! - The syntax tree is owned by its Moment and released in `Drop`. Because
//!   `Drop` requires exclusive ownership it can never overlap a
//!   `syntax_attr` lookup on another thread. Release failures are logged
//!   under target `syntax` and otherwise ignored.
//!
//! Loading:
//! - `Loader` splits bytes into lines (see `core_text::split_lines` for the
//!   CRLF policy), wraps them in a Moment and, when a worker pool is
//!   attached, submits the lines for background layout. A full queue drops
//!   the batch; layout then happens on first access.
//!
//! Segments:
//! - `Segments` views are cheap to cut and share line storage. Digests are
//!   memoized per `Segment`.

pub mod load;
pub mod moment;
pub mod segment;

pub use load::{FileInfo, LoadError, Loaded, Loader};
pub use moment::{Moment, MomentId, Position};
pub use segment::{Digest, Segment, Segments};
