//! Immutable versioned document snapshots.

use crate::load::FileInfo;
use crate::segment::{Digest, Segment, Segments};
use core_syntax::{Language, SyntaxRegistry, SyntaxTree};
use core_text::Line;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::SystemTime;
use tracing::{debug, trace, warn};

static NEXT_MOMENT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique, strictly increasing snapshot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MomentId(u64);

impl MomentId {
    fn next() -> Self {
        MomentId(NEXT_MOMENT_ID.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MomentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Line index plus rune offset within that line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub cell: usize,
}

/// One immutable version of a buffer.
///
/// Lines are shared (`Arc<Line>`) with predecessors and successors; whole
/// buffer views are built on first request and cached. The syntax tree, when
/// a backend exists for the buffer's language, is parsed on first request
/// and released exactly once when the Moment is dropped.
pub struct Moment {
    id: MomentId,
    created_at: SystemTime,
    previous: Option<Arc<Moment>>,
    lines: Arc<[Arc<Line>]>,
    file_info: Option<FileInfo>,
    language: Language,
    syntax: Option<Arc<SyntaxRegistry>>,

    content: OnceLock<String>,
    lower_content: OnceLock<String>,
    parser: OnceLock<Box<dyn SyntaxTree>>,
    parser_init: Mutex<()>,
    syntax_attrs: OnceLock<DashMap<Position, String, ahash::RandomState>>,
}

impl fmt::Debug for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Moment")
            .field("id", &self.id)
            .field("lines", &self.lines.len())
            .field("language", &self.language)
            .field("previous", &self.previous.as_ref().map(|p| p.id))
            .finish()
    }
}

impl Moment {
    pub fn new(previous: Option<Arc<Moment>>, lines: Vec<Arc<Line>>) -> Self {
        let moment = Self {
            id: MomentId::next(),
            created_at: SystemTime::now(),
            previous,
            lines: lines.into(),
            file_info: None,
            language: Language::Unknown,
            syntax: None,
            content: OnceLock::new(),
            lower_content: OnceLock::new(),
            parser: OnceLock::new(),
            parser_init: Mutex::new(()),
            syntax_attrs: OnceLock::new(),
        };
        debug!(
            target: "state.moment",
            moment = %moment.id,
            previous = ?moment.previous.as_ref().map(|p| p.id.get()),
            lines = moment.lines.len(),
            "moment_created"
        );
        moment
    }

    /// Next version of `prev`. Unchanged lines should be passed as clones of
    /// `prev`'s `Arc<Line>` so storage (and segment digests) stay shared.
    /// Language and syntax registry carry over; the file fingerprint does not,
    /// since the new content has not been synced to disk.
    pub fn successor(prev: &Arc<Moment>, lines: Vec<Arc<Line>>) -> Self {
        let mut next = Self::new(Some(prev.clone()), lines);
        next.language = prev.language;
        next.syntax = prev.syntax.clone();
        next
    }

    pub fn with_file_info(mut self, info: FileInfo) -> Self {
        self.file_info = Some(info);
        self
    }

    pub fn with_syntax(mut self, language: Language, registry: Arc<SyntaxRegistry>) -> Self {
        self.language = language;
        self.syntax = Some(registry);
        self
    }

    pub fn id(&self) -> MomentId {
        self.id
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn previous(&self) -> Option<&Arc<Moment>> {
        self.previous.as_ref()
    }

    pub fn file_info(&self) -> Option<&FileInfo> {
        self.file_info.as_ref()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// This Moment followed by its predecessors, newest first.
    pub fn history(&self) -> impl Iterator<Item = &Moment> {
        std::iter::successors(Some(self), |m| m.previous.as_deref())
    }

    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }

    /// Line `i` with its layout computed, or `None` when out of range.
    pub fn line(&self, i: usize) -> Option<&Arc<Line>> {
        let line = self.lines.get(i)?;
        line.init();
        Some(line)
    }

    /// All lines without forcing layout.
    pub fn lines(&self) -> &[Arc<Line>] {
        &self.lines
    }

    pub fn content(&self) -> &str {
        self.content.get_or_init(|| {
            let mut out = String::with_capacity(self.lines.iter().map(|l| l.content().len()).sum());
            for line in self.lines.iter() {
                out.push_str(line.content());
            }
            trace!(target: "state.moment", moment = %self.id, size_bytes = out.len(), "content_built");
            out
        })
    }

    pub fn lower_content(&self) -> &str {
        self.lower_content.get_or_init(|| self.content().to_lowercase())
    }

    /// UTF-8 bytes of the concatenated content.
    pub fn bytes(&self) -> &[u8] {
        self.content().as_bytes()
    }

    /// Whole-document segment list, sharing line storage with this Moment.
    pub fn segments(&self) -> Segments {
        Segments::from_lines(self.lines.clone())
    }

    /// Digest of the whole document, equal to the sum of its single segment.
    pub fn sum(&self) -> Digest {
        Segment::new(self.lines.clone()).sum()
    }

    /// Syntax tree for this buffer, parsed at most once. `None` when the
    /// language is unknown, no backend is registered, or parsing failed; none
    /// of those outcomes is cached.
    pub fn parser(&self) -> Option<&dyn SyntaxTree> {
        if let Some(tree) = self.parser.get() {
            return Some(tree.as_ref());
        }
        let backend = self.syntax.as_ref()?.resolve(self.language)?;
        let _guard = self.parser_init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tree) = self.parser.get() {
            return Some(tree.as_ref());
        }
        match backend.parse(self.content()) {
            Ok(tree) => Some(self.parser.get_or_init(|| tree).as_ref()),
            Err(err) => {
                warn!(
                    target: "syntax",
                    moment = %self.id,
                    language = %self.language,
                    error = %err,
                    "parse_failed"
                );
                None
            }
        }
    }

    /// Kind of the syntax node at `(line, rune_offset)`, memoized per
    /// position. Empty when no parser is available or the line is out of
    /// range.
    pub fn syntax_attr(&self, line: usize, rune_offset: usize) -> String {
        let key = Position {
            line,
            cell: rune_offset,
        };
        let attrs = self
            .syntax_attrs
            .get_or_init(|| DashMap::with_hasher(ahash::RandomState::new()));
        if let Some(attr) = attrs.get(&key) {
            return attr.clone();
        }
        let Some(target) = self.lines.get(line) else {
            return String::new();
        };
        let Some(tree) = self.parser() else {
            return String::new();
        };
        let column = target.byte_offset_of_rune(rune_offset);
        let attr = tree.node_kind_at(line, column).unwrap_or_default();
        attrs.insert(key, attr.clone());
        attr
    }

    /// Map a byte offset into the concatenated content to a position. Offsets
    /// past the end clamp to the end of the last line.
    pub fn byte_offset_to_position(&self, offset: usize) -> Position {
        let mut remaining = offset;
        for (i, line) in self.lines.iter().enumerate() {
            let len = line.content().len();
            if remaining < len {
                let cell = line
                    .cells()
                    .iter()
                    .find(|c| remaining < c.byte_offset + c.len)
                    .map(|c| c.rune_offset)
                    .unwrap_or(0);
                return Position { line: i, cell };
            }
            remaining -= len;
        }
        match self.lines.last() {
            Some(last) => Position {
                line: self.lines.len() - 1,
                cell: last.runes().len(),
            },
            None => Position::default(),
        }
    }

    /// Indentation for a line inserted between `up` and `down`: the nearest
    /// non-blank line scanning upward from `up` and downward from `down`; the
    /// upward indent is used only when strictly deeper.
    pub fn adjacent_indent(&self, up: Option<usize>, down: usize) -> String {
        let upward = up.and_then(|start| {
            (0..=start.min(self.lines.len().saturating_sub(1)))
                .rev()
                .filter(|&i| i < self.lines.len())
                .find_map(|i| self.non_blank(i))
        });
        let downward = (down..self.lines.len()).find_map(|i| self.non_blank(i));

        let depth = |l: Option<&Arc<Line>>| l.and_then(|l| l.non_space_display_offset()).unwrap_or(0);
        if depth(upward) > depth(downward) {
            upward.map(|l| l.indent()).unwrap_or_default()
        } else {
            downward.map(|l| l.indent()).unwrap_or_default()
        }
    }

    fn non_blank(&self, i: usize) -> Option<&Arc<Line>> {
        self.line(i).filter(|l| l.non_space_display_offset().is_some())
    }
}

impl Drop for Moment {
    fn drop(&mut self) {
        // History is unlinked iteratively. A predecessor still shared
        // elsewhere stays alive with its own chain intact.
        let mut next = self.previous.take();
        while let Some(mut older) = next.and_then(Arc::into_inner) {
            next = older.previous.take();
        }
        if let Some(mut tree) = self.parser.take() {
            match tree.release() {
                Ok(()) => trace!(target: "syntax", moment = %self.id, "parser_released"),
                Err(err) => warn!(
                    target: "syntax",
                    moment = %self.id,
                    error = %err,
                    "parser_release_failed"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_syntax::{SyntaxBackend, SyntaxError};
    use core_text::LayoutEnv;
    use std::sync::atomic::AtomicUsize;

    fn moment(lines: &[&str]) -> Moment {
        let env = LayoutEnv::default().into_shared();
        Moment::new(
            None,
            lines.iter().map(|s| Arc::new(Line::new(*s, env.clone()))).collect(),
        )
    }

    #[derive(Default)]
    struct Counts {
        parses: AtomicUsize,
        releases: AtomicUsize,
        queries: AtomicUsize,
    }

    struct CountingBackend(Arc<Counts>, bool);

    struct CountingTree(Arc<Counts>, bool);

    impl SyntaxTree for CountingTree {
        fn node_kind_at(&self, row: usize, byte_column: usize) -> Option<String> {
            self.0.queries.fetch_add(1, Ordering::SeqCst);
            Some(format!("{row}:{byte_column}"))
        }
        fn release(&mut self) -> Result<(), SyntaxError> {
            self.0.releases.fetch_add(1, Ordering::SeqCst);
            if self.1 {
                Err(SyntaxError::AlreadyReleased)
            } else {
                Ok(())
            }
        }
    }

    impl SyntaxBackend for CountingBackend {
        fn language(&self) -> Language {
            Language::Rust
        }
        fn parse(&self, _source: &str) -> Result<Box<dyn SyntaxTree>, SyntaxError> {
            self.0.parses.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingTree(self.0.clone(), self.1)))
        }
    }

    fn registry(counts: &Arc<Counts>, fail_release: bool) -> Arc<SyntaxRegistry> {
        let mut reg = SyntaxRegistry::new();
        reg.register(Arc::new(CountingBackend(counts.clone(), fail_release)));
        Arc::new(reg)
    }

    #[test]
    fn ids_strictly_increase() {
        let a = moment(&[""]);
        let b = moment(&[""]);
        let c = Moment::successor(&Arc::new(moment(&[""])), Vec::new());
        assert!(a.id() < b.id());
        assert!(b.id() < c.id());
    }

    #[test]
    fn content_views_are_cached() {
        let m = moment(&["Hello\n", "WORLD"]);
        let first = m.content() as *const str;
        assert_eq!(m.content(), "Hello\nWORLD");
        assert_eq!(m.content() as *const str, first);
        assert_eq!(m.lower_content(), "hello\nworld");
        assert_eq!(m.bytes(), b"Hello\nWORLD");
    }

    #[test]
    fn whole_sum_matches_segment_sum() {
        let m = moment(&["a\n", "b\n"]);
        assert_eq!(m.sum(), m.segments().segments()[0].sum());
        assert_eq!(m.sum(), moment(&["a\nb", "\n"]).sum());
    }

    #[test]
    fn dropping_newest_keeps_shared_predecessors_linked() {
        let first = Arc::new(moment(&["a\n"]));
        let second = Arc::new(Moment::successor(&first, Vec::new()));
        let third = Moment::successor(&second, Vec::new());
        let first_id = first.id();
        drop(first);
        drop(third);
        assert_eq!(second.previous().map(|p| p.id()), Some(first_id));
        assert_eq!(second.history().count(), 2);
    }

    #[test]
    fn content_computed_once_across_threads() {
        let m = Arc::new(moment(&["a\n", "b\n", "c"]));
        let ptrs: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let m = m.clone();
                    s.spawn(move || m.content().as_ptr() as usize)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(ptrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn line_out_of_range_is_none() {
        let m = moment(&["x"]);
        assert!(m.line(0).unwrap().is_initialized());
        assert!(m.line(1).is_none());
    }

    #[test]
    fn unknown_language_has_no_parser() {
        let counts = Arc::new(Counts::default());
        let m = moment(&["fn x() {}"]).with_syntax(Language::Unknown, registry(&counts, false));
        assert!(m.parser().is_none());
        assert_eq!(m.syntax_attr(0, 0), "");
        assert_eq!(counts.parses.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn syntax_attr_is_memoized_and_uses_byte_columns() {
        let counts = Arc::new(Counts::default());
        let m = moment(&["é = 1\n", "x\n"]).with_syntax(Language::Rust, registry(&counts, false));
        // rune 1 follows the two-byte 'é'
        assert_eq!(m.syntax_attr(0, 1), "0:2");
        assert_eq!(m.syntax_attr(0, 1), "0:2");
        assert_eq!(counts.queries.load(Ordering::SeqCst), 1);
        assert_eq!(m.syntax_attr(9, 0), "");
        drop(m);
        assert_eq!(counts.parses.load(Ordering::SeqCst), 1);
        assert_eq!(counts.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn parser_parsed_once_under_contention() {
        let counts = Arc::new(Counts::default());
        let m = Arc::new(moment(&["fn a() {}\n"]).with_syntax(Language::Rust, registry(&counts, false)));
        std::thread::scope(|s| {
            for _ in 0..8 {
                let m = m.clone();
                s.spawn(move || {
                    assert!(m.parser().is_some());
                });
            }
        });
        assert_eq!(counts.parses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_failure_is_swallowed() {
        let counts = Arc::new(Counts::default());
        let m = moment(&["x"]).with_syntax(Language::Rust, registry(&counts, true));
        assert!(m.parser().is_some());
        drop(m);
        assert_eq!(counts.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn never_parsed_is_never_released() {
        let counts = Arc::new(Counts::default());
        drop(moment(&["x"]).with_syntax(Language::Rust, registry(&counts, false)));
        assert_eq!(counts.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn byte_offsets_map_to_positions() {
        let m = moment(&["ab\n", "漢c\n", "z"]);
        assert_eq!(m.byte_offset_to_position(0), Position { line: 0, cell: 0 });
        assert_eq!(m.byte_offset_to_position(2), Position { line: 0, cell: 2 });
        assert_eq!(m.byte_offset_to_position(3), Position { line: 1, cell: 0 });
        // inside the three-byte rune
        assert_eq!(m.byte_offset_to_position(4), Position { line: 1, cell: 0 });
        assert_eq!(m.byte_offset_to_position(6), Position { line: 1, cell: 1 });
        assert_eq!(m.byte_offset_to_position(8), Position { line: 2, cell: 0 });
        assert_eq!(m.byte_offset_to_position(999), Position { line: 2, cell: 1 });
    }

    #[test]
    fn successor_shares_lines_and_links_history() {
        let first = Arc::new(moment(&["a\n", "b\n"]));
        let mut lines = first.lines().to_vec();
        lines.push(Arc::new(Line::new("c", first.lines()[0].env().clone())));
        let second = Moment::successor(&first, lines);
        assert!(Arc::ptr_eq(&first.lines()[0], &second.lines()[0]));
        let ids: Vec<MomentId> = second.history().map(|m| m.id()).collect();
        assert_eq!(ids, vec![second.id(), first.id()]);
        assert!(second.file_info().is_none());
    }

    #[test]
    fn adjacent_indent_prefers_strictly_deeper_upward() {
        let m = moment(&["fn a() {\n", "    let x;\n", "\n", "  }\n"]);
        assert_eq!(m.adjacent_indent(Some(2), 3), "    ");
        let m = moment(&["  a\n", "  b\n"]);
        assert_eq!(m.adjacent_indent(Some(0), 1), "  ");
        let m = moment(&["x\n", "\t y\n"]);
        assert_eq!(m.adjacent_indent(None, 0), "");
        assert_eq!(m.adjacent_indent(None, 1), "\t ");
        assert_eq!(m.adjacent_indent(Some(7), 9), "\t ");
    }
}
