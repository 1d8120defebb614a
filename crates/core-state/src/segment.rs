//! Range-sliceable views over shared line storage with memoized digests.
//!
//! A `Segment` is a window `[start, end)` into an `Arc<[Arc<Line>]>`; cutting
//! a `Segments` list only allocates new `Segment` values at the two cut points
//! and clones the `Arc` of every segment that falls entirely inside the range.
//! Each `Segment` computes its own digest at most once; a cut segment never
//! inherits its parent's digest.

use ahash::RandomState;
use core_text::Line;
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::sync::{Arc, OnceLock};
use tracing::trace;

// Four independently seeded 64-bit lanes make up the 256-bit digest. The seeds are fixed so
// equal content digests equally for the lifetime of the process. Digests are for comparison
// and deduplication only; they are not persisted.
const LANE_SEEDS: [[u64; 4]; 4] = [
    [0x243f_6a88_85a3_08d3, 0x1319_8a2e_0370_7344, 0xa409_3822_299f_31d0, 0x082e_fa98_ec4e_6c89],
    [0x4528_21e6_38d0_1377, 0xbe54_66cf_34e9_0c6c, 0xc0ac_29b7_c97c_50dd, 0x3f84_d5b5_b547_0917],
    [0x9216_d5d9_8979_fb1b, 0xd131_0ba6_98df_b5ac, 0x2ffd_72db_d01a_dfb7, 0xb8e1_afed_6a26_7e96],
    [0xba7c_9045_f12c_7f99, 0x24a1_9947_b391_6cf7, 0x0801_f2e2_858e_fc16, 0x6369_20d8_7157_1c9a],
];

// Content is fed to the lanes in fixed-size blocks so the digest depends only on the concatenated
// bytes, not on where line boundaries fall.
const BLOCK: usize = 256;

/// 256-bit content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

struct DigestWriter {
    lanes: [ahash::AHasher; 4],
    block: [u8; BLOCK],
    filled: usize,
    total: u64,
}

impl DigestWriter {
    fn new() -> Self {
        Self {
            lanes: LANE_SEEDS.map(|[a, b, c, d]| RandomState::with_seeds(a, b, c, d).build_hasher()),
            block: [0; BLOCK],
            filled: 0,
            total: 0,
        }
    }

    fn write(&mut self, mut bytes: &[u8]) {
        self.total += bytes.len() as u64;
        while !bytes.is_empty() {
            let take = (BLOCK - self.filled).min(bytes.len());
            self.block[self.filled..self.filled + take].copy_from_slice(&bytes[..take]);
            self.filled += take;
            bytes = &bytes[take..];
            if self.filled == BLOCK {
                self.flush();
            }
        }
    }

    fn flush(&mut self) {
        for lane in &mut self.lanes {
            lane.write(&self.block[..self.filled]);
        }
        self.filled = 0;
    }

    fn finish(mut self) -> Digest {
        if self.filled > 0 {
            self.flush();
        }
        let mut out = [0u8; 32];
        for (i, lane) in self.lanes.iter_mut().enumerate() {
            lane.write_u64(self.total);
            out[i * 8..(i + 1) * 8].copy_from_slice(&lane.finish().to_le_bytes());
        }
        Digest(out)
    }
}

/// Contiguous run of lines with a lazily computed digest.
pub struct Segment {
    lines: Arc<[Arc<Line>]>,
    start: usize,
    end: usize,
    sum: OnceLock<Digest>,
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("summed", &self.sum.get().is_some())
            .finish()
    }
}

impl Segment {
    pub fn new(lines: Arc<[Arc<Line>]>) -> Self {
        let end = lines.len();
        Self::window(lines, 0, end)
    }

    fn window(lines: Arc<[Arc<Line>]>, start: usize, end: usize) -> Self {
        Self {
            lines,
            start,
            end,
            sum: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn lines(&self) -> &[Arc<Line>] {
        &self.lines[self.start..self.end]
    }

    /// Digest of the concatenated raw content of this segment's lines.
    pub fn sum(&self) -> Digest {
        *self.sum.get_or_init(|| {
            let mut writer = DigestWriter::new();
            for line in self.lines() {
                writer.write(line.content().as_bytes());
            }
            trace!(target: "state.segment", lines = self.len(), size_bytes = writer.total, "segment_summed");
            writer.finish()
        })
    }
}

/// Ordered list of segments forming one virtual range of lines.
#[derive(Debug, Clone, Default)]
pub struct Segments(Vec<Arc<Segment>>);

impl Segments {
    pub fn new(segments: Vec<Arc<Segment>>) -> Self {
        Self(segments)
    }

    pub fn from_lines(lines: Arc<[Arc<Line>]>) -> Self {
        Self(vec![Arc::new(Segment::new(lines))])
    }

    /// Total number of lines across all segments.
    pub fn len(&self) -> usize {
        self.0.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|s| s.is_empty())
    }

    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.0
    }

    pub fn lines(&self) -> impl Iterator<Item = &Arc<Line>> {
        self.0.iter().flat_map(|s| s.lines().iter())
    }

    /// `self` followed by `other`, sharing every segment.
    pub fn concat(&self, other: &Segments) -> Segments {
        let mut out = self.0.clone();
        out.extend(other.0.iter().cloned());
        Segments(out)
    }

    /// Lines `[start, end)` of the virtual range. `end` clamps to `len()`
    /// and `start` to `end`. Segments fully inside the range are shared;
    /// only the segments cut by either bound are re-created.
    pub fn sub(&self, start: usize, end: usize) -> Segments {
        let end = end.min(self.len());
        let start = start.min(end);
        let mut out = Vec::new();
        let mut offset = 0usize;
        for seg in &self.0 {
            if offset >= end {
                break;
            }
            let seg_start = offset;
            let seg_end = offset + seg.len();
            offset = seg_end;
            if seg_end <= start || seg.is_empty() {
                continue;
            }
            let from = start.max(seg_start) - seg_start;
            let to = end.min(seg_end) - seg_start;
            if from == 0 && to == seg.len() {
                out.push(seg.clone());
            } else {
                out.push(Arc::new(Segment::window(
                    seg.lines.clone(),
                    seg.start + from,
                    seg.start + to,
                )));
            }
        }
        Segments(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::LayoutEnv;

    fn storage(lines: &[&str]) -> Arc<[Arc<Line>]> {
        let env = LayoutEnv::default().into_shared();
        lines
            .iter()
            .map(|s| Arc::new(Line::new(*s, env.clone())))
            .collect::<Vec<_>>()
            .into()
    }

    fn text(segs: &Segments) -> String {
        segs.lines().map(|l| l.content()).collect()
    }

    #[test]
    fn sub_clamps_and_keeps_interior_segments() {
        let a = Segments::from_lines(storage(&["1\n", "2\n", "3\n"]));
        let b = Segments::from_lines(storage(&["4\n", "5\n"]));
        let c = Segments::from_lines(storage(&["6\n", "7\n", "8\n"]));
        let all = a.concat(&b).concat(&c);
        assert_eq!(all.len(), 8);

        let mid = all.sub(2, 6);
        assert_eq!(text(&mid), "3\n4\n5\n6\n");
        assert_eq!(mid.segments().len(), 3);
        assert!(Arc::ptr_eq(&mid.segments()[1], &b.segments()[0]));
        assert!(!Arc::ptr_eq(&mid.segments()[0], &a.segments()[0]));

        assert_eq!(all.sub(5, 100).len(), 3);
        assert_eq!(all.sub(7, 3).len(), 0);
        assert!(all.sub(100, 200).is_empty());
    }

    #[test]
    fn full_range_is_content_equal() {
        let segs = Segments::from_lines(storage(&["a\n", "b"]));
        let whole = segs.sub(0, segs.len());
        assert_eq!(text(&whole), text(&segs));
        assert!(Arc::ptr_eq(&whole.segments()[0], &segs.segments()[0]));
    }

    #[test]
    fn equal_content_equal_sum() {
        let x = Segments::from_lines(storage(&["fn main() {\n", "}\n"]));
        let y = Segments::from_lines(storage(&["fn main() {\n", "}\n"]));
        assert_eq!(x.segments()[0].sum(), y.segments()[0].sum());
    }

    #[test]
    fn single_char_edit_changes_sum() {
        let x = Segment::new(storage(&["hello\n", "world\n"]));
        let y = Segment::new(storage(&["hello\n", "wOrld\n"]));
        assert_ne!(x.sum(), y.sum());
    }

    #[test]
    fn sum_depends_on_bytes_not_line_boundaries() {
        let x = Segment::new(storage(&["ab", "c\n"]));
        let y = Segment::new(storage(&["a", "bc\n"]));
        assert_eq!(x.sum(), y.sum());
        let long = "x".repeat(BLOCK * 2 + 17);
        let (p, q) = long.split_at(BLOCK - 3);
        assert_eq!(Segment::new(storage(&[long.as_str()])).sum(), Segment::new(storage(&[p, q])).sum());
    }

    #[test]
    fn cut_segment_has_its_own_sum() {
        let segs = Segments::from_lines(storage(&["a\n", "b\n", "c\n"]));
        let parent = segs.segments()[0].sum();
        let head = segs.sub(0, 1);
        assert_ne!(head.segments()[0].sum(), parent);
        assert_eq!(head.segments()[0].sum(), Segment::new(storage(&["a\n"])).sum());
    }

    #[test]
    fn digest_renders_as_hex() {
        let d = Segment::new(storage(&[""])).sum();
        let hex = d.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
