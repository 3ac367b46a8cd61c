//! Read-only queries: spans, content accessors, searches.
//!
//! Query ranges are lenient: unbounded sides default to the span and a
//! reversed range clamps to empty, unlike the mutation side which rejects
//! reversed ranges outright.

use std::ops::RangeBounds;

use crate::error::{MemError, Result};
use crate::{Addr, Memory};

impl Memory {
    /// The inclusive start of the span: the lower trim bound if set, else
    /// the first stored address (zero when empty).
    pub fn start(&self) -> Addr {
        match self.trim_start() {
            Some(t) => t,
            None => self.rack().start().unwrap_or(0),
        }
    }

    /// The exclusive end of the span: the upper trim bound if set, else
    /// one past the last stored address (`start()` when empty).
    pub fn endex(&self) -> Addr {
        match self.trim_endex() {
            Some(t) => t,
            None => self.rack().endex().unwrap_or_else(|| self.start()),
        }
    }

    /// The inclusive end of the span. Saturates at zero for an empty span.
    pub fn endin(&self) -> Addr {
        self.endex().saturating_sub(1)
    }

    /// `(start, endex)`.
    pub fn span(&self) -> (Addr, Addr) {
        (self.start(), self.endex())
    }

    /// The first stored address; `start()` when empty.
    pub fn content_start(&self) -> Addr {
        self.rack().start().unwrap_or_else(|| self.start())
    }

    /// One past the last stored address; `start()` when empty.
    pub fn content_endex(&self) -> Addr {
        self.rack().endex().unwrap_or_else(|| self.start())
    }

    /// The last stored address. Saturates at zero when empty.
    pub fn content_endin(&self) -> Addr {
        self.content_endex().saturating_sub(1)
    }

    /// `(content_start, content_endex)`.
    pub fn content_span(&self) -> (Addr, Addr) {
        (self.content_start(), self.content_endex())
    }

    /// The number of stored bytes.
    pub fn content_size(&self) -> u64 {
        self.rack().iter().map(|b| b.len() as u64).sum()
    }

    /// The number of blocks.
    pub fn content_parts(&self) -> usize {
        self.rack().len()
    }

    /// Whether the stored content covers the whole span without gaps.
    ///
    /// An empty memory is contiguous when its span is empty too (no trim
    /// bounds, or equal ones).
    pub fn contiguous(&self) -> bool {
        let (start, endex) = self.span();
        let runs = self.intervals(..);
        match runs.len() {
            0 => start >= endex,
            1 => runs[0] == (start, endex),
            _ => false,
        }
    }

    /// The stored byte at `addr`, or `None` for emptiness.
    pub fn peek(&self, addr: Addr) -> Option<u8> {
        let i = self.rack().index_at(addr)?;
        let b = self.rack().get(i).unwrap();
        Some(b.as_slice()[(addr - b.start()) as usize])
    }

    /// The first address in `range` where `needle` occurs, or `None`.
    ///
    /// Matches never span a gap between blocks.
    pub fn find<R: RangeBounds<Addr>>(&self, needle: &[u8], range: R) -> Option<Addr> {
        let (s, e) = self.query_span(range);
        if s >= e || needle.is_empty() {
            return None;
        }
        let lo = self.rack().index_start(s);
        let hi = self.rack().index_endex(e);
        for i in lo..hi {
            let b = self.rack().get(i).unwrap();
            let (off_lo, off_hi) = b.bound_offsets(s, e);
            if let Some(off) = b.buf().find(needle, off_lo, off_hi) {
                return Some(b.start() + off as u64);
            }
        }
        None
    }

    /// The last address in `range` where `needle` occurs, or `None`.
    pub fn rfind<R: RangeBounds<Addr>>(&self, needle: &[u8], range: R) -> Option<Addr> {
        let (s, e) = self.query_span(range);
        if s >= e || needle.is_empty() {
            return None;
        }
        let lo = self.rack().index_start(s);
        let hi = self.rack().index_endex(e);
        for i in (lo..hi).rev() {
            let b = self.rack().get(i).unwrap();
            let (off_lo, off_hi) = b.bound_offsets(s, e);
            if let Some(off) = b.buf().rfind(needle, off_lo, off_hi) {
                return Some(b.start() + off as u64);
            }
        }
        None
    }

    /// Like [Memory::find], but absence is a [MemError::NotFound] error.
    pub fn index<R: RangeBounds<Addr>>(&self, needle: &[u8], range: R) -> Result<Addr> {
        self.find(needle, range).ok_or(MemError::NotFound)
    }

    /// Like [Memory::rfind], but absence is a [MemError::NotFound] error.
    pub fn rindex<R: RangeBounds<Addr>>(&self, needle: &[u8], range: R) -> Result<Addr> {
        self.rfind(needle, range).ok_or(MemError::NotFound)
    }

    /// Count non-overlapping occurrences of `needle` within `range`.
    pub fn count<R: RangeBounds<Addr>>(&self, needle: &[u8], range: R) -> usize {
        let (s, e) = self.query_span(range);
        if s >= e || needle.is_empty() {
            return 0;
        }
        let lo = self.rack().index_start(s);
        let hi = self.rack().index_endex(e);
        (lo..hi)
            .map(|i| {
                let b = self.rack().get(i).unwrap();
                let (off_lo, off_hi) = b.bound_offsets(s, e);
                b.buf().count(needle, off_lo, off_hi)
            })
            .sum()
    }

    /// Whether `needle` occurs anywhere in the stored content.
    pub fn contains(&self, needle: &[u8]) -> bool {
        self.find(needle, ..).is_some()
    }

    /// The populated intervals intersecting `range`, with touching blocks
    /// merged into one interval.
    pub fn intervals<R: RangeBounds<Addr>>(&self, range: R) -> Vec<(Addr, Addr)> {
        let (s, e) = self.query_span(range);
        let mut out: Vec<(Addr, Addr)> = Vec::new();
        if s >= e {
            return out;
        }
        let lo = self.rack().index_start(s);
        let hi = self.rack().index_endex(e);
        for b in self.rack().range(lo..hi) {
            let bs = b.start().max(s);
            let be = b.endex().min(e);
            if bs >= be {
                continue;
            }
            if let Some(last) = out.last_mut() {
                if last.1 == bs {
                    last.1 = be;
                    continue;
                }
            }
            out.push((bs, be));
        }
        out
    }

    /// The unpopulated intervals of `range`.
    ///
    /// With `bound` set, gaps are clamped to the resolved range and carry
    /// concrete endpoints. Without it, a gap reaching past the outermost
    /// content on an unbounded side is open there (`None`).
    pub fn gaps<R: RangeBounds<Addr>>(
        &self,
        range: R,
        bound: bool,
    ) -> Vec<(Option<Addr>, Option<Addr>)> {
        let open_start =
            matches!(range.start_bound(), std::ops::Bound::Unbounded) && !bound;
        let open_end = matches!(range.end_bound(), std::ops::Bound::Unbounded) && !bound;
        let (s, e) = self.query_span(range);
        let mut out: Vec<(Option<Addr>, Option<Addr>)> = Vec::new();
        let runs = self.intervals(s..e.max(s));
        if runs.is_empty() {
            match (open_start, open_end) {
                (true, true) => out.push((None, None)),
                (true, false) => {
                    if e > 0 || s < e {
                        out.push((None, Some(e)));
                    }
                }
                (false, true) => out.push((Some(s), None)),
                (false, false) => {
                    if s < e {
                        out.push((Some(s), Some(e)));
                    }
                }
            }
            return out;
        }
        if open_start {
            out.push((None, Some(runs[0].0)));
        } else if s < runs[0].0 {
            out.push((Some(s), Some(runs[0].0)));
        }
        for w in runs.windows(2) {
            out.push((Some(w[0].1), Some(w[1].0)));
        }
        let last_end = runs[runs.len() - 1].1;
        if open_end {
            out.push((Some(last_end), None));
        } else if last_end < e {
            out.push((Some(last_end), Some(e)));
        }
        out
    }

    /// The maximal run of identical bytes around `addr` within its block,
    /// as `(start, endex, value)`.
    ///
    /// For an address in a gap this is the gap's hull instead, with `None`
    /// value and open sides where no block bounds the gap.
    pub fn equal_span(&self, addr: Addr) -> (Option<Addr>, Option<Addr>, Option<u8>) {
        match self.rack().index_at(addr) {
            Some(i) => {
                let b = self.rack().get(i).unwrap();
                let s = b.as_slice();
                let off = (addr - b.start()) as usize;
                let v = s[off];
                let mut lo = off;
                while lo > 0 && s[lo - 1] == v {
                    lo -= 1;
                }
                let mut hi = off + 1;
                while hi < s.len() && s[hi] == v {
                    hi += 1;
                }
                (
                    Some(b.start() + lo as u64),
                    Some(b.start() + hi as u64),
                    Some(v),
                )
            }
            None => self.gap_hull(addr),
        }
    }

    /// The extent of the block containing `addr`, as
    /// `(start, endex, value-at-addr)`; for a gap, the gap's hull with
    /// `None` value.
    pub fn block_span(&self, addr: Addr) -> (Option<Addr>, Option<Addr>, Option<u8>) {
        match self.rack().index_at(addr) {
            Some(i) => {
                let b = self.rack().get(i).unwrap();
                let v = b.as_slice()[(addr - b.start()) as usize];
                (Some(b.start()), Some(b.endex()), Some(v))
            }
            None => self.gap_hull(addr),
        }
    }

    fn gap_hull(&self, addr: Addr) -> (Option<Addr>, Option<Addr>, Option<u8>) {
        let i = self.rack().index_start(addr);
        let lo = if i > 0 {
            Some(self.rack().get(i - 1).unwrap().endex())
        } else {
            None
        };
        let hi = self.rack().get(i).map(|b| b.start());
        (lo, hi, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(blocks: &[(Addr, &[u8])]) -> Memory {
        Memory::from_blocks(blocks.iter().map(|&(a, d)| (a, d))).unwrap()
    }

    #[test]
    fn spans_of_an_empty_memory() {
        let m = Memory::new();
        assert_eq!(m.span(), (0, 0));
        assert_eq!(m.content_span(), (0, 0));
        assert_eq!(m.content_size(), 0);
        assert_eq!(m.content_parts(), 0);
        let t = Memory::with_trim(Some(4), Some(9));
        assert_eq!(t.span(), (4, 9));
        assert_eq!(t.endin(), 8);
        assert_eq!(t.content_span(), (4, 4));
    }

    #[test]
    fn spans_follow_content_and_trim_bounds() {
        let mut m = mem(&[(3, b"AB"), (7, b"CD")]);
        assert_eq!(m.span(), (3, 9));
        assert_eq!(m.content_span(), (3, 9));
        assert_eq!(m.content_size(), 4);
        assert_eq!(m.content_parts(), 2);
        assert_eq!(m.content_endin(), 8);
        m.set_trim_span(Some(0), Some(20)).unwrap();
        assert_eq!(m.span(), (0, 20));
        assert_eq!(m.content_span(), (3, 9));
    }

    #[test]
    fn peek_matches_block_membership() {
        let m = mem(&[(1, b"AB"), (5, b"C")]);
        assert_eq!(m.peek(0), None);
        assert_eq!(m.peek(1), Some(b'A'));
        assert_eq!(m.peek(2), Some(b'B'));
        assert_eq!(m.peek(3), None);
        assert_eq!(m.peek(5), Some(b'C'));
        assert_eq!(m.peek(6), None);
    }

    #[test]
    fn contiguity() {
        assert!(Memory::new().contiguous());
        assert!(mem(&[(3, b"ABC")]).contiguous());
        assert!(!mem(&[(3, b"AB"), (6, b"C")]).contiguous());
        // Touching blocks form one contiguous run.
        assert!(mem(&[(3, b"AB"), (5, b"C")]).contiguous());
        let mut bounded = mem(&[(3, b"ABC")]);
        bounded.set_trim_span(Some(3), Some(6)).unwrap();
        assert!(bounded.contiguous());
        bounded.set_trim_span(Some(2), Some(6)).unwrap();
        assert!(!bounded.contiguous());
        let mut empty = Memory::with_trim(Some(2), Some(5));
        assert!(!empty.contiguous());
        empty.set_trim_span(Some(2), Some(2)).unwrap();
        assert!(empty.contiguous());
    }

    #[test]
    fn find_and_rfind_walk_blocks() {
        let m = mem(&[(0, b"abca"), (10, b"abc")]);
        assert_eq!(m.find(b"bc", ..), Some(1));
        assert_eq!(m.rfind(b"bc", ..), Some(11));
        assert_eq!(m.find(b"bc", 2..), Some(11));
        assert_eq!(m.rfind(b"bc", ..4), Some(1));
        assert_eq!(m.find(b"zz", ..), None);
        assert_eq!(m.index(b"bc", ..).unwrap(), 1);
        assert_eq!(m.index(b"zz", ..), Err(MemError::NotFound));
        assert_eq!(m.rindex(b"bc", ..).unwrap(), 11);
    }

    #[test]
    fn matches_never_span_gaps() {
        let m = mem(&[(0, b"ab"), (2, b"cd")]);
        // The blocks touch, so "bc" does exist when merged; a match is
        // still reported per block only.
        assert_eq!(m.find(b"bc", ..), None);
        let gappy = mem(&[(0, b"ab"), (5, b"cd")]);
        assert_eq!(gappy.find(b"bc", ..), None);
    }

    #[test]
    fn count_sums_over_blocks() {
        let m = mem(&[(0, b"aaa"), (5, b"aa")]);
        assert_eq!(m.count(b"a", ..), 5);
        assert_eq!(m.count(b"aa", ..), 2);
        assert_eq!(m.count(b"a", 1..6), 3);
        assert!(m.contains(b"aa"));
        assert!(!m.contains(b"b"));
    }

    #[test]
    fn intervals_merge_touching_blocks() {
        let m = mem(&[(1, b"AB"), (3, b"C"), (7, b"DE")]);
        assert_eq!(m.intervals(..), vec![(1, 4), (7, 9)]);
        assert_eq!(m.intervals(2..8), vec![(2, 4), (7, 8)]);
        assert_eq!(m.intervals(4..7), vec![]);
        assert_eq!(Memory::new().intervals(..), vec![]);
    }

    #[test]
    fn gaps_bounded_and_open() {
        let m = mem(&[(2, b"AB"), (6, b"C")]);
        assert_eq!(
            m.gaps(0..9, true),
            vec![(Some(0), Some(2)), (Some(4), Some(6)), (Some(7), Some(9))]
        );
        assert_eq!(
            m.gaps(.., false),
            vec![(None, Some(2)), (Some(4), Some(6)), (Some(7), None)]
        );
        assert_eq!(m.gaps(2..4, true), vec![]);
        assert_eq!(Memory::new().gaps(.., false), vec![(None, None)]);
        assert_eq!(
            Memory::new().gaps(3..5, true),
            vec![(Some(3), Some(5))]
        );
    }

    #[test]
    fn equal_span_finds_runs_and_gap_hulls() {
        let m = mem(&[(3, b"aabbba"), (12, b"c")]);
        assert_eq!(m.equal_span(5), (Some(5), Some(8), Some(b'b')));
        assert_eq!(m.equal_span(3), (Some(3), Some(5), Some(b'a')));
        assert_eq!(m.equal_span(8), (Some(8), Some(9), Some(b'a')));
        assert_eq!(m.equal_span(10), (Some(9), Some(12), None));
        assert_eq!(m.equal_span(0), (None, Some(3), None));
        assert_eq!(m.equal_span(20), (Some(13), None, None));
    }

    #[test]
    fn block_span_reports_block_extents() {
        let m = mem(&[(3, b"aabbba"), (12, b"c")]);
        assert_eq!(m.block_span(5), (Some(3), Some(9), Some(b'b')));
        assert_eq!(m.block_span(12), (Some(12), Some(13), Some(b'c')));
        assert_eq!(m.block_span(9), (Some(9), Some(12), None));
    }

    #[test]
    fn reversed_query_ranges_clamp_to_empty() {
        let m = mem(&[(0, b"abc")]);
        assert_eq!(m.find(b"a", 3..1), None);
        assert_eq!(m.count(b"a", 3..1), 0);
        assert_eq!(m.intervals(3..1), vec![]);
    }

    #[test]
    fn content_size_is_the_sum_of_block_sizes() {
        let m = mem(&[(1, b"AB"), (5, b"CDE"), (100, b"F")]);
        assert_eq!(m.content_size(), 6);
        let total: u64 = m
            .intervals(..)
            .iter()
            .map(|&(s, e)| e - s)
            .sum();
        assert_eq!(total, m.content_size());
    }
}
