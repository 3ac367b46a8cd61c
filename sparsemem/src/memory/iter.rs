//! Iteration over a memory: keys, values, items, extraction.
//!
//! These entry points build [Rover] cursors over the rack. An unbounded
//! far end (the end bound going forward, the start bound going backward)
//! selects the rover's infinite mode, where iteration keeps producing
//! pattern bytes (or emptiness) past the content.

use std::ops::{Bound, RangeBounds};

use crate::error::{MemError, Result};
use crate::rover::{Items, Keys, Rover};
use crate::{Addr, Memory};

impl Memory {
    /// The addresses of `range` in order, starting at the span by
    /// default. Like [Memory::values], an unbounded end runs forever.
    pub fn keys<R: RangeBounds<Addr>>(&self, range: R) -> Keys {
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => self.start(),
        };
        let endex = match range.end_bound() {
            Bound::Included(&e) => Some(e.saturating_add(1)),
            Bound::Excluded(&e) => Some(e),
            Bound::Unbounded => None,
        };
        Keys::new(start, endex)
    }

    /// A forward cursor over `range` yielding `Some(byte)` or emptiness.
    ///
    /// An unbounded end makes the cursor infinite. Gaps yield `pattern`
    /// bytes when one is given; an empty pattern is rejected.
    pub fn values<R: RangeBounds<Addr>>(
        &self,
        range: R,
        pattern: Option<&[u8]>,
    ) -> Result<Rover<'_>> {
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => self.start(),
        };
        let (endex, infinite) = match range.end_bound() {
            Bound::Included(&e) => (e.saturating_add(1), false),
            Bound::Excluded(&e) => (e, false),
            Bound::Unbounded => (self.endex(), true),
        };
        Rover::new(self.rack(), start, endex, pattern, true, infinite)
    }

    /// A backward cursor over `range`, from the last address down.
    ///
    /// An unbounded start makes the cursor infinite (it keeps descending
    /// past the content towards address zero, then yields pattern bytes
    /// or emptiness forever).
    pub fn rvalues<R: RangeBounds<Addr>>(
        &self,
        range: R,
        pattern: Option<&[u8]>,
    ) -> Result<Rover<'_>> {
        let (start, infinite) = match range.start_bound() {
            Bound::Included(&s) => (s, false),
            Bound::Excluded(&s) => (s.saturating_add(1), false),
            Bound::Unbounded => (self.start(), true),
        };
        let endex = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => self.endex(),
        };
        let start = if infinite { 0 } else { start };
        Rover::new(self.rack(), start, endex, pattern, false, infinite)
    }

    /// Forward `(address, byte-or-emptiness)` pairs over `range`.
    pub fn items<R: RangeBounds<Addr>>(
        &self,
        range: R,
        pattern: Option<&[u8]>,
    ) -> Result<Items<'_>> {
        Ok(Items::new(self.values(range, pattern)?))
    }

    /// Extract `range` into a new memory.
    ///
    /// With `step == 1` this is a cheap copy-on-write slice: the
    /// intersecting blocks are shared, cropped to the range, and flooded
    /// with `pattern` if one is given. With `step > 1` every `step`-th
    /// address of the range is sampled (through the pattern, if any) and
    /// the samples are compacted to consecutive addresses from the range
    /// start, empty samples staying empty. `step == 0` yields an empty
    /// result.
    ///
    /// With `bound`, the result's trim span is set to the resolved range.
    pub fn extract<R: RangeBounds<Addr>>(
        &self,
        range: R,
        pattern: Option<&[u8]>,
        step: usize,
        bound: bool,
    ) -> Result<Memory> {
        if let Some(p) = pattern {
            if p.is_empty() {
                return Err(MemError::InvalidPattern);
            }
        }
        let (s, e) = self.query_span(range);
        let mut out = Memory::new();
        if step == 1 {
            let lo = self.rack().index_start(s);
            let hi = self.rack().index_endex(e);
            for b in self.rack().range(lo..hi) {
                out.rack_mut().push_back(b.clone());
            }
            out.crop(s..e, None)?;
            if let Some(p) = pattern {
                if s < e {
                    out.flood(s..e, p)?;
                }
            }
        } else if step > 1 {
            let rover = self.values(s..e, pattern)?;
            let mut waddr = s;
            for (k, item) in rover.enumerate() {
                if k % step == 0 {
                    if let Some(v) = item {
                        out.poke(waddr, Some(v), None)?;
                    }
                    waddr += 1;
                }
            }
        }
        if bound {
            out.set_trim_span(Some(s), Some(e))?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(blocks: &[(Addr, &[u8])]) -> Memory {
        Memory::from_blocks(blocks.iter().map(|&(a, d)| (a, d))).unwrap()
    }

    #[test]
    fn keys_start_at_the_span() {
        let m = mem(&[(3, b"AB")]);
        let got: Vec<Addr> = m.keys(..).take(4).collect();
        assert_eq!(got, vec![3, 4, 5, 6]);
        let got: Vec<Addr> = m.keys(1..=3).collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn values_walk_data_and_gaps() {
        let m = mem(&[(1, b"AB"), (5, b"C")]);
        let got: Vec<Option<u8>> = m.values(.., None).unwrap().take(10).collect();
        // Unbounded end: infinite mode keeps yielding emptiness.
        assert_eq!(
            got,
            vec![
                Some(b'A'),
                Some(b'B'),
                None,
                None,
                Some(b'C'),
                None,
                None,
                None,
                None,
                None
            ]
        );
        let bounded: Vec<Option<u8>> = m.values(0..6, None).unwrap().collect();
        assert_eq!(
            bounded,
            vec![None, Some(b'A'), Some(b'B'), None, None, Some(b'C')]
        );
    }

    #[test]
    fn values_with_a_pattern_cover_the_gaps() {
        let m = mem(&[(1, b"AB"), (5, b"C")]);
        let got: Vec<u8> = m
            .values(0..7, Some(b"123"))
            .unwrap()
            .map(Option::unwrap)
            .collect();
        assert_eq!(got, b"1AB23C1".to_vec());
    }

    #[test]
    fn rvalues_walk_backwards() {
        let m = mem(&[(1, b"AB")]);
        let got: Vec<Option<u8>> = m.rvalues(0..4, None).unwrap().collect();
        assert_eq!(got, vec![None, Some(b'B'), Some(b'A'), None]);
        let infinite: Vec<Option<u8>> = m.rvalues(..3, None).unwrap().take(5).collect();
        assert_eq!(
            infinite,
            vec![Some(b'B'), Some(b'A'), None, None, None]
        );
    }

    #[test]
    fn items_pair_addresses_and_values() {
        let m = mem(&[(1, b"AB")]);
        let got: Vec<(Addr, Option<u8>)> = m.items(0..3, None).unwrap().collect();
        assert_eq!(
            got,
            vec![(0, None), (1, Some(b'A')), (2, Some(b'B'))]
        );
    }

    #[test]
    fn extract_step_one_slices_and_bounds() {
        let m = mem(&[(1, b"ABCD"), (8, b"xy")]);
        let out = m.extract(2..9, None, 1, true).unwrap();
        assert_eq!(
            out.to_blocks(),
            vec![(2, b"BCD".to_vec()), (8, b"x".to_vec())]
        );
        assert_eq!(out.trim_span(), (Some(2), Some(9)));
        // The source is untouched and its boundary blocks were unshared
        // by the crop, not mutated.
        assert_eq!(
            m.to_blocks(),
            vec![(1, b"ABCD".to_vec()), (8, b"xy".to_vec())]
        );
    }

    #[test]
    fn extract_with_a_pattern_floods_the_result() {
        let m = mem(&[(1, b"AB"), (5, b"C")]);
        let out = m.extract(1..6, Some(b"."), 1, true).unwrap();
        assert_eq!(out.to_blocks(), vec![(1, b"AB..C".to_vec())]);
    }

    #[test]
    fn extract_with_a_step_samples_and_compacts() {
        let m = mem(&[(1, b"ABCD"), (6, b"$"), (8, b"xyz")]);
        let out = m.extract(.., Some(b"."), 3, true).unwrap();
        assert_eq!(out.to_blocks(), vec![(1, b"AD.z".to_vec())]);
        assert_eq!(out.trim_span(), (Some(1), Some(11)));
    }

    #[test]
    fn extract_with_a_step_keeps_empty_samples_as_gaps() {
        let m = mem(&[(0, b"A"), (4, b"B")]);
        // Addresses 0, 2, 4 are sampled; 2 is empty and stays a gap.
        let out = m.extract(0..5, None, 2, false).unwrap();
        assert_eq!(
            out.to_blocks(),
            vec![(0, b"A".to_vec()), (2, b"B".to_vec())]
        );
        assert_eq!(out.trim_span(), (None, None));
    }

    #[test]
    fn extract_step_zero_is_empty() {
        let m = mem(&[(0, b"ABC")]);
        let out = m.extract(.., None, 0, true).unwrap();
        assert!(out.rack().is_empty());
        assert_eq!(out.trim_span(), (Some(0), Some(3)));
    }

    #[test]
    fn extract_rejects_empty_patterns() {
        let m = mem(&[(0, b"ABC")]);
        assert_eq!(
            m.extract(.., Some(b""), 1, true).err(),
            Some(MemError::InvalidPattern)
        );
    }
}
