//! The memory: a sparse byte-addressable map from addresses to bytes.
//!
//! A [Memory] owns one rack of blocks plus an optional trim span. The trim
//! span is an automatic discard boundary: writes outside it are silently
//! dropped or cropped, and no stored byte ever lies outside it.
//!
//! The mutation API is built on two private primitives, both in
//! `edit.rs`:
//!
//!  * `erase_`, which removes a range with or without shifting what
//!    follows, and
//!  * `place_`, which lays bytes down at an address with or without
//!    shifting what follows.
//!
//! Everything else (`poke`, `write`, `insert`, `delete`, `clear`, `crop`,
//! `fill`, `flood`, ...) is phrased in terms of those two.
//!
//! Copying is cheap: `clone()` duplicates the slot array but shares the
//! block payloads, and the first mutation of a shared payload deep-clones
//! it (copy-on-write). [Memory::deep_copy] produces a fully independent
//! copy up front.
//!
//! Mutations that discard stored bytes accept an optional `backups`
//! collector; each discarding phase appends a bounded [Memory] holding the
//! doomed range before destroying it, which is enough to build undo on
//! top of this engine.

mod edit;
mod iter;
mod query;
mod well_formed;

use std::fmt;
use std::ops::{Add, AddAssign, Bound, Deref, Mul, MulAssign, RangeBounds};
use std::rc::Rc;

use crate::block::{Block, BlockBuf};
use crate::error::{MemError, Result};
use crate::rack::Rack;
use crate::{Addr, STR_MAX_CONTENT_SIZE};

/// A sparse byte-addressable memory container.
#[derive(Clone, Debug)]
pub struct Memory {
    rack: Rack,
    trim_start: Option<Addr>,
    trim_endex: Option<Addr>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// An empty memory with no trim bounds.
    pub fn new() -> Memory {
        Memory {
            rack: Rack::new(),
            trim_start: None,
            trim_endex: None,
        }
    }

    /// An empty memory with the given trim bounds.
    ///
    /// If both bounds are set and `trim_endex < trim_start`, the end bound
    /// is lifted to the start bound.
    pub fn with_trim(trim_start: Option<Addr>, trim_endex: Option<Addr>) -> Memory {
        let trim_endex = match (trim_start, trim_endex) {
            (Some(s), Some(e)) if e < s => Some(s),
            _ => trim_endex,
        };
        Memory {
            rack: Rack::new(),
            trim_start,
            trim_endex,
        }
    }

    /// A memory holding a copy of `data` as a single block at `offset`.
    /// Empty input yields an empty memory.
    pub fn from_bytes(data: impl AsRef<[u8]>, offset: Addr) -> Result<Memory> {
        let data = data.as_ref();
        let mut mem = Memory::new();
        if !data.is_empty() {
            mem.rack.push_back(Block::new(offset, data)?);
        }
        Ok(mem)
    }

    /// A memory built from pre-sorted blocks.
    ///
    /// Blocks must be non-empty, address-ascending and non-overlapping
    /// (touching is fine); anything else is [MemError::InvalidBlocks].
    pub fn from_blocks<I, D>(blocks: I) -> Result<Memory>
    where
        I: IntoIterator<Item = (Addr, D)>,
        D: AsRef<[u8]>,
    {
        let mut mem = Memory::new();
        let mut prev_endex: Option<Addr> = None;
        for (addr, data) in blocks {
            let data = data.as_ref();
            if data.is_empty() {
                return Err(MemError::InvalidBlocks);
            }
            if let Some(pe) = prev_endex {
                if addr < pe {
                    return Err(MemError::InvalidBlocks);
                }
            }
            let block = Block::new(addr, data)?;
            prev_endex = Some(block.endex());
            mem.rack.push_back(block);
        }
        Ok(mem)
    }

    /// A translated copy of `other`: shallow (payloads shared) unless
    /// `deep` is set.
    pub fn from_memory(other: &Memory, offset: i64, deep: bool) -> Result<Memory> {
        let translate = |bound: Option<Addr>| -> Result<Option<Addr>> {
            match bound {
                Some(a) => Ok(Some(
                    a.checked_add_signed(offset).ok_or(MemError::Overflow)?,
                )),
                None => Ok(None),
            }
        };
        let trim_start = translate(other.trim_start)?;
        let trim_endex = translate(other.trim_endex)?;
        let mut rack = other.rack.clone();
        rack.shift(offset)?;
        if deep {
            rack.consolidate();
        }
        Ok(Memory {
            rack,
            trim_start,
            trim_endex,
        })
    }

    /// A fully independent copy: like `clone()`, but with every shared
    /// payload consolidated up front.
    pub fn deep_copy(&self) -> Memory {
        let mut mem = self.clone();
        mem.rack.consolidate();
        mem
    }

    pub fn trim_start(&self) -> Option<Addr> {
        self.trim_start
    }

    pub fn trim_endex(&self) -> Option<Addr> {
        self.trim_endex
    }

    pub fn trim_span(&self) -> (Option<Addr>, Option<Addr>) {
        (self.trim_start, self.trim_endex)
    }

    /// Set or clear the lower trim bound, cropping newly excluded content.
    ///
    /// Setting a start bound above the end bound drags the end bound up
    /// with it.
    pub fn set_trim_start(&mut self, value: Option<Addr>) -> Result<()> {
        self.trim_start = value;
        if let (Some(s), Some(e)) = (value, self.trim_endex) {
            if e < s {
                self.trim_endex = Some(s);
            }
        }
        if let Some(s) = value {
            if let Some(cs) = self.rack.start() {
                if cs < s {
                    self.erase_(cs, s, false, false)?;
                }
            }
            if let Some(e) = self.trim_endex {
                if let Some(ce) = self.rack.endex() {
                    if ce > e {
                        self.erase_(e, ce, false, false)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Set or clear the upper trim bound, cropping newly excluded content.
    ///
    /// Setting an end bound below the start bound drags the start bound
    /// down with it.
    pub fn set_trim_endex(&mut self, value: Option<Addr>) -> Result<()> {
        self.trim_endex = value;
        if let (Some(s), Some(e)) = (self.trim_start, value) {
            if e < s {
                self.trim_start = Some(e);
            }
        }
        if let Some(e) = value {
            if let Some(ce) = self.rack.endex() {
                if ce > e {
                    self.erase_(e, ce, false, false)?;
                }
            }
            if let Some(s) = self.trim_start {
                if let Some(cs) = self.rack.start() {
                    if cs < s {
                        self.erase_(cs, s, false, false)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Set both trim bounds at once.
    pub fn set_trim_span(
        &mut self,
        trim_start: Option<Addr>,
        trim_endex: Option<Addr>,
    ) -> Result<()> {
        let trim_endex = match (trim_start, trim_endex) {
            (Some(s), Some(e)) if e < s => Some(s),
            _ => trim_endex,
        };
        self.trim_start = trim_start;
        self.trim_endex = trim_endex;
        if let Some(s) = trim_start {
            if let Some(cs) = self.rack.start() {
                if cs < s {
                    self.erase_(cs, s, false, false)?;
                }
            }
        }
        if let Some(e) = trim_endex {
            if let Some(ce) = self.rack.endex() {
                if ce > e {
                    self.erase_(e, ce, false, false)?;
                }
            }
        }
        Ok(())
    }

    /// Export the blocks as `(address, bytes)` pairs.
    pub fn to_blocks(&self) -> Vec<(Addr, Vec<u8>)> {
        self.rack
            .iter()
            .map(|b| (b.start(), b.as_slice().to_vec()))
            .collect()
    }

    /// The stored bytes as one contiguous vector.
    ///
    /// Requires the memory to be contiguous across its span; anything else
    /// is [MemError::NonContiguous]. An empty memory yields an empty
    /// vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.contiguous() {
            return Err(MemError::NonContiguous);
        }
        let mut out = Vec::new();
        for b in self.rack.iter() {
            out.extend_from_slice(b.as_slice());
        }
        Ok(out)
    }

    /// A read-only view over `range`, which must lie within one block.
    ///
    /// The view freezes its block: mutations over it fail with
    /// [MemError::BlockLocked] until the view is dropped. An empty range
    /// yields an empty view with no freeze.
    pub fn view<R: RangeBounds<Addr>>(&self, range: R) -> Result<MemoryView> {
        let (s, e) = self.query_span(range);
        if s >= e {
            return Ok(MemoryView {
                buf: None,
                lo: 0,
                hi: 0,
            });
        }
        let i = self.rack.index_at(s).ok_or(MemError::NonContiguous)?;
        let b = self.rack.get(i).unwrap();
        if e > b.endex() {
            return Err(MemError::NonContiguous);
        }
        let lo = (s - b.start()) as usize;
        let hi = (e - b.start()) as usize;
        let buf = b.buf_rc();
        buf.acquire_view();
        Ok(MemoryView {
            buf: Some(buf),
            lo,
            hi,
        })
    }

    pub(crate) fn rack(&self) -> &Rack {
        &self.rack
    }

    pub(crate) fn rack_mut(&mut self) -> &mut Rack {
        &mut self.rack
    }

    /// Resolve a query range: unbounded sides default to the span, and a
    /// reversed range clamps to empty.
    fn query_span<R: RangeBounds<Addr>>(&self, range: R) -> (Addr, Addr) {
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => self.start(),
        };
        let endex = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => self.endex(),
        };
        (start, endex.max(start))
    }

    /// Resolve a mutation range: unbounded sides default to the span, and
    /// a reversed range is rejected.
    fn edit_span<R: RangeBounds<Addr>>(&self, range: R) -> Result<(Addr, Addr)> {
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.checked_add(1).ok_or(MemError::Overflow)?,
            Bound::Unbounded => self.start(),
        };
        let endex = match range.end_bound() {
            Bound::Included(&e) => e.checked_add(1).ok_or(MemError::Overflow)?,
            Bound::Excluded(&e) => e,
            Bound::Unbounded => self.endex(),
        };
        if endex < start {
            return Err(MemError::IndexOutOfRange);
        }
        Ok((start, endex))
    }

    /// Clamp `[start, endex)` to the trim span.
    fn clamp_to_trim(&self, start: Addr, endex: Addr) -> (Addr, Addr) {
        let s = match self.trim_start {
            Some(t) if t > start => t,
            _ => start,
        };
        let e = match self.trim_endex {
            Some(t) if t < endex => t,
            _ => endex,
        };
        (s, e.max(s))
    }
}

impl PartialEq for Memory {
    /// Equality compares the stored content: the populated address set and
    /// its bytes. Segmentation into blocks and trim bounds do not matter.
    fn eq(&self, other: &Memory) -> bool {
        let mut lhs = self.rack.iter();
        let mut rhs = other.rack.iter();
        let mut la: Option<(Addr, &[u8])> = lhs.next().map(|b| (b.start(), b.as_slice()));
        let mut ra: Option<(Addr, &[u8])> = rhs.next().map(|b| (b.start(), b.as_slice()));
        loop {
            match (la, ra) {
                (None, None) => return true,
                (Some(_), None) | (None, Some(_)) => return false,
                (Some((laddr, lbytes)), Some((raddr, rbytes))) => {
                    if laddr != raddr {
                        return false;
                    }
                    let n = lbytes.len().min(rbytes.len());
                    if lbytes[..n] != rbytes[..n] {
                        return false;
                    }
                    la = if lbytes.len() > n {
                        Some((laddr + n as u64, &lbytes[n..]))
                    } else {
                        lhs.next().map(|b| (b.start(), b.as_slice()))
                    };
                    ra = if rbytes.len() > n {
                        Some((raddr + n as u64, &rbytes[n..]))
                    } else {
                        rhs.next().map(|b| (b.start(), b.as_slice()))
                    };
                }
            }
        }
    }
}

impl Eq for Memory {}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.content_size() <= STR_MAX_CONTENT_SIZE {
            write!(f, "<[")?;
            for (i, b) in self.rack.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "[{:#x}, b\"", b.start())?;
                for &byte in b.as_slice() {
                    write!(f, "{}", std::ascii::escape_default(byte))?;
                }
                write!(f, "\"]")?;
            }
            write!(f, "]>")
        } else {
            write!(
                f,
                "<Memory@[{:#x}..{:#x}): {} bytes in {} blocks>",
                self.start(),
                self.endex(),
                self.content_size(),
                self.content_parts()
            )
        }
    }
}

impl AddAssign<&Memory> for Memory {
    /// Concatenate `rhs` after the content end.
    ///
    /// # Panics
    ///
    /// Panics if the translated content would overflow the address space;
    /// use [Memory::extend_memory] for the checked form.
    fn add_assign(&mut self, rhs: &Memory) {
        self.extend_memory(rhs, 0)
            .expect("address overflow while concatenating memories");
    }
}

impl Add<&Memory> for Memory {
    type Output = Memory;

    /// See [AddAssign].
    fn add(mut self, rhs: &Memory) -> Memory {
        self += rhs;
        self
    }
}

impl MulAssign<usize> for Memory {
    /// Repeat the span content `times` times in place.
    ///
    /// # Panics
    ///
    /// Panics if the repeated content would overflow the address space;
    /// use [Memory::repeat] for the checked form.
    fn mul_assign(&mut self, times: usize) {
        self.repeat(times)
            .expect("address overflow while repeating memory");
    }
}

impl Mul<usize> for Memory {
    type Output = Memory;

    /// See [MulAssign].
    fn mul(mut self, times: usize) -> Memory {
        self *= times;
        self
    }
}

/// A read-only view over a span of one block.
///
/// While the view is alive its block is frozen: any mutation over it fails
/// with [MemError::BlockLocked]. Dropping the view lifts the freeze. The
/// view stays readable even if the memory later drops the block.
pub struct MemoryView {
    buf: Option<Rc<BlockBuf>>,
    lo: usize,
    hi: usize,
}

impl MemoryView {
    pub fn as_slice(&self) -> &[u8] {
        match &self.buf {
            Some(b) => &b.as_slice()[self.lo..self.hi],
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.hi - self.lo
    }

    pub fn is_empty(&self) -> bool {
        self.hi == self.lo
    }
}

impl Deref for MemoryView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Drop for MemoryView {
    fn drop(&mut self) {
        if let Some(b) = &self.buf {
            b.release_view();
        }
    }
}

impl fmt::Debug for MemoryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryView({} bytes)", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(blocks: &[(Addr, &[u8])]) -> Memory {
        Memory::from_blocks(blocks.iter().map(|&(a, d)| (a, d))).unwrap()
    }

    #[test]
    fn new_is_empty() {
        let m = Memory::new();
        assert!(m.rack().is_empty());
        assert_eq!(m.span(), (0, 0));
        m.assert_well_formed();
    }

    #[test]
    fn with_trim_normalises_the_bounds() {
        let m = Memory::with_trim(Some(10), Some(5));
        assert_eq!(m.trim_span(), (Some(10), Some(10)));
        let m = Memory::with_trim(Some(5), Some(10));
        assert_eq!(m.trim_span(), (Some(5), Some(10)));
    }

    #[test]
    fn from_bytes_builds_one_block() {
        let m = Memory::from_bytes(b"ABC", 7).unwrap();
        assert_eq!(m.to_blocks(), vec![(7, b"ABC".to_vec())]);
        let e = Memory::from_bytes(b"", 7).unwrap();
        assert!(e.rack().is_empty());
    }

    #[test]
    fn from_bytes_rejects_overflow() {
        assert_eq!(
            Memory::from_bytes(b"ABC", u64::MAX - 1).err(),
            Some(MemError::Overflow)
        );
    }

    #[test]
    fn from_blocks_validates() {
        assert!(Memory::from_blocks([(1u64, b"AB".as_slice()), (3, b"CD".as_slice())]).is_ok());
        assert_eq!(
            Memory::from_blocks([(1u64, b"AB".as_slice()), (2, b"CD".as_slice())]).err(),
            Some(MemError::InvalidBlocks)
        );
        assert_eq!(
            Memory::from_blocks([(5u64, b"AB".as_slice()), (1, b"CD".as_slice())]).err(),
            Some(MemError::InvalidBlocks)
        );
        assert_eq!(
            Memory::from_blocks([(1u64, b"".as_slice())]).err(),
            Some(MemError::InvalidBlocks)
        );
    }

    #[test]
    fn from_memory_translates_and_copies() {
        let src = mem(&[(10, b"AB"), (20, b"CD")]);
        let moved = Memory::from_memory(&src, -10, false).unwrap();
        assert_eq!(moved.to_blocks(), vec![(0, b"AB".to_vec()), (10, b"CD".to_vec())]);
        assert_eq!(
            Memory::from_memory(&src, -11, false).err(),
            Some(MemError::Overflow)
        );
        let deep = Memory::from_memory(&src, 0, true).unwrap();
        assert!(!deep.rack().get(0).unwrap().is_shared());
    }

    #[test]
    fn clone_is_shallow_deep_copy_is_not() {
        let src = mem(&[(1, b"ABC")]);
        let shallow = src.clone();
        assert!(src.rack().get(0).unwrap().is_shared());
        let deep = src.deep_copy();
        assert!(!deep.rack().get(0).unwrap().is_shared());
        assert_eq!(shallow, src);
        assert_eq!(deep, src);
    }

    #[test]
    fn copy_on_write_keeps_the_original_intact() {
        let src = mem(&[(1, b"ABC")]);
        let mut copy = src.clone();
        copy.poke(2, Some(b'X'), None).unwrap();
        assert_eq!(src.to_blocks(), vec![(1, b"ABC".to_vec())]);
        assert_eq!(copy.to_blocks(), vec![(1, b"AXC".to_vec())]);
    }

    #[test]
    fn equality_ignores_segmentation_and_trims() {
        let one = mem(&[(0, b"abcd")]);
        let split = mem(&[(0, b"ab"), (2, b"cd")]);
        assert_eq!(one, split);
        let mut trimmed = one.clone();
        trimmed.set_trim_span(Some(0), Some(100)).unwrap();
        assert_eq!(one, trimmed);
        let other = mem(&[(0, b"ab"), (3, b"cd")]);
        assert_ne!(one, other);
        let differs = mem(&[(0, b"abce")]);
        assert_ne!(one, differs);
    }

    #[test]
    fn set_trim_start_crops() {
        let mut m = mem(&[(5, b"ABC"), (9, b"xyz")]);
        m.set_trim_start(Some(7)).unwrap();
        assert_eq!(m.to_blocks(), vec![(7, b"C".to_vec()), (9, b"xyz".to_vec())]);
        m.set_trim_start(None).unwrap();
        assert_eq!(m.trim_span(), (None, None));
    }

    #[test]
    fn set_trim_endex_crops_and_drags_the_start() {
        let mut m = mem(&[(5, b"ABC"), (9, b"xyz")]);
        m.set_trim_start(Some(5)).unwrap();
        m.set_trim_endex(Some(10)).unwrap();
        assert_eq!(m.to_blocks(), vec![(5, b"ABC".to_vec()), (9, b"x".to_vec())]);
        m.set_trim_endex(Some(3)).unwrap();
        assert_eq!(m.trim_span(), (Some(3), Some(3)));
        assert!(m.rack().is_empty());
    }

    #[test]
    fn to_bytes_requires_contiguity() {
        let m = mem(&[(3, b"ABC")]);
        assert_eq!(m.to_bytes().unwrap(), b"ABC".to_vec());
        let gappy = mem(&[(3, b"AB"), (6, b"CD")]);
        assert_eq!(gappy.to_bytes().err(), Some(MemError::NonContiguous));
        let mut bounded = mem(&[(3, b"ABC")]);
        bounded.set_trim_span(Some(0), Some(6)).unwrap();
        assert_eq!(bounded.to_bytes().err(), Some(MemError::NonContiguous));
        assert!(Memory::new().to_bytes().unwrap().is_empty());
    }

    #[test]
    fn view_freezes_its_block() {
        let mut m = mem(&[(3, b"ABCDE")]);
        let view = m.view(4..7).unwrap();
        assert_eq!(view.as_slice(), b"BCD");
        assert_eq!(m.poke(5, Some(b'!'), None), Err(MemError::BlockLocked));
        drop(view);
        m.poke(5, Some(b'!'), None).unwrap();
        assert_eq!(m.to_blocks(), vec![(3, b"AB!DE".to_vec())]);
    }

    #[test]
    fn view_requires_a_single_block() {
        let m = mem(&[(0, b"AB"), (5, b"CD")]);
        assert_eq!(m.view(1..6).err(), Some(MemError::NonContiguous));
        assert_eq!(m.view(3..4).err(), Some(MemError::NonContiguous));
        let empty = m.view(4..4).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn display_renders_blocks_or_a_summary() {
        let small = mem(&[(1, b"ABC"), (6, b"xyz")]);
        assert_eq!(small.to_string(), "<[[0x1, b\"ABC\"], [0x6, b\"xyz\"]]>");
        let big = Memory::from_bytes(vec![0u8; 1500], 0).unwrap();
        let text = big.to_string();
        let matcher = fm::FMBuilder::new("<Memory@[0x0..0x5dc): 1500 bytes in 1 blocks>")
            .unwrap()
            .build()
            .unwrap();
        if let Err(e) = matcher.matches(&text) {
            panic!("{}", e);
        }
        let re = regex::Regex::new(r"^<Memory@\[0x0\.\.0x5dc\): 1500 bytes in 1 blocks>$").unwrap();
        assert!(re.is_match(&text));
    }

    #[test]
    fn display_escapes_non_printable_bytes() {
        let m = mem(&[(0, &[0x41, 0x00, 0xff])]);
        assert_eq!(m.to_string(), "<[[0x0, b\"A\\x00\\xff\"]]>");
    }

    #[test]
    fn block_export_round_trips() {
        let m = mem(&[(1, b"AB"), (5, b"CDE")]);
        let back = Memory::from_blocks(m.to_blocks()).unwrap();
        assert_eq!(back, m);
        back.validate().unwrap();
    }

    #[test]
    fn concatenation_laws() {
        let m = mem(&[(1, b"AB"), (5, b"CD")]);
        let empty = Memory::new();
        assert_eq!(m.clone() + &empty, m);
        assert_eq!(empty.clone() + &m, m);
        let mut sum = mem(&[(0, b"ab")]);
        sum += &mem(&[(0, b"cd")]);
        assert_eq!(sum.to_blocks(), vec![(0, b"abcd".to_vec())]);
    }

    #[test]
    fn repetition_laws() {
        let m = mem(&[(0, b"AB")]);
        assert_eq!(m.clone() * 1, m);
        assert_eq!(m.clone() * 0, Memory::new());
        assert_eq!((m.clone() * 3).to_blocks(), vec![(0, b"ABABAB".to_vec())]);
    }

    #[test]
    fn repetition_keeps_internal_gaps() {
        // Span is [0, 3): one byte then a two-byte gap, repeated.
        let mut m = mem(&[(0, b"A")]);
        m.set_trim_span(Some(0), Some(3)).unwrap();
        let tripled = m.clone() * 3;
        // Copies land at the span period, but the trim span still caps
        // the result.
        assert_eq!(tripled.to_blocks(), vec![(0, b"A".to_vec())]);
        let mut unbounded = mem(&[(0, b"A"), (2, b"B")]);
        unbounded.repeat(2).unwrap();
        // The second copy's "A" lands right after the first copy's "B" and
        // merges with it.
        assert_eq!(
            unbounded.to_blocks(),
            vec![(0, b"A".to_vec()), (2, b"BA".to_vec()), (5, b"B".to_vec())]
        );
    }
}
