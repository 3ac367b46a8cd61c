//! Mutating operations.
//!
//! The two primitives everything rests on:
//!
//!  * [Memory::erase_] removes `[start, endex)`. With `shift_after` the
//!    blocks past the range move down by the range size; with
//!    `merge_deletion` the survivors on either side of the hole are merged
//!    when the shift makes them touch.
//!  * [Memory::place_] lays bytes down at an address. With `shift_after`
//!    the blocks from the address onwards move up first (an insertion);
//!    without it the caller has already erased the target range (an
//!    overwrite).
//!
//! Argument validation, overflow checks and view-freeze checks happen
//! before the first destructive step, so those failures leave the
//! container untouched. A refused allocation in the middle of a
//! multi-block operation can leave a completed prefix applied; the
//! container still validates.

use crate::block::{Block, BlockBuf};
use crate::error::{MemError, Result};
use crate::op_debug;
use crate::{Addr, Memory};

use std::ops::RangeBounds;

impl Memory {
    /// Append a bounded extraction of `[start, endex)` to the collector,
    /// if one was supplied and the range holds any content.
    fn backup_range(
        &self,
        backups: &mut Option<&mut Vec<Memory>>,
        start: Addr,
        endex: Addr,
    ) -> Result<()> {
        if start >= endex {
            return Ok(());
        }
        if let Some(sink) = backups.as_deref_mut() {
            if self.rack().index_start(start) < self.rack().index_endex(endex) {
                sink.push(self.extract(start..endex, None, 1, true)?);
            }
        }
        Ok(())
    }

    /// Discard the content that a `size`-byte shift towards the lower trim
    /// bound would push across it.
    fn pretrim_start(
        &mut self,
        size: u64,
        backups: &mut Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        if let Some(ts) = self.trim_start() {
            let bound = ts.saturating_add(size);
            if let Some(cstart) = self.rack().start() {
                if bound > cstart {
                    self.backup_range(backups, cstart, bound)?;
                    self.erase_(cstart, bound, false, false)?;
                }
            }
        }
        Ok(())
    }

    /// Discard the content that a `size`-byte growth (or shift) towards
    /// the upper trim bound would push across it. Only content from
    /// `start_min` onwards moves, so nothing below it is discarded.
    fn pretrim_endex(
        &mut self,
        start_min: Addr,
        size: u64,
        backups: &mut Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        if let Some(te) = self.trim_endex() {
            let bound = te.saturating_sub(size).max(start_min);
            if let Some(cend) = self.rack().endex() {
                if bound < cend {
                    self.backup_range(backups, bound, cend)?;
                    self.erase_(bound, cend, false, false)?;
                }
            }
        }
        Ok(())
    }

    /// The unified removal primitive; see the module docs.
    pub(crate) fn erase_(
        &mut self,
        start: Addr,
        endex: Addr,
        shift_after: bool,
        merge_deletion: bool,
    ) -> Result<()> {
        if start >= endex {
            return Ok(());
        }
        let size = endex - start;
        let idx = self.rack().index_start(start);

        // Analysis pass: which slots get trimmed, chopped or dropped.
        let mut trim_tail: Option<usize> = None;
        let mut interior = false;
        if let Some(b) = self.rack().get(idx) {
            if b.start() < start {
                trim_tail = Some(idx);
                if b.endex() > endex {
                    interior = true;
                }
            }
        }

        if interior {
            // The range lies strictly inside one block.
            let b = self.rack().get(idx).unwrap();
            if b.mutation_locked() {
                return Err(MemError::BlockLocked);
            }
            if shift_after {
                let off = (start - b.start()) as usize;
                self.rack_mut()
                    .get_mut(idx)
                    .unwrap()
                    .payload_mut()?
                    .delete(off, size as usize)?;
                self.rack_mut().slide_left(idx + 1, size);
            } else {
                let tail = self.rack_mut().get_mut(idx).unwrap().split_tail(endex)?;
                self.rack_mut().insert(idx + 1, tail);
            }
            return Ok(());
        }

        let inner_lo = if trim_tail.is_some() { idx + 1 } else { idx };
        let mut inner_hi = inner_lo;
        let mut chop: Option<usize> = None;
        while let Some(b) = self.rack().get(inner_hi) {
            if b.start() >= endex {
                break;
            }
            if b.endex() <= endex {
                inner_hi += 1;
                continue;
            }
            chop = Some(inner_hi);
            break;
        }

        // Whether the survivors around the hole end up touching once the
        // tail side shifts down by `size`.
        let mut merge = false;
        if shift_after && merge_deletion && inner_lo > 0 {
            if let Some(next) = self.rack().get(inner_hi) {
                let prev = self.rack().get(inner_lo - 1).unwrap();
                let prev_endex = if trim_tail == Some(inner_lo - 1) {
                    start
                } else {
                    prev.endex()
                };
                let next_start = if chop == Some(inner_hi) {
                    endex
                } else {
                    next.start()
                };
                merge = next_start - prev_endex == size;
            }
        }

        // Freeze pre-flight on everything about to be mutated in place.
        if let Some(i) = trim_tail {
            if self.rack().get(i).unwrap().mutation_locked() {
                return Err(MemError::BlockLocked);
            }
        }
        if let Some(i) = chop {
            if self.rack().get(i).unwrap().mutation_locked() {
                return Err(MemError::BlockLocked);
            }
        }
        if merge && self.rack().get(inner_lo - 1).unwrap().mutation_locked() {
            return Err(MemError::BlockLocked);
        }

        // Apply.
        if let Some(i) = trim_tail {
            let b = self.rack_mut().get_mut(i).unwrap();
            let keep = (start - b.start()) as usize;
            b.payload_mut()?.truncate(keep)?;
        }
        if let Some(i) = chop {
            let b = self.rack_mut().get_mut(i).unwrap();
            let cut = (endex - b.start()) as usize;
            b.payload_mut()?.delete(0, cut)?;
            b.set_addr(endex);
        }
        let mut drop_hi = inner_hi;
        if merge {
            let absorbed: Vec<u8> = self.rack().get(inner_hi).unwrap().as_slice().to_vec();
            self.rack_mut()
                .get_mut(inner_lo - 1)
                .unwrap()
                .payload_mut()?
                .extend_back(&absorbed)?;
            drop_hi = inner_hi + 1;
        }
        if shift_after {
            self.rack_mut().slide_left(drop_hi, size);
        }
        self.rack_mut().drain(inner_lo..drop_hi);
        Ok(())
    }

    /// The unified insertion primitive; see the module docs.
    pub(crate) fn place_(&mut self, addr: Addr, data: &[u8], shift_after: bool) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let size = data.len() as u64;
        let endex = addr.checked_add(size).ok_or(MemError::Overflow)?;
        if shift_after {
            if let Some(last) = self.rack().back() {
                last.endex().checked_add(size).ok_or(MemError::Overflow)?;
            }
        }
        let idx = self.rack().index_start(addr);

        // Fast path: the preceding block ends exactly at `addr`.
        if idx > 0 && self.rack().get(idx - 1).unwrap().endex() == addr {
            self.rack_mut()
                .get_mut(idx - 1)
                .unwrap()
                .payload_mut()?
                .extend_back(data)?;
            if shift_after {
                self.rack_mut().slide_right(idx, size);
            } else if let Some(next) = self.rack().get(idx) {
                if next.start() == endex {
                    // The write closed the gap: fold the next block in.
                    let absorbed: Vec<u8> = next.as_slice().to_vec();
                    self.rack_mut()
                        .get_mut(idx - 1)
                        .unwrap()
                        .payload_mut()?
                        .extend_back(&absorbed)?;
                    self.rack_mut().remove(idx);
                }
            }
            return Ok(());
        }

        if let Some(b) = self.rack().get(idx) {
            if b.start() < addr && addr < b.endex() {
                // Strictly inside a block: open a hole and fill it. Without
                // a shift the caller has erased the range, so this cannot
                // happen then.
                debug_assert!(shift_after);
                let off = (addr - b.start()) as usize;
                let buf = self.rack_mut().get_mut(idx).unwrap().payload_mut()?;
                buf.reserve(off, data.len())?;
                buf.as_mut_slice()[off..off + data.len()].copy_from_slice(data);
                self.rack_mut().slide_right(idx + 1, size);
                return Ok(());
            }
            // Fast path: the following block starts exactly where this
            // write ends up touching it.
            let pre_target = if shift_after { addr } else { endex };
            if b.start() == pre_target {
                let blk = self.rack_mut().get_mut(idx).unwrap();
                blk.payload_mut()?.extend_front(data)?;
                blk.set_addr(addr);
                if shift_after {
                    self.rack_mut().slide_right(idx + 1, size);
                }
                return Ok(());
            }
        }

        // A standalone block at the insertion point.
        let block = Block::new(addr, data)?;
        self.rack_mut().insert(idx, block);
        if shift_after {
            self.rack_mut().slide_right(idx + 1, size);
        }
        Ok(())
    }

    /// Store or erase one byte.
    ///
    /// `poke(addr, Some(v))` stores `v` at `addr`, silently dropping the
    /// write if `addr` lies outside the trim span. `poke(addr, None)`
    /// erases the cell without shifting anything.
    pub fn poke(
        &mut self,
        addr: Addr,
        value: Option<u8>,
        mut backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        let endex = addr.checked_add(1).ok_or(MemError::Overflow)?;
        match value {
            None => {
                self.backup_range(&mut backups, addr, endex)?;
                self.erase_(addr, endex, false, false)?;
            }
            Some(v) => {
                if let Some(ts) = self.trim_start() {
                    if addr < ts {
                        return Ok(());
                    }
                }
                if let Some(te) = self.trim_endex() {
                    if addr >= te {
                        return Ok(());
                    }
                }
                self.backup_range(&mut backups, addr, endex)?;
                if let Some(i) = self.rack().index_at(addr) {
                    // In place.
                    let b = self.rack_mut().get_mut(i).unwrap();
                    let off = (addr - b.start()) as usize;
                    b.payload_mut()?.set(off, v)?;
                } else {
                    let idx = self.rack().index_start(addr);
                    if idx > 0 && self.rack().get(idx - 1).unwrap().endex() == addr {
                        // Append to the preceding block.
                        self.rack_mut()
                            .get_mut(idx - 1)
                            .unwrap()
                            .payload_mut()?
                            .push_back(v)?;
                        if let Some(next) = self.rack().get(idx) {
                            if next.start() == endex {
                                let absorbed: Vec<u8> = next.as_slice().to_vec();
                                self.rack_mut()
                                    .get_mut(idx - 1)
                                    .unwrap()
                                    .payload_mut()?
                                    .extend_back(&absorbed)?;
                                self.rack_mut().remove(idx);
                            }
                        }
                    } else if self.rack().get(idx).map(|b| b.start()) == Some(endex) {
                        // Prepend to the following block.
                        let blk = self.rack_mut().get_mut(idx).unwrap();
                        blk.payload_mut()?.push_front(v)?;
                        blk.set_addr(addr);
                    } else {
                        let block = Block::new(addr, &[v])?;
                        self.rack_mut().insert(idx, block);
                    }
                }
            }
        }
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Overwrite `[addr, addr + data.len())` with `data`.
    ///
    /// The effective range is clamped to the trim span before any work
    /// happens; existing content in the clamped range is replaced, and
    /// nothing shifts.
    pub fn write(
        &mut self,
        addr: Addr,
        data: &[u8],
        mut backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let size = data.len() as u64;
        let endex = addr.checked_add(size).ok_or(MemError::Overflow)?;
        op_debug!("write {:#x}..{:#x}", addr, endex);
        let mut s = addr;
        let mut e = endex;
        let mut d = data;
        if let Some(ts) = self.trim_start() {
            if e <= ts {
                return Ok(());
            }
            if s < ts {
                d = &d[(ts - s) as usize..];
                s = ts;
            }
        }
        if let Some(te) = self.trim_endex() {
            if s >= te {
                return Ok(());
            }
            if e > te {
                d = &d[..(te - s) as usize];
                e = te;
            }
        }
        if d.len() == 1 {
            return self.poke(s, Some(d[0]), backups);
        }
        self.backup_range(&mut backups, s, e)?;
        // Fast path: appending right at the end of all content.
        if self.rack().endex() == Some(s) {
            self.rack_mut()
                .back_mut()
                .unwrap()
                .payload_mut()?
                .extend_back(d)?;
        } else {
            self.erase_(s, e, false, false)?;
            self.place_(s, d, false)?;
        }
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Overwrite with another memory's content, translated by `offset`.
    ///
    /// With `clear` set the whole target span of `data` is erased first,
    /// so gaps in `data` clear the corresponding target cells; without it
    /// only the populated ranges of `data` replace target content.
    pub fn write_memory(
        &mut self,
        offset: Addr,
        data: &Memory,
        clear: bool,
        mut backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        if data.rack().is_empty() {
            return Ok(());
        }
        let dstart = data
            .rack()
            .start()
            .unwrap()
            .checked_add(offset)
            .ok_or(MemError::Overflow)?;
        let dendex = data
            .rack()
            .endex()
            .unwrap()
            .checked_add(offset)
            .ok_or(MemError::Overflow)?;
        if clear {
            let (s, e) = self.clamp_to_trim(dstart, dendex);
            self.backup_range(&mut backups, s, e)?;
            self.erase_(s, e, false, false)?;
            for block in data.rack().iter() {
                let at = block.start().checked_add(offset).ok_or(MemError::Overflow)?;
                self.write(at, block.as_slice(), None)?;
            }
        } else {
            for block in data.rack().iter() {
                let at = block.start().checked_add(offset).ok_or(MemError::Overflow)?;
                self.write(at, block.as_slice(), backups.as_deref_mut())?;
            }
        }
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Insert `data` at `addr`, shifting everything from `addr` on up by
    /// the data size. Content pushed across the upper trim bound is
    /// discarded first; inserted bytes outside the trim span are dropped.
    pub fn insert(
        &mut self,
        addr: Addr,
        data: &[u8],
        mut backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let size = data.len() as u64;
        let dendex = addr.checked_add(size).ok_or(MemError::Overflow)?;
        op_debug!("insert {:#x}+{}", addr, size);
        self.pretrim_endex(addr, size, &mut backups)?;
        self.place_(addr, data, true)?;
        if let Some(te) = self.trim_endex() {
            if dendex > te {
                self.erase_(te.max(addr), dendex, false, false)?;
            }
        }
        if let Some(ts) = self.trim_start() {
            if addr < ts {
                self.erase_(addr, ts.min(dendex), false, false)?;
            }
        }
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Insert `size` addresses of emptiness at `addr`, splitting any block
    /// that straddles it and shifting everything from `addr` on up.
    pub fn reserve(
        &mut self,
        addr: Addr,
        size: u64,
        mut backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        op_debug!("reserve {:#x}+{}", addr, size);
        self.pretrim_endex(addr, size, &mut backups)?;
        if let Some(cend) = self.rack().endex() {
            if cend > addr {
                cend.checked_add(size).ok_or(MemError::Overflow)?;
            }
        }
        let idx = self.rack().index_start(addr);
        if let Some(b) = self.rack().get(idx) {
            if b.start() < addr {
                let tail = self.rack_mut().get_mut(idx).unwrap().split_tail(addr)?;
                self.rack_mut().insert(idx + 1, tail);
                self.rack_mut().slide_right(idx + 1, size);
                #[cfg(debug_assertions)]
                self.assert_well_formed();
                return Ok(());
            }
        }
        self.rack_mut().slide_right(idx, size);
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Delete `range`, shifting the content past it down over the hole
    /// (and merging the edges when they meet exactly).
    pub fn delete<R: RangeBounds<Addr>>(
        &mut self,
        range: R,
        mut backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        let (s, e) = self.edit_span(range)?;
        op_debug!("delete {:#x}..{:#x}", s, e);
        self.backup_range(&mut backups, s, e)?;
        self.erase_(s, e, true, true)?;
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Clear `range`: erase its content, leaving the hole in place.
    pub fn clear<R: RangeBounds<Addr>>(
        &mut self,
        range: R,
        mut backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        let (s, e) = self.edit_span(range)?;
        op_debug!("clear {:#x}..{:#x}", s, e);
        self.backup_range(&mut backups, s, e)?;
        self.erase_(s, e, false, false)?;
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Discard all content outside `range`, without shifting anything.
    pub fn crop<R: RangeBounds<Addr>>(
        &mut self,
        range: R,
        mut backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        let (s, e) = self.edit_span(range)?;
        op_debug!("crop {:#x}..{:#x}", s, e);
        if let Some(cstart) = self.rack().start() {
            if cstart < s {
                self.backup_range(&mut backups, cstart, s)?;
                self.erase_(cstart, s, false, false)?;
            }
        }
        if let Some(cend) = self.rack().endex() {
            if cend > e {
                self.backup_range(&mut backups, e, cend)?;
                self.erase_(e, cend, false, false)?;
            }
        }
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Translate all content by `offset`.
    ///
    /// With a trim bound on the receiving side, the bytes that would land
    /// beyond it are discarded before the move. Without one, a move that
    /// would push content past either end of the address space fails with
    /// `Overflow`.
    pub fn shift(&mut self, offset: i64, mut backups: Option<&mut Vec<Memory>>) -> Result<()> {
        op_debug!("shift {}", offset);
        if offset == 0 || self.rack().is_empty() {
            return Ok(());
        }
        if offset < 0 {
            self.pretrim_start(offset.unsigned_abs(), &mut backups)?;
        } else {
            self.pretrim_endex(0, offset as u64, &mut backups)?;
        }
        self.rack_mut().shift(offset)?;
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Overwrite `range` with `pattern`, repeated and phase-aligned to the
    /// range start the caller asked for. Existing content is replaced.
    pub fn fill<R: RangeBounds<Addr>>(
        &mut self,
        range: R,
        pattern: &[u8],
        mut backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        if pattern.is_empty() {
            return Err(MemError::InvalidPattern);
        }
        let (s0, e0) = self.edit_span(range)?;
        let (s, e) = self.clamp_to_trim(s0, e0);
        if s >= e {
            return Ok(());
        }
        op_debug!("fill {:#x}..{:#x}", s, e);
        let span = usize::try_from(e - s).map_err(|_| MemError::Overflow)?;
        let mut pat = BlockBuf::from_slice(pattern)?;
        // Keep the pattern phase anchored at the requested start even when
        // the trim span pushed the effective start up.
        pat.rotate_left(((s - s0) % pattern.len() as u64) as usize);
        pat.repeat_to_size(span)?;
        self.backup_range(&mut backups, s, e)?;
        self.erase_(s, e, false, false)?;
        self.place_(s, pat.as_slice(), false)?;
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Fill only the gaps of `range` with `pattern`; stored bytes are
    /// preserved. The affected span coalesces into a single block.
    ///
    /// Nothing is discarded, so there is no backup collector to feed.
    pub fn flood<R: RangeBounds<Addr>>(&mut self, range: R, pattern: &[u8]) -> Result<()> {
        if pattern.is_empty() {
            return Err(MemError::InvalidPattern);
        }
        let (s0, e0) = self.edit_span(range)?;
        let (mut s, mut e) = self.clamp_to_trim(s0, e0);
        if s >= e {
            return Ok(());
        }
        op_debug!("flood {:#x}..{:#x}", s, e);
        // Widen to the hulls of the blocks straddling either end, so the
        // replacement block swallows them whole.
        if let Some(i) = self.rack().index_at(s) {
            s = s.min(self.rack().get(i).unwrap().start());
        }
        if let Some(i) = self.rack().index_at(e - 1) {
            e = e.max(self.rack().get(i).unwrap().endex());
        }
        let span = usize::try_from(e - s).map_err(|_| MemError::Overflow)?;
        let n = pattern.len() as u64;
        let phase = ((s % n) + n - (s0 % n)) % n;
        let mut pat = BlockBuf::from_slice(pattern)?;
        pat.rotate_left(phase as usize);
        pat.repeat_to_size(span)?;
        let lo = self.rack().index_start(s);
        let hi = self.rack().index_endex(e);
        for b in self.rack().range(lo..hi) {
            let off = (b.start() - s) as usize;
            pat.as_mut_slice()[off..off + b.len()].copy_from_slice(b.as_slice());
        }
        let block = Block::from_buf(s, pat)?;
        self.rack_mut().drain(lo..hi);
        self.rack_mut().insert(lo, block);
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(())
    }

    /// Store one byte right after the current content end.
    pub fn append(&mut self, value: u8, backups: Option<&mut Vec<Memory>>) -> Result<()> {
        let at = self.content_endex();
        self.poke(at, Some(value), backups)
    }

    /// Write `data` at `offset` addresses past the current content end.
    pub fn extend(
        &mut self,
        data: &[u8],
        offset: Addr,
        backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        let at = self
            .content_endex()
            .checked_add(offset)
            .ok_or(MemError::Overflow)?;
        self.write(at, data, backups)
    }

    /// Write another memory's content `offset` addresses past the current
    /// content end.
    pub fn extend_memory(&mut self, other: &Memory, offset: Addr) -> Result<()> {
        let at = self
            .content_endex()
            .checked_add(offset)
            .ok_or(MemError::Overflow)?;
        self.write_memory(at, other, false, None)
    }

    /// Take the byte at `addr` (default: the last address of the span) out
    /// of the map, shifting the content past it down by one.
    ///
    /// Returns the removed byte, or `None` if the cell was empty.
    pub fn pop(
        &mut self,
        addr: Option<Addr>,
        mut backups: Option<&mut Vec<Memory>>,
    ) -> Result<Option<u8>> {
        if self.rack().is_empty() {
            return Ok(None);
        }
        let at = match addr {
            Some(a) => a,
            None => self.endex() - 1,
        };
        let endex = at.checked_add(1).ok_or(MemError::Overflow)?;
        let value = self.peek(at);
        self.backup_range(&mut backups, at, endex)?;
        self.erase_(at, endex, true, true)?;
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(value)
    }

    /// Take the last stored item out of the map, without shifting.
    ///
    /// Returns its address and value, or `None` for an empty memory.
    pub fn popitem(&mut self) -> Result<Option<(Addr, u8)>> {
        let (addr, value) = match self.rack().back() {
            Some(b) => {
                let addr = b.endex() - 1;
                (addr, b.as_slice()[b.len() - 1])
            }
            None => return Ok(None),
        };
        self.erase_(addr, addr + 1, false, false)?;
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(Some((addr, value)))
    }

    /// Find the first occurrence of `needle` and delete it (with a shift),
    /// failing with `NotFound` if it is absent.
    pub fn remove(
        &mut self,
        needle: &[u8],
        backups: Option<&mut Vec<Memory>>,
    ) -> Result<()> {
        let at = self.find(needle, ..).ok_or(MemError::NotFound)?;
        let endex = at
            .checked_add(needle.len() as u64)
            .ok_or(MemError::Overflow)?;
        self.delete(at..endex, backups)
    }

    /// Extract `range` into a new memory and erase it here, leaving the
    /// hole in place.
    pub fn cut<R: RangeBounds<Addr>>(&mut self, range: R, bound: bool) -> Result<Memory> {
        let (s, e) = self.edit_span(range)?;
        let taken = self.extract(s..e, None, 1, bound)?;
        self.erase_(s, e, false, false)?;
        #[cfg(debug_assertions)]
        self.assert_well_formed();
        Ok(taken)
    }

    /// Repeat the span content `times` times in place: the checked form of
    /// the `*`/`*=` operators. `times == 0` empties the memory.
    pub fn repeat(&mut self, times: usize) -> Result<()> {
        if times == 0 {
            self.rack_mut().clear();
            return Ok(());
        }
        if times == 1 || self.rack().is_empty() {
            return Ok(());
        }
        if self.trim_span() == (None, None) && self.rack().len() == 1 {
            // Contiguous and unbounded: repeat the single payload in place.
            let b = self.rack().get(0).unwrap();
            let total = b.len().checked_mul(times).ok_or(MemError::Overflow)?;
            b.start()
                .checked_add(total as u64)
                .ok_or(MemError::Overflow)?;
            self.rack_mut()
                .get_mut(0)
                .unwrap()
                .payload_mut()?
                .repeat(times)?;
            return Ok(());
        }
        let start = self.start();
        let span = self.endex() - start;
        let template = self.to_blocks();
        for k in 1..times as u64 {
            let delta = span.checked_mul(k).ok_or(MemError::Overflow)?;
            for (a, bytes) in &template {
                let at = a.checked_add(delta).ok_or(MemError::Overflow)?;
                self.write(at, bytes, None)?;
            }
        }
        Ok(())
    }
}
