//! Structural validation of a memory.
//!
//! [Memory::validate] checks the representation invariants that every
//! public operation promises to re-establish:
//!
//!  * no block is empty;
//!  * blocks are address-ascending and pairwise non-overlapping (touching
//!    is allowed);
//!  * no block reaches past the end of the address space;
//!  * the trim bounds, when set, are ordered and no stored byte lies
//!    outside them.
//!
//! `assert_well_formed` is the debug-build teeth behind that promise:
//! mutation paths call it on exit so a broken invariant aborts loudly at
//! the operation that introduced it, with the offending container
//! rendered into the panic message.

use crate::error::{MemError, Result};
use crate::Memory;

impl Memory {
    /// Check the representation invariants, reporting a violation as
    /// [MemError::InvalidBlocks].
    pub fn validate(&self) -> Result<()> {
        let mut prev_endex: Option<u64> = None;
        for b in self.rack().iter() {
            if b.len() == 0 {
                return Err(MemError::InvalidBlocks);
            }
            if b.start().checked_add(b.len() as u64).is_none() {
                return Err(MemError::InvalidBlocks);
            }
            if let Some(pe) = prev_endex {
                if b.start() < pe {
                    return Err(MemError::InvalidBlocks);
                }
            }
            prev_endex = Some(b.endex());
        }
        if let (Some(s), Some(e)) = (self.trim_start(), self.trim_endex()) {
            if e < s {
                return Err(MemError::InvalidBlocks);
            }
        }
        if let Some(s) = self.trim_start() {
            if let Some(cs) = self.rack().start() {
                if cs < s {
                    return Err(MemError::InvalidBlocks);
                }
            }
        }
        if let Some(e) = self.trim_endex() {
            if let Some(ce) = self.rack().endex() {
                if ce > e {
                    return Err(MemError::InvalidBlocks);
                }
            }
        }
        Ok(())
    }

    /// Panic if the container fails [Memory::validate], rendering it into
    /// the message. Debug builds call this at the end of every mutation.
    #[cfg(any(debug_assertions, test))]
    pub(crate) fn assert_well_formed(&self) {
        if let Err(e) = self.validate() {
            panic!("memory failed validation ({}):\n{}", e, self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Addr;

    fn mem(blocks: &[(Addr, &[u8])]) -> Memory {
        Memory::from_blocks(blocks.iter().map(|&(a, d)| (a, d))).unwrap()
    }

    #[test]
    fn valid_memories_validate() {
        Memory::new().validate().unwrap();
        mem(&[(0, b"ab"), (2, b"cd"), (10, b"e")]).validate().unwrap();
        let mut trimmed = mem(&[(5, b"ab")]);
        trimmed.set_trim_span(Some(5), Some(7)).unwrap();
        trimmed.validate().unwrap();
    }

    #[test]
    fn mutations_preserve_validity() {
        let mut m = mem(&[(1, b"ABC"), (6, b"xyz")]);
        m.insert(8, b"1", None).unwrap();
        m.validate().unwrap();
        m.delete(2..7, None).unwrap();
        m.validate().unwrap();
        m.fill(0..4, b"ab", None).unwrap();
        m.validate().unwrap();
        m.flood(0..20, b"cd").unwrap();
        m.validate().unwrap();
        m.shift(5, None).unwrap();
        m.validate().unwrap();
    }
}
