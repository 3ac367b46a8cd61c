//! A sparse byte-addressable memory container.
//!
//! The crate stores a large, possibly non-contiguous map from unsigned 64-bit
//! addresses to bytes. The representation is an ordered sequence of disjoint,
//! address-anchored byte runs ("blocks") held inside an ordered container
//! (the "rack"). Mutations translate address ranges into block-relative
//! offsets via binary search over the rack, then grow, shrink or split
//! individual blocks. Block payloads are reference counted, so copying a
//! [Memory] is cheap and mutation is copy-on-write.
//!
//! Because working with half-open address ranges can get confusing, we use a
//! few naming conventions consistently throughout (in alphabetical order):
//!
//!  * `addr`: an absolute address.
//!  * `endex`: the exclusive end address of a range. We avoid plain `end`
//!    because it does not say whether the bound is inclusive.
//!  * `endin`: the inclusive end address of a range (`endex - 1`).
//!  * `start`: the inclusive start address of a range.
//!
//! All ranges over addresses are half-open `[start, endex)`. Addresses up to
//! (but excluding) [ADDR_MAX] are storable; [ADDR_MAX] itself is reserved as
//! a sentinel, which keeps every block's exclusive end representable in a
//! `u64`.
//!
//! The container is single-writer: nothing in here is `Send` or `Sync`, and
//! reference counts are deliberately non-atomic. A [Rover] cursor borrows the
//! memory it walks, so the borrow checker rules out mutation during
//! iteration.

mod block;
mod error;
mod memory;
mod rack;
mod rover;

pub use error::{MemError, Result};
pub use memory::{Memory, MemoryView};
pub use rover::{Items, Keys, Rover};

/// An absolute address: the key type of the container.
pub type Addr = u64;

/// The reserved sentinel address. Bytes can be stored at any address in
/// `[0, ADDR_MAX)`; an operation that would place a byte at `ADDR_MAX` or
/// beyond fails with [MemError::Overflow].
pub const ADDR_MAX: Addr = Addr::MAX;

/// Above this content size the [std::fmt::Display] impl of [Memory] prints a
/// one-line summary instead of dumping block contents.
pub const STR_MAX_CONTENT_SIZE: u64 = 1000;

#[cfg(feature = "op_debug")]
use std::{env, sync::LazyLock};

#[cfg(feature = "op_debug")]
static OP_DEBUG: LazyLock<bool> = LazyLock::new(|| env::var("SMD_PRINT_OPS").is_ok());

/// Print select mutation events to stderr for testing/debugging purposes.
#[cfg(feature = "op_debug")]
pub(crate) fn print_op(event: &str) {
    if *OP_DEBUG {
        eprintln!("op-debug: {}", event);
    }
}

/// Emit an operation trace line when the `op_debug` feature is enabled and
/// the `SMD_PRINT_OPS` environment variable is set. Compiles to nothing
/// otherwise.
macro_rules! op_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "op_debug")]
        $crate::print_op(&format!($($arg)*));
    }};
}

pub(crate) use op_debug;
