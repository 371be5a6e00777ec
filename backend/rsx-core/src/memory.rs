//! RSX-side access to guest memory
//!
//! The RSX addresses a 32-bit space that the host backs with any number of separate allocations.
//! [`SuperPointerResolver`] turns an [`AddressRange`] into a [`View`] that exposes the range as one
//! logically contiguous run of bytes, stitching several backing blocks together when the range
//! crosses allocation boundaries.

mod block;
mod cache;
mod resolver;
mod view;


pub use block::{BlockHandle, BlockMap, MapError, MemoryBlockProvider, Segment};
pub use cache::ViewCache;
pub use resolver::{LocalMemoryWindow, ResolveError, SuperPointerResolver};
pub use view::{View, ViewError};

use std::fmt::{Display, Formatter};

/// Size of the 32-bit RSX address space
pub const ADDRESS_SPACE_LEN: u64 = 1 << 32;

/// Half-open range of RSX addresses, `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    pub start: u32,
    pub length: u32,
}

impl AddressRange {
    #[must_use]
    pub const fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// Exclusive end address. Computed in 64 bits so that a range ending exactly at the top of
    /// the address space is representable.
    #[inline]
    #[must_use]
    pub const fn end(self) -> u64 {
        self.start as u64 + self.length as u64
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.length == 0
    }

    #[inline]
    #[must_use]
    pub fn contains(self, address: u32) -> bool {
        address >= self.start && u64::from(address) < self.end()
    }

    #[inline]
    #[must_use]
    pub fn contains_range(self, other: AddressRange) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    #[inline]
    #[must_use]
    pub fn overlaps(self, other: AddressRange) -> bool {
        u64::from(self.start) < other.end() && u64::from(other.start) < self.end()
    }
}

impl Display for AddressRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010X}+{:#X}", self.start, self.length)
    }
}
