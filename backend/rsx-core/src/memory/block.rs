//! Backing allocations and the provider interface used to locate them

use crate::memory::{ADDRESS_SPACE_LEN, AddressRange};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

#[derive(Debug)]
struct MemoryBlock {
    base_address: u32,
    size: u32,
    bytes: RwLock<Box<[u8]>>,
}

/// Shared handle to one host allocation backing a contiguous piece of the RSX address space.
///
/// Cloning a handle is cheap and keeps the allocation alive; views hold handles so that bytes
/// stay valid after the block is unmapped from its provider.
#[derive(Debug, Clone)]
pub struct BlockHandle(Arc<MemoryBlock>);

impl BlockHandle {
    /// Create a zero-filled block.
    ///
    /// # Errors
    ///
    /// Returns an error if the block would extend past the end of the 32-bit address space.
    pub fn new(base_address: u32, size: u32) -> Result<Self, MapError> {
        check_in_address_space(base_address, u64::from(size))?;
        Self::from_bytes(base_address, vec![0; size as usize])
    }

    /// Create a block that takes ownership of existing contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the block would extend past the end of the 32-bit address space.
    pub fn from_bytes(base_address: u32, bytes: Vec<u8>) -> Result<Self, MapError> {
        check_in_address_space(base_address, bytes.len() as u64)?;

        Ok(Self(Arc::new(MemoryBlock {
            base_address,
            size: bytes.len() as u32,
            bytes: RwLock::new(bytes.into_boxed_slice()),
        })))
    }

    #[inline]
    #[must_use]
    pub fn base_address(&self) -> u32 {
        self.0.base_address
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.0.size
    }

    #[inline]
    #[must_use]
    pub fn range(&self) -> AddressRange {
        AddressRange::new(self.0.base_address, self.0.size)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, address: u32) -> bool {
        self.range().contains(address)
    }

    #[inline]
    #[must_use]
    pub fn covers(&self, range: AddressRange) -> bool {
        self.range().contains_range(range)
    }

    /// Shared reference to `length` bytes starting `offset` bytes into the block, or `None` if
    /// that span does not lie entirely inside the block.
    #[must_use]
    pub fn sub_reference(&self, offset: u32, length: u32) -> Option<Segment> {
        if length == 0 || u64::from(offset) + u64::from(length) > u64::from(self.size()) {
            return None;
        }

        Some(Segment { block: self.clone(), offset, length })
    }

    /// Whether both handles refer to the same allocation.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &BlockHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // The guarded data is plain bytes, so a panic while a guard was held cannot leave it in an
    // invalid state
    fn read_guard(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.0.bytes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.0.bytes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A span of bytes inside one backing block.
#[derive(Debug, Clone)]
pub struct Segment {
    block: BlockHandle,
    offset: u32,
    length: u32,
}

impl Segment {
    #[inline]
    #[must_use]
    pub fn block(&self) -> &BlockHandle {
        &self.block
    }

    #[inline]
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    #[allow(clippy::len_without_is_empty)]
    #[must_use]
    pub fn len(&self) -> u32 {
        self.length
    }

    /// RSX address of the first byte in this segment.
    #[inline]
    #[must_use]
    pub fn address(&self) -> u32 {
        self.block.base_address() + self.offset
    }

    /// Narrow this segment to `length` bytes starting `offset` bytes in.
    #[must_use]
    pub fn slice(&self, offset: u32, length: u32) -> Option<Segment> {
        if length == 0 || u64::from(offset) + u64::from(length) > u64::from(self.length) {
            return None;
        }

        Some(Segment { block: self.block.clone(), offset: self.offset + offset, length })
    }

    #[inline]
    #[must_use]
    pub fn same_span(&self, other: &Segment) -> bool {
        self.block.ptr_eq(&other.block) && self.offset == other.offset && self.length == other.length
    }

    /// Run `f` over the segment's bytes while holding a read lock on the backing block.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.block.read_guard();
        let start = self.offset as usize;
        f(&guard[start..start + self.length as usize])
    }

    /// Run `f` over the segment's bytes while holding a write lock on the backing block.
    ///
    /// `f` must not access any other view or segment of the same block; doing so deadlocks.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.block.write_guard();
        let start = self.offset as usize;
        f(&mut guard[start..start + self.length as usize])
    }
}

/// Source of backing blocks for RSX addresses, typically the emulator's virtual memory manager.
///
/// Implementations must return `None` for unmapped addresses rather than failing, and should be
/// safe for concurrent reads if several rendering contexts share one address space.
pub trait MemoryBlockProvider {
    /// Block containing `address`, if any.
    fn find_block(&self, address: u32) -> Option<BlockHandle>;

    /// A single block valid for the whole of `range`, if the range is backed contiguously.
    fn find_contiguous(&self, range: AddressRange) -> Option<BlockHandle> {
        self.find_block(range.start).filter(|block| block.covers(range))
    }

    /// Counter that changes whenever blocks are mapped or unmapped. Views resolved under an older
    /// generation must not be handed out again.
    ///
    /// Providers whose mappings never change after creation can leave this at the default.
    fn generation(&self) -> u64 {
        0
    }
}

impl<P: MemoryBlockProvider + ?Sized> MemoryBlockProvider for &P {
    fn find_block(&self, address: u32) -> Option<BlockHandle> {
        (**self).find_block(address)
    }

    fn find_contiguous(&self, range: AddressRange) -> Option<BlockHandle> {
        (**self).find_contiguous(range)
    }

    fn generation(&self) -> u64 {
        (**self).generation()
    }
}

impl<P: MemoryBlockProvider + ?Sized> MemoryBlockProvider for Arc<P> {
    fn find_block(&self, address: u32) -> Option<BlockHandle> {
        (**self).find_block(address)
    }

    fn find_contiguous(&self, range: AddressRange) -> Option<BlockHandle> {
        (**self).find_contiguous(range)
    }

    fn generation(&self) -> u64 {
        (**self).generation()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("cannot map a zero-length block at {address:#010X}")]
    EmptyBlock { address: u32 },
    #[error("block {new} overlaps existing block {existing}")]
    Overlap { new: AddressRange, existing: AddressRange },
    #[error("block at {address:#010X} with length {len:#X} extends past the 32-bit address space")]
    OutOfRange { address: u32, len: u64 },
}

fn check_in_address_space(address: u32, len: u64) -> Result<(), MapError> {
    // Block sizes are stored as u32, so a full 4 GiB block is out of range too
    if len > u64::from(u32::MAX) || u64::from(address) + len > ADDRESS_SPACE_LEN {
        return Err(MapError::OutOfRange { address, len });
    }

    Ok(())
}

/// In-memory block provider keyed by base address.
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    blocks: BTreeMap<u32, BlockHandle>,
    generation: u64,
}

impl BlockMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a new zero-filled block.
    ///
    /// # Errors
    ///
    /// Returns an error if the block is empty, overlaps an existing block, or extends past the end
    /// of the 32-bit address space.
    pub fn map(&mut self, base_address: u32, size: u32) -> Result<BlockHandle, MapError> {
        let block = BlockHandle::new(base_address, size)?;
        self.map_block(block.clone())?;
        Ok(block)
    }

    /// Map an existing block.
    ///
    /// # Errors
    ///
    /// Returns an error if the block is empty or overlaps an existing block.
    pub fn map_block(&mut self, block: BlockHandle) -> Result<(), MapError> {
        let new = block.range();
        if new.is_empty() {
            return Err(MapError::EmptyBlock { address: new.start });
        }

        if let Some(existing) = self.blocks.values().find(|existing| existing.range().overlaps(new))
        {
            return Err(MapError::Overlap { new, existing: existing.range() });
        }

        self.blocks.insert(new.start, block);
        self.generation += 1;

        Ok(())
    }

    /// Remove the block based at `base_address`. Views that already hold the block keep it alive.
    pub fn unmap(&mut self, base_address: u32) -> Option<BlockHandle> {
        let removed = self.blocks.remove(&base_address);
        if removed.is_some() {
            self.generation += 1;
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BlockHandle> {
        self.blocks.values()
    }
}

impl MemoryBlockProvider for BlockMap {
    fn find_block(&self, address: u32) -> Option<BlockHandle> {
        self.blocks
            .range(..=address)
            .next_back()
            .map(|(_, block)| block)
            .filter(|block| block.contains(address))
            .cloned()
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_reference_bounds() {
        let block = BlockHandle::new(0x1000, 16).unwrap();

        let segment = block.sub_reference(4, 12).unwrap();
        assert_eq!(segment.address(), 0x1004);
        assert_eq!(segment.len(), 12);

        assert!(block.sub_reference(4, 13).is_none());
        assert!(block.sub_reference(16, 1).is_none());
        assert!(block.sub_reference(0, 0).is_none());
        assert!(block.sub_reference(u32::MAX, 2).is_none());
    }

    #[test]
    fn segment_slice() {
        let block = BlockHandle::from_bytes(0, (0..16).collect()).unwrap();
        let segment = block.sub_reference(2, 10).unwrap();

        let inner = segment.slice(3, 4).unwrap();
        assert_eq!(inner.address(), 5);
        inner.with_bytes(|bytes| assert_eq!(bytes, &[5, 6, 7, 8]));

        assert!(segment.slice(8, 3).is_none());
    }

    #[test]
    fn segment_writes_are_visible_through_block() {
        let block = BlockHandle::new(0, 8).unwrap();
        let segment = block.sub_reference(2, 2).unwrap();
        segment.with_bytes_mut(|bytes| bytes.copy_from_slice(&[0xAA, 0xBB]));

        let whole = block.sub_reference(0, 8).unwrap();
        whole.with_bytes(|bytes| assert_eq!(bytes, &[0, 0, 0xAA, 0xBB, 0, 0, 0, 0]));
    }

    #[test]
    fn block_map_lookup() {
        let mut map = BlockMap::new();
        map.map(0x100, 0x10).unwrap();
        map.map(0x110, 0x20).unwrap();
        map.map(0x200, 0x10).unwrap();

        assert_eq!(map.find_block(0x100).unwrap().base_address(), 0x100);
        assert_eq!(map.find_block(0x10F).unwrap().base_address(), 0x100);
        assert_eq!(map.find_block(0x110).unwrap().base_address(), 0x110);
        assert_eq!(map.find_block(0x12F).unwrap().base_address(), 0x110);
        assert!(map.find_block(0x130).is_none());
        assert!(map.find_block(0xFF).is_none());
        assert!(map.find_block(0).is_none());

        // Adjacent blocks are still separate allocations
        assert!(map.find_contiguous(AddressRange::new(0x108, 0x10)).is_none());
        assert!(map.find_contiguous(AddressRange::new(0x110, 0x20)).is_some());
    }

    #[test]
    fn block_map_rejects_overlap() {
        let mut map = BlockMap::new();
        map.map(0x100, 0x10).unwrap();

        assert_eq!(
            map.map(0x108, 0x10).unwrap_err(),
            MapError::Overlap {
                new: AddressRange::new(0x108, 0x10),
                existing: AddressRange::new(0x100, 0x10),
            }
        );
        assert_eq!(map.map(0x300, 0).unwrap_err(), MapError::EmptyBlock { address: 0x300 });
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn block_map_rejects_out_of_range() {
        let mut map = BlockMap::new();

        assert_eq!(
            map.map(0xFFFF_FFF0, 0x20).unwrap_err(),
            MapError::OutOfRange { address: 0xFFFF_FFF0, len: 0x20 }
        );
        assert!(map.is_empty());
        assert_eq!(map.generation(), 0);

        // Ending exactly at 4 GiB is fine
        map.map(0xFFFF_FFF0, 0x10).unwrap();
        assert_eq!(map.len(), 1);

        assert_eq!(
            BlockHandle::from_bytes(0xFFFF_FFFF, vec![0; 2]).unwrap_err(),
            MapError::OutOfRange { address: 0xFFFF_FFFF, len: 2 }
        );
    }

    #[test]
    fn block_map_generation() {
        let mut map = BlockMap::new();
        assert_eq!(map.generation(), 0);

        map.map(0, 16).unwrap();
        assert_eq!(map.generation(), 1);

        assert!(map.unmap(0x1234).is_none());
        assert_eq!(map.generation(), 1);

        assert!(map.unmap(0).is_some());
        assert_eq!(map.generation(), 2);
    }

    #[test]
    fn block_at_top_of_address_space() {
        let block = BlockHandle::new(0xFFFF_FFF0, 16).unwrap();
        assert!(block.contains(0xFFFF_FFFF));
        assert!(block.covers(AddressRange::new(0xFFFF_FFF0, 16)));
    }
}
