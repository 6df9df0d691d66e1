//! Config block registry
//!
//! A [`Registry`] owns a fixed-capacity byte store that holds a
//! [`TableHeader`] followed by config blocks packed back to back. Blocks are
//! appended during a single initialization window and are read-only for
//! the rest of the boot phase:
//!
//! - [`Registry::add_block`] copies a self-describing block into the store
//! - [`Registry::find_block`] returns a borrow of a stored block by id
//! - [`Registry::iter`] enumerates blocks in insertion order
//!
//! The first lookup seals the registry. Adding a new block after that point
//! fails with [`Error::Sealed`], so the single-writer-then-readers
//! discipline is checked instead of assumed.
//!
//! The store is position independent: [`Registry::as_bytes`] is a complete
//! serialization and [`RegistryView::parse`] reads it back without copying.

use core::cell::Cell;
use core::fmt;
use core::iter::FusedIterator;

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use uguid::Guid;
use zerocopy::{FromBytes, IntoBytes};

use crate::error::{Error, Result};
use crate::field::Field;
use crate::header::{
    align_up, BlockHeader, TableHeader, BLOCK_HEADER_SIZE, TABLE_HEADER_SIZE, TABLE_ID,
    TABLE_VERSION,
};

/// A stored config block, borrowed from its registry
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    header: &'a BlockHeader,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Block<'a> {
    /// Block header
    pub fn header(&self) -> &'a BlockHeader {
        self.header
    }

    /// Block type id
    pub fn id(&self) -> Guid {
        self.header.id()
    }

    /// Schema version
    pub fn version(&self) -> u16 {
        self.header.version()
    }

    /// Total size including the header
    pub fn size(&self) -> u32 {
        self.header.size()
    }

    /// Offset of the block within the store
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Header and payload bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Payload bytes following the header
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[BLOCK_HEADER_SIZE..]
    }
}

/// Mutable access to a stored block during the initialization window
///
/// The header stays read-only; only the payload can change.
pub struct BlockMut<'a> {
    header: BlockHeader,
    bytes: &'a mut [u8],
}

impl<'a> BlockMut<'a> {
    /// Block header
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Header and payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }

    /// Payload bytes following the header
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[BLOCK_HEADER_SIZE..]
    }

    /// Write `value` into a field of this block
    ///
    /// Fields overlapping the header are rejected.
    pub fn write_field(&mut self, field: &Field, value: u64) -> Result<()> {
        if field.offset < BLOCK_HEADER_SIZE {
            return Err(Error::InvalidHeader);
        }
        field.write(self.bytes, value)
    }

    /// Read a field of this block
    pub fn read_field(&self, field: &Field) -> Option<u64> {
        field.read(self.bytes)
    }

    pub(crate) fn into_bytes(self) -> &'a mut [u8] {
        self.bytes
    }
}

/// Iterator over the blocks of a registry, in insertion order
///
/// Cloning the iterator restarts enumeration from the same position.
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    data: &'a [u8],
    offset: usize,
    remaining: usize,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let header = BlockHeader::parse(self.data.get(self.offset..)?).ok()?;
        let size = header.size() as usize;
        let bytes = self.data.get(self.offset..self.offset + size)?;
        let block = Block {
            header,
            bytes,
            offset: self.offset,
        };
        self.offset += align_up(size);
        self.remaining -= 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Blocks<'_> {}

impl FusedIterator for Blocks<'_> {}

/// Read-only view over a serialized block table
///
/// Obtained from a live registry with [`Registry::view`] or from persisted
/// bytes with [`RegistryView::parse`].
#[derive(Debug, Clone, Copy)]
pub struct RegistryView<'a> {
    data: &'a [u8],
    capacity: u32,
    count: usize,
}

impl<'a> RegistryView<'a> {
    /// Parse and validate a serialized table
    ///
    /// `bytes` may carry trailing padding after the last block.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let (table, _) = TableHeader::ref_from_prefix(bytes).map_err(|_| Error::InvalidTable)?;
        if table.header.id() != TABLE_ID || table.header.version() != TABLE_VERSION {
            return Err(Error::InvalidTable);
        }

        let capacity = table.capacity();
        let count = table.block_count() as usize;

        let mut offset = TABLE_HEADER_SIZE;
        for _ in 0..count {
            let rest = bytes.get(offset..).ok_or(Error::InvalidTable)?;
            let header = BlockHeader::parse(rest).map_err(|_| Error::InvalidTable)?;
            header.validate().map_err(|_| Error::InvalidTable)?;

            let size = header.size() as usize;
            if size > rest.len() {
                return Err(Error::InvalidTable);
            }
            offset += align_up(size);
        }

        if offset > capacity as usize
            || table.available.get() as usize != capacity as usize - offset
        {
            return Err(Error::InvalidTable);
        }

        let view = Self {
            data: bytes.get(..offset).ok_or(Error::InvalidTable)?,
            capacity,
            count,
        };

        for (i, a) in view.iter().enumerate() {
            if view.iter().skip(i + 1).any(|b| b.id() == a.id()) {
                return Err(Error::InvalidTable);
            }
        }

        Ok(view)
    }

    /// Find a block by id
    pub fn find_block(&self, id: Guid) -> Result<Block<'a>> {
        self.iter().find(|b| b.id() == id).ok_or(Error::NotFound)
    }

    /// Enumerate all blocks in insertion order
    pub fn iter(&self) -> Blocks<'a> {
        Blocks {
            data: self.data,
            offset: TABLE_HEADER_SIZE,
            remaining: self.count,
        }
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the table holds no blocks
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Capacity recorded in the table header
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bytes used by the table header and all blocks
    pub fn used(&self) -> usize {
        self.data.len()
    }

    /// Serialized table bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}

impl<'a> IntoIterator for RegistryView<'a> {
    type Item = Block<'a>;
    type IntoIter = Blocks<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Fixed-capacity config block registry
///
/// `S` is the backing store: a `Vec<u8>` from [`Registry::create`], or any
/// caller-provided buffer through [`Registry::in_place`].
pub struct Registry<S> {
    store: S,
    cursor: usize,
    count: usize,
    sealed: Cell<bool>,
}

#[cfg(feature = "alloc")]
impl Registry<Vec<u8>> {
    /// Allocate an empty registry of `capacity` bytes
    pub fn create(capacity: usize) -> Result<Self> {
        if capacity > u32::MAX as usize {
            return Err(Error::OutOfMemory);
        }
        let mut store = Vec::new();
        store
            .try_reserve_exact(capacity)
            .map_err(|_| Error::OutOfMemory)?;
        store.resize(capacity, 0);
        Self::in_place(store)
    }

    /// Rebuild a registry from bytes produced by [`Registry::as_bytes`]
    ///
    /// The restored registry has the recorded capacity and is sealed.
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        let view = RegistryView::parse(bytes)?;
        let capacity = view.capacity() as usize;

        let mut store = Vec::new();
        store
            .try_reserve_exact(capacity)
            .map_err(|_| Error::OutOfMemory)?;
        store.resize(capacity, 0);
        store[..view.used()].copy_from_slice(view.as_bytes());

        Ok(Self {
            store,
            cursor: view.used(),
            count: view.len(),
            sealed: Cell::new(true),
        })
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> Registry<S> {
    /// Use `store` as the backing store of an empty registry
    ///
    /// The whole buffer is cleared.
    pub fn in_place(mut store: S) -> Result<Self> {
        let capacity = store.as_ref().len();
        if capacity > u32::MAX as usize {
            return Err(Error::OutOfMemory);
        }
        if capacity < TABLE_HEADER_SIZE {
            return Err(Error::CapacityExceeded);
        }

        let bytes = store.as_mut();
        bytes.fill(0);
        bytes[..TABLE_HEADER_SIZE].copy_from_slice(TableHeader::new(capacity as u32).as_bytes());

        Ok(Self {
            store,
            cursor: TABLE_HEADER_SIZE,
            count: 0,
            sealed: Cell::new(false),
        })
    }

    /// Copy a complete block (header and payload) into the store
    ///
    /// On failure the registry is left unchanged.
    pub fn add_block(&mut self, block: &[u8]) -> Result<()> {
        let header = BlockHeader::parse(block)?;
        header.validate()?;
        let size = header.size() as usize;
        if block.len() != size {
            return Err(Error::InvalidHeader);
        }

        let offset = self.reserve(header.id(), size)?;
        self.store.as_mut()[offset..offset + size].copy_from_slice(block);
        self.commit(size)?;

        log::debug!(
            "Added block {} v{} ({} bytes) at offset {:#x}",
            header.id(),
            header.version(),
            size,
            offset
        );
        Ok(())
    }

    /// Reserve a block of `size` bytes and let `init` fill it in place
    ///
    /// `init` receives the zeroed block including its header; the header is
    /// stamped again afterwards so `init` cannot change id, version or size.
    pub fn add_with<F>(&mut self, header: BlockHeader, init: F) -> Result<()>
    where
        F: FnOnce(&mut [u8]),
    {
        header.validate()?;
        let size = header.size() as usize;

        let offset = self.reserve(header.id(), size)?;
        let slot = &mut self.store.as_mut()[offset..offset + size];
        slot.fill(0);
        init(slot);
        slot[..BLOCK_HEADER_SIZE].copy_from_slice(header.as_bytes());
        self.commit(size)?;

        log::debug!(
            "Initialized block {} v{} ({} bytes) at offset {:#x}",
            header.id(),
            header.version(),
            size,
            offset
        );
        Ok(())
    }

    /// Payload access for a stored block while the registry is open
    pub fn find_block_mut(&mut self, id: Guid) -> Result<BlockMut<'_>> {
        if self.sealed.get() {
            log::warn!("Refusing to modify block {} in a sealed registry", id);
            return Err(Error::Sealed);
        }
        let block = self.peek().find_block(id)?;
        let (header, offset, size) = (*block.header(), block.offset(), block.size() as usize);
        Ok(BlockMut {
            header,
            bytes: &mut self.store.as_mut()[offset..offset + size],
        })
    }

    /// Check duplicates, sealing and space for a new block
    fn reserve(&self, id: Guid, size: usize) -> Result<usize> {
        if self.peek().find_block(id).is_ok() {
            return Err(Error::DuplicateId);
        }
        if self.sealed.get() {
            log::warn!("Refusing to add block {} to a sealed registry", id);
            return Err(Error::Sealed);
        }
        if self.count >= u16::MAX as usize {
            return Err(Error::CapacityExceeded);
        }
        self.cursor
            .checked_add(align_up(size))
            .filter(|&end| end <= self.capacity())
            .ok_or(Error::CapacityExceeded)?;
        Ok(self.cursor)
    }

    /// Advance the cursor past a block that was just written
    fn commit(&mut self, size: usize) -> Result<()> {
        let cursor = self.cursor + align_up(size);
        let available = (self.capacity() - cursor) as u32;
        let count = (self.count + 1) as u16;

        let (table, _) =
            TableHeader::mut_from_prefix(self.store.as_mut()).map_err(|_| Error::InvalidTable)?;
        table.block_count.set(count);
        table.available.set(available);

        self.cursor = cursor;
        self.count += 1;
        Ok(())
    }
}

impl<S: AsRef<[u8]>> Registry<S> {
    /// End the initialization window
    pub fn seal(&self) {
        if !self.sealed.replace(true) {
            log::debug!(
                "Sealed registry with {} blocks ({} of {} bytes used)",
                self.count,
                self.cursor,
                self.capacity()
            );
        }
    }

    /// Whether the initialization window has ended
    pub fn is_sealed(&self) -> bool {
        self.sealed.get()
    }

    /// Read-only view of the registry; seals it
    pub fn view(&self) -> RegistryView<'_> {
        self.seal();
        self.peek()
    }

    /// Find a block by id; seals the registry
    pub fn find_block(&self, id: Guid) -> Result<Block<'_>> {
        self.view().find_block(id)
    }

    /// Enumerate blocks in insertion order; seals the registry
    pub fn iter(&self) -> Blocks<'_> {
        self.view().iter()
    }

    /// Check whether a block id is registered without sealing
    pub fn contains(&self, id: Guid) -> bool {
        self.peek().find_block(id).is_ok()
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the registry holds no blocks
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total capacity of the backing store
    pub fn capacity(&self) -> usize {
        self.store.as_ref().len()
    }

    /// Bytes used by the table header and all blocks
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Free bytes after the cursor
    pub fn available(&self) -> usize {
        self.capacity() - self.cursor
    }

    /// Serialized table: header and all blocks, without the free space
    pub fn as_bytes(&self) -> &[u8] {
        &self.store.as_ref()[..self.cursor]
    }

    fn peek(&self) -> RegistryView<'_> {
        RegistryView {
            data: self.as_bytes(),
            capacity: self.capacity() as u32,
            count: self.count,
        }
    }
}

impl<S: AsRef<[u8]>> fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("blocks", &self.count)
            .field("used", &self.cursor)
            .field("capacity", &self.capacity())
            .field("sealed", &self.sealed.get())
            .finish()
    }
}
