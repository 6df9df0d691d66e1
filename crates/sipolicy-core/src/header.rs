//! On-store header formats
//!
//! Every backing store starts with a [`TableHeader`], followed by config
//! blocks that each begin with a [`BlockHeader`]. All integers are
//! little-endian and every struct has alignment 1, so the byte layout does
//! not depend on the compiler or the host.
//!
//! ```text
//! offset 0    TableHeader (32 bytes)
//! offset 32   BlockHeader + payload   (size bytes, padded to 8)
//! ...         BlockHeader + payload
//! cursor      free space up to capacity
//! ```

use uguid::{guid, Guid};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Error, Result};

/// Id stamped into the table header of every backing store
pub const TABLE_ID: Guid = guid!("3f1c52a7-0d94-4b6e-a1c8-5e27b6d9f042");

/// Current table header version
pub const TABLE_VERSION: u16 = 1;

/// Size of [`BlockHeader`] in bytes
pub const BLOCK_HEADER_SIZE: usize = core::mem::size_of::<BlockHeader>();

/// Size of [`TableHeader`] in bytes
pub const TABLE_HEADER_SIZE: usize = core::mem::size_of::<TableHeader>();

/// Alignment of every block start within the store
pub const BLOCK_ALIGNMENT: usize = 8;

/// Round `size` up to [`BLOCK_ALIGNMENT`]
pub const fn align_up(size: usize) -> usize {
    (size + BLOCK_ALIGNMENT - 1) & !(BLOCK_ALIGNMENT - 1)
}

/// Header embedded as the first field of every config block
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct BlockHeader {
    /// Block type id (GUID bytes)
    pub id: [u8; 16],
    /// Total size of header and payload in bytes
    pub size: U32,
    /// Schema version of the payload layout
    pub version: U16,
    /// Producer-defined attributes, stored verbatim
    pub attributes: U16,
}

impl BlockHeader {
    /// Create a header for a block of `size` bytes
    pub const fn new(id: Guid, version: u16, size: u32) -> Self {
        Self {
            id: id.to_bytes(),
            size: U32::new(size),
            version: U16::new(version),
            attributes: U16::new(0),
        }
    }

    /// Block type id
    pub fn id(&self) -> Guid {
        Guid::from_bytes(self.id)
    }

    /// Total block size in bytes
    pub fn size(&self) -> u32 {
        self.size.get()
    }

    /// Schema version
    pub fn version(&self) -> u16 {
        self.version.get()
    }

    /// Check the header on its own, independent of any registry
    pub fn validate(&self) -> Result<()> {
        let id = self.id();
        if (self.size() as usize) < BLOCK_HEADER_SIZE
            || self.version() == 0
            || id == Guid::ZERO
            || id == TABLE_ID
        {
            return Err(Error::InvalidHeader);
        }
        Ok(())
    }

    /// Read a header from the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(bytes)
            .map(|(header, _)| header)
            .map_err(|_| Error::InvalidHeader)
    }
}

/// Header at offset 0 of every backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct TableHeader {
    /// `id` is [`TABLE_ID`], `size` is the store capacity
    pub header: BlockHeader,
    /// Number of registered blocks
    pub block_count: U16,
    /// Reserved, zero
    pub reserved: U16,
    /// Free bytes remaining after the cursor
    pub available: U32,
}

impl TableHeader {
    /// Header for an empty store of `capacity` bytes
    pub const fn new(capacity: u32) -> Self {
        Self {
            header: BlockHeader::new(TABLE_ID, TABLE_VERSION, capacity),
            block_count: U16::new(0),
            reserved: U16::new(0),
            available: U32::new(capacity - TABLE_HEADER_SIZE as u32),
        }
    }

    /// Store capacity in bytes
    pub fn capacity(&self) -> u32 {
        self.header.size()
    }

    /// Number of registered blocks
    pub fn block_count(&self) -> u16 {
        self.block_count.get()
    }
}
