//! Typed config blocks
//!
//! The registry stores opaque bytes. [`ConfigBlock`] ties a Rust struct to
//! a block id and schema version, and the `get`/`get_mut` accessors turn a
//! lookup into a checked conversion instead of a blind cast:
//!
//! - the stored version must be at least [`ConfigBlock::VERSION`]
//! - the stored size must cover `size_of::<T>()`
//!
//! Newer blocks with fields appended past the end of `T` are accepted and
//! viewed through their prefix.
//!
//! Mutable access goes through [`TypedMut`], which puts the stored header
//! back when it is dropped. Only the payload of a block can change.

use core::ops::{Deref, DerefMut};

use uguid::Guid;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Error, Result};
use crate::field::Field;
use crate::header::{BlockHeader, BLOCK_HEADER_SIZE};
use crate::registry::{Block, Registry, RegistryView};

/// A fixed-layout config block type
///
/// Implementors are `#[repr(C)]` structs whose first field is a
/// [`BlockHeader`].
pub trait ConfigBlock: FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned + Sized {
    /// Block type id
    const ID: Guid;
    /// Schema version of this layout
    const VERSION: u16;
    /// Human readable name
    const NAME: &'static str;
    /// Documented policy fields
    const FIELDS: &'static [Field] = &[];

    /// Header describing a block of this type
    fn block_header() -> BlockHeader {
        BlockHeader::new(Self::ID, Self::VERSION, core::mem::size_of::<Self>() as u32)
    }

    /// Header embedded in this block
    fn header(&self) -> BlockHeader {
        BlockHeader::read_from_prefix(self.as_bytes())
            .map(|(header, _)| header)
            .unwrap_or_else(|_| Self::block_header())
    }
}

/// Check a stored block against the layout of `T` and view it as `T`
pub fn cast<'a, T: ConfigBlock>(block: Block<'a>) -> Result<&'a T> {
    check::<T>(block.header())?;
    T::ref_from_prefix(block.as_bytes())
        .map(|(typed, _)| typed)
        .map_err(|_| size_error::<T>(block.size()))
}

fn check<T: ConfigBlock>(header: &BlockHeader) -> Result<()> {
    if header.version() < T::VERSION {
        return Err(Error::UnsupportedVersion {
            found: header.version(),
            required: T::VERSION,
        });
    }
    if (header.size() as usize) < core::mem::size_of::<T>() {
        return Err(size_error::<T>(header.size()));
    }
    Ok(())
}

fn size_error<T>(found: u32) -> Error {
    Error::SizeMismatch {
        found,
        required: core::mem::size_of::<T>() as u32,
    }
}

impl<'a> RegistryView<'a> {
    /// Look up the block for `T` and view it as `T`
    pub fn get<T: ConfigBlock>(&self) -> Result<&'a T> {
        cast(self.find_block(T::ID)?)
    }
}

impl<S: AsRef<[u8]>> Registry<S> {
    /// Look up the block for `T` and view it as `T`; seals the registry
    pub fn get<T: ConfigBlock>(&self) -> Result<&T> {
        cast(self.find_block(T::ID)?)
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> Registry<S> {
    /// Add a typed block
    pub fn add<T: ConfigBlock>(&mut self, block: &T) -> Result<()> {
        self.add_block(block.as_bytes())
    }

    /// Mutable typed access while the registry is open
    pub fn get_mut<T: ConfigBlock>(&mut self) -> Result<TypedMut<'_, T>> {
        let block = self.find_block_mut(T::ID)?;
        let header = *block.header();
        check::<T>(&header)?;
        T::mut_from_prefix(block.into_bytes())
            .map(|(typed, _)| TypedMut { typed, header })
            .map_err(|_| size_error::<T>(header.size()))
    }
}

/// Mutable view of a typed block
///
/// Writes to the embedded header are undone when the guard is dropped.
#[derive(Debug)]
pub struct TypedMut<'a, T: ConfigBlock> {
    typed: &'a mut T,
    header: BlockHeader,
}

impl<T: ConfigBlock> Deref for TypedMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.typed
    }
}

impl<T: ConfigBlock> DerefMut for TypedMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.typed
    }
}

impl<T: ConfigBlock> Drop for TypedMut<'_, T> {
    fn drop(&mut self) {
        self.typed.as_mut_bytes()[..BLOCK_HEADER_SIZE].copy_from_slice(self.header.as_bytes());
    }
}
