//! Component block tables
//!
//! Each feature area contributes its blocks to a phase policy through a
//! static table of [`BlockEntry`] values. The table is used twice: once to
//! size the registry ([`total_size`]) and once to populate it with default
//! values ([`add_entries`]).
//!
//! # Example
//!
//! ```ignore
//! const BLOCKS: &[BlockEntry] = &[BlockEntry::of::<UsbConfig>(), BlockEntry::of::<SataConfig>()];
//!
//! let mut registry = Registry::create(total_size(BLOCKS))?;
//! add_entries(&mut registry, BLOCKS)?;
//! ```

use uguid::Guid;

use crate::block::ConfigBlock;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::header::{align_up, BlockHeader, TABLE_HEADER_SIZE};
use crate::registry::Registry;

/// Static description of one block type and its defaults
#[derive(Debug, Clone, Copy)]
pub struct BlockEntry {
    /// Human readable name
    pub name: &'static str,
    /// Block type id
    pub id: Guid,
    /// Schema version
    pub version: u16,
    /// Total block size in bytes
    pub size: usize,
    /// Documented policy fields
    pub fields: &'static [Field],
    /// Fill a zeroed block with default values
    pub load_default: fn(&mut [u8]),
}

impl BlockEntry {
    /// Entry for a typed block whose `Default` holds the policy defaults
    pub const fn of<T: ConfigBlock + Default>() -> Self {
        Self {
            name: T::NAME,
            id: T::ID,
            version: T::VERSION,
            size: core::mem::size_of::<T>(),
            fields: T::FIELDS,
            load_default: load_default::<T>,
        }
    }

    /// Header of a block described by this entry
    pub fn header(&self) -> BlockHeader {
        BlockHeader::new(self.id, self.version, self.size as u32)
    }

    /// Check a stored header against this entry's version and size
    pub fn verify(&self, header: &BlockHeader) -> Result<()> {
        if header.version() < self.version {
            return Err(Error::UnsupportedVersion {
                found: header.version(),
                required: self.version,
            });
        }
        if (header.size() as usize) < self.size {
            return Err(Error::SizeMismatch {
                found: header.size(),
                required: self.size as u32,
            });
        }
        Ok(())
    }
}

fn load_default<T: ConfigBlock + Default>(block: &mut [u8]) {
    let defaults = T::default();
    let bytes = defaults.as_bytes();
    let len = bytes.len().min(block.len());
    block[..len].copy_from_slice(&bytes[..len]);
}

/// Bytes needed for a registry holding every entry
pub fn total_size(entries: &[BlockEntry]) -> usize {
    TABLE_HEADER_SIZE + entries.iter().map(|e| align_up(e.size)).sum::<usize>()
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> Registry<S> {
    /// Add one entry initialized with its defaults
    pub fn add_entry(&mut self, entry: &BlockEntry) -> Result<()> {
        self.add_with(entry.header(), entry.load_default)
    }
}

/// Add every entry, stopping at the first failure
pub fn add_entries<S>(registry: &mut Registry<S>, entries: &[BlockEntry]) -> Result<()>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    for entry in entries {
        if let Err(e) = registry.add_entry(entry) {
            log::error!("Failed to add {} block: {}", entry.name, e);
            return Err(e);
        }
        log::debug!("{} block v{} ({} bytes)", entry.name, entry.version, entry.size);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uguid::guid;
    use zerocopy::little_endian::U32;
    use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

    #[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
    #[repr(C)]
    struct Alpha {
        header: BlockHeader,
        value: U32,
    }

    impl ConfigBlock for Alpha {
        const ID: Guid = guid!("1d6f3e2a-4b50-4c71-8a93-0f2e5d7c6b18");
        const VERSION: u16 = 1;
        const NAME: &'static str = "Alpha";
    }

    impl Default for Alpha {
        fn default() -> Self {
            Self {
                header: Self::block_header(),
                value: U32::new(0xC0FFEE),
            }
        }
    }

    #[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
    #[repr(C)]
    struct Beta {
        header: BlockHeader,
        flags: [u8; 5],
    }

    impl ConfigBlock for Beta {
        const ID: Guid = guid!("2e7a4f3b-5c61-4d82-9ba4-1a3f6e8d7c29");
        const VERSION: u16 = 3;
        const NAME: &'static str = "Beta";
    }

    impl Default for Beta {
        fn default() -> Self {
            Self {
                header: Self::block_header(),
                flags: [1, 0, 1, 0, 1],
            }
        }
    }

    const ENTRIES: &[BlockEntry] = &[BlockEntry::of::<Alpha>(), BlockEntry::of::<Beta>()];

    #[test]
    fn test_total_size() {
        // 32 table + 28 -> 32 + 29 -> 32
        assert_eq!(total_size(ENTRIES), 32 + 32 + 32);
        assert_eq!(total_size(&[]), TABLE_HEADER_SIZE);
    }

    #[test]
    fn test_add_entries_loads_defaults() {
        let mut registry = Registry::create(total_size(ENTRIES)).unwrap();
        add_entries(&mut registry, ENTRIES).unwrap();
        assert_eq!(registry.available(), 0);

        assert_eq!(registry.get::<Alpha>().unwrap().value.get(), 0xC0FFEE);
        let beta = registry.get::<Beta>().unwrap();
        assert_eq!(beta.flags, [1, 0, 1, 0, 1]);
        assert_eq!(beta.header(), Beta::block_header());
    }

    #[test]
    fn test_add_entries_reports_overflow() {
        let mut registry = Registry::create(total_size(ENTRIES) - 8).unwrap();
        assert_eq!(
            add_entries(&mut registry, ENTRIES).unwrap_err(),
            Error::CapacityExceeded
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_verify() {
        let beta = &ENTRIES[1];
        assert!(beta.verify(&beta.header()).is_ok());
        assert!(beta.verify(&BlockHeader::new(beta.id, 4, 40)).is_ok());
        assert_eq!(
            beta.verify(&BlockHeader::new(beta.id, 2, 29)).unwrap_err(),
            Error::UnsupportedVersion {
                found: 2,
                required: 3
            }
        );
        assert_eq!(
            beta.verify(&BlockHeader::new(beta.id, 3, 28)).unwrap_err(),
            Error::SizeMismatch {
                found: 28,
                required: 29
            }
        );
    }
}
