//! Phase-to-phase handoff records
//!
//! At a phase boundary the serialized table is wrapped in a GUID extension
//! HOB so the next phase can find it by tag and rebuild the registry
//! without recomputing defaults.
//!
//! ```text
//! offset 0   hob_type = 0x0004 (u16)
//! offset 2   length   (u16, whole record, multiple of 8)
//! offset 4   reserved (u32)
//! offset 8   name     (16-byte tag GUID)
//! offset 24  table bytes, zero padded
//! ```
//!
//! Reference: UEFI PI specification, volume 3, "HOB Code Definitions".

use uguid::Guid;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::header::align_up;

/// GUID extension HOB type
pub const HOB_TYPE_GUID_EXTENSION: u16 = 0x0004;
/// End of HOB list marker type
pub const HOB_TYPE_END_OF_HOB_LIST: u16 = 0xFFFF;

/// Generic HOB header
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct HobHeader {
    /// HOB type
    pub hob_type: U16,
    /// Length of the whole HOB in bytes
    pub length: U16,
    /// Reserved, zero
    pub reserved: U32,
}

/// GUID extension HOB header
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct GuidHob {
    /// Generic header
    pub header: HobHeader,
    /// Tag identifying the payload
    pub name: [u8; 16],
}

const GUID_HOB_SIZE: usize = core::mem::size_of::<GuidHob>();
const HOB_HEADER_SIZE: usize = core::mem::size_of::<HobHeader>();

/// Wrap `table` in a GUID extension HOB tagged with `tag`
#[cfg(feature = "alloc")]
pub fn encode(tag: Guid, table: &[u8]) -> Result<Vec<u8>> {
    let length = align_up(GUID_HOB_SIZE + table.len());
    let length16 = u16::try_from(length).map_err(|_| Error::HandoffTooLarge)?;

    let hob = GuidHob {
        header: HobHeader {
            hob_type: U16::new(HOB_TYPE_GUID_EXTENSION),
            length: U16::new(length16),
            reserved: U32::new(0),
        },
        name: tag.to_bytes(),
    };

    let mut record = Vec::new();
    record
        .try_reserve_exact(length + HOB_HEADER_SIZE)
        .map_err(|_| Error::OutOfMemory)?;
    record.extend_from_slice(hob.as_bytes());
    record.extend_from_slice(table);
    record.resize(length, 0);
    Ok(record)
}

/// Like [`encode`], followed by an end-of-list HOB
#[cfg(feature = "alloc")]
pub fn encode_list(tag: Guid, table: &[u8]) -> Result<Vec<u8>> {
    let mut list = encode(tag, table)?;
    let end = HobHeader {
        hob_type: U16::new(HOB_TYPE_END_OF_HOB_LIST),
        length: U16::new(HOB_HEADER_SIZE as u16),
        reserved: U32::new(0),
    };
    list.extend_from_slice(end.as_bytes());
    Ok(list)
}

/// Split a single GUID extension HOB into its tag and data
///
/// The data keeps the record's trailing padding.
pub fn decode(record: &[u8]) -> Result<(Guid, &[u8])> {
    let (hob, _) = GuidHob::ref_from_prefix(record).map_err(|_| Error::InvalidHandoff)?;
    let length = hob.header.length.get() as usize;
    if hob.header.hob_type.get() != HOB_TYPE_GUID_EXTENSION
        || length < GUID_HOB_SIZE
        || length > record.len()
    {
        return Err(Error::InvalidHandoff);
    }
    Ok((Guid::from_bytes(hob.name), &record[GUID_HOB_SIZE..length]))
}

/// Iterator over the HOBs of a list, stopping at the end marker
#[derive(Debug, Clone)]
pub struct Hobs<'a> {
    list: &'a [u8],
    offset: usize,
    done: bool,
}

/// Walk a HOB list
pub fn hobs(list: &[u8]) -> Hobs<'_> {
    Hobs {
        list,
        offset: 0,
        done: false,
    }
}

impl<'a> Iterator for Hobs<'a> {
    /// HOB type and the whole HOB bytes
    type Item = Result<(u16, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let rest = &self.list[self.offset.min(self.list.len())..];
        let header = match HobHeader::ref_from_prefix(rest) {
            Ok((header, _)) => header,
            Err(_) => {
                self.done = true;
                return Some(Err(Error::InvalidHandoff));
            }
        };

        let hob_type = header.hob_type.get();
        if hob_type == HOB_TYPE_END_OF_HOB_LIST {
            self.done = true;
            return None;
        }

        let length = header.length.get() as usize;
        if length < HOB_HEADER_SIZE || length > rest.len() {
            self.done = true;
            return Some(Err(Error::InvalidHandoff));
        }

        self.offset += align_up(length);
        Some(Ok((hob_type, &rest[..length])))
    }
}

/// Find the data of the first GUID extension HOB tagged `tag`
pub fn find(list: &[u8], tag: Guid) -> Result<&[u8]> {
    for hob in hobs(list) {
        let (hob_type, bytes) = hob?;
        if hob_type != HOB_TYPE_GUID_EXTENSION {
            continue;
        }
        let (name, data) = decode(bytes)?;
        if name == tag {
            log::debug!("Found handoff {} ({} bytes)", tag, data.len());
            return Ok(data);
        }
    }
    Err(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use uguid::guid;

    const TAG: Guid = guid!("6b2d9c41-0e37-4a58-b1f2-8c45d7e9a063");
    const OTHER: Guid = guid!("7c3ead52-1f48-4b69-82a3-9d56e8f0b174");

    #[test]
    fn test_encode_layout() {
        let record = encode(TAG, &[0xAB; 10]).unwrap();
        assert_eq!(record.len(), 40);
        assert_eq!(&record[0..2], &HOB_TYPE_GUID_EXTENSION.to_le_bytes());
        assert_eq!(&record[2..4], &40u16.to_le_bytes());
        assert_eq!(&record[8..24], &TAG.to_bytes());
        assert_eq!(&record[24..34], &[0xAB; 10]);
        assert!(record[34..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode() {
        let record = encode(TAG, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let (tag, data) = decode(&record).unwrap();
        assert_eq!(tag, TAG);
        assert_eq!(data, &[1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(decode(&record[..20]).unwrap_err(), Error::InvalidHandoff);
        assert_eq!(decode(&record[..28]).unwrap_err(), Error::InvalidHandoff);
    }

    #[test]
    fn test_too_large() {
        let table = vec![0u8; 0x10000];
        assert_eq!(encode(TAG, &table).unwrap_err(), Error::HandoffTooLarge);
    }

    #[test]
    fn test_find_in_list() {
        let mut list = encode(OTHER, &[0x11; 16]).unwrap();
        list.extend(encode_list(TAG, &[0x22; 12]).unwrap());

        let data = find(&list, TAG).unwrap();
        assert_eq!(&data[..12], &[0x22; 12]);
        assert_eq!(find(&list, OTHER).unwrap(), &[0x11; 16]);

        let missing = guid!("00000000-0000-0000-0000-000000000001");
        assert_eq!(find(&list, missing).unwrap_err(), Error::NotFound);
    }

    #[test]
    fn test_find_skips_other_types() {
        let mut list = vec![0u8; 16];
        list[0..2].copy_from_slice(&0x0003u16.to_le_bytes());
        list[2..4].copy_from_slice(&16u16.to_le_bytes());
        list.extend(encode_list(TAG, &[0x33; 8]).unwrap());

        assert_eq!(hobs(&list).count(), 2);
        assert_eq!(find(&list, TAG).unwrap(), &[0x33; 8]);
    }

    #[test]
    fn test_malformed_list() {
        let mut list = encode(TAG, &[0x44; 8]).unwrap();
        list[2..4].copy_from_slice(&4u16.to_le_bytes());
        assert_eq!(find(&list, TAG).unwrap_err(), Error::InvalidHandoff);

        // Missing end marker
        let list = encode(OTHER, &[0x55; 8]).unwrap();
        assert_eq!(find(&list, TAG).unwrap_err(), Error::InvalidHandoff);
    }
}
