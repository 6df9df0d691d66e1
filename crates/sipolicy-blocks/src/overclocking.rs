//! Overclocking config block (pre-memory)
//!
//! Revision 2 appended the ring ratio fields. Consumers that only need the
//! core settings read [`OverclockingConfigV1`] and keep working against
//! both revisions.

use core::mem::offset_of;

use bitflags::bitflags;
use sipolicy_core::{guid, BlockHeader, ConfigBlock, Field, Guid};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::bit;

bitflags! {
    /// Overclocking enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OcFlags: u32 {
        /// Overclocking support
        const ENABLE = 1 << 0;
        /// Lock the overclocking settings
        const LOCK   = 1 << 1;
        /// Core voltage override instead of adaptive
        const VOLTAGE_OVERRIDE = 1 << 2;
    }
}

/// Overclocking policy, revision 1 layout
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct OverclockingConfigV1 {
    /// Block header
    pub header: BlockHeader,
    /// [`OcFlags`] bits
    pub flags: U32,
    /// Maximum core ratio
    pub core_max_ratio: u8,
    /// AVX2 ratio offset
    pub avx2_ratio_offset: u8,
    /// Reserved
    pub reserved: [u8; 2],
    /// Core voltage override in mV
    pub core_voltage_override: U16,
    /// Core voltage offset in mV (two's complement)
    pub core_voltage_offset: U16,
}

impl ConfigBlock for OverclockingConfigV1 {
    const ID: Guid = OverclockingConfig::ID;
    const VERSION: u16 = 1;
    const NAME: &'static str = "Overclocking";
}

/// Overclocking policy
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct OverclockingConfig {
    /// Revision 1 fields
    pub base: OverclockingConfigV1,
    /// Maximum ring ratio
    pub ring_max_ratio: u8,
    /// Minimum ring ratio
    pub ring_min_ratio: u8,
    /// Reserved
    pub reserved: [u8; 2],
}

impl OverclockingConfigV1 {
    /// Enabled flags
    pub fn flags(&self) -> OcFlags {
        OcFlags::from_bits_retain(self.flags.get())
    }

    /// Core voltage offset in mV
    pub fn core_voltage_offset_mv(&self) -> i16 {
        self.core_voltage_offset.get() as i16
    }

    /// Set the core voltage offset in mV
    pub fn set_core_voltage_offset_mv(&mut self, offset: i16) {
        self.core_voltage_offset.set(offset as u16);
    }
}

impl OverclockingConfig {
    /// Whether the ring ratio range is usable
    pub fn ring_ratio_valid(&self) -> bool {
        self.ring_min_ratio <= self.ring_max_ratio
    }
}

const FLAGS: usize = offset_of!(OverclockingConfigV1, flags);

impl ConfigBlock for OverclockingConfig {
    const ID: Guid = guid!("0b9e4f72-a6c1-4d38-85f2-7e3a1c9d5b64");
    const VERSION: u16 = 2;
    const NAME: &'static str = "Overclocking";
    const FIELDS: &'static [Field] = &[
        Field::flag("enable", FLAGS, 4, bit(OcFlags::ENABLE.bits()), "Overclocking support"),
        Field::flag("lock", FLAGS, 4, bit(OcFlags::LOCK.bits()), "Lock overclocking settings"),
        Field::flag("voltage_override", FLAGS, 4, bit(OcFlags::VOLTAGE_OVERRIDE.bits()), "Core voltage override mode"),
        Field::u8("core_max_ratio", offset_of!(OverclockingConfigV1, core_max_ratio), "Maximum core ratio, 0 = fused"),
        Field::u8("avx2_ratio_offset", offset_of!(OverclockingConfigV1, avx2_ratio_offset), "AVX2 ratio offset"),
        Field::u16("core_voltage_override", offset_of!(OverclockingConfigV1, core_voltage_override), "Core voltage override in mV"),
        Field::u16("core_voltage_offset", offset_of!(OverclockingConfigV1, core_voltage_offset), "Core voltage offset in mV, two's complement"),
        Field::u8("ring_max_ratio", offset_of!(OverclockingConfig, ring_max_ratio), "Maximum ring ratio, 0 = fused"),
        Field::u8("ring_min_ratio", offset_of!(OverclockingConfig, ring_min_ratio), "Minimum ring ratio, 0 = fused"),
    ];
}

impl Default for OverclockingConfig {
    fn default() -> Self {
        Self {
            base: OverclockingConfigV1 {
                header: Self::block_header(),
                flags: U32::new(OcFlags::LOCK.bits()),
                core_max_ratio: 0,
                avx2_ratio_offset: 0,
                reserved: [0; 2],
                core_voltage_override: U16::new(0),
                core_voltage_offset: U16::new(0),
            },
            ring_max_ratio: 0,
            ring_min_ratio: 0,
            reserved: [0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipolicy_core::{Error, Registry};

    #[test]
    fn test_layout() {
        assert_eq!(core::mem::size_of::<OverclockingConfigV1>(), 36);
        assert_eq!(core::mem::size_of::<OverclockingConfig>(), 40);
        assert_eq!(offset_of!(OverclockingConfig, ring_max_ratio), 36);
    }

    #[test]
    fn test_voltage_offset_sign() {
        let mut oc = OverclockingConfig::default();
        oc.base.set_core_voltage_offset_mv(-50);
        assert_eq!(oc.base.core_voltage_offset_mv(), -50);
        assert_eq!(oc.base.core_voltage_offset.get(), 0xFFCE);
    }

    #[test]
    fn test_v1_consumer_reads_v2_block() {
        let mut registry = Registry::create(128).unwrap();
        let mut oc = OverclockingConfig::default();
        oc.base.core_max_ratio = 52;
        registry.add(&oc).unwrap();

        let v1 = registry.get::<OverclockingConfigV1>().unwrap();
        assert_eq!(v1.core_max_ratio, 52);
        assert!(v1.flags().contains(OcFlags::LOCK));
    }

    #[test]
    fn test_v2_consumer_rejects_v1_block() {
        let mut registry = Registry::create(128).unwrap();
        let v1 = OverclockingConfigV1 {
            header: OverclockingConfigV1::block_header(),
            ..OverclockingConfig::default().base
        };
        registry.add(&v1).unwrap();

        assert_eq!(
            registry.get::<OverclockingConfig>().unwrap_err(),
            Error::UnsupportedVersion {
                found: 1,
                required: 2
            }
        );
    }
}
