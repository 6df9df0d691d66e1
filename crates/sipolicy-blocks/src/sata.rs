//! SATA config block

use core::mem::offset_of;

use bitflags::bitflags;
use sipolicy_core::{guid, BlockHeader, ConfigBlock, Field, Guid};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::bit;

/// Number of SATA ports
pub const SATA_PORTS: usize = 8;

bitflags! {
    /// SATA controller enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SataFlags: u32 {
        /// SATA controller
        const ENABLE    = 1 << 0;
        /// Aggressive link power management
        const SALP      = 1 << 1;
        /// Activity LED
        const LED       = 1 << 2;
        /// Test mode
        const TEST_MODE = 1 << 3;
    }
}

/// Controller mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SataMode {
    /// AHCI
    Ahci = 0,
    /// RAID
    Raid = 1,
}

impl TryFrom<u8> for SataMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ahci),
            1 => Ok(Self::Raid),
            other => Err(other),
        }
    }
}

/// SATA policy
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct SataConfig {
    /// Block header
    pub header: BlockHeader,
    /// [`SataFlags`] bits
    pub flags: U32,
    /// [`SataMode`]
    pub mode: u8,
    /// Link speed limit: 0 = default, 1..=3 = Gen1..Gen3
    pub speed_limit: u8,
    /// Port enable mask
    pub port_enable: u8,
    /// Hot plug capable ports
    pub hot_plug: u8,
    /// DevSleep capable ports
    pub dev_sleep: u8,
    /// Reserved
    pub reserved: [u8; 3],
}

impl SataConfig {
    /// Enabled flags
    pub fn flags(&self) -> SataFlags {
        SataFlags::from_bits_retain(self.flags.get())
    }

    /// Replace the enabled flags
    pub fn set_flags(&mut self, flags: SataFlags) {
        self.flags.set(flags.bits());
    }

    /// Controller mode, `None` for an unknown encoding
    pub fn mode(&self) -> Option<SataMode> {
        SataMode::try_from(self.mode).ok()
    }

    /// Whether port `port` is enabled
    pub fn port_enabled(&self, port: usize) -> bool {
        port < SATA_PORTS && self.port_enable & (1 << port) != 0
    }

    /// Whether port `port` supports hot plug
    pub fn hot_plug(&self, port: usize) -> bool {
        port < SATA_PORTS && self.hot_plug & (1 << port) != 0
    }
}

const FLAGS: usize = offset_of!(SataConfig, flags);

impl ConfigBlock for SataConfig {
    const ID: Guid = guid!("c4e89a16-7f2b-4a3d-b851-2e6f09d3c7a8");
    const VERSION: u16 = 1;
    const NAME: &'static str = "Sata";
    const FIELDS: &'static [Field] = &[
        Field::flag("enable", FLAGS, 4, bit(SataFlags::ENABLE.bits()), "SATA controller"),
        Field::flag("salp", FLAGS, 4, bit(SataFlags::SALP.bits()), "Aggressive link power management"),
        Field::flag("led", FLAGS, 4, bit(SataFlags::LED.bits()), "Activity LED"),
        Field::flag("test_mode", FLAGS, 4, bit(SataFlags::TEST_MODE.bits()), "Test mode"),
        Field::u8("mode", offset_of!(SataConfig, mode), "0 = AHCI, 1 = RAID"),
        Field::u8("speed_limit", offset_of!(SataConfig, speed_limit), "0 = default, 1-3 = Gen1-Gen3"),
        Field::u8("port_enable", offset_of!(SataConfig, port_enable), "Port enable mask"),
        Field::u8("hot_plug", offset_of!(SataConfig, hot_plug), "Hot plug port mask"),
        Field::u8("dev_sleep", offset_of!(SataConfig, dev_sleep), "DevSleep port mask"),
    ];
}

impl Default for SataConfig {
    fn default() -> Self {
        Self {
            header: Self::block_header(),
            flags: U32::new((SataFlags::ENABLE | SataFlags::SALP | SataFlags::LED).bits()),
            mode: SataMode::Ahci as u8,
            speed_limit: 0,
            port_enable: 0xFF,
            hot_plug: 0,
            dev_sleep: 0,
            reserved: [0; 3],
        }
    }
}
