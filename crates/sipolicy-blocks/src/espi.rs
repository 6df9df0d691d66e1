//! eSPI config block

use core::mem::offset_of;

use bitflags::bitflags;
use sipolicy_core::field::{extract, insert};
use sipolicy_core::{guid, BlockHeader, ConfigBlock, Field, Guid};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::bit;

bitflags! {
    /// eSPI enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EspiFlags: u32 {
        /// LPC generic memory range decode
        const LGMR_ENABLE      = 1 << 0;
        /// Bus master enable on the host side
        const HOST_BME         = 1 << 1;
        /// Report C10 state to the device
        const HOST_C10_REPORT  = 1 << 2;
        /// Lock the link configuration
        const LOCK_LINK_CONFIG = 1 << 3;
    }
}

/// IO mode shift in `link`
pub const IO_MODE_SHIFT: u8 = 0;
/// IO mode bits: 0 single, 1 dual, 2 quad
pub const IO_MODE_BITS: u8 = 2;
/// Maximum frequency shift in `link`
pub const FREQUENCY_SHIFT: u8 = 2;
/// Maximum frequency bits, see [`EspiConfig::max_frequency_mhz`]
pub const FREQUENCY_BITS: u8 = 3;
/// Alert pin mode bit in `link`
pub const ALERT_MODE_SHIFT: u8 = 5;

const FREQUENCIES_MHZ: [u32; 5] = [20, 25, 33, 50, 66];

/// Link IO mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// Single IO
    Single,
    /// Dual IO
    Dual,
    /// Quad IO
    Quad,
}

/// eSPI policy
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct EspiConfig {
    /// Block header
    pub header: BlockHeader,
    /// [`EspiFlags`] bits
    pub flags: U32,
    /// Link settings, see the `*_SHIFT` constants
    pub link: U32,
}

impl EspiConfig {
    /// Enabled flags
    pub fn flags(&self) -> EspiFlags {
        EspiFlags::from_bits_retain(self.flags.get())
    }

    /// Link IO mode, `None` for an unknown encoding
    pub fn io_mode(&self) -> Option<IoMode> {
        match extract(self.link.get(), IO_MODE_SHIFT, IO_MODE_BITS) {
            0 => Some(IoMode::Single),
            1 => Some(IoMode::Dual),
            2 => Some(IoMode::Quad),
            _ => None,
        }
    }

    /// Set the link IO mode
    pub fn set_io_mode(&mut self, mode: IoMode) {
        let value = match mode {
            IoMode::Single => 0,
            IoMode::Dual => 1,
            IoMode::Quad => 2,
        };
        self.link
            .set(insert(self.link.get(), IO_MODE_SHIFT, IO_MODE_BITS, value));
    }

    /// Maximum link frequency, `None` for an unknown encoding
    pub fn max_frequency_mhz(&self) -> Option<u32> {
        let index = extract(self.link.get(), FREQUENCY_SHIFT, FREQUENCY_BITS);
        FREQUENCIES_MHZ.get(index as usize).copied()
    }

    /// Whether the alert pin is dedicated rather than shared with IO1
    pub fn dedicated_alert(&self) -> bool {
        extract(self.link.get(), ALERT_MODE_SHIFT, 1) != 0
    }
}

const FLAGS: usize = offset_of!(EspiConfig, flags);
const LINK: usize = offset_of!(EspiConfig, link);

impl ConfigBlock for EspiConfig {
    const ID: Guid = guid!("d7b30c58-19e4-4f6a-8c27-5a1d3e96b04f");
    const VERSION: u16 = 1;
    const NAME: &'static str = "Espi";
    const FIELDS: &'static [Field] = &[
        Field::flag("lgmr_enable", FLAGS, 4, bit(EspiFlags::LGMR_ENABLE.bits()), "LPC generic memory range"),
        Field::flag("host_bme", FLAGS, 4, bit(EspiFlags::HOST_BME.bits()), "Host bus master enable"),
        Field::flag("host_c10_report", FLAGS, 4, bit(EspiFlags::HOST_C10_REPORT.bits()), "Report C10 to device"),
        Field::flag("lock_link_config", FLAGS, 4, bit(EspiFlags::LOCK_LINK_CONFIG.bits()), "Lock link configuration"),
        Field::bits("io_mode", LINK, 4, IO_MODE_SHIFT, IO_MODE_BITS, "0 = single, 1 = dual, 2 = quad"),
        Field::bits("max_frequency", LINK, 4, FREQUENCY_SHIFT, FREQUENCY_BITS, "0 = 20 MHz, 1 = 25, 2 = 33, 3 = 50, 4 = 66"),
        Field::flag("dedicated_alert", LINK, 4, ALERT_MODE_SHIFT, "Dedicated alert pin"),
    ];
}

impl Default for EspiConfig {
    fn default() -> Self {
        let link = insert(0, IO_MODE_SHIFT, IO_MODE_BITS, 2);
        let link = insert(link, FREQUENCY_SHIFT, FREQUENCY_BITS, 3);
        Self {
            header: Self::block_header(),
            flags: U32::new((EspiFlags::HOST_BME | EspiFlags::LOCK_LINK_CONFIG).bits()),
            link: U32::new(link),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(core::mem::size_of::<EspiConfig>(), 32);
        assert_eq!(LINK, 28);
    }

    #[test]
    fn test_link_defaults() {
        let espi = EspiConfig::default();
        assert_eq!(espi.io_mode(), Some(IoMode::Quad));
        assert_eq!(espi.max_frequency_mhz(), Some(50));
        assert!(!espi.dedicated_alert());
    }

    #[test]
    fn test_io_mode_keeps_frequency() {
        let mut espi = EspiConfig::default();
        espi.set_io_mode(IoMode::Dual);
        assert_eq!(espi.io_mode(), Some(IoMode::Dual));
        assert_eq!(espi.max_frequency_mhz(), Some(50));
    }

    #[test]
    fn test_unknown_frequency() {
        let mut espi = EspiConfig::default();
        espi.link.set(insert(espi.link.get(), FREQUENCY_SHIFT, FREQUENCY_BITS, 7));
        assert_eq!(espi.max_frequency_mhz(), None);
    }
}
