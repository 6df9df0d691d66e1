//! Direct Connect Interface config block (pre-memory)

use sipolicy_core::field::{extract, insert};
use sipolicy_core::{guid, BlockHeader, ConfigBlock, Field, Guid};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// DCI enable bit
pub const ENABLE_SHIFT: u8 = 0;
/// USB debug class mode shift
pub const DBC_MODE_SHIFT: u8 = 1;
/// USB debug class mode bits
pub const DBC_MODE_BITS: u8 = 3;
/// Keep DCI alive in low power states
pub const LPM_SHIFT: u8 = 4;

/// USB debug class mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DbcMode {
    /// Debug class disabled
    Disabled = 0,
    /// USB2 debug class
    Usb2 = 1,
    /// USB3 debug class
    Usb3 = 2,
    /// USB2 and USB3
    Both = 3,
    /// Leave the hardware setting alone
    NoChange = 4,
}

impl TryFrom<u32> for DbcMode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::Usb2),
            2 => Ok(Self::Usb3),
            3 => Ok(Self::Both),
            4 => Ok(Self::NoChange),
            other => Err(other),
        }
    }
}

/// DCI policy
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DciConfig {
    /// Block header
    pub header: BlockHeader,
    /// Settings, see the `*_SHIFT` constants
    pub control: U32,
}

impl DciConfig {
    /// Whether DCI is enabled
    pub fn enabled(&self) -> bool {
        extract(self.control.get(), ENABLE_SHIFT, 1) != 0
    }

    /// Enable or disable DCI
    pub fn set_enabled(&mut self, enable: bool) {
        self.control
            .set(insert(self.control.get(), ENABLE_SHIFT, 1, enable as u32));
    }

    /// Debug class mode, `None` for an unknown encoding
    pub fn dbc_mode(&self) -> Option<DbcMode> {
        DbcMode::try_from(extract(self.control.get(), DBC_MODE_SHIFT, DBC_MODE_BITS)).ok()
    }

    /// Set the debug class mode
    pub fn set_dbc_mode(&mut self, mode: DbcMode) {
        self.control.set(insert(
            self.control.get(),
            DBC_MODE_SHIFT,
            DBC_MODE_BITS,
            mode as u32,
        ));
    }
}

const CONTROL: usize = core::mem::offset_of!(DciConfig, control);

impl ConfigBlock for DciConfig {
    const ID: Guid = guid!("1e7c3a85-b940-4f2d-a6e1-8d5f2b07c349");
    const VERSION: u16 = 1;
    const NAME: &'static str = "Dci";
    const FIELDS: &'static [Field] = &[
        Field::flag("enable", CONTROL, 4, ENABLE_SHIFT, "Direct Connect Interface"),
        Field::bits("dbc_mode", CONTROL, 4, DBC_MODE_SHIFT, DBC_MODE_BITS, "0 = off, 1 = USB2, 2 = USB3, 3 = both, 4 = no change"),
        Field::flag("lpm", CONTROL, 4, LPM_SHIFT, "Keep DCI in low power states"),
    ];
}

impl Default for DciConfig {
    fn default() -> Self {
        Self {
            header: Self::block_header(),
            control: U32::new(insert(0, DBC_MODE_SHIFT, DBC_MODE_BITS, DbcMode::NoChange as u32)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipolicy_core::field::find_field;

    #[test]
    fn test_layout() {
        assert_eq!(core::mem::size_of::<DciConfig>(), 28);
    }

    #[test]
    fn test_defaults() {
        let dci = DciConfig::default();
        assert!(!dci.enabled());
        assert_eq!(dci.dbc_mode(), Some(DbcMode::NoChange));
    }

    #[test]
    fn test_accessors_and_fields_agree() {
        let mut dci = DciConfig::default();
        dci.set_enabled(true);
        dci.set_dbc_mode(DbcMode::Usb3);

        let enable = find_field(DciConfig::FIELDS, "enable").unwrap();
        let mode = find_field(DciConfig::FIELDS, "dbc_mode").unwrap();
        assert_eq!(enable.read(dci.as_bytes()), Some(1));
        assert_eq!(mode.read(dci.as_bytes()), Some(2));

        mode.write(dci.as_mut_bytes(), 7).unwrap();
        assert_eq!(dci.dbc_mode(), None);
        assert!(dci.enabled());
    }
}
