//! CPU config block

use core::mem::offset_of;

use bitflags::bitflags;
use sipolicy_core::{guid, BlockHeader, ConfigBlock, Field, Guid};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::bit;

bitflags! {
    /// CPU feature enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuFeatures: u32 {
        /// Hyper-Threading
        const HYPER_THREADING      = 1 << 0;
        /// VT-x
        const VMX                  = 1 << 1;
        /// Trusted Execution Technology
        const TXT                  = 1 << 2;
        /// AES-NI
        const AES                  = 1 << 3;
        /// x2APIC mode
        const X2APIC               = 1 << 4;
        /// Protected processor inventory number
        const PPIN_CONTROL         = 1 << 5;
        /// SMM code access check
        const SMM_CODE_CHECK       = 1 << 6;
        /// Silicon debug interface
        const DEBUG_INTERFACE      = 1 << 7;
        /// Lock the debug interface setting
        const DEBUG_INTERFACE_LOCK = 1 << 8;
    }
}

/// Frequency the boot processor runs at before the OS takes over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootFrequency {
    /// Minimum ratio
    Minimum = 0,
    /// Maximum non-turbo ratio
    MaxNonTurbo = 1,
    /// Turbo ratio
    Turbo = 2,
}

impl TryFrom<u8> for BootFrequency {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Minimum),
            1 => Ok(Self::MaxNonTurbo),
            2 => Ok(Self::Turbo),
            other => Err(other),
        }
    }
}

/// CPU policy
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct CpuConfig {
    /// Block header
    pub header: BlockHeader,
    /// [`CpuFeatures`] bits
    pub features: U32,
    /// Number of active cores, 0 for all
    pub active_cores: u8,
    /// [`BootFrequency`]
    pub boot_frequency: u8,
    /// Reserved
    pub reserved: [u8; 2],
    /// Package power limit 1 in 1/8 W
    pub power_limit1: U16,
    /// Package power limit 2 in 1/8 W
    pub power_limit2: U16,
}

impl CpuConfig {
    /// Enabled features
    pub fn features(&self) -> CpuFeatures {
        CpuFeatures::from_bits_retain(self.features.get())
    }

    /// Replace the enabled features
    pub fn set_features(&mut self, features: CpuFeatures) {
        self.features.set(features.bits());
    }

    /// Boot frequency, `None` for an unknown encoding
    pub fn boot_frequency(&self) -> Option<BootFrequency> {
        BootFrequency::try_from(self.boot_frequency).ok()
    }

    /// Power limit 1 in milliwatts
    pub fn power_limit1_mw(&self) -> u32 {
        self.power_limit1.get() as u32 * 125
    }
}

impl ConfigBlock for CpuConfig {
    const ID: Guid = guid!("5c5d2b6e-9a41-4f0c-8e3d-7b1a62f4c810");
    const VERSION: u16 = 1;
    const NAME: &'static str = "Cpu";
    const FIELDS: &'static [Field] = &[
        Field::flag("hyper_threading", FEATURES, 4, bit(CpuFeatures::HYPER_THREADING.bits()), "Hyper-Threading"),
        Field::flag("vmx", FEATURES, 4, bit(CpuFeatures::VMX.bits()), "VT-x"),
        Field::flag("txt", FEATURES, 4, bit(CpuFeatures::TXT.bits()), "Trusted Execution Technology"),
        Field::flag("aes", FEATURES, 4, bit(CpuFeatures::AES.bits()), "AES-NI"),
        Field::flag("x2apic", FEATURES, 4, bit(CpuFeatures::X2APIC.bits()), "x2APIC mode"),
        Field::flag("ppin_control", FEATURES, 4, bit(CpuFeatures::PPIN_CONTROL.bits()), "PPIN control"),
        Field::flag("smm_code_check", FEATURES, 4, bit(CpuFeatures::SMM_CODE_CHECK.bits()), "SMM code access check"),
        Field::flag("debug_interface", FEATURES, 4, bit(CpuFeatures::DEBUG_INTERFACE.bits()), "Silicon debug interface"),
        Field::flag("debug_interface_lock", FEATURES, 4, bit(CpuFeatures::DEBUG_INTERFACE_LOCK.bits()), "Lock debug interface"),
        Field::u8("active_cores", offset_of!(CpuConfig, active_cores), "Active cores, 0 = all"),
        Field::u8("boot_frequency", offset_of!(CpuConfig, boot_frequency), "0 = min, 1 = max non-turbo, 2 = turbo"),
        Field::u16("power_limit1", offset_of!(CpuConfig, power_limit1), "PL1 in 1/8 W"),
        Field::u16("power_limit2", offset_of!(CpuConfig, power_limit2), "PL2 in 1/8 W"),
    ];
}

const FEATURES: usize = offset_of!(CpuConfig, features);

impl Default for CpuConfig {
    fn default() -> Self {
        let features = CpuFeatures::HYPER_THREADING
            | CpuFeatures::VMX
            | CpuFeatures::AES
            | CpuFeatures::X2APIC
            | CpuFeatures::SMM_CODE_CHECK
            | CpuFeatures::DEBUG_INTERFACE_LOCK;
        Self {
            header: Self::block_header(),
            features: U32::new(features.bits()),
            active_cores: 0,
            boot_frequency: BootFrequency::MaxNonTurbo as u8,
            reserved: [0; 2],
            power_limit1: U16::new(15 * 8),
            power_limit2: U16::new(64 * 8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(core::mem::size_of::<CpuConfig>(), 36);
        assert_eq!(FEATURES, 24);
    }

    #[test]
    fn test_defaults() {
        let cpu = CpuConfig::default();
        assert!(cpu.features().contains(CpuFeatures::VMX));
        assert!(!cpu.features().contains(CpuFeatures::TXT));
        assert_eq!(cpu.boot_frequency(), Some(BootFrequency::MaxNonTurbo));
        assert_eq!(cpu.power_limit1_mw(), 15_000);
    }

    #[test]
    fn test_fields_match_accessors() {
        let mut cpu = CpuConfig::default();
        let txt = sipolicy_core::field::find_field(CpuConfig::FIELDS, "txt").unwrap();
        txt.write(cpu.as_mut_bytes(), 1).unwrap();
        assert!(cpu.features().contains(CpuFeatures::TXT));

        cpu.set_features(CpuFeatures::empty());
        let vmx = sipolicy_core::field::find_field(CpuConfig::FIELDS, "vmx").unwrap();
        assert_eq!(vmx.read(cpu.as_bytes()), Some(0));
    }
}
