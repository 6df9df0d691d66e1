//! PCH general config block

use core::mem::offset_of;

use bitflags::bitflags;
use sipolicy_core::field::{extract, insert};
use sipolicy_core::{guid, BlockHeader, ConfigBlock, Field, Guid};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::bit;

bitflags! {
    /// PCH general enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PchFlags: u32 {
        /// Compatible revision id
        const CRID                  = 1 << 0;
        /// Legacy IO low latency
        const LEGACY_IO_LOW_LATENCY = 1 << 1;
        /// Lock the ACPI base address
        const ACPI_BASE_LOCK        = 1 << 2;
        /// Halt the TCO timer on boot
        const TCO_TIMER_HALT        = 1 << 3;
    }
}

/// Serial IRQ enable bit
pub const SIRQ_ENABLE_SHIFT: u8 = 0;
/// Serial IRQ mode: 0 quiet, 1 continuous
pub const SIRQ_MODE_SHIFT: u8 = 1;
/// Start frame pulse width shift
pub const SIRQ_PULSE_SHIFT: u8 = 2;
/// Start frame pulse width bits: 0 = 4 clocks, 1 = 6 clocks, 2 = 8 clocks
pub const SIRQ_PULSE_BITS: u8 = 2;

/// Serial IRQ mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialIrqMode {
    /// Quiet mode
    Quiet,
    /// Continuous mode
    Continuous,
}

/// PCH general policy
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PchGeneralConfig {
    /// Block header
    pub header: BlockHeader,
    /// [`PchFlags`] bits
    pub flags: U32,
    /// Serial IRQ control, see the `SIRQ_*` constants
    pub serial_irq: U32,
    /// ACPI IO base address
    pub acpi_base: U16,
    /// TCO IO base address
    pub tco_base: U16,
}

impl PchGeneralConfig {
    /// Enabled flags
    pub fn flags(&self) -> PchFlags {
        PchFlags::from_bits_retain(self.flags.get())
    }

    /// Replace the enabled flags
    pub fn set_flags(&mut self, flags: PchFlags) {
        self.flags.set(flags.bits());
    }

    /// Whether serial IRQ is enabled
    pub fn serial_irq_enabled(&self) -> bool {
        extract(self.serial_irq.get(), SIRQ_ENABLE_SHIFT, 1) != 0
    }

    /// Serial IRQ mode
    pub fn serial_irq_mode(&self) -> SerialIrqMode {
        match extract(self.serial_irq.get(), SIRQ_MODE_SHIFT, 1) {
            0 => SerialIrqMode::Quiet,
            _ => SerialIrqMode::Continuous,
        }
    }

    /// Set the serial IRQ mode
    pub fn set_serial_irq_mode(&mut self, mode: SerialIrqMode) {
        let value = match mode {
            SerialIrqMode::Quiet => 0,
            SerialIrqMode::Continuous => 1,
        };
        self.serial_irq
            .set(insert(self.serial_irq.get(), SIRQ_MODE_SHIFT, 1, value));
    }

    /// Start frame pulse width in clocks
    pub fn start_frame_pulse_clocks(&self) -> u32 {
        4 + 2 * extract(self.serial_irq.get(), SIRQ_PULSE_SHIFT, SIRQ_PULSE_BITS)
    }
}

const FLAGS: usize = offset_of!(PchGeneralConfig, flags);
const SERIAL_IRQ: usize = offset_of!(PchGeneralConfig, serial_irq);

impl ConfigBlock for PchGeneralConfig {
    const ID: Guid = guid!("8e2f61c4-3b7a-4d95-a0c6-1f9e48b2d537");
    const VERSION: u16 = 1;
    const NAME: &'static str = "PchGeneral";
    const FIELDS: &'static [Field] = &[
        Field::flag("crid", FLAGS, 4, bit(PchFlags::CRID.bits()), "Compatible revision id"),
        Field::flag("legacy_io_low_latency", FLAGS, 4, bit(PchFlags::LEGACY_IO_LOW_LATENCY.bits()), "Legacy IO low latency"),
        Field::flag("acpi_base_lock", FLAGS, 4, bit(PchFlags::ACPI_BASE_LOCK.bits()), "Lock ACPI base"),
        Field::flag("tco_timer_halt", FLAGS, 4, bit(PchFlags::TCO_TIMER_HALT.bits()), "Halt TCO timer on boot"),
        Field::flag("serial_irq_enable", SERIAL_IRQ, 4, SIRQ_ENABLE_SHIFT, "Serial IRQ"),
        Field::flag("serial_irq_mode", SERIAL_IRQ, 4, SIRQ_MODE_SHIFT, "0 = quiet, 1 = continuous"),
        Field::bits("serial_irq_pulse", SERIAL_IRQ, 4, SIRQ_PULSE_SHIFT, SIRQ_PULSE_BITS, "Start frame pulse, 0 = 4 clocks, 1 = 6, 2 = 8"),
        Field::u16("acpi_base", offset_of!(PchGeneralConfig, acpi_base), "ACPI IO base"),
        Field::u16("tco_base", offset_of!(PchGeneralConfig, tco_base), "TCO IO base"),
    ];
}

impl Default for PchGeneralConfig {
    fn default() -> Self {
        let serial_irq = insert(0, SIRQ_ENABLE_SHIFT, 1, 1);
        Self {
            header: Self::block_header(),
            flags: U32::new((PchFlags::ACPI_BASE_LOCK | PchFlags::TCO_TIMER_HALT).bits()),
            serial_irq: U32::new(serial_irq),
            acpi_base: U16::new(0x1800),
            tco_base: U16::new(0x0400),
        }
    }
}
