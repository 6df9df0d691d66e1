//! USB config block

use core::mem::offset_of;

use bitflags::bitflags;
use sipolicy_core::{guid, BlockHeader, ConfigBlock, Field, Guid};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::bit;

/// Number of USB2 ports
pub const USB2_PORTS: usize = 16;
/// Number of USB3 ports
pub const USB3_PORTS: usize = 10;
/// Overcurrent pin value for a port without a pin
pub const OC_SKIP: u8 = 0xFF;

bitflags! {
    /// USB controller enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UsbFlags: u32 {
        /// xDCI device controller
        const XDCI_ENABLE        = 1 << 0;
        /// Overcurrent reporting
        const OVERCURRENT_ENABLE = 1 << 1;
        /// Program port disable override
        const PDO_PROGRAMMING    = 1 << 2;
        /// xHCI latency tolerance reporting
        const XHCI_LTR           = 1 << 3;
        /// USB2 PHY sus well power gating
        const USB2_PHY_GATING    = 1 << 4;
    }
}

/// USB policy
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct UsbConfig {
    /// Block header
    pub header: BlockHeader,
    /// [`UsbFlags`] bits
    pub flags: U32,
    /// USB2 port enable mask
    pub usb2_port_enable: U16,
    /// USB3 port enable mask
    pub usb3_port_enable: U16,
    /// Overcurrent pin per USB2 port
    pub usb2_oc_pin: [u8; USB2_PORTS],
    /// Overcurrent pin per USB3 port
    pub usb3_oc_pin: [u8; USB3_PORTS],
    /// Reserved
    pub reserved: [u8; 2],
}

impl UsbConfig {
    /// Enabled flags
    pub fn flags(&self) -> UsbFlags {
        UsbFlags::from_bits_retain(self.flags.get())
    }

    /// Replace the enabled flags
    pub fn set_flags(&mut self, flags: UsbFlags) {
        self.flags.set(flags.bits());
    }

    /// Whether USB2 port `port` is enabled
    pub fn usb2_port_enabled(&self, port: usize) -> bool {
        port < USB2_PORTS && self.usb2_port_enable.get() & (1 << port) != 0
    }

    /// Whether USB3 port `port` is enabled
    pub fn usb3_port_enabled(&self, port: usize) -> bool {
        port < USB3_PORTS && self.usb3_port_enable.get() & (1 << port) != 0
    }

    /// Enable or disable USB2 port `port`; out of range ports are ignored
    pub fn set_usb2_port(&mut self, port: usize, enable: bool) {
        if port >= USB2_PORTS {
            return;
        }
        let mask = self.usb2_port_enable.get();
        let mask = if enable { mask | 1 << port } else { mask & !(1 << port) };
        self.usb2_port_enable.set(mask);
    }

    /// Overcurrent pin of USB2 port `port`, `None` if the port has none
    pub fn usb2_overcurrent_pin(&self, port: usize) -> Option<u8> {
        self.usb2_oc_pin.get(port).copied().filter(|&pin| pin != OC_SKIP)
    }

    /// Overcurrent pin of USB3 port `port`, `None` if the port has none
    pub fn usb3_overcurrent_pin(&self, port: usize) -> Option<u8> {
        self.usb3_oc_pin.get(port).copied().filter(|&pin| pin != OC_SKIP)
    }

    /// Number of enabled USB2 ports
    pub fn usb2_enabled_count(&self) -> u32 {
        self.usb2_port_enable.get().count_ones()
    }
}

const FLAGS: usize = offset_of!(UsbConfig, flags);

impl ConfigBlock for UsbConfig {
    const ID: Guid = guid!("a1c47e93-52d8-4b06-9f3e-6d0b8c2a4f71");
    const VERSION: u16 = 1;
    const NAME: &'static str = "Usb";
    const FIELDS: &'static [Field] = &[
        Field::flag("xdci_enable", FLAGS, 4, bit(UsbFlags::XDCI_ENABLE.bits()), "xDCI device controller"),
        Field::flag("overcurrent_enable", FLAGS, 4, bit(UsbFlags::OVERCURRENT_ENABLE.bits()), "Overcurrent reporting"),
        Field::flag("pdo_programming", FLAGS, 4, bit(UsbFlags::PDO_PROGRAMMING.bits()), "Port disable override"),
        Field::flag("xhci_ltr", FLAGS, 4, bit(UsbFlags::XHCI_LTR.bits()), "xHCI LTR"),
        Field::flag("usb2_phy_gating", FLAGS, 4, bit(UsbFlags::USB2_PHY_GATING.bits()), "USB2 PHY power gating"),
        Field::u16("usb2_port_enable", offset_of!(UsbConfig, usb2_port_enable), "USB2 port enable mask"),
        Field::u16("usb3_port_enable", offset_of!(UsbConfig, usb3_port_enable), "USB3 port enable mask"),
    ];
}

impl Default for UsbConfig {
    fn default() -> Self {
        // Two ports share each overcurrent pin
        let mut usb2_oc_pin = [0u8; USB2_PORTS];
        for (port, pin) in usb2_oc_pin.iter_mut().enumerate() {
            *pin = (port / 2) as u8;
        }
        let mut usb3_oc_pin = [0u8; USB3_PORTS];
        for (port, pin) in usb3_oc_pin.iter_mut().enumerate() {
            *pin = (port / 2) as u8;
        }

        Self {
            header: Self::block_header(),
            flags: U32::new(
                (UsbFlags::OVERCURRENT_ENABLE | UsbFlags::PDO_PROGRAMMING | UsbFlags::XHCI_LTR).bits(),
            ),
            usb2_port_enable: U16::new(u16::MAX),
            usb3_port_enable: U16::new((1u16 << USB3_PORTS) - 1),
            usb2_oc_pin,
            usb3_oc_pin,
            reserved: [0; 2],
        }
    }
}
