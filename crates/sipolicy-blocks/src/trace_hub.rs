//! Trace Hub config block (pre-memory)

use core::mem::offset_of;

use sipolicy_core::{guid, BlockHeader, ConfigBlock, Field, Guid};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Trace Hub operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TraceHubMode {
    /// Disabled
    Disabled = 0,
    /// Owned by a target debugger
    TargetDebugger = 1,
    /// Owned by a host debugger
    HostDebugger = 2,
}

impl TryFrom<u8> for TraceHubMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::TargetDebugger),
            2 => Ok(Self::HostDebugger),
            other => Err(other),
        }
    }
}

/// Trace Hub policy
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct TraceHubConfig {
    /// Block header
    pub header: BlockHeader,
    /// [`TraceHubMode`]
    pub mode: u8,
    /// Reserved
    pub reserved: [u8; 3],
    /// Trace buffer 0 size in KiB
    pub memory_region0_kib: U32,
    /// Trace buffer 1 size in KiB
    pub memory_region1_kib: U32,
}

impl TraceHubConfig {
    /// Operating mode, `None` for an unknown encoding
    pub fn mode(&self) -> Option<TraceHubMode> {
        TraceHubMode::try_from(self.mode).ok()
    }

    /// Memory to reserve for trace buffers in bytes
    pub fn reserved_memory(&self) -> u64 {
        if self.mode() == Some(TraceHubMode::Disabled) {
            return 0;
        }
        (self.memory_region0_kib.get() as u64 + self.memory_region1_kib.get() as u64) * 1024
    }
}

impl ConfigBlock for TraceHubConfig {
    const ID: Guid = guid!("f2a56d09-8c3e-4b71-9e40-3c7b2d18a6e5");
    const VERSION: u16 = 1;
    const NAME: &'static str = "TraceHub";
    const FIELDS: &'static [Field] = &[
        Field::u8("mode", offset_of!(TraceHubConfig, mode), "0 = disabled, 1 = target debugger, 2 = host debugger"),
        Field::u32("memory_region0_kib", offset_of!(TraceHubConfig, memory_region0_kib), "Trace buffer 0 size in KiB"),
        Field::u32("memory_region1_kib", offset_of!(TraceHubConfig, memory_region1_kib), "Trace buffer 1 size in KiB"),
    ];
}

impl Default for TraceHubConfig {
    fn default() -> Self {
        Self {
            header: Self::block_header(),
            mode: TraceHubMode::Disabled as u8,
            reserved: [0; 3],
            memory_region0_kib: U32::new(1024),
            memory_region1_kib: U32::new(1024),
        }
    }
}
