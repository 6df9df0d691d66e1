//! Known config block types
//!
//! The component tables here drive both registry sizing and default
//! loading for each phase, and let tools name blocks found in a table
//! they did not build.

use sipolicy_core::{BlockEntry, Guid, Result, RegistryView};

use crate::phase::BootPhase;
use crate::{
    CpuConfig, DciConfig, EspiConfig, OverclockingConfig, PchGeneralConfig, SataConfig,
    TraceHubConfig, UsbConfig,
};

/// Blocks of the pre-memory policy
pub const PRE_MEM: &[BlockEntry] = &[
    BlockEntry::of::<TraceHubConfig>(),
    BlockEntry::of::<OverclockingConfig>(),
    BlockEntry::of::<DciConfig>(),
];

/// Blocks of the post-memory policy
pub const POST_MEM: &[BlockEntry] = &[
    BlockEntry::of::<CpuConfig>(),
    BlockEntry::of::<PchGeneralConfig>(),
    BlockEntry::of::<UsbConfig>(),
    BlockEntry::of::<SataConfig>(),
    BlockEntry::of::<EspiConfig>(),
];

/// Every known block, pre-memory first
pub const ALL: &[BlockEntry] = &[
    BlockEntry::of::<TraceHubConfig>(),
    BlockEntry::of::<OverclockingConfig>(),
    BlockEntry::of::<DciConfig>(),
    BlockEntry::of::<CpuConfig>(),
    BlockEntry::of::<PchGeneralConfig>(),
    BlockEntry::of::<UsbConfig>(),
    BlockEntry::of::<SataConfig>(),
    BlockEntry::of::<EspiConfig>(),
];

/// Entry for block type `id`
pub fn entry_by_id(id: Guid) -> Option<&'static BlockEntry> {
    ALL.iter().find(|entry| entry.id == id)
}

/// Entry named `name` (case-insensitive)
pub fn entry_by_name(name: &str) -> Option<&'static BlockEntry> {
    ALL.iter().find(|entry| entry.name.eq_ignore_ascii_case(name))
}

/// Phase whose policy carries block type `id`
pub fn phase_of(id: Guid) -> Option<BootPhase> {
    BootPhase::ALL
        .into_iter()
        .find(|phase| phase.blocks().iter().any(|entry| entry.id == id))
}

/// Check that `view` carries every block of `phase` in a usable revision
///
/// Yields one result per expected block, in catalog order.
pub fn verify<'a>(
    view: RegistryView<'a>,
    phase: BootPhase,
) -> impl Iterator<Item = (&'static BlockEntry, Result<()>)> + 'a {
    phase.blocks().iter().map(move |entry| {
        let result = view
            .find_block(entry.id)
            .and_then(|block| entry.verify(block.header()));
        (entry, result)
    })
}
