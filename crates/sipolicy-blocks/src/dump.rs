//! Policy dumps
//!
//! Decodes every block of a table against the catalog and writes it to the
//! log, the way silicon code prints its policy before consuming it.

use sipolicy_core::{Block, BlockEntry, Field, RegistryView};

use crate::catalog;

/// Field of a known block with its stored value
///
/// `value` is `None` when the stored block is too short to hold the field.
#[derive(Debug, Clone, Copy)]
pub struct FieldValue {
    /// Field descriptor
    pub field: &'static Field,
    /// Stored value
    pub value: Option<u64>,
}

/// Decode every documented field of `block`
pub fn field_values<'a>(
    block: Block<'a>,
    entry: &'static BlockEntry,
) -> impl Iterator<Item = FieldValue> + 'a {
    entry.fields.iter().map(move |field| FieldValue {
        field,
        value: field.read(block.as_bytes()),
    })
}

/// Write the whole table to the log at debug level
pub fn log_policy(view: RegistryView<'_>) {
    log::debug!(
        "Policy table: {} blocks, {} of {} bytes used",
        view.len(),
        view.used(),
        view.capacity()
    );
    for block in view {
        log_block(block);
    }
}

fn log_block(block: Block<'_>) {
    let Some(entry) = catalog::entry_by_id(block.id()) else {
        log::debug!(
            "  {} v{} ({} bytes) unknown block",
            block.id(),
            block.version(),
            block.size()
        );
        return;
    };

    log::debug!(
        "  {} v{} ({} bytes) @ {:#x}",
        entry.name,
        block.version(),
        block.size(),
        block.offset()
    );
    if block.version() < entry.version {
        log::debug!("    older than v{}, fields may be missing", entry.version);
    }
    for FieldValue { field, value } in field_values(block, entry) {
        match value {
            Some(value) => log::debug!("    {:<24} {:#x}", field.name, value),
            None => log::debug!("    {:<24} (absent)", field.name),
        }
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;
    use crate::{BootPhase, DciConfig, Policy};
    use sipolicy_core::ConfigBlock;

    #[test]
    fn test_field_values() {
        let mut policy = Policy::build(BootPhase::PreMem).unwrap();
        policy.get_mut::<DciConfig>().unwrap().set_enabled(true);

        let view = policy.view();
        let block = view.find_block(DciConfig::ID).unwrap();
        let entry = catalog::entry_by_id(DciConfig::ID).unwrap();
        let values: Vec<_> = field_values(block, entry)
            .map(|v| (v.field.name, v.value))
            .collect();
        assert_eq!(
            values,
            vec![("enable", Some(1)), ("dbc_mode", Some(4)), ("lpm", Some(0))]
        );

        log_policy(view);
    }

    #[test]
    fn test_short_block_reports_absent() {
        let entry = catalog::entry_by_name("TraceHub").unwrap();
        let mut registry = sipolicy_core::Registry::create(128).unwrap();
        let mut bytes = [0u8; 32];
        bytes[..24].copy_from_slice(
            zerocopy::IntoBytes::as_bytes(&sipolicy_core::BlockHeader::new(entry.id, 1, 32)),
        );
        registry.add_block(&bytes).unwrap();

        let block = registry.find_block(entry.id).unwrap();
        let absent: Vec<_> = field_values(block, entry)
            .filter(|v| v.value.is_none())
            .map(|v| v.field.name)
            .collect();
        assert_eq!(absent, vec!["memory_region1_kib"]);
    }
}
