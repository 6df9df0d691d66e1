//! CLI command implementations
//!
//! Input files for `dump` and `check` may be either a raw table (as written
//! by `build`) or a HOB list carrying one handoff record per phase. Both are
//! resolved to [`Table`]s by [`find_tables`].

pub mod build;
pub mod check;
pub mod dump;
mod list;

pub use list::{list_blocks, list_fields};

use sipolicy_blocks::BootPhase;
use sipolicy_core::handoff::{self, HOB_TYPE_GUID_EXTENSION};
use sipolicy_core::header::TABLE_ID;

/// A serialized table found in an input file
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    /// Phase named by the handoff record, `None` for a raw table
    pub phase: Option<BootPhase>,
    /// Table bytes, possibly with trailing padding
    pub bytes: &'a [u8],
}

/// Locate the policy tables in `data`
pub fn find_tables(data: &[u8]) -> Result<Vec<Table<'_>>, Box<dyn std::error::Error>> {
    if data.starts_with(&TABLE_ID.to_bytes()) {
        log::debug!("Input is a raw policy table");
        return Ok(vec![Table {
            phase: None,
            bytes: data,
        }]);
    }

    let mut tables = Vec::new();
    for hob in handoff::hobs(data) {
        let (hob_type, record) = hob?;
        if hob_type != HOB_TYPE_GUID_EXTENSION {
            continue;
        }
        let (tag, bytes) = handoff::decode(record)?;
        match BootPhase::from_handoff_tag(tag) {
            Some(phase) => tables.push(Table {
                phase: Some(phase),
                bytes,
            }),
            None => log::debug!("Skipping GUID HOB {}", tag),
        }
    }

    if tables.is_empty() {
        return Err("No policy table or handoff record found".into());
    }
    Ok(tables)
}

/// Format a byte count like "8 KiB"
pub fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
