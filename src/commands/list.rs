//! List commands implementation

use sipolicy_blocks::{catalog, BootPhase};
use sipolicy_core::BlockEntry;

/// List known config blocks
pub fn list_blocks(phase: Option<BootPhase>) {
    println!("Known config blocks:");
    println!();
    println!(
        "{:<14} {:<9} {:>4} {:>6} {:>7}  {}",
        "Name", "Phase", "Ver", "Size", "Fields", "GUID"
    );
    println!("{}", "-".repeat(86));

    for block_phase in BootPhase::ALL {
        if phase.is_some_and(|p| p != block_phase) {
            continue;
        }
        for entry in block_phase.blocks() {
            println!(
                "{:<14} {:<9} {:>4} {:>6} {:>7}  {}",
                entry.name,
                block_phase,
                entry.version,
                entry.size,
                entry.fields.len(),
                entry.id
            );
        }
    }
}

/// Show the fields of one block with their default values
pub fn list_fields(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let entry = catalog::entry_by_name(name)
        .ok_or_else(|| format!("Unknown block '{}' (see `sipolicy blocks`)", name))?;

    println!("{} v{} ({} bytes) {}", entry.name, entry.version, entry.size, entry.id);
    println!();
    println!(
        "{:<24} {:>6} {:>6} {:>10}  {}",
        "Field", "Offset", "Bits", "Default", "Description"
    );
    println!("{}", "-".repeat(80));

    let defaults = default_block(entry);
    for field in entry.fields {
        let bits = if field.bits == 1 {
            format!("{}", field.shift)
        } else {
            format!("{}:{}", field.shift + field.bits - 1, field.shift)
        };
        let default = field
            .read(&defaults)
            .map(|v| format!("{:#x}", v))
            .unwrap_or_default();
        println!(
            "{:<24} {:>#6x} {:>6} {:>10}  {}",
            field.name, field.offset, bits, default, field.help
        );
    }

    Ok(())
}

fn default_block(entry: &BlockEntry) -> Vec<u8> {
    let mut block = vec![0u8; entry.size];
    (entry.load_default)(&mut block);
    block
}
