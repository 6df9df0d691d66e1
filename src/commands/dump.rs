//! Dump command implementation

use std::fs;
use std::path::Path;

use sipolicy_blocks::catalog;
use sipolicy_blocks::dump::{field_values, FieldValue};
use sipolicy_core::{header::BLOCK_HEADER_SIZE, Block, RegistryView};

use super::{find_tables, format_size};

/// Decode and print every table in a file
pub fn cmd_dump(file: &Path, hex: bool) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(file)?;

    for table in find_tables(&data)? {
        let view = RegistryView::parse(table.bytes)?;
        match table.phase {
            Some(phase) => println!("Handoff record: {} policy", phase),
            None => println!("Policy table"),
        }
        println!(
            "  {} blocks, {} of {} used",
            view.len(),
            format_size(view.used()),
            format_size(view.capacity() as usize)
        );
        println!();

        for block in view {
            print_block(block, hex);
        }
    }

    Ok(())
}

fn print_block(block: Block<'_>, hex: bool) {
    let entry = catalog::entry_by_id(block.id());
    let name = entry.map(|e| e.name).unwrap_or("(unknown)");
    println!(
        "{:<14} v{:<3} {:>5} bytes @ {:#06x}  {}",
        name,
        block.version(),
        block.size(),
        block.offset(),
        block.id()
    );

    if let Some(entry) = entry {
        if block.version() < entry.version {
            println!("    older than v{}, some fields may be absent", entry.version);
        }
        for FieldValue { field, value } in field_values(block, entry) {
            match value {
                Some(value) => println!("    {:<24} {:#x}", field.name, value),
                None => println!("    {:<24} (absent)", field.name),
            }
        }
    }

    if hex {
        hex_dump(block.payload(), BLOCK_HEADER_SIZE);
    }
    println!();
}

fn hex_dump(bytes: &[u8], base: usize) {
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let line: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        println!("    {:04x}: {}", base + i * 16, line.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipolicy_blocks::{BootPhase, Policy};

    #[test]
    fn test_dump_table_and_handoff() {
        let policy = Policy::build(BootPhase::PostMem).unwrap();
        let table = std::env::temp_dir().join(format!("sipolicy-{}-dump.bin", std::process::id()));
        let hobs = std::env::temp_dir().join(format!("sipolicy-{}-dump.hob", std::process::id()));
        fs::write(&table, policy.to_table()).unwrap();
        fs::write(&hobs, policy.to_handoff().unwrap()).unwrap();

        cmd_dump(&table, true).unwrap();
        cmd_dump(&hobs, false).unwrap();

        fs::write(&table, [0xAAu8; 40]).unwrap();
        assert!(cmd_dump(&table, false).is_err());

        fs::remove_file(table).ok();
        fs::remove_file(hobs).ok();
    }
}
