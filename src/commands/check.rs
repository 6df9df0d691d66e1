//! Check command implementation
//!
//! A missing or outdated block is fatal to the phase that needs it, so the
//! command fails unless every block of the phase is usable.

use std::fs;
use std::path::Path;

use sipolicy_blocks::{catalog, BootPhase};
use sipolicy_core::{Error, RegistryView};

use super::{find_tables, Table};

/// Check a table against the blocks its phase requires
pub fn cmd_check(file: &Path, phase: Option<BootPhase>) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(file)?;
    let tables = find_tables(&data)?;
    let (table, phase) = select_table(&tables, phase)?;

    let view = RegistryView::parse(table.bytes)?;
    let phase = match phase {
        Some(phase) => phase,
        None => infer_phase(view).ok_or("Cannot tell the table's phase, use --phase")?,
    };

    println!("Checking {} policy ({} blocks)", phase, view.len());
    let mut failures = 0;
    for (entry, result) in catalog::verify(view, phase) {
        match result {
            Ok(()) => println!("  {:<14} ok", entry.name),
            Err(Error::NotFound) => {
                failures += 1;
                println!("  {:<14} MISSING", entry.name);
            }
            Err(e) => {
                failures += 1;
                println!("  {:<14} {}", entry.name, e);
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} required block(s) missing or unusable", failures).into());
    }
    println!("All {} blocks present", phase.blocks().len());
    Ok(())
}

/// Pick the table to check and the phase it should be checked against
fn select_table<'t, 'a>(
    tables: &'t [Table<'a>],
    phase: Option<BootPhase>,
) -> Result<(&'t Table<'a>, Option<BootPhase>), Box<dyn std::error::Error>> {
    match phase {
        Some(wanted) => tables
            .iter()
            .find(|t| t.phase.is_none() || t.phase == Some(wanted))
            .map(|t| (t, Some(wanted)))
            .ok_or_else(|| format!("No {} handoff record in file", wanted).into()),
        None => match tables {
            [only] => Ok((only, only.phase)),
            _ => Err("File carries several phases, use --phase".into()),
        },
    }
}

/// Phase of the first block the catalog knows
fn infer_phase(view: RegistryView<'_>) -> Option<BootPhase> {
    view.iter().find_map(|block| catalog::phase_of(block.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipolicy_blocks::Policy;
    use sipolicy_core::handoff;

    fn write_temp(name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("sipolicy-{}-{}", std::process::id(), name));
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_check_complete_table() {
        let policy = Policy::build(BootPhase::PostMem).unwrap();
        let path = write_temp("check-ok.bin", policy.to_table());

        cmd_check(&path, None).unwrap();
        cmd_check(&path, Some(BootPhase::PostMem)).unwrap();
        assert!(cmd_check(&path, Some(BootPhase::PreMem)).is_err());

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_check_handoff_list() {
        let pre = Policy::build(BootPhase::PreMem).unwrap();
        let post = Policy::build(BootPhase::PostMem).unwrap();
        let mut list = handoff::encode(BootPhase::PreMem.handoff_tag(), pre.to_table()).unwrap();
        list.extend(post.to_handoff().unwrap());
        let path = write_temp("check-hobs.bin", &list);

        assert!(cmd_check(&path, None).is_err());
        cmd_check(&path, Some(BootPhase::PreMem)).unwrap();
        cmd_check(&path, Some(BootPhase::PostMem)).unwrap();

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_check_missing_block() {
        let mut registry = sipolicy_core::Registry::create(1024).unwrap();
        sipolicy_core::component::add_entries(&mut registry, &BootPhase::PreMem.blocks()[..2])
            .unwrap();
        let path = write_temp("check-missing.bin", registry.as_bytes());

        let err = cmd_check(&path, None).unwrap_err();
        assert!(err.to_string().contains("1 required block"));

        fs::remove_file(path).ok();
    }
}
