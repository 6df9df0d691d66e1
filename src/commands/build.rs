//! Build command implementation

use std::fs;
use std::path::Path;

use sipolicy_blocks::profile::Profile;
use sipolicy_blocks::{dump, BootPhase, Policy};
use sipolicy_core::component;

use super::format_size;

/// Build a phase policy and write it as a table or handoff HOB list
pub fn cmd_build(
    phase: Option<BootPhase>,
    profile: Option<&Path>,
    capacity: Option<u32>,
    handoff: bool,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile = profile.map(Profile::load).transpose()?;

    let phase = match (phase, &profile) {
        (Some(phase), Some(profile)) if phase != profile.phase => {
            return Err(format!(
                "Profile is for {} but --phase is {}",
                profile.phase, phase
            )
            .into());
        }
        (Some(phase), _) => phase,
        (None, Some(profile)) => profile.phase,
        (None, None) => return Err("No phase given (use --phase or --profile)".into()),
    };

    let capacity = capacity
        .map(|c| c as usize)
        .or_else(|| profile.as_ref().map(Profile::capacity))
        .unwrap_or_else(|| component::total_size(phase.blocks()));

    let mut policy = Policy::with_capacity(phase, capacity)?;
    if let Some(profile) = &profile {
        profile.apply(policy.registry_mut())?;
    }

    dump::log_policy(policy.view());

    let bytes = if handoff {
        policy.to_handoff()?
    } else {
        policy.to_table().to_vec()
    };
    fs::write(output, &bytes)?;

    let registry = policy.registry();
    println!(
        "Built {} policy: {} blocks, {} of {} used",
        phase,
        registry.len(),
        format_size(registry.used()),
        format_size(registry.capacity())
    );
    println!(
        "Wrote {} ({}) to {:?}",
        if handoff { "handoff HOB list" } else { "table" },
        format_size(bytes.len()),
        output
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipolicy_blocks::{catalog, SataConfig};
    use sipolicy_core::RegistryView;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("sipolicy-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_build_with_profile() {
        let profile = temp_path("build.toml");
        let output = temp_path("build.bin");
        fs::write(&profile, "phase = \"post-mem\"\n[blocks.Sata]\nmode = 1\n").unwrap();

        cmd_build(None, Some(&profile), Some(2048), false, &output).unwrap();

        let data = fs::read(&output).unwrap();
        let view = RegistryView::parse(&data).unwrap();
        assert_eq!(view.capacity(), 2048);
        assert_eq!(view.get::<SataConfig>().unwrap().mode, 1);
        assert!(catalog::verify(view, BootPhase::PostMem).all(|(_, r)| r.is_ok()));

        fs::remove_file(profile).ok();
        fs::remove_file(output).ok();
    }

    #[test]
    fn test_build_handoff() {
        let output = temp_path("handoff.bin");
        cmd_build(Some(BootPhase::PreMem), None, None, true, &output).unwrap();

        let data = fs::read(&output).unwrap();
        let policy = Policy::from_handoff(BootPhase::PreMem, &data).unwrap();
        assert_eq!(policy.registry().available(), 0);

        fs::remove_file(output).ok();
    }

    #[test]
    fn test_build_phase_conflict() {
        let profile = temp_path("conflict.toml");
        fs::write(&profile, "phase = \"pre-mem\"\n").unwrap();
        let output = temp_path("conflict.bin");

        assert!(cmd_build(Some(BootPhase::PostMem), Some(&profile), None, false, &output).is_err());
        assert!(cmd_build(None, None, None, false, &output).is_err());
        assert!(!output.exists());

        fs::remove_file(profile).ok();
    }
}
