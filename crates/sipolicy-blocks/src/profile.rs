//! Platform profile files
//!
//! A profile names a phase and overrides default field values. It is
//! applied while the registry is still open, the same step board code
//! performs when it patches the defaults. TOML:
//!
//! ```toml
//! phase = "post-mem"
//! capacity = "1 KiB"
//!
//! [blocks.Usb]
//! xdci_enable = true
//! usb2_port_enable = "0x00FF"
//!
//! [blocks.Sata]
//! mode = 1
//! ```
//!
//! or RON:
//!
//! ```ron
//! (
//!     phase: "pre-mem",
//!     blocks: {
//!         "Dci": { "enable": 1 },
//!     },
//! )
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use sipolicy_core::{component, field::find_field, Registry};

use crate::catalog;
use crate::phase::BootPhase;
use crate::policy::Policy;

/// Errors that can occur while loading or applying a profile
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// I/O error reading the file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// RON parse error
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    /// Block name not in the catalog
    #[error("unknown block: {0}")]
    UnknownBlock(String),
    /// Field name not in the block's field table
    #[error("unknown field {field} in {block} block")]
    UnknownField {
        /// Block name
        block: String,
        /// Field name
        field: String,
    },
    /// Block belongs to another phase
    #[error("{block} block is not part of the {phase} policy")]
    WrongPhase {
        /// Block name
        block: String,
        /// Phase of the profile
        phase: BootPhase,
    },
    /// A field could not be written
    #[error("cannot set {block}.{field}: {source}")]
    Field {
        /// Block name
        block: String,
        /// Field name
        field: String,
        /// Underlying registry error
        source: sipolicy_core::Error,
    },
    /// Registry error
    #[error("registry error: {0}")]
    Registry(#[from] sipolicy_core::Error),
}

/// Parsed profile
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// Phase the profile targets
    #[serde(deserialize_with = "deserialize_phase")]
    pub phase: BootPhase,
    /// Registry capacity; defaults to the size of the phase's blocks
    #[serde(default, deserialize_with = "deserialize_size")]
    pub capacity: Option<u32>,
    /// Field overrides per block name
    #[serde(default)]
    pub blocks: BTreeMap<String, BTreeMap<String, Setting>>,
}

/// One field value: integer, boolean, or hex/decimal string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting(pub u64);

impl<'de> serde::Deserialize<'de> for Setting {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(u64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(Setting(b as u64)),
            Raw::Int(n) => Ok(Setting(n)),
            Raw::Str(s) => parse_number(&s)
                .map(Setting)
                .map_err(serde::de::Error::custom),
        }
    }
}

fn deserialize_phase<'de, D>(deserializer: D) -> Result<BootPhase, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    let name = String::deserialize(deserializer)?;
    name.parse().map_err(serde::de::Error::custom)
}

/// Deserialize a size that can be a number or a string like "8 KiB"
fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrStr {
        Int(u32),
        Str(String),
    }

    match SizeOrStr::deserialize(deserializer)? {
        SizeOrStr::Int(n) => Ok(Some(n)),
        SizeOrStr::Str(s) => parse_size(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(&hex.replace('_', ""), 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "8 KiB", "0x2000" or "4096"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if let Ok(n) = u32::from_str_radix(hex.trim(), 16) {
            return Ok(n);
        }
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("kb") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

impl Profile {
    /// Load a profile, choosing RON for `.ron` files and TOML otherwise
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let profile = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ron") => Self::from_ron_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };
        log::debug!(
            "Loaded profile {} for {} ({} blocks)",
            path.display(),
            profile.phase,
            profile.blocks.len()
        );
        Ok(profile)
    }

    /// Parse a TOML profile
    pub fn from_toml_str(content: &str) -> Result<Self, ProfileError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse a RON profile
    pub fn from_ron_str(content: &str) -> Result<Self, ProfileError> {
        Ok(ron::from_str(content)?)
    }

    /// Capacity of the registry this profile builds
    pub fn capacity(&self) -> usize {
        self.capacity
            .map(|c| c as usize)
            .unwrap_or_else(|| component::total_size(self.phase.blocks()))
    }

    /// Build the phase policy and apply the overrides
    pub fn build(&self) -> Result<Policy, ProfileError> {
        let mut policy = Policy::with_capacity(self.phase, self.capacity())?;
        self.apply(policy.registry_mut())?;
        Ok(policy)
    }

    /// Write every override into an open registry
    ///
    /// Returns the number of fields written.
    pub fn apply<S>(&self, registry: &mut Registry<S>) -> Result<usize, ProfileError>
    where
        S: AsRef<[u8]> + AsMut<[u8]>,
    {
        let mut written = 0;
        for (block_name, settings) in &self.blocks {
            let entry = catalog::entry_by_name(block_name)
                .ok_or_else(|| ProfileError::UnknownBlock(block_name.clone()))?;
            if catalog::phase_of(entry.id) != Some(self.phase) {
                return Err(ProfileError::WrongPhase {
                    block: entry.name.to_string(),
                    phase: self.phase,
                });
            }

            let mut block = registry.find_block_mut(entry.id)?;
            for (field_name, &Setting(value)) in settings {
                let field = find_field(entry.fields, field_name).ok_or_else(|| {
                    ProfileError::UnknownField {
                        block: entry.name.to_string(),
                        field: field_name.clone(),
                    }
                })?;
                block
                    .write_field(field, value)
                    .map_err(|source| ProfileError::Field {
                        block: entry.name.to_string(),
                        field: field.name.to_string(),
                        source,
                    })?;
                log::debug!("{}.{} = {:#x}", entry.name, field.name, value);
                written += 1;
            }
        }
        log::info!("Applied {} profile overrides", written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::UsbFlags;
    use crate::{DciConfig, SataConfig, UsbConfig};

    const POST_MEM_TOML: &str = r#"
phase = "post-mem"
capacity = "1 KiB"

[blocks.Usb]
xdci_enable = true
usb2_port_enable = "0x00FF"

[blocks.sata]
mode = 1
"#;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x2000").unwrap(), 0x2000);
        assert_eq!(parse_size("8 KiB").unwrap(), 8192);
        assert_eq!(parse_size("1MiB").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("512 B").unwrap(), 512);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("8192 MiB").is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x1800").unwrap(), 0x1800);
        assert_eq!(parse_number("0xFFFF_FFFF").unwrap(), 0xFFFF_FFFF);
        assert_eq!(parse_number(" 42 ").unwrap(), 42);
        assert!(parse_number("0xZZ").is_err());
    }

    #[test]
    fn test_toml_profile() {
        let profile = Profile::from_toml_str(POST_MEM_TOML).unwrap();
        assert_eq!(profile.phase, BootPhase::PostMem);
        assert_eq!(profile.capacity(), 1024);
        assert_eq!(profile.blocks["Usb"]["usb2_port_enable"], Setting(0xFF));
        assert_eq!(profile.blocks["Usb"]["xdci_enable"], Setting(1));

        let policy = profile.build().unwrap();
        let usb = policy.get::<UsbConfig>().unwrap();
        assert!(usb.flags().contains(UsbFlags::XDCI_ENABLE));
        assert_eq!(usb.usb2_enabled_count(), 8);
        assert_eq!(policy.get::<SataConfig>().unwrap().mode, 1);
        assert_eq!(policy.registry().capacity(), 1024);
    }

    #[test]
    fn test_ron_profile() {
        let profile = Profile::from_ron_str(
            r#"(
                phase: "pre-mem",
                blocks: {
                    "Dci": { "enable": 1, "dbc_mode": "0x2" },
                },
            )"#,
        )
        .unwrap();
        assert_eq!(profile.capacity(), component::total_size(BootPhase::PreMem.blocks()));

        let policy = profile.build().unwrap();
        let dci = policy.get::<DciConfig>().unwrap();
        assert!(dci.enabled());
        assert_eq!(dci.dbc_mode(), Some(crate::dci::DbcMode::Usb3));
    }

    #[test]
    fn test_default_capacity_matches_build() {
        let profile = Profile::from_toml_str("phase = \"pre-mem\"").unwrap();
        let policy = profile.build().unwrap();
        assert_eq!(policy.registry().available(), 0);
    }

    #[test]
    fn test_unknown_names() {
        let profile = Profile::from_toml_str("phase = \"post-mem\"\n[blocks.Gpio]\nx = 1").unwrap();
        assert!(matches!(profile.build(), Err(ProfileError::UnknownBlock(b)) if b == "Gpio"));

        let profile =
            Profile::from_toml_str("phase = \"post-mem\"\n[blocks.Usb]\nturbo = 1").unwrap();
        assert!(matches!(
            profile.build(),
            Err(ProfileError::UnknownField { field, .. }) if field == "turbo"
        ));

        assert!(Profile::from_toml_str("phase = \"dxe\"").is_err());
        assert!(Profile::from_toml_str("phase = \"pre-mem\"\nextra = 1").is_err());
    }

    #[test]
    fn test_wrong_phase() {
        let profile =
            Profile::from_toml_str("phase = \"pre-mem\"\n[blocks.Usb]\nxdci_enable = 1").unwrap();
        assert!(matches!(
            profile.build(),
            Err(ProfileError::WrongPhase { phase: BootPhase::PreMem, .. })
        ));
    }

    #[test]
    fn test_value_out_of_range() {
        let profile =
            Profile::from_toml_str("phase = \"post-mem\"\n[blocks.Usb]\nxdci_enable = 2").unwrap();
        assert!(matches!(
            profile.build(),
            Err(ProfileError::Field {
                source: sipolicy_core::Error::ValueOutOfRange,
                ..
            })
        ));
    }

    #[test]
    fn test_apply_after_seal() {
        let profile = Profile::from_toml_str(POST_MEM_TOML).unwrap();
        let mut policy = Policy::build(BootPhase::PostMem).unwrap();
        policy.seal();
        assert!(matches!(
            profile.apply(policy.registry_mut()),
            Err(ProfileError::Registry(sipolicy_core::Error::Sealed))
        ));
    }
}
