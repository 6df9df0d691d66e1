//! Boot phases

use core::fmt;
use core::str::FromStr;

use sipolicy_core::{guid, BlockEntry, Guid};

use crate::catalog::{POST_MEM, PRE_MEM};

/// Boot phase owning a policy registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum BootPhase {
    /// Before system memory is trained
    PreMem,
    /// After system memory is available
    PostMem,
}

impl BootPhase {
    /// All phases in boot order
    pub const ALL: [BootPhase; 2] = [BootPhase::PreMem, BootPhase::PostMem];

    /// Short name
    pub fn name(&self) -> &'static str {
        match self {
            BootPhase::PreMem => "pre-mem",
            BootPhase::PostMem => "post-mem",
        }
    }

    /// Blocks every policy for this phase carries
    pub fn blocks(&self) -> &'static [BlockEntry] {
        match self {
            BootPhase::PreMem => PRE_MEM,
            BootPhase::PostMem => POST_MEM,
        }
    }

    /// Tag of the handoff record carrying this phase's table
    pub fn handoff_tag(&self) -> Guid {
        match self {
            BootPhase::PreMem => guid!("4a8e2c61-d73b-4f05-9b1e-6c2d8a0f3e57"),
            BootPhase::PostMem => guid!("5b9f3d72-e84c-4016-ac2f-7d3e9b1a4f68"),
        }
    }

    /// Phase whose handoff tag is `tag`
    pub fn from_handoff_tag(tag: Guid) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.handoff_tag() == tag)
    }
}

impl fmt::Display for BootPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown phase name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePhaseError;

impl fmt::Display for ParsePhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown phase (expected pre-mem or post-mem)")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParsePhaseError {}

impl FromStr for BootPhase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|phase| same_name(s, phase.name()))
            .ok_or(ParsePhaseError)
    }
}

// Case and separators are ignored: "PostMem", "post_mem", "post-mem"
fn same_name(input: &str, name: &str) -> bool {
    input
        .bytes()
        .filter(|&b| b != b'-' && b != b'_')
        .map(|b| b.to_ascii_lowercase())
        .eq(name.bytes().filter(|&b| b != b'-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("pre-mem".parse::<BootPhase>().unwrap(), BootPhase::PreMem);
        assert_eq!("POST_MEM".parse::<BootPhase>().unwrap(), BootPhase::PostMem);
        assert_eq!("postmem".parse::<BootPhase>().unwrap(), BootPhase::PostMem);
        assert!("dxe".parse::<BootPhase>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for phase in BootPhase::ALL {
            assert_eq!(phase.to_string().parse::<BootPhase>().unwrap(), phase);
        }
    }

    #[test]
    fn test_handoff_tags() {
        assert_ne!(
            BootPhase::PreMem.handoff_tag(),
            BootPhase::PostMem.handoff_tag()
        );
        for phase in BootPhase::ALL {
            assert_eq!(BootPhase::from_handoff_tag(phase.handoff_tag()), Some(phase));
        }
        assert_eq!(BootPhase::from_handoff_tag(Guid::ZERO), None);
    }
}
