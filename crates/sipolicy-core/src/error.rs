//! Error types for sipolicy-core
//!
//! This module provides a no_std compatible error type shared by the
//! registry, the typed block accessors and the handoff codec.

use core::fmt;

/// Core error type - no_std compatible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Creation errors
    /// Backing store of the requested capacity cannot be allocated
    OutOfMemory,

    // Registration errors
    /// A block with the same id is already registered
    DuplicateId,
    /// Not enough space left in the backing store
    CapacityExceeded,
    /// Block header is malformed (size, version or id)
    InvalidHeader,
    /// Registry left its initialization window
    Sealed,

    // Lookup errors
    /// No block with the requested id
    NotFound,
    /// Stored block is older than the consumer requires
    UnsupportedVersion {
        /// Version found in the registry
        found: u16,
        /// Minimum version the consumer understands
        required: u16,
    },
    /// Stored block is smaller than the consumer's layout
    SizeMismatch {
        /// Size found in the registry
        found: u32,
        /// Size the consumer requires
        required: u32,
    },
    /// Value does not fit in the target field
    ValueOutOfRange,

    // Persistence errors
    /// Serialized table is truncated or inconsistent
    InvalidTable,
    /// Handoff record or record list is malformed
    InvalidHandoff,
    /// Table does not fit in a single handoff record
    HandoffTooLarge,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::DuplicateId => write!(f, "block id already registered"),
            Self::CapacityExceeded => write!(f, "registry capacity exceeded"),
            Self::InvalidHeader => write!(f, "invalid block header"),
            Self::Sealed => write!(f, "registry is sealed"),
            Self::NotFound => write!(f, "block not found"),
            Self::UnsupportedVersion { found, required } => write!(
                f,
                "unsupported block version {} (need at least {})",
                found, required
            ),
            Self::SizeMismatch { found, required } => write!(
                f,
                "block size mismatch: {} bytes, need at least {}",
                found, required
            ),
            Self::ValueOutOfRange => write!(f, "value out of range for field"),
            Self::InvalidTable => write!(f, "invalid config block table"),
            Self::InvalidHandoff => write!(f, "invalid handoff record"),
            Self::HandoffTooLarge => write!(f, "table too large for a handoff record"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
