//! sipolicy-blocks - Silicon config block schemas and phase policies
//!
//! This crate defines the concrete config blocks consumed by silicon
//! initialization, groups them per boot phase, and builds the phase
//! registry with default values.
//!
//! # Features
//!
//! - `std` - Enable standard library support and profile files (includes `alloc`)
//! - `alloc` - Enable [`Policy`] and handoff encoding
//!
//! # Example
//!
//! ```ignore
//! use sipolicy_blocks::{BootPhase, Policy, UsbConfig};
//!
//! let policy = Policy::build(BootPhase::PostMem)?;
//! let usb = policy.get::<UsbConfig>()?;
//! println!("{} USB2 ports enabled", usb.usb2_enabled_count());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod catalog;
pub mod cpu;
pub mod dci;
pub mod dump;
pub mod espi;
pub mod overclocking;
pub mod pch_general;
pub mod phase;
#[cfg(feature = "alloc")]
pub mod policy;
#[cfg(feature = "std")]
pub mod profile;
pub mod sata;
pub mod trace_hub;
pub mod usb;

pub use cpu::CpuConfig;
pub use dci::DciConfig;
pub use espi::EspiConfig;
pub use overclocking::{OverclockingConfig, OverclockingConfigV1};
pub use pch_general::PchGeneralConfig;
pub use phase::BootPhase;
#[cfg(feature = "alloc")]
pub use policy::Policy;
pub use sata::SataConfig;
pub use trace_hub::TraceHubConfig;
pub use usb::UsbConfig;

/// Bit position of a single-bit flag value
pub(crate) const fn bit(flag: u32) -> u8 {
    flag.trailing_zeros() as u8
}
