//! sipolicy-core - Config block registry for silicon policy
//!
//! Silicon initialization code is driven by policy data split into config
//! blocks: versioned, GUID-identified structs, one per feature area. This
//! crate provides the store that holds them for a boot phase. It is
//! designed to be `no_std` compatible for use in early boot environments.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable heap-backed registries and handoff encoding
//!
//! # Example
//!
//! ```ignore
//! use sipolicy_core::{component, Registry};
//!
//! let mut registry = Registry::create(component::total_size(BLOCKS))?;
//! component::add_entries(&mut registry, BLOCKS)?;
//!
//! // Init routines receive the registry by reference
//! let usb = registry.get::<UsbConfig>()?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod block;
pub mod component;
pub mod error;
pub mod field;
pub mod handoff;
pub mod header;
pub mod registry;

pub use block::{ConfigBlock, TypedMut};
pub use component::BlockEntry;
pub use error::{Error, Result};
pub use field::Field;
pub use header::{BlockHeader, TableHeader};
pub use registry::{Block, BlockMut, Blocks, Registry, RegistryView};
pub use uguid::{guid, Guid};
