//! Phase policy aggregate
//!
//! A [`Policy`] owns the registry of one boot phase. Platform code builds
//! it, overrides defaults while it is open, and then hands `&Policy` to
//! every init routine. Nothing is reachable through global state.
//!
//! ```text
//! Policy::build(phase)           registry sized and filled with defaults
//! policy.get_mut::<T>()           platform overrides (open window)
//! policy.get::<T>() / seal()      consumers; registry is now read-only
//! policy.to_handoff()             HOB record for the next phase
//! ```

use alloc::vec::Vec;

use sipolicy_core::{component, handoff, ConfigBlock, Registry, RegistryView, Result, TypedMut};

use crate::phase::BootPhase;

/// Registry of one boot phase together with its phase
#[derive(Debug)]
pub struct Policy {
    phase: BootPhase,
    registry: Registry<Vec<u8>>,
}

impl Policy {
    /// Create the phase registry sized for its blocks and fill in defaults
    pub fn build(phase: BootPhase) -> Result<Self> {
        Self::with_capacity(phase, component::total_size(phase.blocks()))
    }

    /// Like [`Policy::build`] with an explicit capacity
    ///
    /// Spare capacity stays available for platform-specific blocks added
    /// before the registry is sealed.
    pub fn with_capacity(phase: BootPhase, capacity: usize) -> Result<Self> {
        let mut registry = Registry::create(capacity)?;
        component::add_entries(&mut registry, phase.blocks())?;
        log::info!(
            "Built {} policy: {} blocks, {} of {} bytes used",
            phase,
            registry.len(),
            registry.used(),
            registry.capacity()
        );
        Ok(Self { phase, registry })
    }

    /// Rebuild the policy published by the previous phase
    ///
    /// `hob_list` is searched for the record tagged for `phase`. The
    /// result is sealed.
    pub fn from_handoff(phase: BootPhase, hob_list: &[u8]) -> Result<Self> {
        let table = handoff::find(hob_list, phase.handoff_tag())?;
        Self::from_table(phase, table)
    }

    /// Rebuild a sealed policy from a serialized table
    pub fn from_table(phase: BootPhase, table: &[u8]) -> Result<Self> {
        let registry = Registry::restore(table)?;
        log::debug!("Restored {} policy with {} blocks", phase, registry.len());
        Ok(Self { phase, registry })
    }

    /// Phase this policy belongs to
    pub fn phase(&self) -> BootPhase {
        self.phase
    }

    /// Underlying registry
    pub fn registry(&self) -> &Registry<Vec<u8>> {
        &self.registry
    }

    /// Underlying registry, for adding platform blocks while open
    pub fn registry_mut(&mut self) -> &mut Registry<Vec<u8>> {
        &mut self.registry
    }

    /// Typed lookup; seals the policy
    pub fn get<T: ConfigBlock>(&self) -> Result<&T> {
        self.registry.get::<T>()
    }

    /// Typed mutable access while the policy is open
    pub fn get_mut<T: ConfigBlock>(&mut self) -> Result<TypedMut<'_, T>> {
        self.registry.get_mut::<T>()
    }

    /// End the initialization window
    pub fn seal(&self) {
        self.registry.seal();
    }

    /// Whether the initialization window has ended
    pub fn is_sealed(&self) -> bool {
        self.registry.is_sealed()
    }

    /// Read-only view; seals the policy
    pub fn view(&self) -> RegistryView<'_> {
        self.registry.view()
    }

    /// Serialized table; seals the policy
    pub fn to_table(&self) -> &[u8] {
        self.registry.seal();
        self.registry.as_bytes()
    }

    /// HOB list carrying this policy to the next phase; seals the policy
    pub fn to_handoff(&self) -> Result<Vec<u8>> {
        let table = self.to_table();
        let list = handoff::encode_list(self.phase.handoff_tag(), table)?;
        log::debug!(
            "Encoded {} policy handoff ({} byte table, {} byte HOB list)",
            self.phase,
            table.len(),
            list.len()
        );
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::UsbFlags;
    use crate::{catalog, CpuConfig, OverclockingConfig, SataConfig, UsbConfig};
    use sipolicy_core::Error;

    // Init routines take the policy explicitly
    fn usb_ports(policy: &Policy) -> Result<u32> {
        Ok(policy.get::<UsbConfig>()?.usb2_enabled_count())
    }

    #[test]
    fn test_build_fills_exactly() {
        for phase in BootPhase::ALL {
            let policy = Policy::build(phase).unwrap();
            assert_eq!(policy.registry().len(), phase.blocks().len());
            assert_eq!(policy.registry().available(), 0);
            assert!(!policy.is_sealed());
        }
    }

    #[test]
    fn test_defaults_visible_to_consumers() {
        let policy = Policy::build(BootPhase::PostMem).unwrap();
        assert_eq!(usb_ports(&policy).unwrap(), 16);
        assert!(policy.is_sealed());
        assert_eq!(policy.get::<CpuConfig>().unwrap().power_limit1.get(), 120);
        assert_eq!(
            policy.get::<OverclockingConfig>().unwrap_err(),
            Error::NotFound
        );
    }

    #[test]
    fn test_override_window() {
        let mut policy = Policy::build(BootPhase::PostMem).unwrap();
        policy.get_mut::<SataConfig>().unwrap().port_enable = 0x03;
        let mut usb = policy.get_mut::<UsbConfig>().unwrap();
        let flags = usb.flags() | UsbFlags::XDCI_ENABLE;
        usb.set_flags(flags);
        drop(usb);
        policy.seal();

        assert_eq!(policy.get::<SataConfig>().unwrap().port_enable, 0x03);
        assert!(policy
            .get::<UsbConfig>()
            .unwrap()
            .flags()
            .contains(UsbFlags::XDCI_ENABLE));
        assert_eq!(policy.get_mut::<SataConfig>().unwrap_err(), Error::Sealed);
    }

    #[test]
    fn test_override_cannot_move_header() {
        let mut policy = Policy::build(BootPhase::PostMem).unwrap();
        {
            let mut cpu = policy.get_mut::<CpuConfig>().unwrap();
            cpu.header.size.set(0x1000);
            cpu.header.id = [0x5A; 16];
            cpu.header.version.set(0);
        }

        let registry = policy.registry();
        assert_eq!(registry.iter().count(), registry.len());
        assert!(policy.get::<UsbConfig>().is_ok());
        assert!(policy.get::<SataConfig>().is_ok());
        assert_eq!(
            policy.get::<CpuConfig>().unwrap().header(),
            CpuConfig::block_header()
        );

        let next = Policy::from_table(BootPhase::PostMem, policy.to_table()).unwrap();
        assert_eq!(next.view().len(), BootPhase::PostMem.blocks().len());
    }

    #[test]
    fn test_spare_capacity_for_platform_blocks() {
        let spare = 64;
        let capacity = sipolicy_core::component::total_size(BootPhase::PreMem.blocks()) + spare;
        let mut policy = Policy::with_capacity(BootPhase::PreMem, capacity).unwrap();
        assert_eq!(policy.registry().available(), spare);

        let too_small = sipolicy_core::component::total_size(BootPhase::PreMem.blocks()) - 8;
        assert_eq!(
            Policy::with_capacity(BootPhase::PreMem, too_small).unwrap_err(),
            Error::CapacityExceeded
        );
        assert!(policy.registry_mut().available() > 0);
    }

    #[test]
    fn test_handoff_round_trip() {
        let mut policy = Policy::build(BootPhase::PreMem).unwrap();
        policy.get_mut::<OverclockingConfig>().unwrap().ring_max_ratio = 45;
        let hobs = policy.to_handoff().unwrap();
        assert!(policy.is_sealed());

        let next = Policy::from_handoff(BootPhase::PreMem, &hobs).unwrap();
        assert!(next.is_sealed());
        assert_eq!(next.phase(), BootPhase::PreMem);
        assert_eq!(next.registry().as_bytes(), policy.registry().as_bytes());
        assert_eq!(next.get::<OverclockingConfig>().unwrap().ring_max_ratio, 45);
        assert!(catalog::verify(next.view(), BootPhase::PreMem).all(|(_, r)| r.is_ok()));

        assert_eq!(
            Policy::from_handoff(BootPhase::PostMem, &hobs).unwrap_err(),
            Error::NotFound
        );
    }
}
