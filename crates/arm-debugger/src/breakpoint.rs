//! Breakpoints: a BKPT instruction temporarily substituted for the
//! original word at some address, restored on removal.

use arm_cpu::ProcessorCore;
use arm_system::ArmSystem;

/// One breakpoint, addressable by either a logical or a physical address.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    address: u32,
    is_logical_address: bool,
    id: u16,
    original_instruction: u32,
    is_enabled: bool,
}

/// Sort/lookup key matching the original's `CompareByAddress`: physical
/// addresses order before logical ones, then by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BreakpointKey(pub bool, pub u32);

impl Breakpoint {
    #[must_use]
    pub fn new(address: u32, is_logical_address: bool, id: u16) -> Self {
        Self {
            address: address & !3,
            is_logical_address,
            id,
            original_instruction: 0,
            is_enabled: false,
        }
    }

    #[must_use]
    pub fn address(&self) -> u32 {
        self.address
    }

    #[must_use]
    pub fn is_logical_address(&self) -> bool {
        self.is_logical_address
    }

    #[must_use]
    pub fn id(&self) -> u16 {
        self.id
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    #[must_use]
    pub fn key(&self) -> BreakpointKey {
        BreakpointKey(self.is_logical_address, self.address)
    }

    fn physical_address(&self, system: &ArmSystem) -> Option<u32> {
        if !self.is_logical_address {
            return Some(self.address);
        }
        let mapping = system.logical_to_physical(self.address);
        if !mapping.is_present {
            return None;
        }
        let page_offset = self.address & (mapping.page_size - 1);
        Some(mapping.physical_base + page_offset)
    }

    /// Substitutes the BKPT instruction. Fails silently (returning `false`)
    /// if the address does not resolve to writable host-backed memory;
    /// already-applied breakpoints are a no-op success.
    pub fn apply(&mut self, system: &mut ArmSystem) -> bool {
        if self.is_enabled {
            return true;
        }
        let Some(phys) = self.physical_address(system) else {
            return false;
        };
        if !system.is_host_backed_physical(phys) {
            return false;
        }

        let mut original = [0u8; 4];
        if system.read_phys(phys, &mut original).is_err() {
            return false;
        }

        let word = ProcessorCore::encode_breakpoint(self.id);
        if system.write_phys(phys, &word.to_le_bytes()).is_err() {
            return false;
        }

        self.original_instruction = u32::from_le_bytes(original);
        self.is_enabled = true;
        true
    }

    /// Restores the original instruction. No-op if not currently applied.
    pub fn remove(&mut self, system: &mut ArmSystem) {
        if !self.is_enabled {
            return;
        }
        if let Some(phys) = self.physical_address(system) {
            let _ = system.write_phys(phys, &self.original_instruction.to_le_bytes());
        }
        self.is_enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arm_cpu::ArchVersion;

    fn system_with_ram() -> ArmSystem {
        let (mut system, _consumer) = ArmSystem::new(ArchVersion::V4);
        system.add_ram("RAM", 0x8000, 0x1000);
        system.write_phys(0x8000, &0xE3A0_002Au32.to_le_bytes()).unwrap(); // MOV R0, #42
        system
    }

    #[test]
    fn apply_then_remove_restores_original_instruction() {
        let mut system = system_with_ram();
        let mut bp = Breakpoint::new(0x8000, false, 0xF001);

        assert!(bp.apply(&mut system));
        let mut word = [0u8; 4];
        system.read_phys(0x8000, &mut word).unwrap();
        assert_eq!(u32::from_le_bytes(word), ProcessorCore::encode_breakpoint(0xF001));

        bp.remove(&mut system);
        system.read_phys(0x8000, &mut word).unwrap();
        assert_eq!(u32::from_le_bytes(word), 0xE3A0_002A);
    }

    #[test]
    fn apply_fails_on_unmapped_address() {
        let mut system = system_with_ram();
        let mut bp = Breakpoint::new(0x9000, false, 0xF001);
        assert!(!bp.apply(&mut system));
    }

    #[test]
    fn ordering_places_physical_before_logical() {
        let physical = BreakpointKey(false, 0x9000);
        let logical = BreakpointKey(true, 0x1000);
        assert!(physical < logical);
    }
}
