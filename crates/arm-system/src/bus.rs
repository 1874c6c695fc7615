//! Routes processor-core bus traffic through the physical address map.

use std::sync::{Arc, Mutex};

use arm_core::{AddressMap, AddressRegion, MmioDevice};
use arm_cpu::Bus;

/// The processor's view of the physical address space: a read map and a
/// write map, since some regions (ROM) are readable but not writable.
pub struct SystemBus {
    read_map: AddressMap,
    write_map: AddressMap,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            read_map: AddressMap::new(),
            write_map: AddressMap::new(),
        }
    }

    #[must_use]
    pub fn read_addresses(&self) -> &AddressMap {
        &self.read_map
    }

    #[must_use]
    pub fn write_addresses(&self) -> &AddressMap {
        &self.write_map
    }

    /// Maps `region` into the read map, the write map, or both, at `base`.
    pub fn map_region(&mut self, base: u32, length: u32, region: Arc<Mutex<AddressRegion>>, readable: bool, writable: bool) -> bool {
        let mut ok = true;
        if readable {
            ok &= self.read_map.try_insert(base, length, Arc::clone(&region));
        }
        if writable {
            ok &= self.write_map.try_insert(base, length, region);
        }
        ok
    }

    fn with_host_bytes<R>(region: &Arc<Mutex<AddressRegion>>, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let mut borrowed = region.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &mut *borrowed {
            AddressRegion::HostBlock(block) => Some(f(block.bytes_mut())),
            AddressRegion::Mmio(_) => None,
        }
    }

    fn mmio_read(region: &Arc<Mutex<AddressRegion>>, aligned_offset: u32) -> Option<u32> {
        let mut borrowed = region.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &mut *borrowed {
            AddressRegion::HostBlock(_) => None,
            AddressRegion::Mmio(device) => Some(device.read(aligned_offset)),
        }
    }

    fn mmio_write(region: &Arc<Mutex<AddressRegion>>, aligned_offset: u32, value: u32) -> bool {
        let mut borrowed = region.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &mut *borrowed {
            AddressRegion::HostBlock(_) => false,
            AddressRegion::Mmio(device) => {
                device.write(aligned_offset, value);
                true
            }
        }
    }
}

impl Bus for SystemBus {
    fn read32(&mut self, addr: u32) -> u32 {
        let Some(found) = self.read_map.try_find_region(addr) else {
            return 0xFFFF_FFFF;
        };
        if let Some(bytes) = Self::with_host_bytes(&found.region, |data| {
            let off = found.offset as usize;
            if off + 4 <= data.len() {
                u32::from_le_bytes(data[off..off + 4].try_into().unwrap())
            } else {
                0xFFFF_FFFF
            }
        }) {
            return bytes;
        }
        Self::mmio_read(&found.region, found.offset & !3).unwrap_or(0xFFFF_FFFF)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        let Some(found) = self.write_map.try_find_region(addr) else {
            return;
        };
        let handled = Self::with_host_bytes(&found.region, |data| {
            let off = found.offset as usize;
            if off + 4 <= data.len() {
                data[off..off + 4].copy_from_slice(&value.to_le_bytes());
            }
        });
        if handled.is_none() {
            Self::mmio_write(&found.region, found.offset & !3, value);
        }
    }

    fn read8(&mut self, addr: u32) -> u8 {
        let Some(found) = self.read_map.try_find_region(addr) else {
            return 0xFF;
        };
        if let Some(byte) = Self::with_host_bytes(&found.region, |data| {
            let off = found.offset as usize;
            if off < data.len() { Some(data[off]) } else { None }
        }) {
            return byte.unwrap_or(0xFF);
        }
        let aligned = found.offset & !3;
        let shift = (found.offset & 3) * 8;
        Self::mmio_read(&found.region, aligned)
            .map(|word| ((word >> shift) & 0xFF) as u8)
            .unwrap_or(0xFF)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        let Some(found) = self.write_map.try_find_region(addr) else {
            return;
        };
        let handled = Self::with_host_bytes(&found.region, |data| {
            let off = found.offset as usize;
            if off < data.len() {
                data[off] = value;
            }
        });
        if handled.is_none() {
            let aligned = found.offset & !3;
            let shift = (found.offset & 3) * 8;
            if let Some(word) = Self::mmio_read(&found.region, aligned) {
                let mask = !(0xFFu32 << shift);
                let updated = (word & mask) | (u32::from(value) << shift);
                Self::mmio_write(&found.region, aligned, updated);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arm_core::{GenericHostBlock, MemoryAccess};

    #[test]
    fn ram_read_write_round_trips() {
        let mut bus = SystemBus::new();
        let ram = Arc::new(Mutex::new(AddressRegion::HostBlock(GenericHostBlock::ram("RAM", 0x1000))));
        assert!(bus.map_region(0, 0x1000, ram, true, true));

        bus.write32(0x10, 0xDEAD_BEEF);
        assert_eq!(bus.read32(0x10), 0xDEAD_BEEF);
        assert_eq!(bus.read8(0x10), 0xEF);
    }

    #[test]
    fn rom_is_not_writable() {
        let mut bus = SystemBus::new();
        let rom = Arc::new(Mutex::new(AddressRegion::HostBlock(GenericHostBlock::rom(
            "ROM",
            vec![0xAB; 0x100],
        ))));
        assert!(bus.map_region(0x8000, 0x100, rom, true, false));
        assert_eq!(bus.read8(0x8000), 0xAB);
        bus.write32(0x8000, 0); // no write map entry: silently dropped
        assert_eq!(bus.read8(0x8000), 0xAB);
    }
}
