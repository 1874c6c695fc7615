//! `ArmSystem`: the composition root binding a processor core, its address
//! space, a translator, and the guest event queue into one running machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use arm_core::{
    guest_event_queue, AddressMap, AddressRegion, AddressTranslator, GenericHostBlock,
    GuestEventConsumer, GuestEventProducer, IdentityTranslator, Observable, PageMapping, Value,
};
use arm_cpu::{ArchVersion, Bus, CoreRegister, ExecutionMetrics, ProcessorCore};

use crate::bus::SystemBus;

/// An error constructing or operating on an `ArmSystem`.
pub type SystemError = String;

/// The composed, runnable ARM system.
pub struct ArmSystem {
    core: ProcessorCore,
    bus: SystemBus,
    translator: Box<dyn AddressTranslator + Send>,
    events: GuestEventProducer,
    host_interrupt: Arc<AtomicBool>,
}

impl ArmSystem {
    /// Builds a system with the given architecture version and no
    /// translator (logical == physical). Returns the system together with
    /// the consumer half of its event queue, which the caller (typically a
    /// debugger session) keeps on the controlling thread for the system's
    /// whole lifetime.
    #[must_use]
    pub fn new(arch: ArchVersion) -> (Self, GuestEventConsumer) {
        let (producer, consumer) = guest_event_queue(0);
        let caps = arm_cpu::capabilities(arch);
        let system = Self {
            core: ProcessorCore::new(caps),
            bus: SystemBus::new(),
            translator: Box::new(IdentityTranslator),
            events: producer,
            host_interrupt: Arc::new(AtomicBool::new(false)),
        };
        (system, consumer)
    }

    /// Installs a RAM region.
    pub fn add_ram(&mut self, name: &str, base: u32, size: u32) -> bool {
        let block = Arc::new(Mutex::new(AddressRegion::HostBlock(GenericHostBlock::ram(name, size as usize))));
        self.bus.map_region(base, size, block, true, true)
    }

    /// Installs a ROM region from an image.
    pub fn add_rom(&mut self, name: &str, base: u32, data: Vec<u8>) -> bool {
        let size = data.len() as u32;
        let block = Arc::new(Mutex::new(AddressRegion::HostBlock(GenericHostBlock::rom(name, data))));
        self.bus.map_region(base, size, block, true, false)
    }

    /// Installs a memory-mapped device, readable and writable at `base`.
    /// Fails if a region with the same name is already mapped.
    pub fn add_mmio(&mut self, base: u32, length: u32, device: Box<dyn arm_core::MmioDevice + Send>) -> bool {
        let name = device.name().to_string();
        if self.bus.read_addresses().find_by_name(&name).is_some() || self.bus.write_addresses().find_by_name(&name).is_some() {
            return false;
        }
        let region = Arc::new(Mutex::new(AddressRegion::Mmio(device)));
        self.bus.map_region(base, length, region, true, true)
    }

    /// Replaces the logical-to-physical translator (e.g. to install an MMU).
    pub fn set_translator(&mut self, translator: Box<dyn AddressTranslator + Send>) {
        self.translator = translator;
    }

    #[must_use]
    pub fn mode(&self) -> arm_cpu::ProcessorMode {
        self.core.registers().mode()
    }

    #[must_use]
    pub fn core_register(&self, id: CoreRegister) -> u32 {
        self.core.core_register(id)
    }

    pub fn set_core_register(&mut self, id: CoreRegister, value: u32) {
        self.core.set_core_register(id, value);
    }

    #[must_use]
    pub fn read_addresses(&self) -> &AddressMap {
        self.bus.read_addresses()
    }

    #[must_use]
    pub fn write_addresses(&self) -> &AddressMap {
        self.bus.write_addresses()
    }

    #[must_use]
    pub fn logical_to_physical(&self, logical_addr: u32) -> PageMapping {
        self.translator.translate(logical_addr)
    }

    /// Reads physical memory directly, bypassing the processor's bus
    /// (used by the debugger for memory inspection and breakpoint
    /// installation). Word-at-a-time for any MMIO region it crosses,
    /// same as `SystemBus::mmio_read`.
    pub fn read_phys(&mut self, addr: u32, buf: &mut [u8]) -> Result<usize, SystemError> {
        let mut read = 0;
        while read < buf.len() {
            let Some(found) = self.bus.read_addresses().try_find_region(addr + read as u32) else {
                break;
            };
            let mut region = found.region.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            match &mut *region {
                AddressRegion::HostBlock(block) => {
                    let off = found.offset as usize;
                    let remaining = (block.size() - off).min(buf.len() - read);
                    buf[read..read + remaining].copy_from_slice(&block.bytes()[off..off + remaining]);
                    read += remaining;
                }
                AddressRegion::Mmio(device) => {
                    if (addr + read as u32) % 4 != 0 || buf.len() - read < 4 {
                        return Err("unaligned MMIO access".to_string());
                    }
                    let word = device.read(found.offset & !3);
                    buf[read..read + 4].copy_from_slice(&word.to_le_bytes());
                    read += 4;
                }
            }
        }
        Ok(read)
    }

    /// Writes physical memory directly (used for program loading and
    /// breakpoint instruction patching).
    pub fn write_phys(&mut self, addr: u32, data: &[u8]) -> Result<usize, SystemError> {
        let mut written = 0;
        while written < data.len() {
            let Some(found) = self.bus.write_addresses().try_find_region(addr + written as u32) else {
                break;
            };
            let mut region = found.region.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            match &mut *region {
                AddressRegion::HostBlock(block) => {
                    let off = found.offset as usize;
                    let remaining = (block.size() - off).min(data.len() - written);
                    block.bytes_mut()[off..off + remaining].copy_from_slice(&data[written..written + remaining]);
                    written += remaining;
                }
                AddressRegion::Mmio(device) => {
                    if (addr + written as u32) % 4 != 0 || data.len() - written < 4 {
                        return Err("unaligned MMIO access".to_string());
                    }
                    let word = u32::from_le_bytes(data[written..written + 4].try_into().unwrap());
                    device.write(found.offset & !3, word);
                    written += 4;
                }
            }
        }
        Ok(written)
    }

    /// Reads through the logical-to-physical translator one page-sized run
    /// at a time; unmapped pages read back as zero rather than failing the
    /// whole transfer.
    pub fn read_logical(&mut self, addr: u32, buf: &mut [u8]) -> Result<usize, SystemError> {
        let mut done = 0;
        while done < buf.len() {
            let logical = addr.wrapping_add(done as u32);
            let mapping = self.translator.translate(logical);
            if !mapping.is_present {
                let page_end = (logical | 0xFFF).wrapping_add(1);
                let run = (page_end.wrapping_sub(logical) as usize).min(buf.len() - done);
                buf[done..done + run].fill(0);
                done += run;
                continue;
            }
            let offset_in_page = logical & (mapping.page_size - 1);
            let phys = mapping.physical_base + offset_in_page;
            let run = (mapping.page_size - offset_in_page) as usize;
            let run = run.min(buf.len() - done);
            let moved = self.read_phys(phys, &mut buf[done..done + run])?;
            done += moved;
            if moved < run {
                break;
            }
        }
        Ok(done)
    }

    /// Writes through the logical-to-physical translator; unmapped pages
    /// are silently skipped.
    pub fn write_logical(&mut self, addr: u32, data: &[u8]) -> Result<usize, SystemError> {
        let mut done = 0;
        while done < data.len() {
            let logical = addr.wrapping_add(done as u32);
            let mapping = self.translator.translate(logical);
            if !mapping.is_present {
                let page_end = (logical | 0xFFF).wrapping_add(1);
                done += (page_end.wrapping_sub(logical) as usize).min(data.len() - done);
                continue;
            }
            let offset_in_page = logical & (mapping.page_size - 1);
            let phys = mapping.physical_base + offset_in_page;
            let run = (mapping.page_size - offset_in_page) as usize;
            let run = run.min(data.len() - done);
            let moved = self.write_phys(phys, &data[done..done + run])?;
            done += moved;
            if moved < run {
                break;
            }
        }
        Ok(done)
    }

    /// Whether `addr` (physical) falls within host-backed, readable memory
    /// rather than unmapped space or an MMIO device. Breakpoints may only be
    /// installed at such addresses.
    #[must_use]
    pub fn is_host_backed_physical(&self, addr: u32) -> bool {
        match self.bus.read_addresses().try_find_region(addr) {
            Some(found) => matches!(&*found.region.lock().unwrap_or_else(std::sync::PoisonError::into_inner), AddressRegion::HostBlock(_)),
            None => false,
        }
    }

    /// A clone of the atomic flag `raise_host_interrupt` sets, for a
    /// worker thread running `run()` to observe.
    #[must_use]
    pub fn host_interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.host_interrupt)
    }

    /// Requests that a running `run()` call return at the next instruction
    /// boundary. Safe to call while the system is executing on another
    /// thread.
    pub fn raise_host_interrupt(&self) {
        self.host_interrupt.store(true, Ordering::Release);
    }

    fn clear_host_interrupt(&self) {
        self.host_interrupt.store(false, Ordering::Release);
    }

    /// Runs until a host or debug interrupt occurs.
    pub fn run(&mut self) -> ExecutionMetrics {
        self.clear_host_interrupt();
        self.core.run(&mut self.bus, &self.host_interrupt)
    }

    /// Runs exactly one instruction.
    pub fn run_single_step(&mut self) -> ExecutionMetrics {
        self.core.run_single_step(&mut self.bus)
    }

    pub fn reset(&mut self) {
        self.core.reset();
    }

    pub fn push_event(&mut self, kind: i32, data1: u32, data2: u32) -> bool {
        self.events.enqueue(kind, data1, data2)
    }
}

impl Observable for ArmSystem {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.core_register(CoreRegister::R(15)).into()),
            "cpsr" => Some(self.core_register(CoreRegister::Cpsr).into()),
            "mode" => Some(format!("{:?}", self.mode()).into()),
            _ => {
                if let Some(n) = path.strip_prefix('r').and_then(|s| s.parse::<u8>().ok()) {
                    if n < 16 {
                        return Some(self.core_register(CoreRegister::R(n)).into());
                    }
                }
                None
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["pc", "cpsr", "mode", "r0..r15"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_starts_in_supervisor_mode() {
        let (system, _consumer) = ArmSystem::new(ArchVersion::V4);
        assert_eq!(system.mode(), arm_cpu::ProcessorMode::Svc32);
    }

    #[test]
    fn assembled_program_executes_and_is_observable() {
        let (mut system, _consumer) = ArmSystem::new(ArchVersion::V4);
        assert!(system.add_ram("RAM", 0x8000, 0x1000));
        system.set_core_register(CoreRegister::R(15), 0x8000);

        // MOV R0, #42
        system.write_phys(0x8000, &0xE3A0_002Au32.to_le_bytes()).unwrap();
        system.run_single_step();

        assert_eq!(system.query("r0"), Some(Value::U32(42)));
    }

    #[test]
    fn logical_read_write_round_trip_with_identity_translator() {
        let (mut system, _consumer) = ArmSystem::new(ArchVersion::V4);
        assert!(system.add_ram("RAM", 0x8000, 0x1000));

        system.write_logical(0x8010, &[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        system.read_logical(0x8010, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn logical_read_of_unmapped_page_returns_zeros() {
        let (mut system, _consumer) = ArmSystem::new(ArchVersion::V4);
        let mut buf = [0xFFu8; 4];
        system.read_logical(0x1000, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 0]);
    }

    struct StubDevice {
        last_write: u32,
    }
    impl arm_core::MmioDevice for StubDevice {
        fn name(&self) -> &str {
            "IOC"
        }
        fn read(&mut self, offset: u32) -> u32 {
            offset.wrapping_add(self.last_write)
        }
        fn write(&mut self, _offset: u32, value: u32) {
            self.last_write = value;
        }
    }

    #[test]
    fn add_mmio_rejects_duplicate_device_name() {
        let (mut system, _consumer) = ArmSystem::new(ArchVersion::V4);
        assert!(system.add_mmio(0x3000, 0x100, Box::new(StubDevice { last_write: 0 })));
        assert!(!system.add_mmio(0x4000, 0x100, Box::new(StubDevice { last_write: 0 })));
    }

    #[test]
    fn read_phys_and_write_phys_dispatch_to_mmio_device() {
        let (mut system, _consumer) = ArmSystem::new(ArchVersion::V4);
        assert!(system.add_mmio(0x3000, 0x100, Box::new(StubDevice { last_write: 0 })));

        system.write_phys(0x3004, &0xCAFEu32.to_le_bytes()).unwrap();
        let mut word = [0u8; 4];
        system.read_phys(0x3004, &mut word).unwrap();
        // offset within the region (4) plus the value written by the line above
        assert_eq!(u32::from_le_bytes(word), 4u32.wrapping_add(0xCAFE));
    }
}
