//! Regions of the physical address space: host-backed memory blocks and
//! memory-mapped I/O devices.

/// Access permitted on a range of mapped addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccess {
    /// The range can only be read.
    ReadOnly,
    /// The range can only be written to.
    WriteOnly,
    /// The range can be both read and written to.
    ReadWrite,
}

impl MemoryAccess {
    #[must_use]
    pub fn allows_read(self) -> bool {
        matches!(self, MemoryAccess::ReadOnly | MemoryAccess::ReadWrite)
    }

    #[must_use]
    pub fn allows_write(self) -> bool {
        matches!(self, MemoryAccess::WriteOnly | MemoryAccess::ReadWrite)
    }
}

/// A device that can be addressed through a memory-mapped I/O window.
///
/// Offsets are relative to the region's base and are always word-aligned;
/// callers are responsible for alignment checking before dispatch.
pub trait MmioDevice {
    /// Name used to disambiguate this device when it appears in both the
    /// read and write maps.
    fn name(&self) -> &str;

    /// Read a 32-bit word at the given offset within the region.
    fn read(&mut self, offset: u32) -> u32;

    /// Write a 32-bit word at the given offset within the region.
    fn write(&mut self, offset: u32, value: u32);
}

/// A span of addresses backed by host-allocated memory (RAM or a ROM image).
pub struct GenericHostBlock {
    name: String,
    description: String,
    data: Vec<u8>,
    access: MemoryAccess,
}

impl GenericHostBlock {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, data: Vec<u8>, access: MemoryAccess) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            data,
            access,
        }
    }

    #[must_use]
    pub fn ram(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, String::new(), vec![0; size], MemoryAccess::ReadWrite)
    }

    #[must_use]
    pub fn rom(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(name, String::new(), data, MemoryAccess::ReadOnly)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn access(&self) -> MemoryAccess {
        self.access
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// A region of the physical address space: either host-backed memory or a
/// memory-mapped device.
pub enum AddressRegion {
    HostBlock(GenericHostBlock),
    Mmio(Box<dyn MmioDevice + Send>),
}

impl AddressRegion {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            AddressRegion::HostBlock(block) => block.name(),
            AddressRegion::Mmio(device) => device.name(),
        }
    }

    #[must_use]
    pub fn is_host_block(&self) -> bool {
        matches!(self, AddressRegion::HostBlock(_))
    }
}
