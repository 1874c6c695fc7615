//! A sorted, non-overlapping map from physical addresses to regions.
//!
//! Lookup is a binary search over mapping bases, rounded to a 4-byte
//! boundary. Mappings never overlap; `try_insert` rejects any span that
//! would.

use std::sync::{Arc, Mutex};

use crate::region::AddressRegion;

/// A shared handle to a region, since the same region can appear in both
/// the read map and the write map of a system (e.g. RAM), and MMIO devices
/// need mutable access on every access. `Mutex` rather than `RefCell` so
/// the owning `ArmSystem` stays `Send` and can be handed to a worker thread
/// while running.
pub type RegionHandle = Arc<Mutex<AddressRegion>>;

/// One contiguous span of the address space bound to a region.
pub struct Mapping {
    base: u32,
    end: u32,
    region: RegionHandle,
}

impl Mapping {
    #[must_use]
    pub fn base(&self) -> u32 {
        self.base
    }

    #[must_use]
    pub fn end(&self) -> u32 {
        self.end
    }

    #[must_use]
    pub fn region(&self) -> &RegionHandle {
        &self.region
    }

    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr < self.end
    }
}

/// The result of a successful address lookup.
pub struct FoundRegion {
    pub region: RegionHandle,
    pub offset: u32,
    pub remaining: u32,
}

/// A sorted, non-overlapping collection of address-to-region mappings.
#[derive(Default)]
pub struct AddressMap {
    mappings: Vec<Mapping>,
}

fn round_up_4(value: u32) -> u32 {
    (value + 3) & !3
}

impl AddressMap {
    #[must_use]
    pub fn new() -> Self {
        Self { mappings: Vec::new() }
    }

    /// Attempts to insert a new mapping. Returns `false` if it would
    /// overlap an existing one, or if `length` is zero.
    pub fn try_insert(&mut self, base: u32, length: u32, region: RegionHandle) -> bool {
        if length == 0 {
            return false;
        }

        let end = base.saturating_add(round_up_4(length));
        if end <= base {
            return false;
        }

        // Branchless-style lower bound: first mapping whose base is >= ours.
        let pos = self.mappings.partition_point(|m| m.base < base);

        if pos > 0 && self.mappings[pos - 1].end > base {
            return false;
        }
        if pos < self.mappings.len() && self.mappings[pos].base < end {
            return false;
        }

        self.mappings.insert(pos, Mapping { base, end, region });
        true
    }

    /// Finds the region containing `addr`, aligned down to a 4-byte
    /// boundary, returning the offset within the region and the number of
    /// bytes remaining to the region's end.
    #[must_use]
    pub fn try_find_region(&self, addr: u32) -> Option<FoundRegion> {
        let aligned = addr & !3;
        let pos = self.mappings.partition_point(|m| m.base <= aligned);

        // `pos` is one past the last mapping whose base <= aligned; the
        // candidate, if any, is at pos - 1.
        if pos == 0 {
            return None;
        }

        let candidate = &self.mappings[pos - 1];
        if !candidate.contains(aligned) {
            return None;
        }

        Some(FoundRegion {
            region: Arc::clone(&candidate.region),
            offset: aligned - candidate.base,
            remaining: candidate.end - aligned,
        })
    }

    pub fn clear(&mut self) {
        self.mappings.clear();
    }

    #[must_use]
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<RegionHandle> {
        self.mappings
            .iter()
            .find(|m| m.region.lock().unwrap_or_else(std::sync::PoisonError::into_inner).name() == name)
            .map(|m| Arc::clone(&m.region))
    }
}
