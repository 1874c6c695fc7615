//! Architecture version gating.
//!
//! Mirrors how the 68000 core's `CpuModel` gates `MOVEC`/`VBR`/`CACR` by
//! model: here a single `ArchVersion` gates which processor modes and
//! instruction classes are available.

/// An ARM architecture version this core can emulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArchVersion {
    V2,
    V3,
    V4,
}

/// Capabilities unlocked by an architecture version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuCapabilities {
    /// 32-bit PC/PSR processor modes (as opposed to 26-bit packed PC+PSR).
    pub has_32bit_modes: bool,
    /// System mode (privileged, User register bank).
    pub has_system_mode: bool,
    /// SWP/SWPB atomic exchange instructions.
    pub has_swap: bool,
}

#[must_use]
pub const fn capabilities(version: ArchVersion) -> CpuCapabilities {
    match version {
        ArchVersion::V2 => CpuCapabilities {
            has_32bit_modes: false,
            has_system_mode: false,
            has_swap: false,
        },
        ArchVersion::V3 => CpuCapabilities {
            has_32bit_modes: true,
            has_system_mode: false,
            has_swap: true,
        },
        ArchVersion::V4 => CpuCapabilities {
            has_32bit_modes: true,
            has_system_mode: true,
            has_swap: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_has_no_32bit_modes() {
        assert!(!capabilities(ArchVersion::V2).has_32bit_modes);
    }

    #[test]
    fn v4_has_system_mode() {
        assert!(capabilities(ArchVersion::V4).has_system_mode);
        assert!(!capabilities(ArchVersion::V3).has_system_mode);
    }
}
