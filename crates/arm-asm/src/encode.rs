//! Instruction encoders.
//!
//! These mirror `arm_cpu::cpu`'s decode dispatch bit-for-bit, so that
//! anything this crate assembles decodes back to the instruction that was
//! written. `arm-asm` depends on `arm-cpu` for exactly this reason: the two
//! must never be allowed to disagree about the bit layout.

use arm_cpu::Condition;

use crate::statement::MsrSource;

/// A resolvable data-processing operand2: either a rotated 8-bit immediate
/// or an unshifted register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand2 {
    Immediate(u32),
    Register(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpOp {
    And,
    Eor,
    Sub,
    Rsb,
    Add,
    Adc,
    Sbc,
    Rsc,
    Tst,
    Teq,
    Cmp,
    Cmn,
    Orr,
    Mov,
    Bic,
    Mvn,
}

impl DpOp {
    #[must_use]
    pub fn opcode_bits(self) -> u32 {
        match self {
            DpOp::And => 0x0,
            DpOp::Eor => 0x1,
            DpOp::Sub => 0x2,
            DpOp::Rsb => 0x3,
            DpOp::Add => 0x4,
            DpOp::Adc => 0x5,
            DpOp::Sbc => 0x6,
            DpOp::Rsc => 0x7,
            DpOp::Tst => 0x8,
            DpOp::Teq => 0x9,
            DpOp::Cmp => 0xA,
            DpOp::Cmn => 0xB,
            DpOp::Orr => 0xC,
            DpOp::Mov => 0xD,
            DpOp::Bic => 0xE,
            DpOp::Mvn => 0xF,
        }
    }

    /// Whether this opcode always implies S=1 regardless of a written
    /// suffix (the comparison instructions have no non-flag-setting form).
    #[must_use]
    pub fn implies_set_flags(self) -> bool {
        matches!(self, DpOp::Tst | DpOp::Teq | DpOp::Cmp | DpOp::Cmn)
    }

    /// Whether this opcode reads `Rn` (MOV/MVN only take `Rd`, `Op2`).
    #[must_use]
    pub fn uses_rn(self) -> bool {
        !matches!(self, DpOp::Mov | DpOp::Mvn)
    }
}

/// Encodes a rotated-immediate operand2. Returns `None` if `value` cannot
/// be expressed as an 8-bit value rotated right by an even count.
#[must_use]
pub fn encode_rotated_immediate(value: u32) -> Option<u32> {
    for rotate in 0..16u32 {
        let rotated = value.rotate_left(rotate * 2);
        if rotated <= 0xFF {
            return Some((rotate << 8) | rotated);
        }
    }
    None
}

#[must_use]
pub fn encode_data_processing(cond: Condition, op: DpOp, set_flags: bool, rd: u8, rn: u8, op2: Operand2) -> u32 {
    let s = set_flags || op.implies_set_flags();
    let mut word = (u32::from(cond.bits()) << 28) | (op.opcode_bits() << 21) | (u32::from(s) << 20) | (u32::from(rd) << 12);

    if op.uses_rn() {
        word |= u32::from(rn) << 16;
    }

    match op2 {
        Operand2::Immediate(imm) => {
            let encoded = encode_rotated_immediate(imm).unwrap_or(imm & 0xFF);
            word | 0x0200_0000 | encoded
        }
        Operand2::Register(rm) => word | u32::from(rm),
    }
}

#[must_use]
pub fn encode_branch(cond: Condition, link: bool, offset_bytes: i32) -> u32 {
    let imm24 = ((offset_bytes - 8) >> 2) as u32 & 0x00FF_FFFF;
    (u32::from(cond.bits()) << 28) | 0x0A00_0000 | (u32::from(link) << 24) | imm24
}

#[must_use]
pub fn encode_swi(cond: Condition, comment: u32) -> u32 {
    (u32::from(cond.bits()) << 28) | 0x0F00_0000 | (comment & 0x00FF_FFFF)
}

#[must_use]
pub fn encode_bkpt(id: u16) -> u32 {
    arm_cpu::ProcessorCore::encode_breakpoint(id)
}

#[must_use]
pub fn encode_multiply(cond: Condition, accumulate: bool, set_flags: bool, rd: u8, rn: u8, rs: u8, rm: u8) -> u32 {
    (u32::from(cond.bits()) << 28)
        | (u32::from(accumulate) << 21)
        | (u32::from(set_flags) << 20)
        | (u32::from(rd) << 16)
        | (u32::from(rn) << 12)
        | (u32::from(rs) << 8)
        | 0x90
        | u32::from(rm)
}

/// Encodes `MRS Rd, CPSR`/`MRS Rd, SPSR`, matching
/// `arm_cpu::cpu::exec_psr_transfer`'s decode: bit 24 set, bit 22 selects
/// SPSR, bits 19-16 fixed at `1111`, S (bit 20) clear.
#[must_use]
pub fn encode_mrs(cond: Condition, use_spsr: bool, rd: u8) -> u32 {
    (u32::from(cond.bits()) << 28) | 0x010F_0000 | (u32::from(use_spsr) << 22) | (u32::from(rd) << 12)
}

/// Encodes `MSR CPSR_<fields>, Rm`/`#imm` (and the `SPSR` forms), matching
/// `exec_psr_transfer`'s decode: bit 24 and bit 21 set (distinguishing it
/// from MRS), bit 22 selects SPSR, bit 25 selects immediate vs register,
/// bits 19/16 select the flags/control fields via `psr_field_mask`.
#[must_use]
pub fn encode_msr(cond: Condition, use_spsr: bool, flags_field: bool, control_field: bool, source: MsrSource) -> u32 {
    let mut word = (u32::from(cond.bits()) << 28) | 0x0120_F000 | (u32::from(use_spsr) << 22);
    if control_field {
        word |= 1 << 16;
    }
    if flags_field {
        word |= 1 << 19;
    }
    match source {
        MsrSource::Register(rm) => word | u32::from(rm),
        MsrSource::Immediate(value) => word | 0x0200_0000 | encode_rotated_immediate(value).unwrap_or(value & 0xFF),
    }
}

#[must_use]
pub fn encode_single_transfer(cond: Condition, load: bool, byte: bool, pre_index: bool, up: bool, write_back: bool, rn: u8, rd: u8, offset: u32) -> u32 {
    (u32::from(cond.bits()) << 28)
        | 0x0400_0000
        | (u32::from(pre_index) << 24)
        | (u32::from(up) << 23)
        | (u32::from(byte) << 22)
        | (u32::from(write_back) << 21)
        | (u32::from(load) << 20)
        | (u32::from(rn) << 16)
        | (u32::from(rd) << 12)
        | (offset & 0x0FFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_immediate_round_trips_against_core_decode() {
        let word = encode_data_processing(Condition::from_bits(0xE), DpOp::Mov, true, 0, 0, Operand2::Immediate(42));
        assert_eq!(word, 0xE3B0_002A);
    }

    #[test]
    fn branch_target_eight_bytes_ahead_has_zero_offset() {
        let word = encode_branch(Condition::from_bits(0xE), false, 8);
        assert_eq!(word & 0x00FF_FFFF, 0);
    }

    #[test]
    fn breakpoint_encoding_matches_core_decoder() {
        let word = encode_bkpt(0xF001);
        assert_eq!(arm_cpu::ProcessorCore::breakpoint_id(word), 0xF001);
    }

    #[test]
    fn mrs_sets_bit24_and_spsr_bit_but_not_msr_bit() {
        let word = encode_mrs(Condition::from_bits(0xE), true, 0);
        assert_eq!(word & 0x0100_0000, 0x0100_0000);
        assert_eq!(word & 0x0040_0000, 0x0040_0000, "R bit selects SPSR");
        assert_eq!(word & 0x0020_0000, 0, "MRS never sets the MSR bit");
        assert_eq!((word >> 16) & 0xF, 0xF);
    }

    #[test]
    fn msr_immediate_sets_i_bit_and_field_mask() {
        let word = encode_msr(Condition::from_bits(0xE), false, true, false, MsrSource::Immediate(0x80));
        assert_eq!(word & 0x0220_0000, 0x0220_0000, "I bit and MSR bit both set");
        assert_eq!(word & (1 << 19), 1 << 19, "flags field selected");
        assert_eq!(word & (1 << 16), 0, "control field not selected");
    }

    #[test]
    fn msr_register_form_carries_rm_in_low_nibble() {
        let word = encode_msr(Condition::from_bits(0xE), false, false, true, MsrSource::Register(3));
        assert_eq!(word & 0x0F, 3);
        assert_eq!(word & 0x0200_0000, 0, "register form never sets the I bit");
    }
}
