//! Instruction fetch, decode, and execution.
//!
//! One call to `run_single_step` retires exactly one instruction. `run`
//! loops until a host interrupt is observed or the processor traps into a
//! debug condition (`BKPT`), matching the "run until a host or debug
//! interrupt occurs" contract of the emulated system.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::bus::Bus;
use crate::flags::{self, Condition, Status};
use crate::model::CpuCapabilities;
use crate::registers::{CoreRegister, ProcessorMode, RegisterFile};

/// Why `run`/`run_single_step` returned control to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
    /// No run has completed yet.
    Unset,
    /// A `BKPT` instruction was executed.
    DebugIrq,
    /// The host-interrupt flag was observed at an instruction boundary.
    HostIrq,
    /// `run_single_step` completed its one instruction.
    SingleStep,
    /// Execution could not continue (e.g. a decode fault with nowhere to
    /// trap to).
    Failure,
}

/// Summary of a `run`/`run_single_step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionMetrics {
    pub cycle_count: u64,
    pub instruction_count: u64,
    pub result: ExecResult,
}

impl ExecutionMetrics {
    const fn new(result: ExecResult) -> Self {
        Self {
            cycle_count: 0,
            instruction_count: 0,
            result,
        }
    }
}

/// Exception vector offsets and mode/LR-adjustment table, indexed by
/// exception class.
struct ExceptionEntry {
    mode: ProcessorMode,
    vector: u32,
    lr_offset: u32,
}

const RESET: ExceptionEntry = ExceptionEntry {
    mode: ProcessorMode::Svc32,
    vector: 0x00,
    lr_offset: 0,
};
const UNDEFINED_INSTRUCTION: ExceptionEntry = ExceptionEntry {
    mode: ProcessorMode::Undefined,
    vector: 0x04,
    lr_offset: 4,
};
const SOFTWARE_INTERRUPT: ExceptionEntry = ExceptionEntry {
    mode: ProcessorMode::Svc32,
    vector: 0x08,
    lr_offset: 4,
};
const PREFETCH_ABORT: ExceptionEntry = ExceptionEntry {
    mode: ProcessorMode::Abort,
    vector: 0x0C,
    lr_offset: 4,
};
const DATA_ABORT: ExceptionEntry = ExceptionEntry {
    mode: ProcessorMode::Abort,
    vector: 0x10,
    lr_offset: 8,
};
const IRQ: ExceptionEntry = ExceptionEntry {
    mode: ProcessorMode::Irq32,
    vector: 0x18,
    lr_offset: 4,
};
const FIQ: ExceptionEntry = ExceptionEntry {
    mode: ProcessorMode::Fiq32,
    vector: 0x1C,
    lr_offset: 4,
};

/// Mask for PC[25:2] within a packed 26-bit r15.
const PC26_MASK: u32 = 0x03FF_FFFC;

/// An ARM processor core: register file, condition evaluation, and
/// instruction dispatch. Generic over the bus it executes against.
pub struct ProcessorCore {
    regs: RegisterFile,
    capabilities: CpuCapabilities,
    halted: bool,
}

impl ProcessorCore {
    #[must_use]
    pub fn new(capabilities: CpuCapabilities) -> Self {
        let mut core = Self {
            regs: RegisterFile::new(),
            capabilities,
            halted: false,
        };
        core.enter_exception(RESET);
        core
    }

    #[must_use]
    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn reset(&mut self) {
        self.regs = RegisterFile::new();
        self.halted = false;
        self.enter_exception(RESET);
    }

    /// Runs until the host-interrupt flag is set or a `BKPT` traps,
    /// checked at every instruction boundary.
    pub fn run<B: Bus>(&mut self, bus: &mut B, host_interrupt: &AtomicBool) -> ExecutionMetrics {
        let mut metrics = ExecutionMetrics::new(ExecResult::Unset);

        loop {
            if host_interrupt.load(Ordering::Acquire) {
                metrics.result = ExecResult::HostIrq;
                break;
            }
            if self.halted {
                metrics.result = ExecResult::Failure;
                break;
            }

            let outcome = self.step(bus);
            metrics.instruction_count += 1;
            metrics.cycle_count += 1;

            if outcome == ExecResult::DebugIrq {
                metrics.result = ExecResult::DebugIrq;
                break;
            }
        }

        metrics
    }

    /// Executes exactly one instruction.
    pub fn run_single_step<B: Bus>(&mut self, bus: &mut B) -> ExecutionMetrics {
        let outcome = self.step(bus);
        ExecutionMetrics {
            cycle_count: 1,
            instruction_count: 1,
            result: if outcome == ExecResult::DebugIrq {
                ExecResult::DebugIrq
            } else {
                ExecResult::SingleStep
            },
        }
    }

    fn step<B: Bus>(&mut self, bus: &mut B) -> ExecResult {
        let pc = self.regs.pc();
        let word = bus.read32(pc);
        self.regs.set_pc(pc.wrapping_add(4));

        let cond = Condition::from_bits(((word >> 28) & 0x0F) as u8);
        if !cond.eval(self.regs.cpsr()) {
            return ExecResult::Unset;
        }

        self.dispatch(bus, word)
    }

    /// Operand read of register `n`, honouring the pipelined-PC convention:
    /// reading r15 as an operand yields `PC + 8`. In a 26-bit mode, r15 is
    /// the packed PC/flags/mode register, so the packed form is returned.
    fn operand(&self, n: u8) -> u32 {
        if n == 15 {
            let pc = self.regs.pc().wrapping_add(4);
            if self.regs.mode().is_26bit() {
                (self.regs.cpsr() & (flags::NZCV_MASK | 0xFF)) | (pc & PC26_MASK)
            } else {
                pc
            }
        } else {
            self.regs.read(n)
        }
    }

    /// Writes a data-processing or load result destined for r15. In a
    /// 32-bit mode this is a plain PC write, restoring CPSR from SPSR when
    /// `restore_flags` (the `MOVS PC, LR` exception-return idiom). In a
    /// 26-bit mode r15 is the packed PC/flags/mode register: PC[25:2] is
    /// always unpacked, and the flags/mode byte is restored from the
    /// written value only when `restore_flags`.
    fn write_pc_result(&mut self, result: u32, restore_flags: bool) {
        if self.regs.mode().is_26bit() {
            self.regs.set_pc(result & PC26_MASK);
            if restore_flags {
                let cpsr = (self.regs.cpsr() & !(flags::NZCV_MASK | 0xFF)) | (result & (flags::NZCV_MASK | 0xFF));
                self.regs.set_cpsr(cpsr);
            }
        } else {
            self.regs.set_pc(result);
            if restore_flags {
                if let Some(spsr) = self.regs.spsr() {
                    self.regs.set_cpsr(spsr);
                }
            }
        }
    }

    fn dispatch<B: Bus>(&mut self, bus: &mut B, word: u32) -> ExecResult {
        if word & 0x0FFF_FFF0 == 0x012F_FF10 {
            return self.exec_branch_exchange(word);
        }
        if self.capabilities.has_swap && word & 0x0FB0_0FF0 == 0x0100_0090 {
            return self.exec_swap(bus, word);
        }
        if self.is_breakpoint(word) {
            return ExecResult::DebugIrq;
        }

        match (word >> 25) & 0x07 {
            0b000 => {
                if word & 0x0FC0_00F0 == 0x0000_0090 {
                    self.exec_multiply(word)
                } else {
                    self.exec_data_processing(word)
                }
            }
            0b001 => self.exec_data_processing(word),
            0b010 | 0b011 => self.exec_single_transfer(bus, word),
            0b100 => self.exec_block_transfer(bus, word),
            0b101 => self.exec_branch(word),
            0b110 => self.exec_coprocessor_transfer(word),
            0b111 => {
                if word & 0x0F00_0000 == 0x0F00_0000 {
                    self.exec_swi(word)
                } else {
                    self.exec_coprocessor_data_op(word)
                }
            }
            _ => unreachable!(),
        }
    }

    /// `BKPT`: cond must be `AL` (1110), bits 27-20 = 0001 0010,
    /// bits 7-4 = 0111. The 16-bit comment is split across bits 19-8 and 3-0.
    fn is_breakpoint(&self, word: u32) -> bool {
        word & 0xFFF0_00F0 == 0xE120_0070
    }

    #[must_use]
    pub fn breakpoint_id(word: u32) -> u16 {
        let hi = (word >> 8) & 0x0FFF;
        let lo = word & 0x0F;
        ((hi << 4) | lo) as u16
    }

    #[must_use]
    pub fn encode_breakpoint(id: u16) -> u32 {
        let id = u32::from(id);
        0xE120_0070 | ((id & 0x0FFF) << 8) | (id & 0x0F)
    }

    fn exec_branch(&mut self, word: u32) -> ExecResult {
        let link = word & 0x0100_0000 != 0;
        let mut offset = (word & 0x00FF_FFFF) << 2;
        if offset & 0x0200_0000 != 0 {
            offset |= 0xFC00_0000; // sign extend
        }
        let target = self.operand(15).wrapping_add(offset).wrapping_sub(4);

        if link {
            self.regs.write(14, self.regs.pc());
        }
        self.regs.set_pc(target);
        ExecResult::Unset
    }

    fn exec_branch_exchange(&mut self, word: u32) -> ExecResult {
        let rn = (word & 0x0F) as u8;
        let target = self.regs.read(rn);
        self.regs.set_pc(target & !0x01);
        ExecResult::Unset
    }

    fn exec_swi(&mut self, _word: u32) -> ExecResult {
        self.enter_exception(SOFTWARE_INTERRUPT);
        ExecResult::Unset
    }

    fn exec_swap(&mut self, bus: &mut impl Bus, word: u32) -> ExecResult {
        let rn = ((word >> 16) & 0x0F) as u8;
        let rd = ((word >> 12) & 0x0F) as u8;
        let rm = (word & 0x0F) as u8;
        let byte = word & 0x0040_0000 != 0;
        let addr = self.regs.read(rn);

        if byte {
            let old = bus.read8(addr);
            bus.write8(addr, self.regs.read(rm) as u8);
            self.regs.write(rd, u32::from(old));
        } else {
            let old = bus.read32(addr);
            bus.write32(addr, self.regs.read(rm));
            self.regs.write(rd, old);
        }
        ExecResult::Unset
    }

    fn exec_multiply(&mut self, word: u32) -> ExecResult {
        let accumulate = word & 0x0020_0000 != 0;
        let set_flags = word & 0x0010_0000 != 0;
        let rd = ((word >> 16) & 0x0F) as u8;
        let rn = ((word >> 12) & 0x0F) as u8;
        let rs = ((word >> 8) & 0x0F) as u8;
        let rm = (word & 0x0F) as u8;

        let mut result = self.regs.read(rm).wrapping_mul(self.regs.read(rs));
        if accumulate {
            result = result.wrapping_add(self.regs.read(rn));
        }
        self.regs.write(rd, result);

        if set_flags {
            self.regs.set_cpsr(Status::update_nz(self.regs.cpsr(), result));
        }
        ExecResult::Unset
    }

    fn exec_data_processing(&mut self, word: u32) -> ExecResult {
        let opcode = (word >> 21) & 0x0F;
        let set_flags = word & 0x0010_0000 != 0;
        let rn = ((word >> 16) & 0x0F) as u8;
        let rd = ((word >> 12) & 0x0F) as u8;

        // PSR transfer, which shares the TST/TEQ/CMP/CMN opcode space with
        // S=0: MRS (bit 21 clear within that range) / MSR.
        if !set_flags && (opcode == 0x8 || opcode == 0x9 || opcode == 0xA || opcode == 0xB) {
            return self.exec_psr_transfer(word);
        }

        let op2 = self.decode_operand2(word);
        let rn_val = self.operand(rn);
        let (result, carry_out, overflow) = alu_op(opcode, rn_val, op2, self.regs.cpsr() & flags::C != 0);

        let writes_result = !matches!(opcode, 0x8 | 0x9 | 0xA | 0xB);
        if writes_result {
            if rd == 15 {
                // MOVS/ADDS PC, ... restores flags (from SPSR, or packed
                // into the result itself in a 26-bit mode): exception
                // return idiom.
                self.write_pc_result(result, set_flags);
                return ExecResult::Unset;
            }
            self.regs.write(rd, result);
        }

        if set_flags {
            let mut cpsr = Status::update_nz(self.regs.cpsr(), result);
            cpsr = Status::set_if(cpsr, flags::C, carry_out);
            if matches!(opcode, 0x2 | 0x3 | 0x4 | 0x5 | 0x6 | 0x7 | 0xA | 0xB) {
                cpsr = Status::set_if(cpsr, flags::V, overflow);
            }
            self.regs.set_cpsr(cpsr);
        }
        ExecResult::Unset
    }

    fn exec_psr_transfer(&mut self, word: u32) -> ExecResult {
        let use_spsr = word & 0x0040_0000 != 0;
        let is_msr = word & 0x0020_0000 != 0;
        if is_msr {
            let value = if word & 0x0200_0000 != 0 {
                rotate_immediate(word)
            } else {
                self.regs.read((word & 0x0F) as u8)
            };
            let field_mask = psr_field_mask(word);
            if use_spsr {
                if let Some(current) = self.regs.spsr() {
                    self.regs.set_spsr((current & !field_mask) | (value & field_mask));
                }
            } else {
                let current = self.regs.cpsr();
                self.regs.set_cpsr((current & !field_mask) | (value & field_mask));
            }
        } else {
            let rd = ((word >> 12) & 0x0F) as u8;
            let value = if use_spsr { self.regs.spsr().unwrap_or(0) } else { self.regs.cpsr() };
            self.regs.write(rd, value);
        }
        ExecResult::Unset
    }

    fn decode_operand2(&mut self, word: u32) -> u32 {
        if word & 0x0200_0000 != 0 {
            rotate_immediate(word)
        } else {
            let rm = (word & 0x0F) as u8;
            let shift_amount = if word & 0x10 != 0 {
                self.regs.read(((word >> 8) & 0x0F) as u8) & 0xFF
            } else {
                (word >> 7) & 0x1F
            };
            let shift_type = (word >> 5) & 0x03;
            barrel_shift(shift_type, self.operand(rm), shift_amount)
        }
    }

    fn exec_single_transfer<B: Bus>(&mut self, bus: &mut B, word: u32) -> ExecResult {
        let pre_index = word & 0x0100_0000 != 0;
        let up = word & 0x0080_0000 != 0;
        let byte = word & 0x0040_0000 != 0;
        let write_back = word & 0x0020_0000 != 0;
        let load = word & 0x0010_0000 != 0;
        let rn = ((word >> 16) & 0x0F) as u8;
        let rd = ((word >> 12) & 0x0F) as u8;

        let offset = if word & 0x0200_0000 != 0 {
            let rm = (word & 0x0F) as u8;
            let shift_amount = (word >> 7) & 0x1F;
            let shift_type = (word >> 5) & 0x03;
            barrel_shift(shift_type, self.regs.read(rm), shift_amount)
        } else {
            word & 0x0FFF
        };

        let base = self.operand(rn);
        let offset_addr = if up { base.wrapping_add(offset) } else { base.wrapping_sub(offset) };
        let addr = if pre_index { offset_addr } else { base };

        if load {
            let value = if byte { u32::from(bus.read8(addr)) } else { bus.read32(addr) };
            self.regs.write(rd, value);
        } else {
            let value = self.regs.read(rd);
            if byte {
                bus.write8(addr, value as u8);
            } else {
                bus.write32(addr, value);
            }
        }

        if !pre_index || write_back {
            self.regs.write(rn, offset_addr);
        }
        ExecResult::Unset
    }

    fn exec_block_transfer<B: Bus>(&mut self, bus: &mut B, word: u32) -> ExecResult {
        let pre_index = word & 0x0100_0000 != 0;
        let up = word & 0x0080_0000 != 0;
        let write_back = word & 0x0020_0000 != 0;
        let load = word & 0x0010_0000 != 0;
        let rn = ((word >> 16) & 0x0F) as u8;
        let register_list = word & 0xFFFF;

        let registers: Vec<u8> = (0..16).filter(|r| register_list & (1 << r) != 0).collect();
        let count = registers.len() as u32;
        let mut addr = self.regs.read(rn);
        let final_addr = if up { addr.wrapping_add(count * 4) } else { addr.wrapping_sub(count * 4) };

        let ordered: Vec<u8> = if up { registers } else { registers.into_iter().rev().collect() };

        for reg in ordered {
            if up {
                if pre_index {
                    addr = addr.wrapping_add(4);
                }
            } else if pre_index {
                addr = addr.wrapping_sub(4);
            }

            if load {
                let value = bus.read32(addr);
                if reg == 15 {
                    self.write_pc_result(value, false);
                } else {
                    self.regs.write(reg, value);
                }
            } else {
                let value = self.operand(reg);
                bus.write32(addr, value);
            }

            if up {
                if !pre_index {
                    addr = addr.wrapping_add(4);
                }
            } else if !pre_index {
                addr = addr.wrapping_sub(4);
            }
        }

        if write_back {
            self.regs.write(rn, final_addr);
        }
        ExecResult::Unset
    }

    fn exec_coprocessor_transfer(&mut self, _word: u32) -> ExecResult {
        self.enter_exception(UNDEFINED_INSTRUCTION);
        ExecResult::Unset
    }

    fn exec_coprocessor_data_op(&mut self, _word: u32) -> ExecResult {
        self.enter_exception(UNDEFINED_INSTRUCTION);
        ExecResult::Unset
    }

    /// Enters an ARM exception: saves CPSR to the target mode's SPSR,
    /// computes the banked LR, switches mode, disables interrupts as the
    /// exception class requires, and sets PC to the vector. The target
    /// mode is downgraded to its 26-bit counterpart on a core without
    /// `has_32bit_modes` (e.g. `ArchVersion::V2`), which never has Svc32
    /// etc. to enter in the first place.
    fn enter_exception(&mut self, entry: ExceptionEntry) {
        let old_cpsr = self.regs.cpsr();
        let return_addr = self.regs.pc().wrapping_add(entry.lr_offset).wrapping_sub(4);
        let target_mode = if self.capabilities.has_32bit_modes {
            entry.mode
        } else {
            entry.mode.to_26bit()
        };

        self.regs.set_mode(target_mode);
        self.regs.set_spsr(old_cpsr);
        self.regs.write(14, return_addr);

        let mut new_cpsr = (old_cpsr & !0x1F) | target_mode.bits() | flags::I;
        if matches!(target_mode, ProcessorMode::Svc32 | ProcessorMode::Svc26) && entry.vector == 0x00 {
            new_cpsr |= flags::F; // Reset also disables FIQ.
        }
        self.regs.set_cpsr(new_cpsr);
        self.regs.set_pc(entry.vector);
    }

    pub fn raise_irq(&mut self) {
        if self.regs.cpsr() & flags::I == 0 {
            self.enter_exception(IRQ);
        }
    }

    pub fn raise_fiq(&mut self) {
        if self.regs.cpsr() & flags::F == 0 {
            self.enter_exception(FIQ);
        }
    }

    pub fn raise_data_abort(&mut self) {
        self.enter_exception(DATA_ABORT);
    }

    pub fn raise_prefetch_abort(&mut self) {
        self.enter_exception(PREFETCH_ABORT);
    }

    #[must_use]
    pub fn core_register(&self, reg: CoreRegister) -> u32 {
        self.regs.core_register(reg)
    }

    pub fn set_core_register(&mut self, reg: CoreRegister, value: u32) {
        self.regs.set_core_register(reg, value);
    }
}

fn psr_field_mask(word: u32) -> u32 {
    let mut mask = 0;
    if word & (1 << 16) != 0 {
        mask |= 0x0000_00FF; // control field
    }
    if word & (1 << 19) != 0 {
        mask |= 0xFF00_0000; // flags field
    }
    mask
}

fn rotate_immediate(word: u32) -> u32 {
    let imm = word & 0xFF;
    let rotate = ((word >> 8) & 0x0F) * 2;
    imm.rotate_right(rotate)
}

/// Barrel shifter: 0=LSL, 1=LSR, 2=ASR, 3=ROR.
fn barrel_shift(shift_type: u32, value: u32, amount: u32) -> u32 {
    match shift_type {
        0 => {
            if amount == 0 {
                value
            } else if amount >= 32 {
                0
            } else {
                value << amount
            }
        }
        1 => {
            if amount == 0 || amount >= 32 {
                0
            } else {
                value >> amount
            }
        }
        2 => {
            let amount = amount.min(31);
            ((value as i32) >> amount) as u32
        }
        3 => {
            let amount = amount & 0x1F;
            if amount == 0 {
                value
            } else {
                value.rotate_right(amount)
            }
        }
        _ => unreachable!(),
    }
}

/// Runs one ALU opcode, returning `(result, carry_out, overflow)`.
fn alu_op(opcode: u32, a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    match opcode {
        0x0 => (a & b, carry_in, false),              // AND
        0x1 => (a ^ b, carry_in, false),               // EOR
        0x2 => sub_with_flags(a, b),                   // SUB
        0x3 => sub_with_flags(b, a),                   // RSB
        0x4 => add_with_flags(a, b, false),            // ADD
        0x5 => add_with_flags(a, b, carry_in),         // ADC
        0x6 => sub_with_carry(a, b, carry_in),         // SBC
        0x7 => sub_with_carry(b, a, carry_in),         // RSC
        0x8 => (a & b, carry_in, false),               // TST
        0x9 => (a ^ b, carry_in, false),               // TEQ
        0xA => sub_with_flags(a, b),                   // CMP
        0xB => add_with_flags(a, b, false),            // CMN
        0xC => (a | b, carry_in, false),               // ORR
        0xD => (b, carry_in, false),                   // MOV
        0xE => (a & !b, carry_in, false),               // BIC
        0xF => (!b, carry_in, false),                   // MVN
        _ => unreachable!(),
    }
}

fn add_with_flags(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let (r1, c1) = a.overflowing_add(b);
    let (result, c2) = r1.overflowing_add(u32::from(carry_in));
    let carry = c1 || c2;
    let overflow = ((a ^ result) & (b ^ result) & 0x8000_0000) != 0;
    (result, carry, overflow)
}

fn sub_with_flags(a: u32, b: u32) -> (u32, bool, bool) {
    let (result, borrow) = a.overflowing_sub(b);
    let carry = !borrow; // ARM carry on subtract means "no borrow".
    let overflow = ((a ^ b) & (a ^ result) & 0x8000_0000) != 0;
    (result, carry, overflow)
}

fn sub_with_carry(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let not_carry = u32::from(!carry_in);
    let (r1, b1) = a.overflowing_sub(b);
    let (result, b2) = r1.overflowing_sub(not_carry);
    let carry = !(b1 || b2);
    let overflow = ((a ^ b) & (a ^ result) & 0x8000_0000) != 0;
    (result, carry, overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        mem: Vec<u8>,
    }

    impl TestBus {
        fn new(size: usize) -> Self {
            Self { mem: vec![0; size] }
        }
    }

    impl Bus for TestBus {
        fn read32(&mut self, addr: u32) -> u32 {
            let a = addr as usize;
            u32::from_le_bytes(self.mem[a..a + 4].try_into().unwrap())
        }
        fn write32(&mut self, addr: u32, value: u32) {
            let a = addr as usize;
            self.mem[a..a + 4].copy_from_slice(&value.to_le_bytes());
        }
        fn read8(&mut self, addr: u32) -> u8 {
            self.mem[addr as usize]
        }
        fn write8(&mut self, addr: u32, value: u8) {
            self.mem[addr as usize] = value;
        }
    }

    fn mov_imm(rd: u8, imm: u8) -> u32 {
        0xE3A0_0000 | (u32::from(rd) << 12) | u32::from(imm)
    }

    #[test]
    fn mov_immediate_writes_register() {
        let mut bus = TestBus::new(0x100);
        bus.write32(0, mov_imm(0, 42));
        bus.write32(4, 0xEAFF_FFFE); // B . (infinite self-branch, never reached in this test)

        let caps = crate::model::capabilities(crate::model::ArchVersion::V4);
        let mut core = ProcessorCore::new(caps);
        core.registers_mut().set_pc(0);
        core.run_single_step(&mut bus);

        assert_eq!(core.registers().read(0), 42);
        assert_eq!(core.registers().pc(), 4);
    }

    #[test]
    fn breakpoint_round_trips_through_encoding() {
        let word = ProcessorCore::encode_breakpoint(0xF001);
        assert_eq!(ProcessorCore::breakpoint_id(word), 0xF001);
    }

    #[test]
    fn swi_enters_supervisor_mode_and_saves_lr() {
        let mut bus = TestBus::new(0x100);
        bus.write32(0, 0xEF00_0001); // SWI #1

        let caps = crate::model::capabilities(crate::model::ArchVersion::V4);
        let mut core = ProcessorCore::new(caps);
        core.registers_mut().set_mode(ProcessorMode::User32);
        core.registers_mut().set_pc(0);
        core.run_single_step(&mut bus);

        assert_eq!(core.registers().mode(), ProcessorMode::Svc32);
        assert_eq!(core.registers().pc(), 0x08);
        assert_eq!(core.registers().read(14), 4);
    }

    #[test]
    fn v2_core_resets_into_26bit_supervisor_mode() {
        let caps = crate::model::capabilities(crate::model::ArchVersion::V2);
        let core = ProcessorCore::new(caps);
        assert_eq!(core.registers().mode(), ProcessorMode::Svc26);
        assert!(core.registers().mode().is_26bit());
    }

    #[test]
    fn v2_swi_enters_26bit_supervisor_mode_not_svc32() {
        let mut bus = TestBus::new(0x100);
        bus.write32(0, 0xEF00_0001); // SWI #1

        let caps = crate::model::capabilities(crate::model::ArchVersion::V2);
        let mut core = ProcessorCore::new(caps);
        core.registers_mut().set_mode(ProcessorMode::User26);
        core.registers_mut().set_pc(0);
        core.run_single_step(&mut bus);

        assert_eq!(core.registers().mode(), ProcessorMode::Svc26);
        assert_eq!(core.registers().pc(), 0x08);
    }

    #[test]
    fn reading_pc_as_operand_in_26bit_mode_packs_flags_and_mode() {
        let mut bus = TestBus::new(0x100);
        bus.write32(0, 0xE1A0_000F); // MOV R0, PC

        let caps = crate::model::capabilities(crate::model::ArchVersion::V2);
        let mut core = ProcessorCore::new(caps);
        core.registers_mut().set_mode(ProcessorMode::Svc26);
        core.registers_mut().set_cpsr((flags::N | ProcessorMode::Svc26.bits()) | flags::I);
        core.registers_mut().set_pc(0);
        core.run_single_step(&mut bus);

        let r0 = core.registers().read(0);
        assert_eq!(r0 & PC26_MASK, 8); // PC + 8 pipeline offset, packed into bits 25:2
        assert_eq!(r0 & flags::N, flags::N);
        assert_eq!(r0 & flags::I, flags::I);
        assert_eq!(r0 & 0x1F, ProcessorMode::Svc26.bits());
    }

    #[test]
    fn movs_pc_in_26bit_mode_restores_packed_flags_and_mode() {
        let mut bus = TestBus::new(0x100);
        bus.write32(0, 0xE1B0_F00E); // MOVS PC, R14

        let caps = crate::model::capabilities(crate::model::ArchVersion::V2);
        let mut core = ProcessorCore::new(caps);
        core.registers_mut().set_mode(ProcessorMode::Svc26);
        let packed_return = (flags::Z | ProcessorMode::User26.bits()) | 0x20; // target PC=0x20, Z set, User26
        core.registers_mut().write(14, packed_return);
        core.registers_mut().set_pc(0);
        core.run_single_step(&mut bus);

        assert_eq!(core.registers().pc(), 0x20);
        assert_eq!(core.registers().mode(), ProcessorMode::User26);
        assert_eq!(core.registers().cpsr() & flags::Z, flags::Z);
    }

    #[test]
    fn branch_with_link_sets_lr_to_next_instruction() {
        let mut bus = TestBus::new(0x100);
        bus.write32(0, 0xEB00_0000); // BL +0 (target = pc+8+0 = 8)

        let caps = crate::model::capabilities(crate::model::ArchVersion::V4);
        let mut core = ProcessorCore::new(caps);
        core.registers_mut().set_mode(ProcessorMode::Svc32);
        core.registers_mut().set_pc(0);
        core.run_single_step(&mut bus);

        assert_eq!(core.registers().read(14), 4);
        assert_eq!(core.registers().pc(), 8);
    }
}
