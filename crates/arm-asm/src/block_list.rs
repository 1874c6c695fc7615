//! Two-pass assembly: the first pass fixes every label's address, the
//! second emits bytes now that forward references are resolvable.
//!
//! This flattens the original's block-sealing machinery (pre-assembled
//! vs. deferred blocks, resealed on every assembler-state change) into a
//! single ordered statement list walked twice. The property that matters
//! survives: a label may be referenced before its definition appears in
//! source, and still resolve.

use arm_cpu::ArchVersion;

use crate::encode::{self, DpOp, Operand2};
use crate::messages::{Location, Messages};
use crate::scope::{ScopeArena, SymbolValue};
use crate::statement::{AssemblyDirective, BranchTarget, InstructionBody, ObjectCode, Operand2Expr, Statement};

/// An ordered sequence of parsed statements awaiting assembly.
#[derive(Debug, Default)]
pub struct BlockList {
    statements: Vec<Statement>,
}

impl BlockList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Assembles every statement into object code. Returns `None` object
    /// code only when the first pass cannot establish a base address; a
    /// second-pass encoding failure still returns the zero-padded bytes
    /// alongside the errors so offsets downstream remain consistent.
    #[must_use]
    pub fn assemble(&self) -> (Option<ObjectCode>, Messages) {
        let mut messages = Messages::new();
        let mut scope = ScopeArena::new();
        let root = scope.root();

        let base_address = match self.statements.first() {
            Some(Statement::Org { address, .. }) => *address,
            _ => 0,
        };

        // First pass: fix every label and EQU constant to an address or
        // value, without emitting any bytes.
        let mut address = base_address;
        for statement in &self.statements {
            match statement {
                Statement::Label { name, location } => {
                    if let Err(original) = scope.define(root, name, location.clone(), SymbolValue::Address(address)) {
                        messages.append_error(location.clone(), format!("'{name}' redefined; first defined at {original}"));
                    }
                }
                Statement::Equ { name, value, location } => {
                    if let Err(original) = scope.define(root, name, location.clone(), SymbolValue::Constant(*value)) {
                        messages.append_error(location.clone(), format!("'{name}' redefined; first defined at {original}"));
                    }
                }
                Statement::Org { address: new_address, .. } => address = *new_address,
                other => address += other.predicted_size(),
            }
        }

        // Second pass: re-walk in the same order, now able to resolve any
        // symbol referenced before its definition appeared in source. An
        // `AssemblyDirective` takes effect immediately: it changes `arch`,
        // and every statement after it (until the next one) sees the new
        // value, which is the block-sealing behaviour this flat walk
        // preserves without needing literal block boundaries.
        let mut bytes = Vec::new();
        let mut address = base_address;
        let mut arch = ArchVersion::V4;
        for statement in &self.statements {
            let start_len = bytes.len();
            match statement {
                Statement::Empty | Statement::Label { .. } | Statement::Equ { .. } | Statement::Include { .. } | Statement::Block { .. } => {}
                Statement::Directive { directive: AssemblyDirective::Architecture(version), .. } => arch = *version,
                Statement::Org { address: new_address, .. } => {
                    pad_to(&mut bytes, base_address, *new_address);
                    address = *new_address;
                }
                Statement::DefineWord { values, .. } => {
                    for value in values {
                        bytes.extend_from_slice(&value.to_le_bytes());
                    }
                }
                Statement::DefineByte { values, .. } => bytes.extend_from_slice(values),
                Statement::Instruction { body, location } => {
                    let word = encode_instruction(body, address, &scope, root, location, &mut messages, arch);
                    bytes.extend_from_slice(&word.to_le_bytes());
                }
            }

            let predicted = statement.predicted_size() as usize;
            let emitted = bytes.len() - start_len;
            if emitted != predicted && !matches!(statement, Statement::Org { .. }) {
                messages.append_fatal(
                    statement.location().cloned().unwrap_or_default(),
                    format!("statement emitted {emitted} bytes but predicted {predicted}"),
                );
            }
            address += statement.predicted_size();
        }

        messages.sort();
        (Some(ObjectCode { base_address, bytes }), messages)
    }
}

fn pad_to(bytes: &mut Vec<u8>, base_address: u32, target_address: u32) {
    let current = base_address + bytes.len() as u32;
    if target_address > current {
        bytes.resize(bytes.len() + (target_address - current) as usize, 0);
    }
}

fn resolve_operand2(
    expr: &Operand2Expr,
    scope: &ScopeArena,
    root: usize,
    location: &Location,
    messages: &mut Messages,
) -> Operand2 {
    match expr {
        Operand2Expr::Immediate(value) => Operand2::Immediate(*value),
        Operand2Expr::Register(reg) => Operand2::Register(*reg),
        Operand2Expr::Symbol(name) => match scope.lookup(root, name) {
            Some(SymbolValue::Address(addr)) => Operand2::Immediate(addr),
            Some(SymbolValue::Constant(value)) => Operand2::Immediate(value as u32),
            None => {
                messages.append_error(location.clone(), format!("undefined symbol '{name}'"));
                Operand2::Immediate(0)
            }
        },
    }
}

fn resolve_branch_offset(
    target: &BranchTarget,
    instruction_address: u32,
    scope: &ScopeArena,
    root: usize,
    location: &Location,
    messages: &mut Messages,
) -> i32 {
    match target {
        BranchTarget::Offset(offset) => *offset,
        BranchTarget::Label(name) => match scope.lookup(root, name) {
            Some(SymbolValue::Address(addr)) => addr as i64 as i32 - instruction_address as i32,
            Some(SymbolValue::Constant(_)) => {
                messages.append_error(location.clone(), format!("'{name}' is a constant, not a branch target"));
                0
            }
            None => {
                messages.append_error(location.clone(), format!("undefined label '{name}'"));
                0
            }
        },
    }
}

fn encode_instruction(
    body: &InstructionBody,
    address: u32,
    scope: &ScopeArena,
    root: usize,
    location: &Location,
    messages: &mut Messages,
    arch: ArchVersion,
) -> u32 {
    match body {
        InstructionBody::DataProcessing { cond, op, set_flags, rd, rn, op2 } => {
            let op2 = resolve_operand2(op2, scope, root, location, messages);
            if let Operand2::Immediate(value) = op2 {
                if *op != DpOp::Mov && *op != DpOp::Mvn && encode::encode_rotated_immediate(value).is_none() {
                    messages.append_error(location.clone(), format!("immediate {value:#x} is not representable as a rotated 8-bit value"));
                }
            }
            encode::encode_data_processing(*cond, *op, *set_flags, *rd, *rn, op2)
        }
        InstructionBody::Branch { cond, link, target } => {
            let offset = resolve_branch_offset(target, address, scope, root, location, messages);
            encode::encode_branch(*cond, *link, offset)
        }
        InstructionBody::SingleTransfer { cond, load, byte, rn, rd, offset, pre_index, write_back } => {
            let up = *offset >= 0;
            encode::encode_single_transfer(*cond, *load, *byte, *pre_index, up, *write_back, *rn, *rd, offset.unsigned_abs())
        }
        InstructionBody::Multiply { cond, accumulate, set_flags, rd, rn, rs, rm } => {
            encode::encode_multiply(*cond, *accumulate, *set_flags, *rd, *rn, *rs, *rm)
        }
        InstructionBody::Swi { cond, comment } => encode::encode_swi(*cond, *comment),
        InstructionBody::Bkpt { id } => encode::encode_bkpt(*id),
        InstructionBody::Mrs { cond, use_spsr, rd } => {
            require_32bit_modes(arch, "MRS", location, messages);
            encode::encode_mrs(*cond, *use_spsr, *rd)
        }
        InstructionBody::Msr { cond, use_spsr, flags_field, control_field, source } => {
            require_32bit_modes(arch, "MSR", location, messages);
            encode::encode_msr(*cond, *use_spsr, *flags_field, *control_field, *source)
        }
        InstructionBody::Adr { cond, rd, target } => {
            let target_address = resolve_adr_target(target, address, scope, root, location, messages);
            let pc_value = address.wrapping_add(8);
            let delta = i64::from(target_address) - i64::from(pc_value);
            let (op, magnitude) = if delta >= 0 { (DpOp::Add, delta as u32) } else { (DpOp::Sub, (-delta) as u32) };
            if encode::encode_rotated_immediate(magnitude).is_none() {
                messages.append_error(location.clone(), format!("ADR distance {magnitude:#x} is not representable as a rotated 8-bit value"));
            }
            encode::encode_data_processing(*cond, op, false, *rd, 15, Operand2::Immediate(magnitude))
        }
    }
}

/// MRS/MSR read and write the full 32-bit CPSR/SPSR; a 26-bit-only core has
/// no such register to transfer (its flags and mode live packed into r15).
fn require_32bit_modes(arch: ArchVersion, mnemonic: &str, location: &Location, messages: &mut Messages) {
    if !arm_cpu::capabilities(arch).has_32bit_modes {
        messages.append_error(location.clone(), format!("{mnemonic} requires a 32-bit-mode architecture (ARMv3 or later)"));
    }
}

fn resolve_adr_target(
    target: &BranchTarget,
    instruction_address: u32,
    scope: &ScopeArena,
    root: usize,
    location: &Location,
    messages: &mut Messages,
) -> u32 {
    match target {
        BranchTarget::Offset(offset) => (instruction_address as i64 + i64::from(*offset)) as u32,
        BranchTarget::Label(name) => match scope.lookup(root, name) {
            Some(SymbolValue::Address(addr)) => addr,
            Some(SymbolValue::Constant(_)) => {
                messages.append_error(location.clone(), format!("'{name}' is a constant, not an address"));
                instruction_address
            }
            None => {
                messages.append_error(location.clone(), format!("undefined symbol '{name}'"));
                instruction_address
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::DpOp;
    use crate::statement::MsrSource;
    use arm_cpu::Condition;

    fn loc(line: i32) -> Location {
        Location::new("t.s", line, 0)
    }

    #[test]
    fn forward_branch_reference_resolves_in_second_pass() {
        let mut blocks = BlockList::new();
        // B target ; target: MOV R0, #1
        blocks.push(Statement::Instruction {
            body: InstructionBody::Branch {
                cond: Condition::from_bits(0xE),
                link: false,
                target: BranchTarget::Label("target".into()),
            },
            location: loc(1),
        });
        blocks.push(Statement::Label { name: "target".into(), location: loc(2) });
        blocks.push(Statement::Instruction {
            body: InstructionBody::DataProcessing {
                cond: Condition::from_bits(0xE),
                op: DpOp::Mov,
                set_flags: false,
                rd: 0,
                rn: 0,
                op2: Operand2Expr::Immediate(1),
            },
            location: loc(2),
        });

        let (object, messages) = blocks.assemble();
        assert!(!messages.has_errors(), "{:?}", messages.messages());
        let object = object.unwrap();
        let word = u32::from_le_bytes(object.bytes[0..4].try_into().unwrap());
        // branch to the very next instruction: offset = 4 - 8 = -4, imm24 encodes -1
        assert_eq!(word & 0x00FF_FFFF, 0x00FF_FFFF);
    }

    #[test]
    fn undefined_symbol_is_reported_as_error() {
        let mut blocks = BlockList::new();
        blocks.push(Statement::Instruction {
            body: InstructionBody::Branch {
                cond: Condition::from_bits(0xE),
                link: false,
                target: BranchTarget::Label("nowhere".into()),
            },
            location: loc(1),
        });

        let (_, messages) = blocks.assemble();
        assert!(messages.has_errors());
    }

    #[test]
    fn redefined_label_reports_original_location() {
        let mut blocks = BlockList::new();
        blocks.push(Statement::Label { name: "x".into(), location: loc(1) });
        blocks.push(Statement::Label { name: "x".into(), location: loc(2) });

        let (_, messages) = blocks.assemble();
        assert!(messages.has_errors());
        let text = messages.messages()[0].text().to_string();
        assert!(text.contains("t.s:1:0"));
    }

    #[test]
    fn adr_forward_reference_resolves_to_add_from_pc() {
        let mut blocks = BlockList::new();
        // ADR R0, label ; label is 44 bytes further on
        blocks.push(Statement::Instruction {
            body: InstructionBody::Adr {
                cond: Condition::from_bits(0xE),
                rd: 0,
                target: BranchTarget::Label("label".into()),
            },
            location: loc(1),
        });
        for i in 0..10 {
            blocks.push(Statement::Instruction {
                body: InstructionBody::DataProcessing {
                    cond: Condition::from_bits(0xE),
                    op: DpOp::Mov,
                    set_flags: false,
                    rd: 0,
                    rn: 0,
                    op2: Operand2Expr::Immediate(0),
                },
                location: loc(2 + i),
            });
        }
        blocks.push(Statement::Label { name: "label".into(), location: loc(12) });
        blocks.push(Statement::DefineWord { values: vec![0xDEAD_BEEF], location: loc(12) });

        let (object, messages) = blocks.assemble();
        assert!(!messages.has_errors(), "{:?}", messages.messages());
        let object = object.unwrap();
        // ADR (4) + 10 MOVs (40) + the DefineWord (4) = 48; label sits at 44
        assert_eq!(object.bytes.len(), 48);
        let word = u32::from_le_bytes(object.bytes[0..4].try_into().unwrap());
        // ADD R0, PC, #36 ; label (address 44) minus (pc value, 0+8) = 36
        assert_eq!(word, 0xE28F_0024);
    }

    #[test]
    fn msr_on_a_26bit_only_architecture_reports_an_error() {
        let mut blocks = BlockList::new();
        blocks.push(Statement::Directive {
            directive: AssemblyDirective::Architecture(ArchVersion::V2),
            location: loc(1),
        });
        blocks.push(Statement::Instruction {
            body: InstructionBody::Msr {
                cond: Condition::from_bits(0xE),
                use_spsr: false,
                flags_field: true,
                control_field: true,
                source: MsrSource::Register(0),
            },
            location: loc(2),
        });

        let (_, messages) = blocks.assemble();
        assert!(messages.has_errors());
        assert!(messages.messages()[0].text().contains("32-bit-mode"));
    }

    #[test]
    fn mrs_on_the_default_architecture_has_no_error() {
        let mut blocks = BlockList::new();
        blocks.push(Statement::Instruction {
            body: InstructionBody::Mrs {
                cond: Condition::from_bits(0xE),
                use_spsr: false,
                rd: 0,
            },
            location: loc(1),
        });

        let (_, messages) = blocks.assemble();
        assert!(!messages.has_errors(), "{:?}", messages.messages());
    }
}
