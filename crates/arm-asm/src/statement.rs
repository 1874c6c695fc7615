//! Parsed statements: the output of parsing and the input to assembly.

use arm_cpu::{ArchVersion, Condition};

use crate::encode::DpOp;
use crate::messages::Location;

/// One data-processing, branch, or other instruction, captured with
/// everything needed to encode it once any symbol references resolve.
#[derive(Debug, Clone)]
pub enum InstructionBody {
    DataProcessing {
        cond: Condition,
        op: DpOp,
        set_flags: bool,
        rd: u8,
        rn: u8,
        op2: Operand2Expr,
    },
    Branch {
        cond: Condition,
        link: bool,
        target: BranchTarget,
    },
    SingleTransfer {
        cond: Condition,
        load: bool,
        byte: bool,
        rn: u8,
        rd: u8,
        offset: i32,
        pre_index: bool,
        write_back: bool,
    },
    Multiply {
        cond: Condition,
        accumulate: bool,
        set_flags: bool,
        rd: u8,
        rn: u8,
        rs: u8,
        rm: u8,
    },
    Swi {
        cond: Condition,
        comment: u32,
    },
    Bkpt {
        id: u16,
    },
    Mrs {
        cond: Condition,
        use_spsr: bool,
        rd: u8,
    },
    Msr {
        cond: Condition,
        use_spsr: bool,
        flags_field: bool,
        control_field: bool,
        source: MsrSource,
    },
    /// `ADR Rd, label`: resolves to `ADD`/`SUB Rd, PC, #offset` once
    /// `label`'s address is known, same forward-reference treatment as
    /// `Branch`.
    Adr {
        cond: Condition,
        rd: u8,
        target: BranchTarget,
    },
}

/// The value MSR writes into the selected PSR fields: an immediate or a
/// register, mirroring `arm_cpu::cpu::exec_psr_transfer`'s decode of bit 25.
#[derive(Debug, Clone, Copy)]
pub enum MsrSource {
    Immediate(u32),
    Register(u8),
}

/// An operand2 that may reference a symbol not yet defined.
#[derive(Debug, Clone)]
pub enum Operand2Expr {
    Immediate(u32),
    Register(u8),
    Symbol(String),
}

/// A branch target: a literal word offset or a label to resolve later.
#[derive(Debug, Clone)]
pub enum BranchTarget {
    Offset(i32),
    Label(String),
}

/// A directive that changes assembler state affecting statements that
/// follow it. Only the architecture-version axis is modelled: it is the
/// one that actually gates an instruction class (MRS/MSR need
/// `has_32bit_modes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyDirective {
    Architecture(ArchVersion),
}

/// The boundary markers of a macro or procedure definition. Accepted and
/// parsed, but carry no expansion semantics: the body between start and
/// end is assembled as ordinary statements, same as if the markers were
/// not there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMarker {
    MacroStart,
    MacroEnd,
    ProcedureStart,
    ProcedureEnd,
}

/// A parsed, but not yet assembled, line of source.
#[derive(Debug, Clone)]
pub enum Statement {
    Empty,
    Label {
        name: String,
        location: Location,
    },
    Equ {
        name: String,
        value: i64,
        location: Location,
    },
    Org {
        address: u32,
        location: Location,
    },
    DefineWord {
        values: Vec<u32>,
        location: Location,
    },
    DefineByte {
        values: Vec<u8>,
        location: Location,
    },
    Instruction {
        body: InstructionBody,
        location: Location,
    },
    /// A state-changing directive; see `AssemblyDirective`.
    Directive {
        directive: AssemblyDirective,
        location: Location,
    },
    /// A reference to another source file, resolved via the `InputSet`
    /// collaborator passed to `assemble` and spliced in place before the
    /// two-pass walk sees it; never reaches `BlockList` itself.
    Include {
        path: String,
        location: Location,
    },
    /// A macro or procedure start/end marker, accepted as a no-op.
    Block {
        marker: BlockMarker,
        location: Location,
    },
}

impl Statement {
    /// The number of bytes this statement will occupy in the final object
    /// code. Labels, EQUs, and ORG directives occupy zero bytes themselves.
    #[must_use]
    pub fn predicted_size(&self) -> u32 {
        match self {
            Statement::Empty
            | Statement::Label { .. }
            | Statement::Equ { .. }
            | Statement::Org { .. }
            | Statement::Directive { .. }
            | Statement::Include { .. }
            | Statement::Block { .. } => 0,
            Statement::DefineWord { values, .. } => (values.len() as u32) * 4,
            Statement::DefineByte { values, .. } => values.len() as u32,
            Statement::Instruction { .. } => 4,
        }
    }

    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Statement::Empty => None,
            Statement::Label { location, .. }
            | Statement::Equ { location, .. }
            | Statement::Org { location, .. }
            | Statement::DefineWord { location, .. }
            | Statement::DefineByte { location, .. }
            | Statement::Instruction { location, .. }
            | Statement::Directive { location, .. }
            | Statement::Include { location, .. }
            | Statement::Block { location, .. } => Some(location),
        }
    }
}

/// The final result of a successful assembly: raw bytes plus the symbols
/// resolved along the way.
#[derive(Debug, Clone, Default)]
pub struct ObjectCode {
    pub base_address: u32,
    pub bytes: Vec<u8>,
}

impl ObjectCode {
    #[must_use]
    pub fn new(base_address: u32) -> Self {
        Self {
            base_address,
            bytes: Vec::new(),
        }
    }
}
