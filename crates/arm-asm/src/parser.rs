//! Turns one line of tokens into a `Statement`.
//!
//! This is deliberately a flat, per-line recogniser rather than the
//! original's tree of per-statement-kind parse nodes: the set of
//! statement kinds is closed and small, so one function per kind reads
//! clearer than a trait object per node. `BlockList` still drives the
//! two-pass, deferred-resolution behaviour those nodes existed to support.

use arm_cpu::{ArchVersion, Condition};

use crate::encode::DpOp;
use crate::messages::{Location, Messages};
use crate::statement::{AssemblyDirective, BlockMarker, BranchTarget, InstructionBody, MsrSource, Operand2Expr, Statement};
use crate::token::{Token, TokenClass};

const CONDITIONS: &[(&str, u8)] = &[
    ("EQ", 0x0),
    ("NE", 0x1),
    ("CS", 0x2),
    ("HS", 0x2),
    ("CC", 0x3),
    ("LO", 0x3),
    ("MI", 0x4),
    ("PL", 0x5),
    ("VS", 0x6),
    ("VC", 0x7),
    ("HI", 0x8),
    ("LS", 0x9),
    ("GE", 0xA),
    ("LT", 0xB),
    ("GT", 0xC),
    ("LE", 0xD),
    ("AL", 0xE),
];

const DP_MNEMONICS: &[(&str, DpOp)] = &[
    ("AND", DpOp::And),
    ("EOR", DpOp::Eor),
    ("SUB", DpOp::Sub),
    ("RSB", DpOp::Rsb),
    ("ADD", DpOp::Add),
    ("ADC", DpOp::Adc),
    ("SBC", DpOp::Sbc),
    ("RSC", DpOp::Rsc),
    ("TST", DpOp::Tst),
    ("TEQ", DpOp::Teq),
    ("CMP", DpOp::Cmp),
    ("CMN", DpOp::Cmn),
    ("ORR", DpOp::Orr),
    ("MOV", DpOp::Mov),
    ("BIC", DpOp::Bic),
    ("MVN", DpOp::Mvn),
];

/// Splits a mnemonic like `MOVEQS` into (`MOV`, condition, has_s_suffix).
fn split_mnemonic<'a>(word: &'a str, bases: &[&'a str]) -> Option<(&'a str, &'a str)> {
    bases
        .iter()
        .find(|base| word.starts_with(*base))
        .map(|base| (*base, &word[base.len()..]))
}

fn parse_condition_and_s(rest: &str) -> (Condition, bool) {
    let upper = rest.to_ascii_uppercase();
    let (cond_str, has_s) = if let Some(stripped) = upper.strip_suffix('S') {
        (stripped, true)
    } else {
        (upper.as_str(), false)
    };

    let cond = CONDITIONS
        .iter()
        .find(|(name, _)| *name == cond_str)
        .map_or(0xE, |(_, bits)| *bits);

    (Condition::from_bits(cond), has_s)
}

fn register_number(text: &str) -> Option<u8> {
    let upper = text.to_ascii_uppercase();
    match upper.as_str() {
        "SP" => Some(13),
        "LR" => Some(14),
        "PC" => Some(15),
        _ => upper.strip_prefix('R').and_then(|rest| rest.parse::<u8>().ok()).filter(|n| *n < 16),
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix('&') {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn expect_class(&mut self, class: TokenClass) -> Option<&Token> {
        match self.peek() {
            Some(t) if t.class == class => self.next(),
            _ => None,
        }
    }
}

/// Parses one already-tokenised line, which may contain a label followed
/// by an instruction on the same line (`loop: MOV R0, #0`). Returns one
/// statement per thing found; an empty line yields a single `Empty`.
#[must_use]
pub fn parse_line(tokens: &[Token], location: Location, messages: &mut Messages) -> Vec<Statement> {
    if tokens.is_empty() {
        return vec![Statement::Empty];
    }

    if tokens.len() >= 2 && tokens[0].class == TokenClass::Identifier && tokens[1].class == TokenClass::Colon {
        let label = Statement::Label {
            name: tokens[0].text.clone(),
            location: location.clone(),
        };
        let rest = &tokens[2..];
        if rest.is_empty() {
            return vec![label];
        }
        return vec![label, parse_single_statement(rest, location, messages)];
    }

    vec![parse_single_statement(tokens, location, messages)]
}

/// Parses one label-free statement: a directive or an instruction.
fn parse_single_statement(tokens: &[Token], location: Location, messages: &mut Messages) -> Statement {
    let mut cursor = Cursor { tokens, pos: 0 };

    // `NAME EQU value`: the symbol being defined comes before the directive.
    if tokens.len() >= 2 && tokens[0].class == TokenClass::Identifier && tokens[1].text.eq_ignore_ascii_case("EQU") {
        let name = tokens[0].text.clone();
        cursor.pos = 2;
        return match cursor.next().and_then(|t| parse_integer(&t.text)) {
            Some(value) => Statement::Equ { name, value, location },
            None => {
                messages.append_error(location.clone(), "EQU requires an integer value");
                Statement::Empty
            }
        };
    }

    let Some(mnemonic_tok) = cursor.expect_class(TokenClass::Identifier) else {
        messages.append_error(location.clone(), "expected a label, directive, or instruction");
        return Statement::Empty;
    };
    let mnemonic = mnemonic_tok.text.to_ascii_uppercase();

    match mnemonic.as_str() {
        "ORG" => return parse_org(&mut cursor, location, messages),
        "DCD" => return parse_dcd(&mut cursor, location, messages),
        "DCB" => return parse_dcb(&mut cursor, location, messages),
        "ARCH" => return parse_arch(&mut cursor, location, messages),
        "INCLUDE" => return parse_include(&mut cursor, location, messages),
        "MACRO" => return Statement::Block { marker: BlockMarker::MacroStart, location },
        "MEND" => return Statement::Block { marker: BlockMarker::MacroEnd, location },
        "PROC" => return Statement::Block { marker: BlockMarker::ProcedureStart, location },
        "ENDP" => return Statement::Block { marker: BlockMarker::ProcedureEnd, location },
        _ => {}
    }

    if let Some((base, rest)) = split_mnemonic(&mnemonic, &["BL", "B"]) {
        return parse_branch(&mut cursor, base == "BL", rest, location, messages);
    }
    if mnemonic.starts_with("SWI") || mnemonic.starts_with("SVC") {
        let rest = mnemonic.trim_start_matches("SWI").trim_start_matches("SVC");
        return parse_swi(&mut cursor, rest, location, messages);
    }
    if mnemonic.starts_with("BKPT") {
        return parse_bkpt(&mut cursor, location, messages);
    }
    if mnemonic.starts_with("MRS") {
        let rest = mnemonic.trim_start_matches("MRS");
        return parse_mrs(&mut cursor, rest, location, messages);
    }
    if mnemonic.starts_with("MSR") {
        let rest = mnemonic.trim_start_matches("MSR");
        return parse_msr(&mut cursor, rest, location, messages);
    }
    if mnemonic.starts_with("ADR") {
        let rest = mnemonic.trim_start_matches("ADR");
        return parse_adr(&mut cursor, rest, location, messages);
    }
    if let Some((base, rest)) = split_mnemonic(&mnemonic, &["MLA", "MUL"]) {
        return parse_multiply(&mut cursor, base == "MLA", rest, location, messages);
    }
    if let Some((base, rest)) = split_mnemonic(&mnemonic, &["LDR", "STR"]) {
        return parse_single_transfer(&mut cursor, base == "LDR", rest, location, messages);
    }

    let dp_bases: Vec<&str> = DP_MNEMONICS.iter().map(|(n, _)| *n).collect();
    if let Some((base, rest)) = split_mnemonic(&mnemonic, &dp_bases) {
        let op = DP_MNEMONICS.iter().find(|(n, _)| *n == base).unwrap().1;
        return parse_data_processing(&mut cursor, op, rest, location, messages);
    }

    messages.append_error(location.clone(), format!("unrecognised mnemonic '{mnemonic}'"));
    Statement::Empty
}

fn parse_org(cursor: &mut Cursor, location: Location, messages: &mut Messages) -> Statement {
    match cursor.next().and_then(|t| parse_integer(&t.text)) {
        Some(value) => Statement::Org {
            address: value as u32,
            location,
        },
        None => {
            messages.append_error(location.clone(), "ORG requires an address");
            Statement::Empty
        }
    }
}

fn parse_dcd(cursor: &mut Cursor, location: Location, messages: &mut Messages) -> Statement {
    let mut values = Vec::new();
    loop {
        match cursor.next() {
            Some(t) if t.class == TokenClass::IntegerLiteral => {
                match parse_integer(&t.text) {
                    Some(v) => values.push(v as u32),
                    None => messages.append_error(location.clone(), format!("invalid integer '{}'", t.text)),
                }
            }
            Some(t) if t.class == TokenClass::Comma => continue,
            _ => break,
        }
    }
    Statement::DefineWord { values, location }
}

fn parse_dcb(cursor: &mut Cursor, location: Location, messages: &mut Messages) -> Statement {
    let mut values = Vec::new();
    loop {
        match cursor.next() {
            Some(t) if t.class == TokenClass::IntegerLiteral => match parse_integer(&t.text) {
                Some(v) => values.push(v as u8),
                None => messages.append_error(location.clone(), format!("invalid byte '{}'", t.text)),
            },
            Some(t) if t.class == TokenClass::Comma => continue,
            _ => break,
        }
    }
    Statement::DefineByte { values, location }
}

fn parse_branch(cursor: &mut Cursor, link: bool, suffix: &str, location: Location, messages: &mut Messages) -> Statement {
    let (cond, _) = parse_condition_and_s(suffix);
    match cursor.next() {
        Some(t) if t.class == TokenClass::Identifier => Statement::Instruction {
            body: InstructionBody::Branch {
                cond,
                link,
                target: BranchTarget::Label(t.text.clone()),
            },
            location,
        },
        Some(t) if t.class == TokenClass::Dot => Statement::Instruction {
            body: InstructionBody::Branch {
                cond,
                link,
                target: BranchTarget::Offset(0),
            },
            location,
        },
        _ => {
            messages.append_error(location.clone(), "branch requires a target label");
            Statement::Empty
        }
    }
}

fn parse_swi(cursor: &mut Cursor, suffix: &str, location: Location, messages: &mut Messages) -> Statement {
    let (cond, _) = parse_condition_and_s(suffix);
    let _ = cursor.expect_class(TokenClass::Hash);
    match cursor.next().and_then(|t| parse_integer(&t.text)) {
        Some(value) => Statement::Instruction {
            body: InstructionBody::Swi {
                cond,
                comment: value as u32,
            },
            location,
        },
        None => {
            messages.append_error(location.clone(), "SWI requires an immediate comment");
            Statement::Empty
        }
    }
}

fn parse_bkpt(cursor: &mut Cursor, location: Location, messages: &mut Messages) -> Statement {
    let _ = cursor.expect_class(TokenClass::Hash);
    match cursor.next().and_then(|t| parse_integer(&t.text)) {
        Some(value) => Statement::Instruction {
            body: InstructionBody::Bkpt { id: value as u16 },
            location,
        },
        None => {
            messages.append_error(location.clone(), "BKPT requires an immediate id");
            Statement::Empty
        }
    }
}

fn parse_arch(cursor: &mut Cursor, location: Location, messages: &mut Messages) -> Statement {
    match cursor.next().map(|t| t.text.to_ascii_uppercase()).as_deref() {
        Some("V2") => Statement::Directive {
            directive: AssemblyDirective::Architecture(ArchVersion::V2),
            location,
        },
        Some("V3") => Statement::Directive {
            directive: AssemblyDirective::Architecture(ArchVersion::V3),
            location,
        },
        Some("V4") => Statement::Directive {
            directive: AssemblyDirective::Architecture(ArchVersion::V4),
            location,
        },
        _ => {
            messages.append_error(location.clone(), "ARCH requires V2, V3, or V4");
            Statement::Empty
        }
    }
}

fn parse_include(cursor: &mut Cursor, location: Location, messages: &mut Messages) -> Statement {
    match cursor.next() {
        Some(t) if t.class == TokenClass::StringLiteral => Statement::Include {
            path: t.text.clone(),
            location,
        },
        _ => {
            messages.append_error(location.clone(), "INCLUDE requires a quoted filename");
            Statement::Empty
        }
    }
}

fn parse_mrs(cursor: &mut Cursor, suffix: &str, location: Location, messages: &mut Messages) -> Statement {
    let (cond, _) = parse_condition_and_s(suffix);
    let Some(rd) = cursor.next().and_then(|t| register_number(&t.text)) else {
        messages.append_error(location.clone(), "expected destination register");
        return Statement::Empty;
    };
    let _ = cursor.expect_class(TokenClass::Comma);
    let use_spsr = match cursor.next() {
        Some(t) if t.text.eq_ignore_ascii_case("SPSR") => true,
        Some(t) if t.text.eq_ignore_ascii_case("CPSR") => false,
        _ => {
            messages.append_error(location.clone(), "MRS requires CPSR or SPSR as its source");
            return Statement::Empty;
        }
    };
    Statement::Instruction {
        body: InstructionBody::Mrs { cond, use_spsr, rd },
        location,
    }
}

/// Parses `CPSR`/`SPSR`, optionally suffixed `_f`/`_c`/`_fc`, into
/// (use_spsr, flags_field, control_field). A bare `CPSR`/`SPSR` selects
/// both fields, matching the real instruction's default.
fn parse_psr_fields(text: &str) -> Option<(bool, bool, bool)> {
    let upper = text.to_ascii_uppercase();
    let (use_spsr, rest) = if let Some(rest) = upper.strip_prefix("SPSR") {
        (true, rest)
    } else if let Some(rest) = upper.strip_prefix("CPSR") {
        (false, rest)
    } else {
        return None;
    };
    match rest {
        "" | "_FC" | "_CF" => Some((use_spsr, true, true)),
        "_F" => Some((use_spsr, true, false)),
        "_C" => Some((use_spsr, false, true)),
        _ => None,
    }
}

fn parse_msr(cursor: &mut Cursor, suffix: &str, location: Location, messages: &mut Messages) -> Statement {
    let (cond, _) = parse_condition_and_s(suffix);
    let Some((use_spsr, flags_field, control_field)) = cursor.next().and_then(|t| parse_psr_fields(&t.text)) else {
        messages.append_error(location.clone(), "MSR requires a CPSR or SPSR destination, optionally suffixed _f/_c/_fc");
        return Statement::Empty;
    };
    let _ = cursor.expect_class(TokenClass::Comma);

    let source = if cursor.peek().map(|t| t.class) == Some(TokenClass::Hash) {
        let _ = cursor.next();
        match cursor.next().and_then(|t| parse_integer(&t.text)) {
            Some(v) => MsrSource::Immediate(v as u32),
            None => {
                messages.append_error(location.clone(), "expected immediate value");
                return Statement::Empty;
            }
        }
    } else {
        match cursor.next().and_then(|t| register_number(&t.text)) {
            Some(r) => MsrSource::Register(r),
            None => {
                messages.append_error(location.clone(), "expected an immediate or source register");
                return Statement::Empty;
            }
        }
    };

    Statement::Instruction {
        body: InstructionBody::Msr {
            cond,
            use_spsr,
            flags_field,
            control_field,
            source,
        },
        location,
    }
}

fn parse_adr(cursor: &mut Cursor, suffix: &str, location: Location, messages: &mut Messages) -> Statement {
    let (cond, _) = parse_condition_and_s(suffix);
    let Some(rd) = cursor.next().and_then(|t| register_number(&t.text)) else {
        messages.append_error(location.clone(), "expected destination register");
        return Statement::Empty;
    };
    let _ = cursor.expect_class(TokenClass::Comma);
    match cursor.next() {
        Some(t) if t.class == TokenClass::Identifier => Statement::Instruction {
            body: InstructionBody::Adr {
                cond,
                rd,
                target: BranchTarget::Label(t.text.clone()),
            },
            location,
        },
        Some(t) if t.class == TokenClass::Dot => Statement::Instruction {
            body: InstructionBody::Adr {
                cond,
                rd,
                target: BranchTarget::Offset(0),
            },
            location,
        },
        _ => {
            messages.append_error(location.clone(), "ADR requires a label");
            Statement::Empty
        }
    }
}

fn parse_multiply(cursor: &mut Cursor, accumulate: bool, suffix: &str, location: Location, messages: &mut Messages) -> Statement {
    let (cond, set_flags) = parse_condition_and_s(suffix);

    let Some(rd) = cursor.next().and_then(|t| register_number(&t.text)) else {
        messages.append_error(location.clone(), "expected destination register");
        return Statement::Empty;
    };
    let _ = cursor.expect_class(TokenClass::Comma);
    let Some(rm) = cursor.next().and_then(|t| register_number(&t.text)) else {
        messages.append_error(location.clone(), "expected Rm");
        return Statement::Empty;
    };
    let _ = cursor.expect_class(TokenClass::Comma);
    let Some(rs) = cursor.next().and_then(|t| register_number(&t.text)) else {
        messages.append_error(location.clone(), "expected Rs");
        return Statement::Empty;
    };

    let rn = if accumulate {
        let _ = cursor.expect_class(TokenClass::Comma);
        cursor.next().and_then(|t| register_number(&t.text)).unwrap_or(0)
    } else {
        0
    };

    Statement::Instruction {
        body: InstructionBody::Multiply {
            cond,
            accumulate,
            set_flags,
            rd,
            rn,
            rs,
            rm,
        },
        location,
    }
}

fn parse_single_transfer(cursor: &mut Cursor, load: bool, suffix: &str, location: Location, messages: &mut Messages) -> Statement {
    let (cond, byte) = {
        let upper = suffix.to_ascii_uppercase();
        let byte = upper.ends_with('B');
        let cond_part = if byte { &upper[..upper.len() - 1] } else { upper.as_str() };
        let bits = CONDITIONS.iter().find(|(n, _)| *n == cond_part).map_or(0xE, |(_, b)| *b);
        (Condition::from_bits(bits), byte)
    };

    let Some(rd) = cursor.next().and_then(|t| register_number(&t.text)) else {
        messages.append_error(location.clone(), "expected destination register");
        return Statement::Empty;
    };
    let _ = cursor.expect_class(TokenClass::Comma);
    let _ = cursor.expect_class(TokenClass::OpenBracket);
    let Some(rn) = cursor.next().and_then(|t| register_number(&t.text)) else {
        messages.append_error(location.clone(), "expected base register");
        return Statement::Empty;
    };

    let mut offset: i32 = 0;
    let mut negative = false;
    if cursor.peek().map(|t| t.class) == Some(TokenClass::Comma) {
        let _ = cursor.next();
        if cursor.peek().map(|t| t.class) == Some(TokenClass::Minus) {
            negative = true;
            let _ = cursor.next();
        }
        let _ = cursor.expect_class(TokenClass::Hash);
        if let Some(v) = cursor.next().and_then(|t| parse_integer(&t.text)) {
            offset = v as i32;
        }
    }
    let _ = cursor.expect_class(TokenClass::CloseBracket);
    let write_back = cursor.peek().map(|t| t.class) == Some(TokenClass::Bang);
    if write_back {
        let _ = cursor.next();
    }

    Statement::Instruction {
        body: InstructionBody::SingleTransfer {
            cond,
            load,
            byte,
            rn,
            rd,
            offset: if negative { -offset } else { offset },
            pre_index: true,
            write_back,
        },
        location,
    }
}

fn parse_data_processing(cursor: &mut Cursor, op: DpOp, suffix: &str, location: Location, messages: &mut Messages) -> Statement {
    let (cond, set_flags) = parse_condition_and_s(suffix);

    let Some(rd) = cursor.next().and_then(|t| register_number(&t.text)) else {
        messages.append_error(location.clone(), "expected destination register");
        return Statement::Empty;
    };
    let _ = cursor.expect_class(TokenClass::Comma);

    let rn = if op.uses_rn() {
        let Some(reg) = cursor.next().and_then(|t| register_number(&t.text)) else {
            messages.append_error(location.clone(), "expected first source register");
            return Statement::Empty;
        };
        let _ = cursor.expect_class(TokenClass::Comma);
        reg
    } else {
        0
    };

    let op2 = match cursor.peek() {
        Some(t) if t.class == TokenClass::Hash => {
            let _ = cursor.next();
            match cursor.next().and_then(|t| parse_integer(&t.text)) {
                Some(v) => Operand2Expr::Immediate(v as u32),
                None => {
                    messages.append_error(location.clone(), "expected immediate value");
                    return Statement::Empty;
                }
            }
        }
        Some(t) if t.class == TokenClass::Register => {
            let reg = register_number(&t.text).unwrap();
            let _ = cursor.next();
            Operand2Expr::Register(reg)
        }
        Some(t) if t.class == TokenClass::Identifier => {
            let name = t.text.clone();
            let _ = cursor.next();
            Operand2Expr::Symbol(name)
        }
        _ => {
            messages.append_error(location.clone(), "expected operand2");
            return Statement::Empty;
        }
    };

    Statement::Instruction {
        body: InstructionBody::DataProcessing {
            cond,
            op,
            set_flags,
            rd,
            rn,
            op2,
        },
        location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::lex_line;

    fn parse(line: &str) -> (Vec<Statement>, Messages) {
        let tokens = lex_line("t.s", 1, line);
        let mut messages = Messages::new();
        let stmts = parse_line(&tokens, Location::new("t.s", 1, 0), &mut messages);
        (stmts, messages)
    }

    #[test]
    fn parses_mov_immediate() {
        let (stmts, messages) = parse("MOV R0, #42");
        assert!(messages.is_empty());
        match &stmts[..] {
            [Statement::Instruction {
                body: InstructionBody::DataProcessing { op: DpOp::Mov, rd: 0, op2: Operand2Expr::Immediate(42), .. },
                ..
            }] => {}
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn parses_label() {
        let (stmts, _) = parse("loop:");
        assert!(matches!(&stmts[..], [Statement::Label { name, .. }] if name == "loop"));
    }

    #[test]
    fn parses_label_and_instruction_on_same_line() {
        let (stmts, _) = parse("loop: SWI #1");
        assert!(matches!(&stmts[..], [Statement::Label { name, .. }, Statement::Instruction { .. }] if name == "loop"));
    }

    #[test]
    fn parses_swi() {
        let (stmts, _) = parse("SWI #1");
        assert!(matches!(&stmts[..], [Statement::Instruction { body: InstructionBody::Swi { comment: 1, .. }, .. }]));
    }

    #[test]
    fn parses_branch_to_label() {
        let (stmts, _) = parse("BL done");
        assert!(matches!(
            &stmts[..],
            [Statement::Instruction { body: InstructionBody::Branch { link: true, target: BranchTarget::Label(ref n), .. }, .. }]
            if n == "done"
        ));
    }

    #[test]
    fn parses_mrs_from_spsr() {
        let (stmts, messages) = parse("MRS R0, SPSR");
        assert!(messages.is_empty());
        assert!(matches!(
            &stmts[..],
            [Statement::Instruction { body: InstructionBody::Mrs { use_spsr: true, rd: 0, .. }, .. }]
        ));
    }

    #[test]
    fn parses_msr_with_flags_only_field() {
        let (stmts, messages) = parse("MSR CPSR_f, R1");
        assert!(messages.is_empty());
        assert!(matches!(
            &stmts[..],
            [Statement::Instruction {
                body: InstructionBody::Msr { use_spsr: false, flags_field: true, control_field: false, source: MsrSource::Register(1), .. },
                ..
            }]
        ));
    }

    #[test]
    fn parses_adr_to_label() {
        let (stmts, _) = parse("ADR R4, table");
        assert!(matches!(
            &stmts[..],
            [Statement::Instruction { body: InstructionBody::Adr { rd: 4, target: BranchTarget::Label(ref n), .. }, .. }]
            if n == "table"
        ));
    }

    #[test]
    fn parses_include_directive() {
        let (stmts, _) = parse("INCLUDE \"macros.s\"");
        assert!(matches!(&stmts[..], [Statement::Include { path, .. }] if path == "macros.s"));
    }

    #[test]
    fn parses_macro_and_procedure_markers_as_no_ops() {
        for (text, expected) in [
            ("MACRO", BlockMarker::MacroStart),
            ("MEND", BlockMarker::MacroEnd),
            ("PROC", BlockMarker::ProcedureStart),
            ("ENDP", BlockMarker::ProcedureEnd),
        ] {
            let (stmts, _) = parse(text);
            assert!(matches!(&stmts[..], [Statement::Block { marker, .. }] if *marker == expected));
            assert_eq!(stmts[0].predicted_size(), 0);
        }
    }

    #[test]
    fn parses_arch_directive() {
        let (stmts, messages) = parse("ARCH V2");
        assert!(messages.is_empty());
        assert!(matches!(
            &stmts[..],
            [Statement::Directive { directive: AssemblyDirective::Architecture(ArchVersion::V2), .. }]
        ));
    }
}
