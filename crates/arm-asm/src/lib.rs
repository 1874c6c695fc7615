//! Two-pass ARM assembler.
//!
//! Source text goes in, [`ObjectCode`] plus a diagnostic list comes out.
//! Nothing in this crate panics on malformed input; every failure is
//! recorded in [`Messages`] instead.

use std::collections::HashSet;

pub mod block_list;
pub mod encode;
pub mod messages;
pub mod parser;
pub mod scope;
pub mod statement;
pub mod token;

pub use block_list::BlockList;
pub use encode::{DpOp, Operand2};
pub use messages::{Location, Message, MessageSeverity, Messages};
pub use scope::{ScopeArena, SymbolValue};
pub use statement::{AssemblyDirective, BlockMarker, BranchTarget, InstructionBody, MsrSource, ObjectCode, Operand2Expr, Statement};
pub use token::{lex_line, Token, TokenClass};

/// Resolves an `Include` directive's filename to further source text.
///
/// Implementors decide how an include identifier maps to source (reading
/// from disk, looking up an in-memory map of test fixtures, and so on);
/// this crate only needs the resolved text.
pub trait InputSet {
    fn resolve(&self, name: &str) -> Option<String>;
}

/// An `InputSet` with nothing in it: every `Include` fails to resolve.
/// The right default for a caller that never intends to use `INCLUDE`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIncludes;

impl InputSet for NoIncludes {
    fn resolve(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Assembles a complete source string into object code.
///
/// Splits `source` into lines, tokenises and parses each one in turn, and
/// runs the two-pass assembler over the resulting statement list. `inputs`
/// resolves any `INCLUDE "name"` directive encountered along the way; a
/// file already visited (directly or transitively) is silently skipped
/// rather than re-included. Always returns object code alongside any
/// diagnostics raised along the way; callers should check
/// [`Messages::has_errors`] before trusting the bytes.
#[must_use]
pub fn assemble(file_name: &str, source: &str, inputs: &dyn InputSet) -> (Option<ObjectCode>, Messages) {
    let mut blocks = BlockList::new();
    let mut messages = Messages::new();
    let mut visited = HashSet::new();
    visited.insert(file_name.to_string());

    assemble_into(file_name, source, inputs, &mut blocks, &mut messages, &mut visited);

    let (object, block_messages) = blocks.assemble();
    for message in block_messages.messages() {
        match message.severity() {
            MessageSeverity::Info => messages.append_info(message.location().clone(), message.text()),
            MessageSeverity::Warning => messages.append_warning(message.location().clone(), message.text()),
            MessageSeverity::Error => messages.append_error(message.location().clone(), message.text()),
            MessageSeverity::Fatal => messages.append_fatal(message.location().clone(), message.text()),
        }
    }
    messages.sort();
    (object, messages)
}

/// Parses one source text's lines into `blocks`, recursively splicing in
/// any `INCLUDE`d source in place of the directive that named it.
fn assemble_into(
    file_name: &str,
    source: &str,
    inputs: &dyn InputSet,
    blocks: &mut BlockList,
    messages: &mut Messages,
    visited: &mut HashSet<String>,
) {
    for (index, line) in source.lines().enumerate() {
        let line_no = (index + 1) as i32;
        let tokens = lex_line(file_name, line_no, line);
        let location = Location::new(file_name, line_no, 0);
        for statement in parser::parse_line(&tokens, location, messages) {
            match statement {
                Statement::Include { path, location } => {
                    if visited.contains(&path) {
                        continue;
                    }
                    visited.insert(path.clone());
                    match inputs.resolve(&path) {
                        Some(included) => assemble_into(&path, &included, inputs, blocks, messages, visited),
                        None => messages.append_error(location, format!("cannot resolve include '{path}'")),
                    }
                }
                other => blocks.push(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_a_small_program_with_a_forward_branch() {
        let source = "\
            B start\n\
            dead: SWI #0\n\
            start: MOV R0, #5\n\
            ADD R1, R0, #1\n\
            B dead\n\
        ";
        let (object, messages) = assemble("prog.s", source, &NoIncludes);
        assert!(!messages.has_errors(), "{:?}", messages.messages());
        let object = object.unwrap();
        assert_eq!(object.bytes.len(), 20);
    }

    #[test]
    fn reports_errors_for_unknown_mnemonics() {
        let (_, messages) = assemble("prog.s", "FROBNICATE R0\n", &NoIncludes);
        assert!(messages.has_errors());
    }

    #[test]
    fn unresolvable_include_reports_an_error() {
        let (_, messages) = assemble("prog.s", "INCLUDE \"missing.s\"\n", &NoIncludes);
        assert!(messages.has_errors());
    }

    struct MapInputs(std::collections::HashMap<&'static str, &'static str>);
    impl InputSet for MapInputs {
        fn resolve(&self, name: &str) -> Option<String> {
            self.0.get(name).map(|s| (*s).to_string())
        }
    }

    #[test]
    fn include_splices_resolved_source_in_place() {
        let mut map = std::collections::HashMap::new();
        map.insert("consts.s", "FORTY_TWO EQU 42\n");
        let inputs = MapInputs(map);

        let source = "INCLUDE \"consts.s\"\nMOV R0, #1\n";
        let (object, messages) = assemble("prog.s", source, &inputs);
        assert!(!messages.has_errors(), "{:?}", messages.messages());
        let object = object.unwrap();
        assert_eq!(object.bytes.len(), 4);
    }

    #[test]
    fn duplicate_include_is_silently_elided() {
        let mut map = std::collections::HashMap::new();
        map.insert("consts.s", "FORTY_TWO EQU 42\n");
        let inputs = MapInputs(map);

        let source = "INCLUDE \"consts.s\"\nINCLUDE \"consts.s\"\nMOV R0, #1\n";
        let (_, messages) = assemble("prog.s", source, &inputs);
        assert!(!messages.has_errors(), "{:?}", messages.messages());
    }
}
