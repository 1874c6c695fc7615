//! Lexical tokens consumed by the statement parser.
//!
//! Only the token *contract* matters to the rest of the pipeline: a flat
//! stream of classified, located fragments of source text. How the text
//! was scanned to produce them is an implementation detail of `lex_line`.

use crate::messages::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Identifier,
    Register,
    IntegerLiteral,
    StringLiteral,
    Comma,
    Hash,
    OpenBracket,
    CloseBracket,
    Bang,
    Caret,
    Colon,
    Dot,
    Minus,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub class: TokenClass,
    pub text: String,
    pub location: Location,
}

impl Token {
    #[must_use]
    pub fn new(class: TokenClass, text: impl Into<String>, location: Location) -> Self {
        Self {
            class,
            text: text.into(),
            location,
        }
    }
}

/// Splits one line of source into tokens. Comments (`;` to end of line)
/// are dropped. Whitespace is insignificant outside of string literals.
#[must_use]
pub fn lex_line(file_name: &str, line_no: i32, line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let offset = i as i32;

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == ';' {
            break;
        }

        match c {
            ',' => {
                tokens.push(Token::new(TokenClass::Comma, ",", Location::new(file_name, line_no, offset)));
                i += 1;
            }
            '#' => {
                tokens.push(Token::new(TokenClass::Hash, "#", Location::new(file_name, line_no, offset)));
                i += 1;
            }
            '[' => {
                tokens.push(Token::new(TokenClass::OpenBracket, "[", Location::new(file_name, line_no, offset)));
                i += 1;
            }
            ']' => {
                tokens.push(Token::new(TokenClass::CloseBracket, "]", Location::new(file_name, line_no, offset)));
                i += 1;
            }
            '!' => {
                tokens.push(Token::new(TokenClass::Bang, "!", Location::new(file_name, line_no, offset)));
                i += 1;
            }
            '^' => {
                tokens.push(Token::new(TokenClass::Caret, "^", Location::new(file_name, line_no, offset)));
                i += 1;
            }
            ':' => {
                tokens.push(Token::new(TokenClass::Colon, ":", Location::new(file_name, line_no, offset)));
                i += 1;
            }
            '.' => {
                tokens.push(Token::new(TokenClass::Dot, ".", Location::new(file_name, line_no, offset)));
                i += 1;
            }
            '-' => {
                tokens.push(Token::new(TokenClass::Minus, "-", Location::new(file_name, line_no, offset)));
                i += 1;
            }
            '"' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    i += 1;
                }
                let text: String = chars[start + 1..i].iter().collect();
                tokens.push(Token::new(TokenClass::StringLiteral, text, Location::new(file_name, line_no, offset)));
                i += 1; // consume closing quote, if any
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::new(TokenClass::IntegerLiteral, text, Location::new(file_name, line_no, offset)));
            }
            _ if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let class = if is_register_name(&text) {
                    TokenClass::Register
                } else {
                    TokenClass::Identifier
                };
                tokens.push(Token::new(class, text, Location::new(file_name, line_no, offset)));
            }
            _ => {
                i += 1; // skip anything unrecognised rather than aborting the line
            }
        }
    }

    tokens
}

fn is_register_name(text: &str) -> bool {
    let upper = text.to_ascii_uppercase();
    if upper == "PC" || upper == "LR" || upper == "SP" {
        return true;
    }
    upper
        .strip_prefix('R')
        .and_then(|rest| rest.parse::<u8>().ok())
        .is_some_and(|n| n < 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_instruction_with_register_operands() {
        let tokens = lex_line("a.s", 1, "MOV R0, #42 ; comment");
        let classes: Vec<TokenClass> = tokens.iter().map(|t| t.class).collect();
        assert_eq!(
            classes,
            vec![
                TokenClass::Identifier,
                TokenClass::Register,
                TokenClass::Comma,
                TokenClass::Hash,
                TokenClass::IntegerLiteral,
            ]
        );
    }

    #[test]
    fn recognises_pc_lr_sp_as_registers() {
        let tokens = lex_line("a.s", 1, "MOV PC, LR");
        assert_eq!(tokens[1].class, TokenClass::Register);
        assert_eq!(tokens[3].class, TokenClass::Register);
    }
}
