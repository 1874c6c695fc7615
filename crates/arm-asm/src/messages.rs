//! Diagnostic accumulation.
//!
//! The assembler's public API never panics on a malformed program: every
//! failure is recorded here instead, with enough location information to
//! point the caller back at the offending line.

use std::fmt;

/// A point in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub file_name: String,
    pub line_no: i32,
    pub offset: i32,
}

impl Location {
    #[must_use]
    pub fn new(file_name: impl Into<String>, line_no: i32, offset: i32) -> Self {
        Self {
            file_name: file_name.into(),
            line_no,
            offset,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.line_no > 0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_name, self.line_no, self.offset)
    }
}

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageSeverity {
    Info,
    Warning,
    Error,
    Fatal,
}

/// A single diagnostic.
#[derive(Debug, Clone)]
pub struct Message {
    severity: MessageSeverity,
    location: Location,
    text: String,
    ordinal: u32,
}

impl Message {
    #[must_use]
    pub fn severity(&self) -> MessageSeverity {
        self.severity
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}: {}", self.location, self.severity, self.text)
    }
}

/// An ordered, accumulating collection of diagnostics.
#[derive(Debug, Default, Clone)]
pub struct Messages {
    messages: Vec<Message>,
    next_ordinal: u32,
}

impl Messages {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.severity >= MessageSeverity::Error)
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn append(&mut self, severity: MessageSeverity, location: Location, text: String) {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.messages.push(Message {
            severity,
            location,
            text,
            ordinal,
        });
    }

    pub fn append_info(&mut self, location: Location, text: impl Into<String>) {
        self.append(MessageSeverity::Info, location, text.into());
    }

    pub fn append_warning(&mut self, location: Location, text: impl Into<String>) {
        self.append(MessageSeverity::Warning, location, text.into());
    }

    pub fn append_error(&mut self, location: Location, text: impl Into<String>) {
        self.append(MessageSeverity::Error, location, text.into());
    }

    pub fn append_fatal(&mut self, location: Location, text: impl Into<String>) {
        self.append(MessageSeverity::Fatal, location, text.into());
    }

    /// Sorts in place by `(line, offset, ordinal)`, the original insertion
    /// order used as a final tiebreaker.
    pub fn sort(&mut self) {
        self.messages.sort_by(|a, b| {
            a.location
                .line_no
                .cmp(&b.location.line_no)
                .then(a.location.offset.cmp(&b.location.offset))
                .then(a.ordinal.cmp(&b.ordinal))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_orders_by_line_then_offset() {
        let mut messages = Messages::new();
        messages.append_error(Location::new("a.s", 5, 0), "second line");
        messages.append_error(Location::new("a.s", 2, 4), "first line, later column");
        messages.append_error(Location::new("a.s", 2, 1), "first line, earlier column");
        messages.sort();

        let texts: Vec<&str> = messages.messages().iter().map(Message::text).collect();
        assert_eq!(texts, vec!["first line, earlier column", "first line, later column", "second line"]);
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let mut messages = Messages::new();
        messages.append_warning(Location::default(), "just a warning");
        assert!(!messages.has_errors());
        messages.append_error(Location::default(), "now an error");
        assert!(messages.has_errors());
    }
}
