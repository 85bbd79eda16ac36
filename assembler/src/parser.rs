//! Line parser for Hack assembly source
//!
//! Zero-copy: every accessor returns a slice of the original line. Comment
//! stripping uses a byte scan, which is measurably faster than `str::find`
//! on short assembly lines.

use std::fmt;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum CommandType {
    /// @Xxx where Xxx is either a symbol or a decimal number
    ACommand,
    /// dest=comp;jump
    CCommand,
    /// (Xxx) where Xxx is a symbol
    LCommand,
}

#[derive(Debug)]
pub enum ParserError {
    InvalidState(&'static str),
    /// A `(Xxx` line with no closing parenthesis
    MalformedLabel(String),
}

impl std::error::Error for ParserError {}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidState(msg) => write!(f, "invalid parser state: {msg}"),
            Self::MalformedLabel(line) => {
                write!(f, "malformed label (missing closing paren): {line}")
            }
        }
    }
}

/// Iterates over assembly lines, skipping comments and blanks.
pub struct ParserLines<'a> {
    lines: std::slice::Iter<'a, String>,
    current_line: &'a str,
    current_command_type: Option<CommandType>,
}

impl<'a> ParserLines<'a> {
    #[must_use]
    pub fn from_lines(lines: &'a [String]) -> Self {
        Self {
            lines: lines.iter(),
            current_line: "",
            current_command_type: None,
        }
    }

    /// Advances to the next command, skipping comments and whitespace.
    /// Returns false once the input is exhausted.
    #[inline]
    pub fn advance(&mut self) -> bool {
        for line in self.lines.by_ref() {
            if line.is_empty() {
                continue;
            }

            let trimmed = Self::strip_comment(line).trim();
            if !trimmed.is_empty() {
                self.current_line = trimmed;
                self.current_command_type = Some(Self::classify(trimmed));
                return true;
            }
        }

        self.current_command_type = None;
        false
    }

    /// Byte-level scan for the `//` comment marker.
    #[inline]
    fn strip_comment(line: &str) -> &str {
        let bytes = line.as_bytes();
        for i in 0..bytes.len().saturating_sub(1) {
            if bytes[i] == b'/' && bytes[i + 1] == b'/' {
                return &line[..i];
            }
        }
        line
    }

    /// The first byte is enough: `@` and `(` open A- and L-commands,
    /// anything else is a C-command.
    #[inline]
    fn classify(line: &str) -> CommandType {
        match line.as_bytes()[0] {
            b'@' => CommandType::ACommand,
            b'(' => CommandType::LCommand,
            _ => CommandType::CCommand,
        }
    }

    #[inline]
    pub fn command_type(&self) -> Result<CommandType, ParserError> {
        self.current_command_type
            .ok_or(ParserError::InvalidState("no current line"))
    }

    /// Returns the symbol of an A- or L-command, without its decoration.
    ///
    /// # Errors
    /// Fails on C-commands, on L-commands missing their closing paren, and
    /// when no command is current.
    #[inline]
    pub fn symbol(&self) -> Result<&'a str, ParserError> {
        match self.current_command_type {
            Some(CommandType::ACommand) => Ok(self.current_line[1..].trim()),
            Some(CommandType::LCommand) => self
                .current_line
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .map(str::trim)
                .ok_or_else(|| ParserError::MalformedLabel(self.current_line.to_string())),
            Some(CommandType::CCommand) => {
                Err(ParserError::InvalidState("symbol() called on C-command"))
            }
            None => Err(ParserError::InvalidState("no current line")),
        }
    }

    /// The dest part of a C-command; empty when the instruction stores
    /// nowhere. Interior whitespace is insignificant.
    #[inline]
    pub fn dest(&self) -> Result<&'a str, ParserError> {
        self.require_c_command()?;
        match self.current_line.find('=') {
            Some(pos) => Ok(self.current_line[..pos].trim()),
            None => Ok(""),
        }
    }

    /// The comp part of a C-command.
    #[inline]
    pub fn comp(&self) -> Result<&'a str, ParserError> {
        self.require_c_command()?;
        let start = self.current_line.find('=').map_or(0, |pos| pos + 1);
        let end = self
            .current_line
            .find(';')
            .unwrap_or(self.current_line.len());
        Ok(self.current_line[start..end].trim())
    }

    /// The jump part of a C-command; empty when the instruction never
    /// jumps.
    #[inline]
    pub fn jump(&self) -> Result<&'a str, ParserError> {
        self.require_c_command()?;
        match self.current_line.find(';') {
            Some(pos) => Ok(self.current_line[pos + 1..].trim()),
            None => Ok(""),
        }
    }

    /// The raw text of the current command, for error messages.
    #[inline]
    #[must_use]
    pub fn current_text(&self) -> &'a str {
        self.current_line
    }

    fn require_c_command(&self) -> Result<(), ParserError> {
        match self.current_command_type {
            Some(CommandType::CCommand) => Ok(()),
            Some(_) => Err(ParserError::InvalidState(
                "field accessor called on non-C-command",
            )),
            None => Err(ParserError::InvalidState("no current line")),
        }
    }
}
