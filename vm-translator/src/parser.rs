//! VM command parsing
//!
//! Line-oriented: `//` comments are stripped, each remaining line splits on
//! whitespace into exactly one command. There is no cross-line state, so
//! parsing is a pure function from line to command.

use std::fmt;

/// A VM memory segment named by push/pop commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Local,
    Argument,
    This,
    That,
    Temp,
    Pointer,
    Static,
}

impl Segment {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "constant" => Some(Self::Constant),
            "local" => Some(Self::Local),
            "argument" => Some(Self::Argument),
            "this" => Some(Self::This),
            "that" => Some(Self::That),
            "temp" => Some(Self::Temp),
            "pointer" => Some(Self::Pointer),
            "static" => Some(Self::Static),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Local => "local",
            Self::Argument => "argument",
            Self::This => "this",
            Self::That => "that",
            Self::Temp => "temp",
            Self::Pointer => "pointer",
            Self::Static => "static",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stack arithmetic/logic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
    ShiftLeft,
    ShiftRight,
}

impl ArithmeticOp {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "sub" => Some(Self::Sub),
            "neg" => Some(Self::Neg),
            "eq" => Some(Self::Eq),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            "shiftleft" => Some(Self::ShiftLeft),
            "shiftright" => Some(Self::ShiftRight),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Neg => "neg",
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::ShiftLeft => "shiftleft",
            Self::ShiftRight => "shiftright",
        }
    }
}

/// One VM command; each variant carries exactly the operands it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmCommand {
    Arithmetic(ArithmeticOp),
    Push(Segment, u16),
    Pop(Segment, u16),
    Label(String),
    Goto(String),
    IfGoto(String),
    Function(String, u16),
    Call(String, u16),
    Return,
}

impl fmt::Display for VmCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Arithmetic(op) => f.write_str(op.name()),
            Self::Push(segment, index) => write!(f, "push {segment} {index}"),
            Self::Pop(segment, index) => write!(f, "pop {segment} {index}"),
            Self::Label(name) => write!(f, "label {name}"),
            Self::Goto(name) => write!(f, "goto {name}"),
            Self::IfGoto(name) => write!(f, "if-goto {name}"),
            Self::Function(name, n_locals) => write!(f, "function {name} {n_locals}"),
            Self::Call(name, n_args) => write!(f, "call {name} {n_args}"),
            Self::Return => f.write_str("return"),
        }
    }
}

/// Largest value `push constant` may load.
pub const MAX_CONSTANT: u16 = 32767;

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    UnknownCommand { line: usize, text: String },
    UnknownSegment { line: usize, text: String },
    MissingArgument { line: usize, text: String },
    InvalidIndex { line: usize, text: String },
    ConstantOutOfRange { line: usize, value: u16 },
    PointerIndexOutOfRange { line: usize, index: u16 },
    TempIndexOutOfRange { line: usize, index: u16 },
    PopConstant { line: usize },
    TrailingTokens { line: usize, text: String },
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownCommand { line, text } => {
                write!(f, "line {line}: unknown command: {text}")
            }
            Self::UnknownSegment { line, text } => {
                write!(f, "line {line}: unknown segment: {text}")
            }
            Self::MissingArgument { line, text } => {
                write!(f, "line {line}: missing argument in: {text}")
            }
            Self::InvalidIndex { line, text } => {
                write!(f, "line {line}: invalid index: {text}")
            }
            Self::ConstantOutOfRange { line, value } => {
                write!(f, "line {line}: constant out of range (max {MAX_CONSTANT}): {value}")
            }
            Self::PointerIndexOutOfRange { line, index } => {
                write!(f, "line {line}: pointer index must be 0 or 1, got {index}")
            }
            Self::TempIndexOutOfRange { line, index } => {
                write!(f, "line {line}: temp index must be in 0..=7, got {index}")
            }
            Self::PopConstant { line } => {
                write!(f, "line {line}: cannot pop to the constant segment")
            }
            Self::TrailingTokens { line, text } => {
                write!(f, "line {line}: unexpected trailing tokens in: {text}")
            }
        }
    }
}

/// Parses one source line into a command, or None for blanks and comments.
///
/// `line_no` is 1-based and only used in error messages.
pub fn parse_line(raw: &str, line_no: usize) -> Result<Option<VmCommand>, ParseError> {
    let text = match raw.find("//") {
        Some(pos) => &raw[..pos],
        None => raw,
    };

    let mut tokens = text.split_whitespace();
    let Some(op) = tokens.next() else {
        return Ok(None);
    };

    let command = match op {
        "push" | "pop" => {
            let segment_text = expect_token(&mut tokens, text, line_no)?;
            let segment = Segment::parse(segment_text).ok_or_else(|| ParseError::UnknownSegment {
                line: line_no,
                text: segment_text.to_string(),
            })?;
            let index = expect_index(&mut tokens, text, line_no)?;
            validate_segment_index(op == "pop", segment, index, line_no)?;
            if op == "push" {
                VmCommand::Push(segment, index)
            } else {
                VmCommand::Pop(segment, index)
            }
        }
        "label" => VmCommand::Label(expect_token(&mut tokens, text, line_no)?.to_string()),
        "goto" => VmCommand::Goto(expect_token(&mut tokens, text, line_no)?.to_string()),
        "if-goto" => VmCommand::IfGoto(expect_token(&mut tokens, text, line_no)?.to_string()),
        "function" => {
            let name = expect_token(&mut tokens, text, line_no)?.to_string();
            let n_locals = expect_index(&mut tokens, text, line_no)?;
            VmCommand::Function(name, n_locals)
        }
        "call" => {
            let name = expect_token(&mut tokens, text, line_no)?.to_string();
            let n_args = expect_index(&mut tokens, text, line_no)?;
            VmCommand::Call(name, n_args)
        }
        "return" => VmCommand::Return,
        other => match ArithmeticOp::parse(other) {
            Some(op) => VmCommand::Arithmetic(op),
            None => {
                return Err(ParseError::UnknownCommand {
                    line: line_no,
                    text: other.to_string(),
                })
            }
        },
    };

    if tokens.next().is_some() {
        return Err(ParseError::TrailingTokens {
            line: line_no,
            text: text.trim().to_string(),
        });
    }

    Ok(Some(command))
}

fn expect_token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    text: &str,
    line_no: usize,
) -> Result<&'a str, ParseError> {
    tokens.next().ok_or_else(|| ParseError::MissingArgument {
        line: line_no,
        text: text.trim().to_string(),
    })
}

fn expect_index<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    text: &str,
    line_no: usize,
) -> Result<u16, ParseError> {
    let token = expect_token(tokens, text, line_no)?;
    token.parse().map_err(|_| ParseError::InvalidIndex {
        line: line_no,
        text: token.to_string(),
    })
}

fn validate_segment_index(
    is_pop: bool,
    segment: Segment,
    index: u16,
    line_no: usize,
) -> Result<(), ParseError> {
    match segment {
        Segment::Constant => {
            if is_pop {
                return Err(ParseError::PopConstant { line: line_no });
            }
            if index > MAX_CONSTANT {
                return Err(ParseError::ConstantOutOfRange {
                    line: line_no,
                    value: index,
                });
            }
        }
        Segment::Pointer => {
            if index > 1 {
                return Err(ParseError::PointerIndexOutOfRange {
                    line: line_no,
                    index,
                });
            }
        }
        Segment::Temp => {
            if index > 7 {
                return Err(ParseError::TempIndexOutOfRange {
                    line: line_no,
                    index,
                });
            }
        }
        _ => {}
    }
    Ok(())
}
