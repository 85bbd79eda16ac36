//! VM command emitter
//!
//! Purely mechanical: one line per command, written through any
//! `io::Write`. Segment/index combinations are validated here so the
//! compilation engine cannot emit an ill-formed access.

use std::fmt;
use std::io::Write;

/// Largest index `push constant` may carry.
pub const MAX_CONSTANT: u16 = 32767;

/// A VM memory segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Argument => "argument",
            Self::Local => "local",
            Self::Static => "static",
            Self::This => "this",
            Self::That => "that",
            Self::Pointer => "pointer",
            Self::Temp => "temp",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A VM arithmetic/logic command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmOp {
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

impl VmOp {
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

impl fmt::Display for VmOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub enum EmitError {
    Io(std::io::Error),
    ConstantOutOfRange(u16),
    PointerIndexOutOfRange(u16),
    TempIndexOutOfRange(u16),
    PopConstant,
}

impl std::error::Error for EmitError {}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::ConstantOutOfRange(n) => {
                write!(f, "constant out of range (max {MAX_CONSTANT}): {n}")
            }
            Self::PointerIndexOutOfRange(n) => {
                write!(f, "pointer index must be 0 or 1, got {n}")
            }
            Self::TempIndexOutOfRange(n) => {
                write!(f, "temp index must be in 0..=7, got {n}")
            }
            Self::PopConstant => f.write_str("cannot pop to the constant segment"),
        }
    }
}

impl From<std::io::Error> for EmitError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Writes VM commands to an output stream.
pub struct VmWriter<W: Write> {
    out: W,
}

impl<W: Write> VmWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_push(&mut self, segment: Segment, index: u16) -> Result<(), EmitError> {
        Self::validate_access(segment, index)?;
        writeln!(self.out, "push {segment} {index}")?;
        Ok(())
    }

    pub fn write_pop(&mut self, segment: Segment, index: u16) -> Result<(), EmitError> {
        if segment == Segment::Constant {
            return Err(EmitError::PopConstant);
        }
        Self::validate_access(segment, index)?;
        writeln!(self.out, "pop {segment} {index}")?;
        Ok(())
    }

    pub fn write_arithmetic(&mut self, op: VmOp) -> Result<(), EmitError> {
        writeln!(self.out, "{op}")?;
        Ok(())
    }

    pub fn write_label(&mut self, label: &str) -> Result<(), EmitError> {
        writeln!(self.out, "label {label}")?;
        Ok(())
    }

    pub fn write_goto(&mut self, label: &str) -> Result<(), EmitError> {
        writeln!(self.out, "goto {label}")?;
        Ok(())
    }

    pub fn write_if_goto(&mut self, label: &str) -> Result<(), EmitError> {
        writeln!(self.out, "if-goto {label}")?;
        Ok(())
    }

    pub fn write_call(&mut self, name: &str, n_args: u16) -> Result<(), EmitError> {
        writeln!(self.out, "call {name} {n_args}")?;
        Ok(())
    }

    pub fn write_function(&mut self, name: &str, n_locals: u16) -> Result<(), EmitError> {
        writeln!(self.out, "function {name} {n_locals}")?;
        Ok(())
    }

    pub fn write_return(&mut self) -> Result<(), EmitError> {
        writeln!(self.out, "return")?;
        Ok(())
    }

    fn validate_access(segment: Segment, index: u16) -> Result<(), EmitError> {
        match segment {
            Segment::Constant if index > MAX_CONSTANT => {
                Err(EmitError::ConstantOutOfRange(index))
            }
            Segment::Pointer if index > 1 => Err(EmitError::PointerIndexOutOfRange(index)),
            Segment::Temp if index > 7 => Err(EmitError::TempIndexOutOfRange(index)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(f: impl FnOnce(&mut VmWriter<&mut Vec<u8>>) -> Result<(), EmitError>) -> String {
        let mut buffer = Vec::new();
        let mut writer = VmWriter::new(&mut buffer);
        f(&mut writer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn writes_one_line_per_command() {
        let out = emit(|w| {
            w.write_push(Segment::Constant, 7)?;
            w.write_arithmetic(VmOp::Neg)?;
            w.write_pop(Segment::Local, 0)?;
            w.write_return()
        });
        assert_eq!(out, "push constant 7\nneg\npop local 0\nreturn\n");
    }

    #[test]
    fn writes_flow_and_call_commands() {
        let out = emit(|w| {
            w.write_label("WHILE_EXP0")?;
            w.write_if_goto("WHILE_END0")?;
            w.write_goto("WHILE_EXP0")?;
            w.write_call("Math.multiply", 2)?;
            w.write_function("Main.main", 1)
        });
        assert_eq!(
            out,
            "label WHILE_EXP0\nif-goto WHILE_END0\ngoto WHILE_EXP0\n\
             call Math.multiply 2\nfunction Main.main 1\n"
        );
    }

    #[test]
    fn validates_indices() {
        let mut buffer = Vec::new();
        let mut writer = VmWriter::new(&mut buffer);

        assert!(writer.write_push(Segment::Constant, 32767).is_ok());
        assert!(matches!(
            writer.write_push(Segment::Pointer, 2),
            Err(EmitError::PointerIndexOutOfRange(2))
        ));
        assert!(matches!(
            writer.write_pop(Segment::Temp, 8),
            Err(EmitError::TempIndexOutOfRange(8))
        ));
        assert!(matches!(
            writer.write_pop(Segment::Constant, 0),
            Err(EmitError::PopConstant)
        ));
    }
}
