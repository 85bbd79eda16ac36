//! VM-to-Hack translator
//!
//! Lowers stack-machine VM code into Hack assembly. Translation is strictly
//! sequential: commands are parsed and emitted in source order, and files
//! are emitted in the order the driver supplies them, preceded by a single
//! bootstrap fragment.
//!
//! # Example
//!
//! ```
//! use vm_translator::translate;
//!
//! let asm = translate("push constant 7\npush constant 8\nadd\n", "Add", false).unwrap();
//! assert!(asm.contains("M=D+M"));
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

pub mod code_writer;
pub mod parser;

pub use code_writer::CodeWriter;
pub use parser::{ArithmeticOp, ParseError, Segment, VmCommand};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum TranslateError {
    Io(std::io::Error),
    Parse { file: String, error: ParseError },
    /// The input path names neither a `.vm` file nor a directory holding one
    NoInput(PathBuf),
}

impl std::error::Error for TranslateError {}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Parse { file, error } => write!(f, "{file}: {error}"),
            Self::NoInput(path) => {
                write!(f, "no .vm input found at {}", path.display())
            }
        }
    }
}

impl From<std::io::Error> for TranslateError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Translates one file's worth of VM source to assembly text.
///
/// `stem` is the source filename without extension; it seeds the writer's
/// unique identifier. When `bootstrap` is set, the run-once preamble
/// (SP = 256, `call Sys.init 0`) is emitted first.
pub fn translate(source: &str, stem: &str, bootstrap: bool) -> Result<String, ParseError> {
    let mut writer = CodeWriter::new(stem);
    if bootstrap {
        writer.write_bootstrap();
    }

    for (i, line) in source.lines().enumerate() {
        if let Some(command) = parser::parse_line(line, i + 1)? {
            writer.write_command(&command);
        }
    }

    Ok(writer.finish())
}

/// Translates the file or directory at `path`, writing a single `.asm`
/// file and returning its path.
///
/// Directory mode gathers every `.vm` file directly inside (sorted by
/// name for deterministic output), concatenates their translations after
/// one bootstrap fragment, and writes `<dirname>.asm` next to the
/// directory. File mode writes `<stem>.asm` next to the input.
pub fn translate_path(path: &Path) -> Result<PathBuf, TranslateError> {
    let inputs = collect_inputs(path)?;
    let output_path = derive_output_path(path);

    let mut output = String::new();
    let mut bootstrap = true;
    for input in &inputs {
        let stem = file_stem(input);
        let source = fs::read_to_string(input)?;
        output.push_str(&format!("// {}\n", file_name(input)));
        let asm =
            translate(&source, &stem, bootstrap).map_err(|error| TranslateError::Parse {
                file: file_name(input),
                error,
            })?;
        output.push_str(&asm);
        bootstrap = false;
    }

    fs::write(&output_path, output)?;
    Ok(output_path)
}

/// The `.vm` files a path stands for: the file itself, or the sorted
/// non-recursive contents of a directory.
fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>, TranslateError> {
    if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "vm"))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(TranslateError::NoInput(path.to_path_buf()));
        }
        Ok(files)
    } else if path.extension().is_some_and(|ext| ext == "vm") && path.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(TranslateError::NoInput(path.to_path_buf()))
    }
}

/// Output lands next to the input: `<dir>.asm` for directories,
/// `<stem>.asm` for files.
fn derive_output_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        let dirname = file_name(path);
        path.with_file_name(format!("{dirname}.asm"))
    } else {
        path.with_extension("asm")
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_simple_arithmetic() {
        let asm = translate("push constant 7\npush constant 8\nadd\n", "Add", false).unwrap();
        assert!(asm.starts_with("// push constant 7\n@7\nD=A\n"));
        assert!(asm.contains("M=D+M"));
    }

    #[test]
    fn comment_only_source_translates_to_nothing() {
        let asm = translate("// nothing\n\n   \n", "Empty", false).unwrap();
        assert!(asm.is_empty());
    }

    #[test]
    fn bootstrap_emitted_only_when_requested() {
        let with = translate("", "First", true).unwrap();
        let without = translate("", "Second", false).unwrap();
        assert!(with.contains("@256"));
        assert!(without.is_empty());
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        let err = translate("add\nbogus\n", "Bad", false).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn output_path_for_file_and_directory() {
        assert_eq!(
            derive_output_path(Path::new("foo/Bar.vm")),
            PathBuf::from("foo/Bar.asm")
        );
    }
}
