//! Jack compiler
//!
//! Compiles the Jack object-oriented language to stack-machine VM code.
//! One class per file; the pipeline is tokenizer -> recursive-descent
//! engine -> VM writer, with a two-scope symbol table resolving every
//! identifier to a (segment, index) pair.
//!
//! # Example
//!
//! ```
//! use jack_compiler::compile;
//!
//! let vm = compile("class Main { function int seven() { return 7; } }").unwrap();
//! assert_eq!(vm, "function Main.seven 0\npush constant 7\nreturn\n");
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

pub mod engine;
pub mod symbol_table;
pub mod tokenizer;
pub mod vm_writer;

pub use engine::{CompilationEngine, CompileError};
pub use symbol_table::{Kind, Symbol, SymbolTable};
pub use tokenizer::{tokenize, Keyword, LexError, Token, TokenKind, TokenStream};
pub use vm_writer::{EmitError, Segment, VmOp, VmWriter};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Any fatal condition met while compiling a path.
#[derive(Debug)]
pub enum JackError {
    Io(std::io::Error),
    Lex { file: String, error: LexError },
    Compile { file: String, error: CompileError },
    /// The input path names neither a `.jack` file nor a directory holding one
    NoInput(PathBuf),
}

impl std::error::Error for JackError {}

impl fmt::Display for JackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Lex { file, error } => write!(f, "{file}: {error}"),
            Self::Compile { file, error } => write!(f, "{file}: {error}"),
            Self::NoInput(path) => write!(f, "no .jack input found at {}", path.display()),
        }
    }
}

impl From<std::io::Error> for JackError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Compiles one class's source text to VM code.
pub fn compile(source: &str) -> Result<String, CompileError> {
    let tokens = tokenizer::tokenize(source)?;

    let mut out = Vec::new();
    let mut engine = CompilationEngine::new(TokenStream::new(tokens), &mut out);
    engine.compile_class()?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Compiles the file or directory at `path`, writing one `.vm` per
/// `.jack` input next to it, and returns the output paths.
pub fn compile_path(path: &Path) -> Result<Vec<PathBuf>, JackError> {
    let inputs = collect_inputs(path)?;

    let mut outputs = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let source = fs::read_to_string(input)?;
        let file = input
            .file_name()
            .map_or_else(String::new, |s| s.to_string_lossy().into_owned());

        let vm = compile(&source).map_err(|error| match error {
            CompileError::Lex(error) => JackError::Lex { file: file.clone(), error },
            other => JackError::Compile { file, error: other },
        })?;

        let output = input.with_extension("vm");
        fs::write(&output, vm)?;
        outputs.push(output);
    }
    Ok(outputs)
}

/// The `.jack` files a path stands for: the file itself, or the sorted
/// non-recursive contents of a directory.
fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>, JackError> {
    if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "jack"))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(JackError::NoInput(path.to_path_buf()));
        }
        Ok(files)
    } else if path.extension().is_some_and(|ext| ext == "jack") && path.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(JackError::NoInput(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_class() {
        let vm = compile("class Main { function int seven() { return 7; } }").unwrap();
        assert_eq!(vm, "function Main.seven 0\npush constant 7\nreturn\n");
    }

    #[test]
    fn lex_errors_are_fatal() {
        let err = compile("class Main { function void main() { let x = 32768; } }").unwrap_err();
        assert!(err.to_string().contains("32768"));
    }
}
