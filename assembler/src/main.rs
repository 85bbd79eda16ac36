//! Hack assembler driver
//!
//! # Usage
//! ```bash
//! assembler <input.asm> [output.hack]
//! ```
//!
//! The output path defaults to the input path with its extension replaced
//! by `.hack`.

#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::fs;
use std::process;

use hack_assembler::assemble;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Derives the output file path from the input path unless one was given.
fn output_path(input: &str, explicit_output: Option<&str>) -> String {
    explicit_output.map_or_else(
        || {
            input
                .strip_suffix(".asm")
                .map_or_else(|| format!("{input}.hack"), |stem| format!("{stem}.hack"))
        },
        std::string::ToString::to_string,
    )
}

fn run(input_path: &str, explicit_output: Option<&str>) -> Result<String> {
    let source = fs::read_to_string(input_path)?;
    let hack = assemble(&source)?;

    let output = output_path(input_path, explicit_output);
    fs::write(&output, hack)?;
    Ok(output)
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if !(2..=3).contains(&args.len()) {
        eprintln!("Usage: {} <input.asm> [output.hack]", args[0]);
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} Add.asm", args[0]);
        eprintln!("  {} Add.asm Add.hack", args[0]);
        process::exit(1);
    }

    match run(&args[1], args.get(2).map(String::as_str)) {
        Ok(output) => println!("Assembly completed. Output written to {output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
