//! Command-line runner: compile a circuit file and execute one function.
//!
//! Warnings go to stderr, the rendered result line to stdout. Input values
//! are non-negative literals in decimal, `0x…` hex or `0b…` binary, one
//! per input field of the entry function.

use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use bitmill::{ConsoleSink, DirSource, Input, RunParams, parse_literal};

#[derive(Parser)]
#[command(name = "bitmill", version, about = "Run a function from a bit-circuit program")]
struct Args {
    /// Source file; includes resolve against its directory.
    file: PathBuf,

    /// Entry function descriptor, e.g. `nand:2:1`.
    function: String,

    /// Input values, one per input field of the entry function.
    values: Vec<String>,

    /// Do not render the result line.
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let Some(name) = args.file.file_name() else {
        return Err(format!("`{}` has no file name", args.file.display()));
    };
    let dir = args
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut sink = ConsoleSink;
    let program = bitmill::compiler::compile(&DirSource::new(dir), &name.to_string_lossy(), &mut sink)
        .map_err(|e| e.to_string())?;

    let mut inputs = Vec::with_capacity(args.values.len());
    for text in &args.values {
        let value = parse_literal(text)
            .ok_or_else(|| format!("`{text}` is not a non-negative number"))?;
        inputs.push(Input::Uint(value));
    }
    // A lone value spans the whole input width only when the function's
    // format has a single field; multi-field functions take one value per
    // field, so a short list is reported as a count mismatch, not packed.
    let input_fields = program
        .lookup(&args.function)
        .map(|callee| {
            program
                .function(callee)
                .format
                .input
                .iter()
                .filter(|p| p.width > 0)
                .count()
        })
        .unwrap_or(0);
    let mut params = if inputs.len() == 1 && input_fields == 1 {
        RunParams::single(inputs.remove(0))
    } else {
        RunParams::list(inputs)
    };
    if args.quiet {
        params = params.quiet();
    }

    program
        .run(&args.function, params, &mut sink)
        .map_err(|e| e.to_string())?;
    Ok(())
}
