pub mod cli;
pub mod error;
pub mod model;
pub mod parser;
pub mod processor;
pub mod writer;

pub use error::EquationError;
pub use processor::{Equation, Sequence};

use anyhow::Context;
use clap::Parser;

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // 1. ── Parse ──────────────────────────────────────────────────────
    let json = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Reading {}", args.input.display()))?;
    let raw = parser::load_from_json(&json).with_context(|| "Parsing input JSON")?;

    // 2. ── Process ────────────────────────────────────────────────────
    let processed =
        processor::run(&raw, &args.eval).with_context(|| "Evaluating workspace equations")?;

    // 3. ── Write outputs ──────────────────────────────────────────────
    match &args.output {
        Some(path) => writer::json::emit(&processed, path).with_context(|| "Writing JSON results")?,
        None => {
            let stdout = std::io::stdout();
            writer::text::emit(&processed, &mut stdout.lock())
                .with_context(|| "Writing results to stdout")?;
        }
    }

    Ok(())
}
