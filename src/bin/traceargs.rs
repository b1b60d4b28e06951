use std::io::Read;

use anyhow::Result;
use clap::Parser;

use traceargs::frontend::CmdLoader;

/// Reads a panic stack trace on stdin and writes it back out with each
/// frame's raw argument words decoded into typed, named values.
#[derive(Debug, Parser)]
#[command(version)]
struct Traceargs {}

fn main() -> Result<()> {
    let _args = Traceargs::parse();

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let mut loader = CmdLoader::from_env();
    let enriched = traceargs::enrich_trace(&input, &mut loader)?;

    for path in &enriched.unbound {
        eprintln!("warning: no declaration found for {path}; leaving its frames unchanged");
    }
    for line in &enriched.lines {
        println!("{line}");
    }

    Ok(())
}
