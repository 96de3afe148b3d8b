use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use crate::extractor;
use crate::script;

#[derive(Parser)]
#[command(name = "pg2inserts")]
#[command(version)]
#[command(about = "Rewrite PostgreSQL dump COPY blocks as portable INSERT statements", long_about = None)]
pub struct Cli {
    /// PostgreSQL textual dump file to read
    pub dump: PathBuf,

    /// Output SQL file
    #[arg(default_value = "inserts.sql")]
    pub output: PathBuf,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&cli.dump)
        .with_context(|| format!("cannot read dump file {}", cli.dump.display()))?;

    let blocks = extractor::extract_blocks(&text);
    let total_rows: usize = blocks.iter().map(|b| b.rows.len()).sum();

    let (script, errors) = script::assemble(&blocks);

    std::fs::write(&cli.output, script)
        .with_context(|| format!("cannot write output file {}", cli.output.display()))?;

    eprintln!("Tables found: {}", blocks.len());
    eprintln!("Rows written: {}", total_rows - errors.len());
    eprintln!("Rows skipped: {}", errors.len());
    eprintln!("Output: {}", cli.output.display());

    if !errors.is_empty() {
        eprintln!("\nSkipped rows:");
        for e in &errors {
            eprintln!("  - {e}");
        }
    }

    Ok(())
}
