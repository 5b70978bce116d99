//! Benchmark harness: scan a JSON file and report structural throughput.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use briskly::StructuralIndex;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "briskly")]
#[command(about = "JSON structural index benchmark harness", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON file to scan
    file: PathBuf,

    /// Number of timed iterations
    #[arg(short, long, default_value = "10")]
    iterations: u32,

    /// Print the first offsets of the index
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = fs::read(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;

    let mut index = StructuralIndex::with_byte_capacity(json.len());

    // One untimed pass warms the caches and surfaces errors up front.
    briskly::build_structural_index(&json, &mut index)
        .with_context(|| format!("failed to index {}", cli.file.display()))?;

    let start = Instant::now();
    for _ in 0..cli.iterations {
        briskly::build_structural_index(&json, &mut index)?;
    }
    let elapsed = start.elapsed();

    let scanned = json.len() as f64 * f64::from(cli.iterations);
    let gb_per_s = scanned / elapsed.as_secs_f64() / 1e9;
    println!(
        "{}: {} bytes, {} structurals, {:.3} GB/s over {} iterations",
        cli.file.display(),
        json.len(),
        index.len(),
        gb_per_s,
        cli.iterations
    );

    if cli.dump {
        let shown = index.len().min(32);
        println!("offsets[..{}]: {:?}", shown, &index.offsets()[..shown]);
    }

    Ok(())
}
