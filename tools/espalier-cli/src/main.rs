mod commands;
mod format;
mod writer;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{convert::ConvertArgs, import::ImportArgs, info::InfoArgs, schema::SchemaArgs};

#[derive(Parser)]
#[command(name = "espalier", about = "Inspect and convert espalier datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a dataset's schema
    Schema(SchemaArgs),
    /// Summarize a dataset's entries and arrays
    Info(InfoArgs),
    /// Convert a dataset to jsonl/csv/parquet
    Convert(ConvertArgs),
    /// Import a parquet file as a new dataset
    Import(ImportArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Schema(args) => args.run(),
        Commands::Info(args) => args.run(),
        Commands::Convert(args) => args.run(),
        Commands::Import(args) => args.run(),
    }
}
