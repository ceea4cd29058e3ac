use std::{fs, path::PathBuf};

use anyhow::Result;
use arrow::datatypes::Schema;
use clap::Args;
use espalier::Dataset;
use espalier::core::format_node;

#[derive(Args)]
pub struct SchemaArgs {
    /// Path to the dataset directory
    input: PathBuf,

    /// Print the Arrow export schema instead of the storage schema
    #[arg(long)]
    arrow: bool,

    /// Output file path (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl SchemaArgs {
    pub fn run(self) -> Result<()> {
        let dataset = Dataset::open(&self.input)?;
        let text = if self.arrow {
            let plan = dataset.export_plan();
            if !plan.dropped().is_empty() {
                eprintln!(
                    "Warning: no Arrow rendering for: {}",
                    plan.dropped().join(", ")
                );
            }
            format_arrow_schema(&plan.schema())
        } else {
            format_node(dataset.root())?
        };
        let text = text.trim_end();

        match self.output {
            Some(path) => fs::write(path, format!("{text}\n"))?,
            None => println!("{text}"),
        }
        Ok(())
    }
}

fn format_arrow_schema(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|field| {
            let null = if field.is_nullable() { ", nullable" } else { "" };
            format!("{}: {}{}", field.name(), field.data_type(), null)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
