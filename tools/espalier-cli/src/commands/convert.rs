use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use espalier::Dataset;
use espalier::arrow::{FlattenPolicy, ListPolicy, flatten_record_batch};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    format::{ListPolicyChoice, OutputFormat},
    writer::{CsvWriter, JsonlWriter, ParquetWriter, RecordBatchWriter},
};

#[derive(Args)]
pub struct ConvertArgs {
    /// Path to the dataset directory
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Jsonl)]
    format: OutputFormat,

    /// Output file path (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Entries per record batch
    #[arg(long, default_value_t = 4096)]
    batch_size: usize,

    /// Policy for list columns: drop | keep | flatten-fixed
    #[arg(long, value_enum)]
    list_policy: Option<ListPolicyChoice>,

    /// Number of columns generated when --list-policy flatten-fixed is used
    #[arg(long)]
    list_flatten_size: Option<usize>,
}

impl ConvertArgs {
    pub fn run(self) -> Result<()> {
        let dataset = Dataset::open(&self.input)?;
        let flatten_policy = self.flatten_policy()?;

        let pb = ProgressBar::new(dataset.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})",
            )?
            .progress_chars("=>-"),
        );

        let mut writer: Box<dyn RecordBatchWriter> = match self.format {
            OutputFormat::Jsonl => Box::new(JsonlWriter::new(self.output.as_deref())?),
            OutputFormat::Csv => Box::new(CsvWriter::new(self.output.as_deref())?),
            OutputFormat::Parquet => {
                let path = self
                    .output
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("Parquet output requires -o <file>"))?;
                Box::new(ParquetWriter::new(path)?)
            }
        };

        let plan = dataset.export_plan();
        if !plan.dropped().is_empty() {
            eprintln!(
                "Warning: columns without an Arrow rendering were skipped: {}",
                plan.dropped().join(", ")
            );
        }

        let mut dropped_warned = false;
        dataset.for_each_record_batch(self.batch_size, |batch| {
            let (flat_batch, dropped_columns) =
                flatten_record_batch(&batch, None, &flatten_policy)?;
            if !dropped_warned && !dropped_columns.is_empty() {
                dropped_warned = true;
                eprintln!(
                    "Warning: output policy skipped columns: {}",
                    dropped_columns.join(", ")
                );
            }
            let n = flat_batch.num_rows() as u64;
            writer.write_batch(flat_batch)?;
            pb.inc(n);
            Ok(())
        })?;

        writer.finish()?;
        pb.finish_with_message("done");
        Ok(())
    }

    fn flatten_policy(&self) -> Result<FlattenPolicy> {
        let mut policy = self.format.default_policy();

        if let Some(choice) = self.list_policy {
            policy.lists = choice.with_size(self.list_flatten_size.unwrap_or(1));
        }
        if self.list_flatten_size.is_some() && !matches!(policy.lists, ListPolicy::FlattenFixed(_))
        {
            anyhow::bail!("--list-flatten-size requires --list-policy flatten-fixed");
        }

        Ok(policy)
    }
}
