use std::{fs, path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Args;
use espalier::Dataset;
use espalier::arrow::record_batch_to_parts;
use espalier::core::{ArrayStore, SchemaNode};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

#[derive(Args)]
pub struct ImportArgs {
    /// Path to the parquet file
    input: PathBuf,

    /// Dataset directory to create
    dest: PathBuf,

    /// Rows per decoded record batch
    #[arg(long, default_value_t = 4096)]
    batch_size: usize,
}

impl ImportArgs {
    pub fn run(self) -> Result<()> {
        let file = fs::File::open(&self.input)?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(self.batch_size);
        let schema = builder.schema().clone();
        let reader = builder.build()?;

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        let batch = arrow::compute::concat_batches(&schema, &batches)?;

        let (decl, backend, skipped) = record_batch_to_parts(&batch)?;
        if !skipped.is_empty() {
            eprintln!(
                "Warning: columns without a storage rendering were skipped: {}",
                skipped.join(", ")
            );
        }
        let root = SchemaNode::from_decl(&decl)?;
        let dataset = Dataset::from_parts(root, ArrayStore::new(Arc::new(backend)))?;
        dataset.save(&self.dest)?;
        eprintln!("Imported {} entries to {}", dataset.len(), self.dest.display());
        Ok(())
    }
}
