use std::{
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Result;
use arrow::record_batch::RecordBatch;

pub trait RecordBatchWriter {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

fn open_dest(output: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(fs::File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

// --- JSON Lines ---

pub struct JsonlWriter {
    dest: Box<dyn Write>,
    flush_each_batch: bool,
}

impl JsonlWriter {
    pub fn new(output: Option<&Path>) -> Result<Self> {
        Ok(Self {
            dest: open_dest(output)?,
            flush_each_batch: output.is_none(),
        })
    }
}

impl RecordBatchWriter for JsonlWriter {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()> {
        let mut json_writer = arrow::json::LineDelimitedWriter::new(&mut self.dest);
        json_writer.write(&batch)?;
        json_writer.finish()?;
        drop(json_writer);
        if self.flush_each_batch {
            self.dest.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.dest.flush()?;
        Ok(())
    }
}

// --- CSV ---

pub struct CsvWriter {
    dest: Box<dyn Write>,
    header_written: bool,
    flush_each_batch: bool,
}

impl CsvWriter {
    pub fn new(output: Option<&Path>) -> Result<Self> {
        Ok(Self {
            dest: open_dest(output)?,
            header_written: false,
            flush_each_batch: output.is_none(),
        })
    }
}

impl RecordBatchWriter for CsvWriter {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()> {
        let header = !self.header_written;
        self.header_written = true;
        let mut csv_writer = arrow::csv::WriterBuilder::new()
            .with_header(header)
            .build(&mut self.dest);
        csv_writer.write(&batch)?;
        drop(csv_writer);
        if self.flush_each_batch {
            self.dest.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.dest.flush()?;
        Ok(())
    }
}

// --- Parquet ---

pub struct ParquetWriter {
    output_path: PathBuf,
    inner: Option<parquet::arrow::ArrowWriter<fs::File>>,
}

impl ParquetWriter {
    pub fn new(output: &Path) -> Result<Self> {
        Ok(Self {
            output_path: output.to_path_buf(),
            inner: None,
        })
    }
}

impl RecordBatchWriter for ParquetWriter {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()> {
        if self.inner.is_none() {
            let file = fs::File::create(&self.output_path)?;
            let props = parquet::file::properties::WriterProperties::builder().build();
            self.inner = Some(parquet::arrow::ArrowWriter::try_new(
                file,
                batch.schema(),
                Some(props),
            )?);
        }
        self.inner
            .as_mut()
            .expect("writer exists after first batch")
            .write(&batch)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(writer) => {
                writer.close()?;
                eprintln!("Written to {}", self.output_path.display());
                Ok(())
            }
            None => anyhow::bail!("dataset produced no record batches"),
        }
    }
}
