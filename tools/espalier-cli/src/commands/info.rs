use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use espalier::Dataset;
use espalier::core::ArrayId;

#[derive(Args)]
pub struct InfoArgs {
    /// Path to the dataset directory
    input: PathBuf,
}

impl InfoArgs {
    pub fn run(self) -> Result<()> {
        let dataset = Dataset::open(&self.input)?;
        let arrays = dataset.root().arrays();

        println!("entries: {}", dataset.len());
        println!("arrays:  {}", arrays.len());
        println!();

        let id_width = arrays
            .keys()
            .map(|id| id.as_str().len())
            .chain(std::iter::once("array".len()))
            .max()
            .unwrap_or(5);
        println!(
            "{:<id_width$}  {:<9}  {:<5}  {:>8}",
            "array", "role", "dtype", "length"
        );
        for (id, dtype) in &arrays {
            let len = dataset.store().len(id)?;
            println!(
                "{:<id_width$}  {:<9}  {:<5}  {:>8}",
                id.as_str(),
                array_role(id),
                dtype.to_string(),
                len
            );
        }
        Ok(())
    }
}

/// Storage role encoded in an array id's `#` suffix.
fn array_role(id: &ArrayId) -> &'static str {
    let name = id.as_str();
    let base = match name.split_once('@') {
        Some((base, _)) => base,
        None => name,
    };
    match base.rsplit_once('#') {
        Some((_, "starts")) => "starts",
        Some((_, "stops")) => "stops",
        Some((_, "tags")) => "tags",
        Some((_, "offsets")) => "offsets",
        Some((_, "positions")) => "positions",
        Some((_, "mask")) => "mask",
        _ => "data",
    }
}
