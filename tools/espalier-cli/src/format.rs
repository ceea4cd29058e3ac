use clap::ValueEnum;
use espalier::arrow::{FlattenPolicy, ListPolicy};

#[derive(Clone, Copy, Debug, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    Jsonl,
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn default_policy(&self) -> FlattenPolicy {
        match self {
            OutputFormat::Jsonl | OutputFormat::Parquet => FlattenPolicy::for_parquet(),
            OutputFormat::Csv => FlattenPolicy::for_csv(),
        }
    }
}

/// Command-line spelling of [`ListPolicy`]; the fixed expansion size is
/// supplied separately via `--list-flatten-size`.
#[derive(Clone, Copy, Debug, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ListPolicyChoice {
    Drop,
    Keep,
    FlattenFixed,
}

impl ListPolicyChoice {
    pub fn with_size(self, size: usize) -> ListPolicy {
        match self {
            ListPolicyChoice::Drop => ListPolicy::Drop,
            ListPolicyChoice::Keep => ListPolicy::Keep,
            ListPolicyChoice::FlattenFixed => ListPolicy::FlattenFixed(size),
        }
    }
}
