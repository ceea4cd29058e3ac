//! Flattening of nested record batches for tabular writers.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int32Array, ListArray, StructArray};
use arrow::compute::take;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

/// Policy for `Struct` columns during [`flatten_record_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructPolicy {
    /// Pass the column through unchanged (e.g. for Parquet output).
    Keep,
    /// Expand each field into a top-level column named `{col}.{field}`.
    Flatten,
}

/// Policy for `List` columns during [`flatten_record_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPolicy {
    /// Drop the column entirely (e.g. for CSV output).
    Drop,
    /// Pass the column through unchanged.
    Keep,
    /// Expand the list to exactly `n` columns named `{col}.0` through
    /// `{col}.{n-1}`, padding short lists with nulls and truncating long
    /// ones. The size must be supplied by the caller.
    FlattenFixed(usize),
}

/// Aggregate policy controlling how compound columns are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenPolicy {
    pub structs: StructPolicy,
    pub lists: ListPolicy,
}

impl FlattenPolicy {
    /// Typical policy for CSV: expand records, drop variable-length lists.
    pub fn for_csv() -> Self {
        Self {
            structs: StructPolicy::Flatten,
            lists: ListPolicy::Drop,
        }
    }

    /// Typical policy for Parquet and JSON: pass nesting through unchanged.
    pub fn for_parquet() -> Self {
        Self {
            structs: StructPolicy::Keep,
            lists: ListPolicy::Keep,
        }
    }
}

#[derive(Default)]
struct Collector {
    fields: Vec<Field>,
    arrays: Vec<ArrayRef>,
    dropped: BTreeSet<String>,
}

impl Collector {
    fn keep(&mut self, path: &str, field: &Field, col: &ArrayRef) {
        self.fields.push(Field::new(
            path,
            field.data_type().clone(),
            field.is_nullable(),
        ));
        self.arrays.push(col.clone());
    }
}

/// Flatten a [`RecordBatch`] by walking its schema and applying `policy`
/// to `Struct` and `List` columns at every nesting level. Other column
/// types pass through under their dotted path.
///
/// `separator` joins path segments; `None` means `'.'`. Dropped column
/// paths are returned alongside the batch.
///
/// # Errors
///
/// [`ArrowError::InvalidArgumentError`] if flattening would produce two
/// columns with the same name.
pub fn flatten_record_batch(
    batch: &RecordBatch,
    separator: Option<char>,
    policy: &FlattenPolicy,
) -> Result<(RecordBatch, Vec<String>), ArrowError> {
    let sep = separator.unwrap_or('.').to_string();
    let mut out = Collector::default();

    for (i, field) in batch.schema().fields().iter().enumerate() {
        collect_columns(field, field.name(), batch.column(i), &sep, policy, &mut out)?;
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(out.fields.len());
    for field in &out.fields {
        if !seen.insert(field.name().clone()) {
            return Err(ArrowError::InvalidArgumentError(format!(
                "flattening column name collision: '{}'",
                field.name()
            )));
        }
    }

    let schema = Arc::new(Schema::new(out.fields));
    let result = RecordBatch::try_new_with_options(
        schema,
        out.arrays,
        &arrow::record_batch::RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
    )?;
    Ok((result, out.dropped.into_iter().collect()))
}

fn collect_columns(
    field: &Field,
    path: &str,
    col: &ArrayRef,
    sep: &str,
    policy: &FlattenPolicy,
    out: &mut Collector,
) -> Result<(), ArrowError> {
    match field.data_type() {
        DataType::Struct(children) => match policy.structs {
            StructPolicy::Keep => out.keep(path, field, col),
            StructPolicy::Flatten => {
                let strukt = col
                    .as_any()
                    .downcast_ref::<StructArray>()
                    .expect("DataType::Struct matches StructArray");
                for (i, child) in children.iter().enumerate() {
                    let child_path = format!("{path}{sep}{}", child.name());
                    collect_columns(child, &child_path, strukt.column(i), sep, policy, out)?;
                }
            }
        },
        DataType::List(_) => match policy.lists {
            ListPolicy::Drop => {
                out.dropped.insert(path.to_owned());
            }
            ListPolicy::Keep => out.keep(path, field, col),
            ListPolicy::FlattenFixed(n) => {
                let list = col
                    .as_any()
                    .downcast_ref::<ListArray>()
                    .expect("DataType::List matches ListArray");
                for (child_field, child_col) in expand_list_fixed(list, path, n, sep)? {
                    collect_columns(&child_field, child_field.name(), &child_col, sep, policy, out)?;
                }
            }
        },
        _ => out.keep(path, field, col),
    }
    Ok(())
}

/// Expand a [`ListArray`] into exactly `n` columns, padding short rows
/// with nulls. Null rows produce nulls in every child column.
fn expand_list_fixed(
    array: &ListArray,
    name: &str,
    n: usize,
    sep: &str,
) -> Result<Vec<(Field, ArrayRef)>, ArrowError> {
    let item_type = match array.data_type() {
        DataType::List(item_field) => item_field.data_type().clone(),
        _ => unreachable!(),
    };
    let offsets = array.value_offsets();
    (0..n)
        .map(|i| {
            let indices: Int32Array = (0..array.len())
                .map(|row| {
                    if array.is_null(row) {
                        return None;
                    }
                    let start = offsets[row] as usize;
                    let stop = offsets[row + 1] as usize;
                    if i < stop - start {
                        Some((start + i) as i32)
                    } else {
                        None
                    }
                })
                .collect();
            let col = take(array.values().as_ref(), &indices, None)?;
            let field = Field::new(format!("{name}{sep}{i}"), item_type.clone(), true);
            Ok((field, col))
        })
        .collect()
}
