//! Parquet-backed event trees.
//!
//! # Layout: `tnp_event_tree_v1`
//!
//! One tree per file. Every numeric or boolean column is a branch and is
//! read as `Float64` (nulls become `NaN`).
//!
//! | Key (schema metadata) | Value                         |
//! |-----------------------|-------------------------------|
//! | `tnp.tree_name`       | Tree identifier, e.g. `Events` |
//!
//! When `tnp.tree_name` is absent the file is treated as an anonymous tree
//! and answers to any tree name.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tnp_core::{Error, Result};

use crate::source::{Columns, EventBatch, EventSource};

/// Schema metadata key holding the tree identifier.
pub const META_KEY_TREE_NAME: &str = "tnp.tree_name";

/// Event source reading one tree per Parquet file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetSource;

impl ParquetSource {
    /// New source.
    pub fn new() -> Self {
        Self
    }
}

impl EventSource for ParquetSource {
    fn read_branches(&self, path: &Path, tree: &str, branches: &[String]) -> Result<EventBatch> {
        let store_err = |what: &str, e: &dyn std::fmt::Display| {
            Error::EventStore(format!("{what} {}: {e}", path.display()))
        };

        let file = File::open(path).map_err(|e| store_err("opening", &e))?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| store_err("reading", &e))?;

        if let Some(stored) = builder.schema().metadata().get(META_KEY_TREE_NAME)
            && stored != tree
        {
            return Err(Error::EventStore(format!(
                "tree '{tree}' not found in {} (file holds '{stored}')",
                path.display()
            )));
        }

        let n_entries = usize::try_from(builder.metadata().file_metadata().num_rows())
            .map_err(|e| store_err("row count of", &e))?;

        let mut columns: Columns =
            branches.iter().map(|b| (b.clone(), Vec::with_capacity(n_entries))).collect();
        if branches.is_empty() {
            return Ok(EventBatch { n_entries, columns });
        }

        let schema = builder.schema().clone();
        let mut roots = Vec::with_capacity(branches.len());
        for b in branches {
            let idx = schema.index_of(b).map_err(|_| {
                Error::EventStore(format!(
                    "branch '{b}' not found in tree '{tree}' of {}",
                    path.display()
                ))
            })?;
            roots.push(idx);
        }
        let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
        let reader = builder.with_projection(mask).build().map_err(|e| store_err("reading", &e))?;

        for batch in reader {
            let batch = batch.map_err(|e| store_err("decoding", &e))?;
            for b in branches {
                let raw = batch.column_by_name(b).ok_or_else(|| {
                    Error::EventStore(format!(
                        "branch '{b}' missing from batch of {}",
                        path.display()
                    ))
                })?;
                let as_f64 = cast(raw, &DataType::Float64).map_err(|e| {
                    Error::EventStore(format!(
                        "branch '{b}' in {} is not numeric: {e}",
                        path.display()
                    ))
                })?;
                let values = as_f64.as_primitive::<Float64Type>();
                if let Some(col) = columns.get_mut(b) {
                    col.extend(values.iter().map(|v| v.unwrap_or(f64::NAN)));
                }
            }
        }

        tracing::trace!(
            path = %path.display(),
            tree,
            n_entries,
            branches = branches.len(),
            "read branches"
        );
        Ok(EventBatch { n_entries, columns })
    }
}

/// Write `columns` as tree `tree` into a Parquet file.
///
/// All columns must have the same length.
pub fn write_tree_parquet(path: &Path, tree: &str, columns: &[(&str, &[f64])]) -> Result<()> {
    if let Some((_, first)) = columns.first()
        && let Some((name, bad)) = columns.iter().find(|(_, c)| c.len() != first.len())
    {
        return Err(Error::Validation(format!(
            "column '{name}' has {} entries, expected {}",
            bad.len(),
            first.len()
        )));
    }

    let fields: Vec<Field> =
        columns.iter().map(|(name, _)| Field::new(*name, DataType::Float64, false)).collect();
    let metadata = HashMap::from([(META_KEY_TREE_NAME.to_string(), tree.to_string())]);
    let schema = Arc::new(Schema::new(fields).with_metadata(metadata));
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, values)| Arc::new(Float64Array::from(values.to_vec())) as ArrayRef)
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| Error::Validation(format!("failed to build RecordBatch: {e}")))?;

    let file = File::create(path)?;
    let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .map_err(|e| Error::Validation(format!("failed to create Parquet writer: {e}")))?;
    writer.write(&batch).map_err(|e| Error::Validation(format!("failed to write Parquet: {e}")))?;
    writer.close().map_err(|e| Error::Validation(format!("failed to close Parquet writer: {e}")))?;
    Ok(())
}
