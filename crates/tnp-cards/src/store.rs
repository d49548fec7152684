//! Histogram container files.
//!
//! # Layout: `tnp_histograms_v1`
//!
//! One Parquet file holds any number of 1D histograms, one row each:
//!
//! | Column    | Type            | Meaning                          |
//! |-----------|-----------------|----------------------------------|
//! | `name`    | Utf8            | Histogram key, unique per file   |
//! | `n_bins`  | UInt32          | Number of in-range bins          |
//! | `x_min`   | Float64         | Lower axis edge                  |
//! | `x_max`   | Float64         | Upper axis edge                  |
//! | `content` | List\<Float64\> | Sum of weights per bin           |
//! | `sumw2`   | List\<Float64\> | Sum of squared weights per bin   |
//!
//! Schema metadata `tnp.schema_version` is set to `tnp_histograms_v1`.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, Float64Array, Float64Builder, ListArray, ListBuilder, StringArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Float64Type, Schema, UInt32Type};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tnp_core::{Error, Result};
use tnp_ntuple::{Binning, Histogram};

/// Schema metadata key of the container version.
pub const META_KEY_SCHEMA_VERSION: &str = "tnp.schema_version";
/// Current container version.
pub const SCHEMA_VERSION: &str = "tnp_histograms_v1";

fn list_f64() -> DataType {
    DataType::List(Arc::new(Field::new_list_field(DataType::Float64, true)))
}

fn container_schema() -> Schema {
    let metadata = HashMap::from([(META_KEY_SCHEMA_VERSION.to_string(), SCHEMA_VERSION.to_string())]);
    Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("n_bins", DataType::UInt32, false),
        Field::new("x_min", DataType::Float64, false),
        Field::new("x_max", DataType::Float64, false),
        Field::new("content", list_f64(), false),
        Field::new("sumw2", list_f64(), false),
    ])
    .with_metadata(metadata)
}

/// Write `histograms` into one container file, in the given order.
///
/// Names must be unique.
pub fn write_histograms(path: &Path, histograms: &[&Histogram]) -> Result<()> {
    let mut seen: Vec<&str> = Vec::with_capacity(histograms.len());
    for h in histograms {
        if seen.contains(&h.name.as_str()) {
            return Err(Error::Validation(format!(
                "duplicate histogram '{}' for {}",
                h.name,
                path.display()
            )));
        }
        seen.push(&h.name);
    }

    let mut n_bins = Vec::with_capacity(histograms.len());
    let mut content = ListBuilder::new(Float64Builder::new());
    let mut sumw2 = ListBuilder::new(Float64Builder::new());
    for h in histograms {
        n_bins.push(u32::try_from(h.n_bins()).map_err(|_| {
            Error::Validation(format!("'{}' has too many bins ({})", h.name, h.n_bins()))
        })?);
        content.values().append_slice(&h.content);
        content.append(true);
        sumw2.values().append_slice(&h.sumw2);
        sumw2.append(true);
    }

    let schema = Arc::new(container_schema());
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(histograms.iter().map(|h| h.name.as_str()))),
        Arc::new(UInt32Array::from(n_bins)),
        Arc::new(Float64Array::from_iter_values(histograms.iter().map(|h| h.binning.x_min))),
        Arc::new(Float64Array::from_iter_values(histograms.iter().map(|h| h.binning.x_max))),
        Arc::new(content.finish()),
        Arc::new(sumw2.finish()),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| Error::Validation(format!("failed to build RecordBatch: {e}")))?;

    let file = File::create(path)?;
    let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .map_err(|e| Error::Validation(format!("failed to create Parquet writer: {e}")))?;
    writer.write(&batch).map_err(|e| Error::Validation(format!("failed to write Parquet: {e}")))?;
    writer.close().map_err(|e| Error::Validation(format!("failed to close Parquet writer: {e}")))?;

    tracing::debug!(path = %path.display(), histograms = histograms.len(), "wrote container");
    Ok(())
}

/// Read every histogram of a container file, in stored order.
pub fn read_histograms(path: &Path) -> Result<Vec<Histogram>> {
    let bad = |msg: String| Error::Validation(format!("{}: {msg}", path.display()));

    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| bad(format!("not a Parquet file: {e}")))?;
    match builder.schema().metadata().get(META_KEY_SCHEMA_VERSION) {
        Some(v) if v == SCHEMA_VERSION => {}
        Some(v) => return Err(bad(format!("unsupported container version '{v}'"))),
        None => return Err(bad(format!("missing '{META_KEY_SCHEMA_VERSION}' metadata"))),
    }
    let reader = builder.build().map_err(|e| bad(e.to_string()))?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| bad(e.to_string()))?;
        let names = typed_column(&batch, "name", &DataType::Utf8).map_err(&bad)?.as_string::<i32>();
        let n_bins = typed_column(&batch, "n_bins", &DataType::UInt32)
            .map_err(&bad)?
            .as_primitive::<UInt32Type>();
        let x_min = typed_column(&batch, "x_min", &DataType::Float64)
            .map_err(&bad)?
            .as_primitive::<Float64Type>();
        let x_max = typed_column(&batch, "x_max", &DataType::Float64)
            .map_err(&bad)?
            .as_primitive::<Float64Type>();
        let content = typed_column(&batch, "content", &list_f64()).map_err(&bad)?.as_list::<i32>();
        let sumw2 = typed_column(&batch, "sumw2", &list_f64()).map_err(&bad)?.as_list::<i32>();

        for row in 0..batch.num_rows() {
            let name = names.value(row).to_string();
            let binning = Binning::new(n_bins.value(row) as usize, x_min.value(row), x_max.value(row))?;
            let hist = Histogram::from_bins(
                name,
                binning,
                list_values(content, row),
                list_values(sumw2, row),
            )?;
            out.push(hist);
        }
    }
    Ok(out)
}

fn typed_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
    expected: &DataType,
) -> std::result::Result<&'a ArrayRef, String> {
    let col = batch.column_by_name(name).ok_or_else(|| format!("missing column '{name}'"))?;
    if !col.data_type().equals_datatype(expected) {
        return Err(format!(
            "column '{name}' has type {:?}, expected {expected:?}",
            col.data_type()
        ));
    }
    Ok(col)
}

fn list_values(list: &ListArray, row: usize) -> Vec<f64> {
    let values = list.value(row);
    values.as_primitive::<Float64Type>().iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}
