//! File access for the pipeline: delimited text inputs and columnar outputs.

pub mod source;
pub mod store;

use std::fs::{self, File};
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::{Error, Result};

pub use source::{CsvSource, InputSource, MemorySource};
pub use store::{CACHE_VERSION, Manifest, OutputFormat, OutputStore};

/// Rows per batch when reading files
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Rows inspected when inferring a CSV schema
const SCHEMA_INFERENCE_ROWS: usize = 1000;

fn io_error(path: &Path, action: &str, err: std::io::Error) -> Error {
    Error::Io(std::io::Error::new(
        err.kind(),
        format!("failed to {action} {}: {err}", path.display()),
    ))
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| Error::Config(format!("delimiter {delimiter:?} is not a single ASCII byte")))
}

/// Read a delimited text file with a header row into one batch.
///
/// Column types are inferred, except `text_columns` which are always read
/// as text so codes keep their leading zeros.
pub fn read_csv(path: &Path, delimiter: char, text_columns: &[&str]) -> Result<RecordBatch> {
    let start = Instant::now();
    let mut file = File::open(path).map_err(|e| io_error(path, "open", e))?;

    let format = Format::default()
        .with_header(true)
        .with_delimiter(delimiter_byte(delimiter)?);
    let (inferred, _) = format.infer_schema(&mut file, Some(SCHEMA_INFERENCE_ROWS))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| io_error(path, "rewind", e))?;

    let fields = inferred
        .fields()
        .iter()
        .map(|field| {
            if text_columns.contains(&field.name().as_str()) {
                Field::new(field.name(), DataType::Utf8, true)
            } else {
                field.as_ref().clone().with_nullable(true)
            }
        })
        .collect_vec();
    let schema = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_format(format)
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build(BufReader::new(file))?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    debug!(
        "Read {} rows from {} in {:?}",
        batch.num_rows(),
        path.display(),
        start.elapsed()
    );
    Ok(batch)
}

/// Write a batch as delimited text with a header row
pub fn write_csv(path: &Path, batch: &RecordBatch, delimiter: char) -> Result<()> {
    let delimiter = delimiter_byte(delimiter)?;
    write_atomic(path, |file| {
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .with_delimiter(delimiter)
            .build(file);
        writer.write(batch)?;
        Ok(())
    })
}

/// Write a batch as a Snappy-compressed Parquet file.
///
/// The file is written next to its destination and renamed into place, so
/// readers never observe a partial file.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    write_atomic(path, |file| {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;
        Ok(())
    })
}

/// Read every row group of a Parquet file into one batch
pub fn read_parquet(path: &Path) -> Result<RecordBatch> {
    let file = File::open(path).map_err(|e| io_error(path, "open", e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = Arc::clone(builder.schema());
    let reader = builder.with_batch_size(DEFAULT_BATCH_SIZE).build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write through `write` to a temporary sibling, then rename over `path`
pub(crate) fn write_atomic(path: &Path, write: impl FnOnce(File) -> Result<()>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, "create directory", e))?;
    }
    let tmp = temp_path(path);
    let file = File::create(&tmp).map_err(|e| io_error(&tmp, "create", e))?;

    if let Err(e) = write(file) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| io_error(path, "replace", e))
}
