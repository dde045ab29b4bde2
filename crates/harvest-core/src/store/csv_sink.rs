//! CSV dataset output.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::errors::{HarvestError, HarvestResult};
use crate::models::{MethodRecord, DATASET_COLUMNS};
use crate::store::RowSink;

/// Writes one header row, then one row per record. `code_tokens` is a JSON
/// array in its cell; multi-line code is quoted by the writer.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvSink<File> {
    /// Truncate or create `path`.
    pub fn create(path: &Path) -> HarvestResult<Self> {
        Self::from_writer(File::create(path)?)
    }

    /// Append to `path`, writing the header only if the file is new or empty.
    pub fn append_to(path: &Path) -> HarvestResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() == 0 {
            Self::from_writer(file)
        } else {
            Ok(Self::headerless(file))
        }
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(writer: W) -> HarvestResult<Self> {
        let mut sink = Self::headerless(writer);
        sink.writer.write_record(DATASET_COLUMNS)?;
        Ok(sink)
    }

    fn headerless(writer: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(writer),
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> HarvestResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| HarvestError::Io(e.into_error()))
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn append(&mut self, record: &MethodRecord) -> HarvestResult<()> {
        self.writer.write_record(record.to_row()?)?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> HarvestResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
