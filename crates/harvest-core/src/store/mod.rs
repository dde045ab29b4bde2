//! Dataset sinks: where accepted rows are appended.

pub mod csv_sink;
pub mod schema;
pub mod sqlite_sink;

pub use csv_sink::CsvSink;
pub use sqlite_sink::SqliteSink;

use crate::clean::dedup::DedupKeyMode;
use crate::errors::HarvestResult;
use crate::models::MethodRecord;

/// Append-only row consumer. Rows arrive in pipeline order and already
/// deduplicated.
pub trait RowSink {
    fn append(&mut self, record: &MethodRecord) -> HarvestResult<()>;

    /// Refuse a run whose dedup key mode differs from keys this sink stores.
    fn check_key_mode(&self, _mode: DedupKeyMode) -> HarvestResult<()> {
        Ok(())
    }

    /// Persist what has been appended so far. Called after each repository.
    fn flush(&mut self) -> HarvestResult<()> {
        Ok(())
    }

    /// Called once when the run ends.
    fn finish(&mut self) -> HarvestResult<()> {
        self.flush()
    }
}

/// Collects rows in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub rows: Vec<MethodRecord>,
}

impl RowSink for MemorySink {
    fn append(&mut self, record: &MethodRecord) -> HarvestResult<()> {
        self.rows.push(record.clone());
        Ok(())
    }
}

/// Fans each row out to several sinks, in order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn RowSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn RowSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl RowSink for MultiSink {
    fn append(&mut self, record: &MethodRecord) -> HarvestResult<()> {
        self.sinks.iter_mut().try_for_each(|s| s.append(record))
    }

    fn check_key_mode(&self, mode: DedupKeyMode) -> HarvestResult<()> {
        self.sinks.iter().try_for_each(|s| s.check_key_mode(mode))
    }

    fn flush(&mut self) -> HarvestResult<()> {
        self.sinks.iter_mut().try_for_each(|s| s.flush())
    }

    fn finish(&mut self) -> HarvestResult<()> {
        self.sinks.iter_mut().try_for_each(|s| s.finish())
    }
}
