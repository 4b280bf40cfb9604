//! CSV output.
//!
//! The whole table is kept in memory and written exactly once, at
//! normal termination, to
//! `Google_TT_<RouteName> <WindowStart> to <WindowEnd>.csv`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::schema::{TravelTimeRecord, OUTPUT_COLUMNS};
use crate::util;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

/// Builds the output file name from the route label and window bounds.
pub fn file_name(route_name: &str, start: &DateTime<Utc>, end: &DateTime<Utc>) -> String {
    format!(
        "Google_TT_{} {} to {}.csv",
        route_name,
        util::format_window_timestamp(start),
        util::format_window_timestamp(end),
    )
}

/// Ordered sequence of collected records.
///
/// Insertion order is collection order; records are only ever
/// appended.
#[derive(Debug, Default)]
pub struct OutputTable {
    records: Vec<TravelTimeRecord>,
}

impl OutputTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = TravelTimeRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TravelTimeRecord] {
        &self.records
    }

    /// Serializes the table. The header row is always written, even
    /// when the table is empty.
    pub fn write_to<W: Write>(&self, out: W) -> Result<(), OutputError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out);

        writer.write_record(OUTPUT_COLUMNS)?;
        for record in self.records() {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), OutputError> {
        let file = File::create(path)?;
        self.write_to(file)
    }
}
