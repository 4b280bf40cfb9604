use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Columns every input file must carry.
pub const REQUIRED_INPUT_COLUMNS: [&str; 3] = ["ID", "origins", "destinations"];

/// Output header, in column order.
pub const OUTPUT_COLUMNS: [&str; 8] = [
    "ID",
    "Origins",
    "Destinations",
    "Req_Date",
    "Req_Time",
    "Distance",
    "Duration",
    "TT_Best_Guess",
];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to open input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read input CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("input file is missing required column '{0}'")]
    MissingColumn(&'static str),
}

// ------------------------------------------------------------
// Coordinate pair
// ------------------------------------------------------------
//
// One origin/destination pair to query on every pass.
//
// Coordinates are kept as the raw "lat,lng" strings from the input
// file; they are forwarded to the API untouched.
//
// NOTE:
// `dep_date` / `dep_time` are parsed but never sent: every request
// departs "now". They stay on the pair so the override is visible
// in debug logs.
//
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatePair {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub dep_date: Option<String>,
    pub dep_time: Option<String>,
}

impl CoordinatePair {
    pub fn has_departure_override(&self) -> bool {
        self.dep_date.is_some() || self.dep_time.is_some()
    }
}

/// Input row as it appears in the CSV, before required fields
/// are checked.
#[derive(Debug, Deserialize)]
struct InputRow {
    #[serde(rename = "ID")]
    id: Option<String>,
    origins: Option<String>,
    destinations: Option<String>,
    dep_date: Option<String>,
    dep_time: Option<String>,
}

impl InputRow {
    fn into_pair(self) -> Option<CoordinatePair> {
        Some(CoordinatePair {
            id: non_empty(self.id)?,
            origin: non_empty(self.origins)?,
            destination: non_empty(self.destinations)?,
            dep_date: non_empty(self.dep_date),
            dep_time: non_empty(self.dep_time),
        })
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}

// ------------------------------------------------------------
// Travel time record
// ------------------------------------------------------------
//
// One row of the output table. Produced once per successful API
// call per pass and never mutated afterwards.
//
// Serde names match the output header exactly.
//
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TravelTimeRecord {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Origins")]
    pub origin: String,

    #[serde(rename = "Destinations")]
    pub destination: String,

    /// UTC date of the request (also the departure date)
    #[serde(rename = "Req_Date")]
    pub req_date: String,

    /// UTC time of the request (also the departure time)
    #[serde(rename = "Req_Time")]
    pub req_time: String,

    /// Route distance in meters
    #[serde(rename = "Distance")]
    pub distance_m: u64,

    /// Traffic-free duration in seconds
    #[serde(rename = "Duration")]
    pub duration_s: u64,

    /// Traffic-adjusted duration in seconds (best guess model)
    #[serde(rename = "TT_Best_Guess")]
    pub tt_best_guess_s: u64,
}

/// Loads the coordinate pair list from a CSV file.
///
/// Rows missing any required field are dropped; a file missing a
/// required column is rejected before any row is read.
pub fn load_pairs(path: impl AsRef<Path>) -> Result<Vec<CoordinatePair>, InputError> {
    let file = File::open(path.as_ref())?;
    read_pairs(file)
}

pub fn read_pairs<R: Read>(reader: R) -> Result<Vec<CoordinatePair>, InputError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    for column in REQUIRED_INPUT_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(InputError::MissingColumn(column));
        }
    }

    let mut pairs = Vec::new();
    let mut dropped = 0usize;
    for (line, row) in rdr.deserialize::<InputRow>().enumerate() {
        match row?.into_pair() {
            Some(pair) => pairs.push(pair),
            None => {
                dropped += 1;
                log::debug!("dropping input row {}: missing required field", line + 1);
            }
        }
    }

    if dropped > 0 {
        log::info!("dropped {} input row(s) with missing required fields", dropped);
    }

    Ok(pairs)
}
