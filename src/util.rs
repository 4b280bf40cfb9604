//! Utility helpers shared by the config, collector and output layers.
//!
//! This module contains:
//! - Window timestamp parsing / formatting
//! - Request date / time formatting for output rows
//! - Logger initialization
//!
//! IMPORTANT:
//! - No API-specific business logic should live here.
//! - Everything except `init_logging` must remain pure.

use chrono::{DateTime, NaiveDateTime, Utc};
use env_logger::{Builder, Env, Target};

/// Fixed format of the window bounds in the configuration and in the
/// output file name.
///
/// Example: "2019-05-03 06-00-00"
///
/// NOTE:
/// Dashes instead of colons in the time part keep the value usable
/// inside a file name on every platform.
pub const WINDOW_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Format of the `Req_Date` output column.
pub const REQ_DATE_FORMAT: &str = "%Y-%m-%d";

/// Format of the `Req_Time` output column.
pub const REQ_TIME_FORMAT: &str = "%H:%M:%S";

/// Parse a window bound ("YYYY-MM-DD HH-MM-SS") as a UTC timestamp.
pub fn parse_window_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), WINDOW_FORMAT)?;
    Ok(naive.and_utc())
}

/// Format a UTC timestamp back into the window bound format.
///
/// Round-trips with `parse_window_timestamp` for whole seconds.
pub fn format_window_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(WINDOW_FORMAT).to_string()
}

/// Split a request timestamp into the `Req_Date` / `Req_Time` pair.
pub fn request_date_time(ts: &DateTime<Utc>) -> (String, String) {
    (
        ts.format(REQ_DATE_FORMAT).to_string(),
        ts.format(REQ_TIME_FORMAT).to_string(),
    )
}

/// Initializes `env_logger` on stdout with an `info` default;
/// `RUST_LOG` overrides it.
pub fn init_logging() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();
}
