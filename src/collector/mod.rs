//! Collector module
//!
//! This module groups all logic responsible for:
//! - Deciding when a pass runs (absolute tick schedule)
//! - Running a pass over every coordinate pair
//! - Accumulating records until the window closes or the cap is hit
//!
//! The collector layer acts as the orchestration layer between:
//! - The travel time provider (network / JSON)
//! - The output table (written by the caller)
//!
//! Design notes:
//! - API-specific logic MUST NOT live here
//! - Time is read through `Clock` only, never `Utc::now()` directly
pub mod clock;
pub mod runner;
pub mod schedule;
