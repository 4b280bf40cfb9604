//! Travel time providers
//!
//! This module provides:
//! - The `TravelTimeProvider` trait the collector talks to
//! - The typed `RequestFailure` every provider call may return
//! - The Google Distance Matrix implementation (`google`)
//!
//! The collector never sees HTTP or JSON; it only receives a
//! `TravelTimeEstimate` or a `RequestFailure` per pair.

pub mod google;

use thiserror::Error;

use crate::schema::CoordinatePair;

/// Numeric fields extracted from a successful API response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TravelTimeEstimate {
    /// Route distance in meters
    pub distance_m: u64,

    /// Traffic-free duration in seconds
    pub duration_s: u64,

    /// Traffic-adjusted duration in seconds
    pub duration_in_traffic_s: u64,
}

/// Why a single pair could not be measured on a pass.
///
/// Every variant is recovered the same way (skip the pair for this
/// tick); the distinction exists for logging and counting.
#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("malformed JSON response: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("API status {status}{}", api_message_suffix(.message))]
    ApiStatus {
        status: String,
        message: Option<String>,
    },

    #[error("element status {0}")]
    ElementStatus(String),

    #[error("response has no rows/elements")]
    EmptyResponse,

    #[error("response is missing field '{0}'")]
    MissingField(&'static str),
}

fn api_message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

/// A source of driving travel times for one origin/destination pair.
///
/// CONTRACT:
/// - Exactly one remote call per invocation, no retries
/// - Departure time is always "now"
/// - Must never panic on bad responses
///
/// THREAD SAFETY:
/// - Must be Send + Sync so the collector can hold it across awaits
///
#[async_trait::async_trait]
pub trait TravelTimeProvider: Send + Sync {
    /// Short identifier for logs (e.g. "google").
    fn name(&self) -> &'static str;

    /// Human-readable form of the request issued for `pair`, safe to
    /// log (no credentials).
    fn describe_request(&self, pair: &CoordinatePair) -> String {
        format!("{} -> {}", pair.origin, pair.destination)
    }

    /// Requests the current travel time for `pair`.
    async fn travel_time(&self, pair: &CoordinatePair) -> Result<TravelTimeEstimate, RequestFailure>;
}
