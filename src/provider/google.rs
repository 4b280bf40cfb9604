use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    config::ApiConfig,
    schema::CoordinatePair,
};

use super::{RequestFailure, TravelTimeEstimate, TravelTimeProvider};

/// Departure time sent with every request. The server resolves it
/// to its own clock, so no local timestamp is involved.
const DEPARTURE_TIME: &str = "now";

/// Stands in for the API key in logged URLs.
const REDACTED: &str = "REDACTED";

/// Google Distance Matrix provider
///
/// Docs:
/// https://developers.google.com/maps/documentation/distance-matrix/distance-matrix
///
/// One GET per pair, one origin and one destination per request.
pub struct GoogleDistanceMatrix {
    client: Client,
    base_url: String,
    api_key: String,
    mode: String,
    traffic_model: String,
    log_requests: bool,
}

impl GoogleDistanceMatrix {
    pub fn new(api: &ApiConfig, log_requests: bool) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = api.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: api.base_url.clone(),
            api_key: api.key.clone(),
            mode: api.mode.clone(),
            traffic_model: api.traffic_model.clone(),
            log_requests,
        })
    }

    /// Builds the full request URL for one pair.
    ///
    /// Query parameters:
    /// origins, destinations, key, departure_time, mode, traffic_model
    pub fn request_url(&self, pair: &CoordinatePair) -> Result<Url, RequestFailure> {
        Url::parse_with_params(
            &self.base_url,
            &[
                ("origins", pair.origin.as_str()),
                ("destinations", pair.destination.as_str()),
                ("key", self.api_key.as_str()),
                ("departure_time", DEPARTURE_TIME),
                ("mode", self.mode.as_str()),
                ("traffic_model", self.traffic_model.as_str()),
            ],
        )
        .map_err(|e| RequestFailure::InvalidUrl(format!("{}: {}", self.base_url, e)))
    }

    /// The URL with the `key` parameter replaced. Works on decoded
    /// pairs, so keys that need percent-encoding are hidden too.
    fn redacted(&self, url: &Url) -> String {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == "key" { REDACTED.to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();

        let mut shown = url.clone();
        shown.query_pairs_mut().clear().extend_pairs(pairs);
        shown.to_string()
    }
}

#[async_trait::async_trait]
impl TravelTimeProvider for GoogleDistanceMatrix {
    fn name(&self) -> &'static str {
        "google"
    }

    fn describe_request(&self, pair: &CoordinatePair) -> String {
        match self.request_url(pair) {
            Ok(url) => format!("GET {}", self.redacted(&url)),
            Err(e) => e.to_string(),
        }
    }

    async fn travel_time(&self, pair: &CoordinatePair) -> Result<TravelTimeEstimate, RequestFailure> {
        let url = self.request_url(pair)?;

        if self.log_requests {
            log::info!("[{}] GET {}", pair.id, self.redacted(&url));
        } else {
            log::debug!("[{}] GET {}", pair.id, self.redacted(&url));
        }

        // The key is part of the URL, so it must not leak through the
        // error's Display.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RequestFailure::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestFailure::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RequestFailure::Transport(e.without_url()))?;

        parse_response(&body)
    }
}

// ------------------------------------------------------------
// Response shape
// ------------------------------------------------------------
//
// {
//   "status": "OK",
//   "rows": [ { "elements": [ {
//       "status": "OK",
//       "distance": { "value": 4321 },
//       "duration": { "value": 600 },
//       "duration_in_traffic": { "value": 720 }
//   } ] } ]
// }
//
// Only the first element of the first row is used: every request
// carries exactly one origin and one destination.
//
#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    status: String,

    #[serde(default)]
    error_message: Option<String>,

    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: Option<String>,
    distance: Option<ValueField>,
    duration: Option<ValueField>,
    duration_in_traffic: Option<ValueField>,
}

#[derive(Debug, Deserialize)]
struct ValueField {
    value: u64,
}

/// Extracts distance, duration and duration in traffic from a raw
/// Distance Matrix JSON body.
pub fn parse_response(body: &str) -> Result<TravelTimeEstimate, RequestFailure> {
    let resp: DistanceMatrixResponse = serde_json::from_str(body)?;

    if resp.status != "OK" {
        return Err(RequestFailure::ApiStatus {
            status: resp.status,
            message: resp.error_message,
        });
    }

    let element = resp
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.elements.into_iter().next())
        .ok_or(RequestFailure::EmptyResponse)?;

    if let Some(status) = element.status.filter(|s| s != "OK") {
        return Err(RequestFailure::ElementStatus(status));
    }

    Ok(TravelTimeEstimate {
        duration_s: element
            .duration
            .ok_or(RequestFailure::MissingField("duration"))?
            .value,
        duration_in_traffic_s: element
            .duration_in_traffic
            .ok_or(RequestFailure::MissingField("duration_in_traffic"))?
            .value,
        distance_m: element
            .distance
            .ok_or(RequestFailure::MissingField("distance"))?
            .value,
    })
}
