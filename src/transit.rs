//! # Transit Arrivals Fetching
//!
//! This module talks to a SIRI StopMonitoring feed (the 511.org regional API)
//! and turns the predicted arrivals for one stop into local clock strings.
//!
//! ## Data Source
//!
//! - **Request**: `GET <endpoint>?api_key=..&agency=SF&stopcode=<id>&format=json`
//! - **Body**: JSON, sometimes prefixed with a UTF-8 byte-order mark
//! - **Path**: `ServiceDelivery.StopMonitoringDelivery.MonitoredStopVisit[*]
//!   .MonitoredVehicleJourney.MonitoredCall.ExpectedArrivalTime`
//! - **Timestamps**: UTC, `YYYY-MM-DDTHH:MM:SSZ`
//!
//! ## Error Handling
//!
//! [`TransitClient::fetch`] reports every failure through [`TransitError`].
//! The [`ArrivalSource`] implementation folds those errors into
//! [`ArrivalResult::Failed`] so the cycle never has to branch on an error
//! channel; the reason is drawn on the panel in place of the times.

use crate::config::TransitConfig;
use crate::cycle::ArrivalSource;
use crate::ArrivalResult;
use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Wire format of `ExpectedArrivalTime`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// 12-hour clock used for every time on the board, e.g. "09:33 AM"
pub const CLOCK_FORMAT: &str = "%I:%M %p";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors that can occur while fetching arrivals for a stop.
#[derive(Error, Debug)]
pub enum TransitError {
    /// Connection, timeout or non-success status
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Body was not the expected StopMonitoring JSON shape
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// An arrival timestamp did not match `YYYY-MM-DDTHH:MM:SSZ`
    #[error("bad timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StopMonitoringResponse {
    service_delivery: ServiceDelivery,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceDelivery {
    stop_monitoring_delivery: StopMonitoringDelivery,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StopMonitoringDelivery {
    monitored_stop_visit: Vec<MonitoredStopVisit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MonitoredStopVisit {
    monitored_vehicle_journey: MonitoredVehicleJourney,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MonitoredVehicleJourney {
    monitored_call: MonitoredCall,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MonitoredCall {
    expected_arrival_time: String,
}

/// Client for the StopMonitoring endpoint.
pub struct TransitClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    agency: String,
    tz: Tz,
}

impl TransitClient {
    /// Build a client; `tz` is the zone arrival times are shown in.
    pub fn new(config: &TransitConfig, tz: Tz) -> Result<Self, TransitError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(config, tz, http))
    }

    /// Build on top of an existing HTTP client.
    pub fn with_client(config: &TransitConfig, tz: Tz, http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            agency: config.agency.clone(),
            tz,
        }
    }

    /// Fetch upcoming arrivals for one stop as local clock strings.
    ///
    /// An empty vector means the feed listed no visits.
    pub async fn fetch(&self, stop_id: &str) -> Result<Vec<String>, TransitError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("agency", self.agency.as_str()),
                ("stopcode", stop_id),
                ("format", "json"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            // The URL carries the API key; keep it out of panel text and logs
            .map_err(|e| e.without_url())?;

        let body = response.bytes().await.map_err(|e| e.without_url())?;
        debug!(stop_id, bytes = body.len(), "stop monitoring response");

        parse_arrivals(&body, self.tz)
    }
}

impl ArrivalSource for TransitClient {
    /// Fetch arrivals, folding any failure into [`ArrivalResult::Failed`].
    async fn arrivals(&self, stop_id: &str) -> ArrivalResult {
        match self.fetch(stop_id).await {
            Ok(times) if times.is_empty() => ArrivalResult::NoArrivals,
            Ok(times) => ArrivalResult::Upcoming(times),
            Err(error) => {
                warn!(stop_id, "arrivals fetch failed: {error}");
                ArrivalResult::Failed(error.to_string())
            }
        }
    }
}

/// Decode a StopMonitoring body into local clock strings, in feed order.
pub fn parse_arrivals(body: &[u8], tz: Tz) -> Result<Vec<String>, TransitError> {
    let body = body.strip_prefix(UTF8_BOM).unwrap_or(body);
    let response: StopMonitoringResponse = serde_json::from_slice(body)?;

    response
        .service_delivery
        .stop_monitoring_delivery
        .monitored_stop_visit
        .iter()
        .map(|visit| {
            format_arrival(
                &visit
                    .monitored_vehicle_journey
                    .monitored_call
                    .expected_arrival_time,
                tz,
            )
        })
        .collect()
}

/// Convert one UTC `ExpectedArrivalTime` into a local 12-hour clock string.
pub fn format_arrival(raw: &str, tz: Tz) -> Result<String, TransitError> {
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|source| {
        TransitError::Timestamp {
            value: raw.to_string(),
            source,
        }
    })?;
    let local = Utc.from_utc_datetime(&naive).with_timezone(&tz);
    Ok(local.format(CLOCK_FORMAT).to_string())
}
