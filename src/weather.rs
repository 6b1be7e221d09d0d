//! # Current Weather Fetching
//!
//! Reads current conditions from WeatherAPI.com (`/v1/current.json`) for the
//! configured coordinates. Only two fields are used: `current.temp_f` and
//! `current.condition.text`.
//!
//! Temperature is shown in whole degrees, truncated toward zero (68.7 → 68).
//! Any failure becomes [`WeatherResult::Unavailable`], and the banner falls
//! back to "Weather unavailable".

use crate::config::WeatherConfig;
use crate::cycle::WeatherSource;
use crate::WeatherResult;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while fetching current weather.
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Connection, timeout or non-success status
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload did not contain `current.temp_f` / `current.condition.text`
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct CurrentResponse {
    current: Current,
}

#[derive(Deserialize)]
struct Current {
    temp_f: f64,
    condition: Condition,
}

#[derive(Deserialize)]
struct Condition {
    text: String,
}

/// Client for the current-conditions endpoint.
pub struct WeatherClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    query: String,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(config, http))
    }

    /// Build on top of an existing HTTP client.
    pub fn with_client(config: &WeatherConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            query: format!("{},{}", config.latitude, config.longitude),
        }
    }

    /// Fetch current temperature (whole °F) and condition text.
    pub async fn fetch(&self) -> Result<(i32, String), WeatherError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("key", self.api_key.as_str()), ("q", self.query.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.without_url())?;

        let body = response.bytes().await.map_err(|e| e.without_url())?;
        parse_current(&body)
    }
}

impl WeatherSource for WeatherClient {
    async fn current(&self) -> WeatherResult {
        match self.fetch().await {
            Ok((temp_f, description)) => WeatherResult::Available {
                temp_f,
                description,
            },
            Err(error) => {
                warn!("weather fetch failed: {error}");
                WeatherResult::Unavailable(error.to_string())
            }
        }
    }
}

/// Decode a `current.json` body.
pub fn parse_current(body: &[u8]) -> Result<(i32, String), WeatherError> {
    let response: CurrentResponse = serde_json::from_slice(body)?;
    // `as` truncates toward zero
    let temp_f = response.current.temp_f as i32;
    Ok((temp_f, response.current.condition.text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(temp_f: f64, text: &str) -> String {
        format!(
            r#"{{"location":{{"name":"San Francisco"}},"current":{{"temp_c":20.4,"temp_f":{temp_f},"condition":{{"text":"{text}","code":1003}}}}}}"#
        )
    }

    #[test]
    fn test_temperature_is_truncated() {
        let (temp, text) = parse_current(body(68.7, "Partly cloudy").as_bytes()).unwrap();
        assert_eq!(temp, 68);
        assert_eq!(text, "Partly cloudy");
    }

    #[test]
    fn test_negative_temperature_truncates_toward_zero() {
        let (temp, _) = parse_current(body(-3.9, "Snow").as_bytes()).unwrap();
        assert_eq!(temp, -3);
    }

    #[test]
    fn test_missing_condition_is_decode_error() {
        let err = parse_current(br#"{"current":{"temp_f":51.0}}"#).unwrap_err();
        assert!(matches!(err, WeatherError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        // Nothing listens on port 1; the connection is refused immediately
        let config = WeatherConfig {
            endpoint: "http://127.0.0.1:1/v1/current.json".to_string(),
            timeout_secs: 5,
            ..WeatherConfig::default()
        };
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        let client = WeatherClient::with_client(&config, http);
        let result = client.current().await;
        assert!(matches!(result, WeatherResult::Unavailable(_)));
        assert_eq!(result.to_string(), "Weather unavailable");
    }
}
