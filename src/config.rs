//! # Configuration Management
//!
//! Settings come from two layers. The optional `transit-board.toml` file holds
//! the static parts (display geometry, timezone, endpoints, stop titles); the
//! environment supplies credentials, stop codes and coordinates on top of it.
//! Environment values may also live in a `.env` file in the working
//! directory. Variables already set in the process win over the file.
//! The result is one [`Config`] value, built once at startup and passed by
//! reference to every component.

use crate::STOP_COUNT;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default location of the optional config file.
pub const CONFIG_FILE: &str = "transit-board.toml";

/// Default location of the optional dotenv file.
pub const DOTENV_FILE: &str = ".env";

/// Errors raised while interpreting configuration values.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configured timezone is not an IANA name chrono-tz knows
    #[error("unknown timezone {name:?}: {reason}")]
    Timezone { name: String, reason: String },
}

/// Application configuration loaded from file and environment
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Transit arrivals feed
    pub transit: TransitConfig,
    /// Weather feed
    pub weather: WeatherConfig,
    /// Display and layout settings
    pub display: DisplayConfig,
    /// Stops shown on the board
    pub stops: StopsConfig,
}

/// Transit (StopMonitoring) API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransitConfig {
    /// API key, normally supplied through `API_KEY`
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Regional operator code
    pub agency: String,
    pub endpoint: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Weather API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// API key, normally supplied through `W_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Latitude as passed to the API, normally from `LAT`
    pub latitude: String,
    /// Longitude as passed to the API, normally from `LONG`
    pub longitude: String,
    pub endpoint: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Display and refresh settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Panel width in pixels
    pub width: u32,
    /// Panel height in pixels
    pub height: u32,
    /// IANA timezone used for the clock and arrival times
    pub timezone: String,
    /// Seconds between cycles in `--watch` mode
    pub refresh_interval_secs: u64,
    /// Where the PBM sink writes frames when no panel is attached
    pub output_path: PathBuf,
    /// Panel wiring, used by the `hardware` build
    pub hardware: HardwareConfig,
}

/// E-ink HAT wiring (BCM GPIO numbers)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub spi_device: String,
    pub gpio_chip: String,
    /// Data/Command select
    pub dc_pin: u32,
    pub rst_pin: u32,
    pub busy_pin: u32,
}

/// Stops shown on the board, in grid order
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StopsConfig {
    /// Provider stop codes: top-left, top-right, bottom-left, bottom-right
    pub ids: [String; STOP_COUNT],
    /// Display titles keyed by stop code
    pub titles: BTreeMap<String, String>,
}

impl Default for TransitConfig {
    fn default() -> Self {
        TransitConfig {
            api_key: String::new(),
            agency: "SF".to_string(),
            endpoint: "https://api.511.org/transit/StopMonitoring".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        WeatherConfig {
            api_key: String::new(),
            latitude: String::new(),
            longitude: String::new(),
            endpoint: "https://api.weatherapi.com/v1/current.json".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 800,  // Waveshare 7.5" V2
            height: 480, // Waveshare 7.5" V2
            timezone: "America/Los_Angeles".to_string(),
            refresh_interval_secs: 60,
            output_path: PathBuf::from("transit-board.pbm"),
            hardware: HardwareConfig::default(),
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        // Waveshare e-Paper HAT on a Raspberry Pi header
        HardwareConfig {
            spi_device: "/dev/spidev0.0".to_string(),
            gpio_chip: "/dev/gpiochip0".to_string(),
            dc_pin: 25,
            rst_pin: 17,
            busy_pin: 24,
        }
    }
}

impl Default for StopsConfig {
    fn default() -> Self {
        let titles = [
            ("14411", "30 - North Beach"),
            ("15273", "28 - Presidio"),
            ("15272", "43 - Panhandle"),
            ("13858", "1 - California"),
        ];
        StopsConfig {
            ids: ["14411", "15273", "15272", "13858"].map(String::from),
            titles: titles
                .into_iter()
                .map(|(id, title)| (id.to_string(), title.to_string()))
                .collect(),
        }
    }
}

impl StopsConfig {
    /// Title for a stop code, or the generated `"Stop <id>"` label.
    pub fn title_for(&self, stop_id: &str) -> String {
        self.titles
            .get(stop_id)
            .cloned()
            .unwrap_or_else(|| format!("Stop {stop_id}"))
    }
}

impl DisplayConfig {
    /// Parse the configured timezone name
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Timezone {
                name: self.timezone.clone(),
                reason: e.to_string(),
            })
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Config {
    /// Load `transit-board.toml` and overlay `.env` and the process environment.
    pub fn load() -> Self {
        Self::load_from_files(CONFIG_FILE, DOTENV_FILE, |key| std::env::var(key).ok())
    }

    /// Load a config file, then overlay `process_env`, falling back to the
    /// values in `dotenv_path` for keys the process does not set.
    pub fn load_from_files<P, Q, F>(config_path: P, dotenv_path: Q, process_env: F) -> Self
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_from_path(config_path);
        let dotenv = read_dotenv(dotenv_path);
        config.apply_env(|key| process_env(key).or_else(|| dotenv.get(key).cloned()));
        config
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.as_ref().display(), "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!("invalid config file format: {e}; using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!("no config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Overlay environment variables onto the loaded configuration.
    ///
    /// Recognised keys: `API_KEY`, `STOPID1`..`STOPID4`, `W_API_KEY`, `LAT`,
    /// `LONG`. Values are taken as-is; nothing is validated here; a bad key
    /// or coordinate shows up as a failed fetch on the panel.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("API_KEY") {
            self.transit.api_key = key;
        }
        for (index, slot) in self.stops.ids.iter_mut().enumerate() {
            if let Some(id) = lookup(&format!("STOPID{}", index + 1)) {
                *slot = id;
            }
        }
        if let Some(key) = lookup("W_API_KEY") {
            self.weather.api_key = key;
        }
        if let Some(lat) = lookup("LAT") {
            self.weather.latitude = lat;
        }
        if let Some(lon) = lookup("LONG") {
            self.weather.longitude = lon;
        }

        if self.transit.api_key.is_empty() {
            warn!("API_KEY is not set; arrivals requests will fail");
        }
        if self.weather.api_key.is_empty() {
            warn!("W_API_KEY is not set; weather requests will fail");
        }
    }
}

/// Read `KEY=value` pairs from a dotenv file without touching the process
/// environment. A missing file yields nothing; malformed lines are skipped.
pub fn read_dotenv<P: AsRef<Path>>(path: P) -> BTreeMap<String, String> {
    let path = path.as_ref();
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %path.display(), "no dotenv file loaded: {e}");
            return BTreeMap::new();
        }
    };

    let vars: BTreeMap<String, String> = entries
        .filter_map(|entry| match entry {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!(path = %path.display(), "skipping dotenv entry: {e}");
                None
            }
        })
        .collect();
    debug!(path = %path.display(), count = vars.len(), "loaded dotenv file");
    vars
}
