//! # Transit Board Core Library
//!
//! This library provides the data types and building blocks for a small
//! e-ink board that shows upcoming bus arrivals for four stops next to the
//! current time and weather. It targets a Raspberry Pi driving a Waveshare
//! 7.5" bitonal panel, but everything except the hardware sink also runs on a
//! desktop for development.
//!
//! ## Refresh Cycle
//!
//! One cycle is a complete fetch-render-display pass:
//! 1. **Capture**: read the wall clock once, before any request goes out
//! 2. **Fetch**: weather plus arrivals for the four configured stops
//! 3. **Compose**: build the banner and the 2×2 grid of stop panels
//! 4. **Draw**: rasterise the layout into a bitonal [`frame::Frame`]
//! 5. **Display**: hand the frame to a [`display::DisplaySink`]
//!
//! Nothing carries over between cycles except the static [`config::Config`].
//!
//! ## Partial Failure
//!
//! A failing data source never aborts the cycle. Fetch results are tagged
//! ([`ArrivalResult`], [`WeatherResult`]) and turn into placeholder text only
//! at the display edge, so a viewer can tell from the panel alone which
//! subsystem failed.

use std::fmt;

// Module declarations
pub mod config;
pub mod cycle;
pub mod display;
pub mod frame;
pub mod renderer;
pub mod transit;
pub mod weather;

/// Number of stop panels on the board (2 columns × 2 rows).
pub const STOP_COUNT: usize = 4;

/// Text shown in place of arrivals when a stop has no upcoming visits.
pub const NO_ARRIVALS: &str = "No arrivals found";

/// Upcoming arrivals for one stop, as fetched during a single cycle.
///
/// The variants keep "nothing scheduled" apart from "could not fetch",
/// even though both end up as a single line of text on the panel.
///
/// # Example
/// ```
/// use transit_board_lib::ArrivalResult;
///
/// let empty = ArrivalResult::NoArrivals;
/// assert_eq!(empty.display_lines(), vec!["No arrivals found".to_string()]);
///
/// let failed = ArrivalResult::Failed("HTTP 503".into());
/// assert_eq!(failed.display_lines(), vec!["Error: HTTP 503".to_string()]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrivalResult {
    /// Local 12-hour clock strings, soonest first (e.g. `"09:33 AM"`)
    Upcoming(Vec<String>),
    /// The feed answered but listed no visits for the stop
    NoArrivals,
    /// Transport, status, decode or timestamp failure
    Failed(String),
}

impl ArrivalResult {
    /// Lines to draw for this stop. Never empty.
    pub fn display_lines(&self) -> Vec<String> {
        match self {
            ArrivalResult::Upcoming(times) if !times.is_empty() => times.clone(),
            ArrivalResult::Upcoming(_) | ArrivalResult::NoArrivals => vec![NO_ARRIVALS.to_string()],
            ArrivalResult::Failed(reason) => vec![format!("Error: {reason}")],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ArrivalResult::Failed(_))
    }
}

/// Current conditions for the configured coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum WeatherResult {
    /// Temperature in whole degrees Fahrenheit (truncated) and condition text
    Available { temp_f: i32, description: String },
    /// The weather feed could not be used this cycle
    Unavailable(String),
}

impl fmt::Display for WeatherResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherResult::Available {
                temp_f,
                description,
            } => write!(f, "{temp_f}°F {description}"),
            WeatherResult::Unavailable(_) => f.write_str("Weather unavailable"),
        }
    }
}
