//! # Refresh Cycle
//!
//! One cycle captures the wall clock, fetches weather and the four stops,
//! lays out and draws the frame, and pushes it to the display.
//!
//! The five requests run concurrently on the current task and are joined
//! before anything is drawn, so a slow stop no longer delays the others. The
//! clock is read once, before the first request goes out, and every part of
//! the frame is rendered against that single instant.
//!
//! Data sources sit behind [`WeatherSource`] and [`ArrivalSource`] so the
//! cycle can be exercised without the network.

use crate::config::Config;
use crate::display::{DisplaySession, DisplaySink};
use crate::frame::Frame;
use crate::renderer::{draw_board, BoardLayout};
use crate::{ArrivalResult, WeatherResult, STOP_COUNT};
use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use embedded_graphics::prelude::Size;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Shortest allowed period between cycles in watch mode
const MIN_REFRESH: Duration = Duration::from_secs(1);

/// Something that can report upcoming arrivals for a stop.
///
/// Failures are part of the result, never an error channel.
pub trait ArrivalSource {
    fn arrivals(&self, stop_id: &str) -> impl Future<Output = ArrivalResult> + Send;
}

/// Something that can report current weather.
pub trait WeatherSource {
    fn current(&self) -> impl Future<Output = WeatherResult> + Send;
}

/// Arrivals for one configured stop.
#[derive(Clone, Debug, PartialEq)]
pub struct StopArrivals {
    pub stop_id: String,
    pub arrivals: ArrivalResult,
}

impl StopArrivals {
    pub fn new(stop_id: impl Into<String>, arrivals: ArrivalResult) -> Self {
        Self {
            stop_id: stop_id.into(),
            arrivals,
        }
    }
}

/// Everything one frame is rendered from.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Wall clock captured before any fetch started
    pub now: DateTime<Tz>,
    pub weather: WeatherResult,
    /// In configured order
    pub stops: [StopArrivals; STOP_COUNT],
}

impl Snapshot {
    /// Number of failed sources, weather included
    pub fn failures(&self) -> usize {
        let weather = usize::from(matches!(self.weather, WeatherResult::Unavailable(_)));
        weather + self.stops.iter().filter(|s| s.arrivals.is_failed()).count()
    }
}

/// Fetch weather and all four stops concurrently, stamped with `now`.
pub async fn collect<W, A>(
    now: DateTime<Tz>,
    stop_ids: &[String; STOP_COUNT],
    weather: &W,
    transit: &A,
) -> Snapshot
where
    W: WeatherSource,
    A: ArrivalSource,
{
    let [first, second, third, fourth] = stop_ids;
    let (weather, a, b, c, d) = tokio::join!(
        weather.current(),
        transit.arrivals(first),
        transit.arrivals(second),
        transit.arrivals(third),
        transit.arrivals(fourth)
    );

    Snapshot {
        now,
        weather,
        stops: [
            StopArrivals::new(first.as_str(), a),
            StopArrivals::new(second.as_str(), b),
            StopArrivals::new(third.as_str(), c),
            StopArrivals::new(fourth.as_str(), d),
        ],
    }
}

/// Compose and rasterise a snapshot.
pub fn render(snapshot: &Snapshot, config: &Config, size: Size) -> (BoardLayout, Frame) {
    let layout = BoardLayout::compose(snapshot, &config.stops, size);
    let mut frame = Frame::new(size.width, size.height);
    // Drawing into a Frame cannot fail
    draw_board(&layout, &mut frame).unwrap_or_else(|never| match never {});
    (layout, frame)
}

/// Runs refresh cycles against one pair of data sources.
pub struct Cycle<'a, W, A> {
    config: &'a Config,
    tz: Tz,
    weather: W,
    transit: A,
}

impl<'a, W, A> Cycle<'a, W, A>
where
    W: WeatherSource,
    A: ArrivalSource,
{
    pub fn new(config: &'a Config, weather: W, transit: A) -> anyhow::Result<Self> {
        let tz = config.display.tz()?;
        Ok(Self {
            config,
            tz,
            weather,
            transit,
        })
    }

    /// Capture the clock now and fetch everything.
    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot_at(Utc::now()).await
    }

    /// Fetch everything, stamped with a given instant.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> Snapshot {
        let now = now.with_timezone(&self.tz);
        collect(now, &self.config.stops.ids, &self.weather, &self.transit).await
    }

    /// Fetch and lay out without touching a display (`--stdout`).
    pub async fn preview(&self, size: Size) -> BoardLayout {
        let snapshot = self.snapshot().await;
        BoardLayout::compose(&snapshot, &self.config.stops, size)
    }

    /// One full pass: fetch, render, display.
    pub async fn run<S: DisplaySink>(
        &self,
        session: &mut DisplaySession<S>,
    ) -> anyhow::Result<BoardLayout> {
        let snapshot = self.snapshot().await;
        self.present(&snapshot, session)
    }

    /// Render a snapshot and push it to the display.
    pub fn present<S: DisplaySink>(
        &self,
        snapshot: &Snapshot,
        session: &mut DisplaySession<S>,
    ) -> anyhow::Result<BoardLayout> {
        let failures = snapshot.failures();
        if failures > 0 {
            warn!(failures, "rendering with placeholder text for failed sources");
        }

        let (layout, frame) = render(snapshot, self.config, session.size());
        info!(banner = %layout.banner, ink = frame.ink_count(), "frame rendered");

        session.show(&frame).context("display update failed")?;
        Ok(layout)
    }

    /// Repeat [`Cycle::run`] every `every` until `shutdown` resolves.
    ///
    /// The panel rests between refreshes. Returns the number of completed
    /// cycles; a display failure ends the loop with an error.
    pub async fn watch<S, F>(
        &self,
        session: &mut DisplaySession<S>,
        every: Duration,
        shutdown: F,
    ) -> anyhow::Result<usize>
    where
        S: DisplaySink,
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(every.max(MIN_REFRESH));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut cycles = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(cycles, "stopping refresh loop");
                    return Ok(cycles);
                }
                _ = ticker.tick() => {}
            }

            self.run(session).await?;
            session.rest().context("display sleep failed")?;
            cycles += 1;
        }
    }
}
