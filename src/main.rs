//! # Transit Board Application Entry Point
//!
//! Wires configuration, the two data clients and a display sink together and
//! runs refresh cycles. It supports production mode (e-ink panel, or a PBM
//! file when built without the `hardware` feature) and development mode
//! (`--stdout`, text preview only).
//!
//! ## Flags
//!
//! - `--stdout`: fetch once and print the board as text; no display is opened
//! - `--watch`: keep refreshing every `display.refresh_interval_secs` until
//!   Ctrl+C instead of exiting after one cycle

#[cfg(test)]
mod tests;

use anyhow::Context;
use embedded_graphics::prelude::Size;
use std::env;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use transit_board_lib::{
    config::Config,
    cycle::Cycle,
    display::{DisplaySession, DisplaySink},
    renderer::draw_text,
    transit::TransitClient,
    weather::WeatherClient,
};

/// Open the display this build drives.
#[cfg(all(target_os = "linux", feature = "hardware"))]
fn open_sink(config: &Config) -> anyhow::Result<impl DisplaySink> {
    use transit_board_lib::display::epd::Epd7in5Sink;

    Epd7in5Sink::open(&config.display.hardware).context("e-paper panel unavailable")
}

/// Open the display this build drives.
#[cfg(not(all(target_os = "linux", feature = "hardware")))]
fn open_sink(config: &Config) -> anyhow::Result<impl DisplaySink> {
    use transit_board_lib::display::PbmFileSink;

    info!(
        path = %config.display.output_path.display(),
        "built without panel support; writing frames to a PBM file"
    );
    Ok(PbmFileSink::new(
        &config.display.output_path,
        Size::new(config.display.width, config.display.height),
    ))
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .init();

    let development_mode = env::args().any(|arg| arg == "--stdout");
    let watch = env::args().any(|arg| arg == "--watch");

    let config = Config::load();
    let tz = config.display.tz()?;

    let transit =
        TransitClient::new(&config.transit, tz).context("failed to build transit client")?;
    let weather = WeatherClient::new(&config.weather).context("failed to build weather client")?;
    let cycle = Cycle::new(&config, weather, transit)?;

    // Create Tokio runtime for the concurrent fetches
    let rt = tokio::runtime::Runtime::new()?;

    // Development mode: text preview, no display
    if development_mode {
        let size = Size::new(config.display.width, config.display.height);
        let layout = rt.block_on(cycle.preview(size));
        print!("{}", draw_text(&layout));
        return Ok(());
    }

    let mut session = DisplaySession::open(open_sink(&config)?)?;

    rt.block_on(async {
        if watch {
            let shutdown = async {
                // An error here means no handler could be installed; run until killed
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            cycle
                .watch(&mut session, config.display.refresh_interval(), shutdown)
                .await
                .map(|_| ())
        } else {
            cycle.run(&mut session).await.map(|_| ())
        }
    })?;

    session.close()?;
    info!("display updated");
    Ok(())
}
