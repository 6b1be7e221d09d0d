//! Display sinks
//!
//! A [`DisplaySink`] is anything that can show a [`Frame`]: the Waveshare
//! 7.5" V2 panel (behind the `hardware` feature) or a PBM file for
//! development. The sink is wrapped in a [`DisplaySession`], which owns the
//! device for the whole process and puts the panel to sleep when dropped, on
//! both the normal and the error path.

use crate::frame::Frame;
use embedded_graphics::prelude::Size;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors reported by display sinks.
#[derive(Error, Debug)]
pub enum DisplayError {
    /// Frame does not match the panel's native resolution
    #[error("frame is {frame:?} but display is {display:?}")]
    SizeMismatch { frame: Size, display: Size },

    /// Writing the development output failed
    #[error("frame output: {0}")]
    Io(#[from] std::io::Error),

    /// SPI/GPIO or controller failure
    #[error("panel: {0}")]
    Hardware(String),
}

/// Lifecycle of a bitonal display device
pub trait DisplaySink {
    /// Native resolution in pixels
    fn size(&self) -> Size;
    /// Power up / wake the controller
    fn init(&mut self) -> Result<(), DisplayError>;
    /// Blank the panel to white
    fn clear(&mut self) -> Result<(), DisplayError>;
    /// Push a full frame and refresh
    fn display(&mut self, frame: &Frame) -> Result<(), DisplayError>;
    /// Enter deep sleep; the image stays on the panel
    fn sleep(&mut self) -> Result<(), DisplayError>;
}

/// Scoped ownership of a display sink.
///
/// Opening initialises and clears the device. The panel is put to sleep by
/// [`DisplaySession::rest`], [`DisplaySession::close`] or, failing those, on
/// drop.
pub struct DisplaySession<S: DisplaySink> {
    sink: S,
    asleep: bool,
}

impl<S: DisplaySink> DisplaySession<S> {
    pub fn open(mut sink: S) -> Result<Self, DisplayError> {
        sink.init()?;
        sink.clear()?;
        info!(size = ?sink.size(), "display ready");
        Ok(Self {
            sink,
            asleep: false,
        })
    }

    pub fn size(&self) -> Size {
        self.sink.size()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Show a frame, waking the panel first if it is resting.
    pub fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let display = self.sink.size();
        let frame_size = Size::new(frame.width(), frame.height());
        if frame_size != display {
            return Err(DisplayError::SizeMismatch {
                frame: frame_size,
                display,
            });
        }

        if self.asleep {
            debug!("waking display");
            self.sink.init()?;
            self.asleep = false;
        }
        self.sink.display(frame)
    }

    /// Put the panel to sleep between refreshes
    pub fn rest(&mut self) -> Result<(), DisplayError> {
        if !self.asleep {
            self.sink.sleep()?;
            self.asleep = true;
        }
        Ok(())
    }

    /// Sleep the panel and release the device, reporting any failure.
    pub fn close(mut self) -> Result<(), DisplayError> {
        self.rest()
    }
}

impl<S: DisplaySink> Drop for DisplaySession<S> {
    fn drop(&mut self) {
        if !self.asleep {
            if let Err(e) = self.sink.sleep() {
                warn!("failed to put display to sleep: {e}");
            }
            self.asleep = true;
        }
    }
}

/// Development sink that writes every frame to a PBM image.
pub struct PbmFileSink {
    path: PathBuf,
    size: Size,
}

impl PbmFileSink {
    pub fn new(path: impl Into<PathBuf>, size: Size) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

}

impl DisplaySink for PbmFileSink {
    fn size(&self) -> Size {
        self.size
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }

    fn display(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        fs::write(&self.path, frame.to_pbm())?;
        info!(path = %self.path.display(), "frame written");
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Waveshare 7.5" V2 (800×480) over spidev and gpio-cdev
#[cfg(all(target_os = "linux", feature = "hardware"))]
pub mod epd {
    use super::{DisplayError, DisplaySink};
    use crate::config::HardwareConfig;
    use crate::frame::Frame;
    use embedded_graphics::prelude::Size;
    use epd_waveshare::{
        epd7in5_v2::{Epd7in5, HEIGHT, WIDTH},
        prelude::*,
    };
    use linux_embedded_hal::{
        gpio_cdev::{Chip, LineRequestFlags},
        spidev::{SpiModeFlags, SpidevOptions},
        CdevPin, Delay, SpidevDevice,
    };
    use tracing::info;

    const CONSUMER: &str = "transit-board";

    type Panel = Epd7in5<SpidevDevice, CdevPin, CdevPin, CdevPin, Delay>;

    fn hw_err<E: core::fmt::Debug>(e: E) -> DisplayError {
        DisplayError::Hardware(format!("{e:?}"))
    }

    pub struct Epd7in5Sink {
        spi: SpidevDevice,
        delay: Delay,
        panel: Panel,
    }

    impl Epd7in5Sink {
        /// Claim the SPI device and the DC/RST/BUSY lines and reset the controller.
        pub fn open(hw: &HardwareConfig) -> Result<Self, DisplayError> {
            info!(
                spi = %hw.spi_device,
                dc = hw.dc_pin,
                rst = hw.rst_pin,
                busy = hw.busy_pin,
                "opening e-paper panel"
            );

            let mut spi = SpidevDevice::open(&hw.spi_device).map_err(hw_err)?;
            let options = SpidevOptions::new()
                .bits_per_word(8)
                .max_speed_hz(4_000_000)
                .mode(SpiModeFlags::SPI_MODE_0)
                .build();
            spi.configure(&options).map_err(hw_err)?;

            let mut chip = Chip::new(&hw.gpio_chip).map_err(hw_err)?;
            let mut line = |offset: u32, flags: LineRequestFlags| {
                let handle = chip
                    .get_line(offset)
                    .and_then(|l| l.request(flags, 0, CONSUMER))
                    .map_err(hw_err)?;
                CdevPin::new(handle).map_err(hw_err)
            };
            let busy = line(hw.busy_pin, LineRequestFlags::INPUT)?;
            let dc = line(hw.dc_pin, LineRequestFlags::OUTPUT)?;
            let rst = line(hw.rst_pin, LineRequestFlags::OUTPUT)?;

            let mut delay = Delay;
            let panel = Epd7in5::new(&mut spi, busy, dc, rst, &mut delay, None).map_err(hw_err)?;

            Ok(Self { spi, delay, panel })
        }
    }

    impl DisplaySink for Epd7in5Sink {
        fn size(&self) -> Size {
            Size::new(WIDTH, HEIGHT)
        }

        fn init(&mut self) -> Result<(), DisplayError> {
            self.panel
                .wake_up(&mut self.spi, &mut self.delay)
                .map_err(hw_err)
        }

        fn clear(&mut self) -> Result<(), DisplayError> {
            // Refreshes the panel on its own
            self.panel
                .clear_frame(&mut self.spi, &mut self.delay)
                .map_err(hw_err)
        }

        fn display(&mut self, frame: &Frame) -> Result<(), DisplayError> {
            self.panel
                .update_and_display_frame(&mut self.spi, frame.as_bytes(), &mut self.delay)
                .map_err(hw_err)
        }

        fn sleep(&mut self) -> Result<(), DisplayError> {
            self.panel
                .sleep(&mut self.spi, &mut self.delay)
                .map_err(hw_err)
        }
    }
}
