//! # Board Layout and Rendering
//!
//! The board is a banner with the clock and current weather, above a 2×2
//! grid of stop panels. Rendering happens in two steps:
//!
//! 1. [`BoardLayout::compose`] decides *what* goes *where*: banner text, panel
//!    titles, the arrival lines that survive truncation, and each panel's
//!    rectangle. It is a pure function of the cycle snapshot.
//! 2. [`draw_board`] rasterises a layout onto any embedded-graphics
//!    [`DrawTarget`] with [`BinaryColor`], normally a [`crate::frame::Frame`].
//!
//! [`draw_text`] renders the same layout as plain text for development
//! (`--stdout`), mirroring what the panel would show.
//!
//! ## Geometry (800×480 panel)
//!
//! ```text
//! y=0    ┌──────────────────────────────────────┐
//! y=40   │     09:33 AM | 68°F Partly cloudy    │  banner, centered
//! y=100  ├██████ title ██████┬██████ title ██████┤  40 px inverted bar
//!        │ 09:41 AM          │ 09:38 AM          │  3 lines, 30 px apart
//! y=290  ├██████ title ██████┼██████ title ██████┤
//!        │ ...               │ ...               │
//! y=480  └───────────────────┴───────────────────┘
//! ```

use crate::config::StopsConfig;
use crate::cycle::Snapshot;
use crate::transit::CLOCK_FORMAT;
use crate::WeatherResult;
use chrono::DateTime;
use chrono_tz::Tz;
use embedded_graphics::{
    mono_font::{
        iso_8859_1::{FONT_10X20, FONT_9X18_BOLD},
        MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

/// Vertical center of the banner text
pub const BANNER_CENTER_Y: i32 = 40;
/// Height reserved above the grid for the banner
pub const BANNER_HEIGHT: u32 = 100;
/// Height of the inverted title bar at the top of each panel
pub const TITLE_BAR_HEIGHT: u32 = 40;
/// Gap between the title bar and the first arrival line
pub const ARRIVAL_TOP_GAP: i32 = 5;
/// Distance between arrival line tops
pub const LINE_SPACING: i32 = 30;
/// Left inset of arrival lines inside a panel
pub const LEFT_MARGIN: i32 = 10;
/// Arrivals shown per stop; later ones are dropped
pub const MAX_ARRIVALS: usize = 3;

const GRID_COLUMNS: u32 = 2;
const GRID_ROWS: u32 = 2;

/// One stop panel in the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelLayout {
    pub stop_id: String,
    /// Configured title, or `"Stop <id>"`
    pub title: String,
    /// At most [`MAX_ARRIVALS`] lines, in received order
    pub lines: Vec<String>,
    /// Whole panel area, title bar included
    pub bounds: Rectangle,
}

impl PanelLayout {
    pub fn title_bar(&self) -> Rectangle {
        Rectangle::new(
            self.bounds.top_left,
            Size::new(self.bounds.size.width, TITLE_BAR_HEIGHT),
        )
    }

    /// Top-left anchor of arrival line `index`
    pub fn line_origin(&self, index: usize) -> Point {
        let top = self.bounds.top_left.y
            + TITLE_BAR_HEIGHT as i32
            + ARRIVAL_TOP_GAP
            + index as i32 * LINE_SPACING;
        Point::new(self.bounds.top_left.x + LEFT_MARGIN, top)
    }
}

/// Everything drawn in one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardLayout {
    pub size: Size,
    pub banner: String,
    /// Exactly four panels: top-left, top-right, bottom-left, bottom-right
    pub panels: Vec<PanelLayout>,
}

/// Banner text: local time, then weather or the unavailable fallback.
pub fn banner_text(now: &DateTime<Tz>, weather: &WeatherResult) -> String {
    format!("{} | {}", now.format(CLOCK_FORMAT), weather)
}

impl BoardLayout {
    /// Lay out one snapshot on a display of `size` pixels.
    pub fn compose(snapshot: &Snapshot, stops: &StopsConfig, size: Size) -> Self {
        let cell_width = size.width / GRID_COLUMNS;
        let cell_height = size.height.saturating_sub(BANNER_HEIGHT) / GRID_ROWS;

        let panels = snapshot
            .stops
            .iter()
            .enumerate()
            .map(|(index, stop)| {
                let column = index as u32 % GRID_COLUMNS;
                let row = index as u32 / GRID_COLUMNS;
                let top_left = Point::new(
                    (column * cell_width) as i32,
                    (BANNER_HEIGHT + row * cell_height) as i32,
                );

                let mut lines = stop.arrivals.display_lines();
                lines.truncate(MAX_ARRIVALS);

                PanelLayout {
                    stop_id: stop.stop_id.clone(),
                    title: stops.title_for(&stop.stop_id),
                    lines,
                    bounds: Rectangle::new(top_left, Size::new(cell_width, cell_height)),
                }
            })
            .collect();

        BoardLayout {
            size,
            banner: banner_text(&snapshot.now, &snapshot.weather),
            panels,
        }
    }
}

/// Draw a layout onto a bitonal target. The target is not cleared first.
///
/// Each panel is drawn clipped to its own bounds, so nothing one stop shows
/// can spill into a neighbour.
pub fn draw_board<D>(layout: &BoardLayout, target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let banner_style = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
    let title_style = MonoTextStyle::new(&FONT_9X18_BOLD, BinaryColor::Off);
    let line_style = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);

    let centered = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();
    let top_left = TextStyleBuilder::new()
        .alignment(Alignment::Left)
        .baseline(Baseline::Top)
        .build();

    Text::with_text_style(
        &layout.banner,
        Point::new(layout.size.width as i32 / 2, BANNER_CENTER_Y),
        banner_style,
        centered,
    )
    .draw(target)?;

    for panel in &layout.panels {
        // Long error lines are cut at the panel edge
        let mut cell = target.clipped(&panel.bounds);

        let bar = panel.title_bar();
        bar.into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut cell)?;

        Text::with_text_style(&panel.title, bar.center(), title_style, centered)
            .draw(&mut cell)?;

        for (index, line) in panel.lines.iter().enumerate() {
            Text::with_text_style(line, panel.line_origin(index), line_style, top_left)
                .draw(&mut cell)?;
        }
    }

    Ok(())
}

/// Render a layout as plain text, two panels per row.
pub fn draw_text(layout: &BoardLayout) -> String {
    const COLUMN_WIDTH: usize = 34;
    let mut out = String::new();

    out.push_str(&format!("{:^width$}\n\n", layout.banner, width = COLUMN_WIDTH * 2 + 3));

    for row in layout.panels.chunks(GRID_COLUMNS as usize) {
        let titles: Vec<String> = row
            .iter()
            .map(|p| format!("[{:^width$}]", p.title, width = COLUMN_WIDTH - 2))
            .collect();
        out.push_str(&titles.join(" | "));
        out.push('\n');

        for index in 0..MAX_ARRIVALS {
            let cells: Vec<String> = row
                .iter()
                .map(|p| {
                    let line = p.lines.get(index).map(String::as_str).unwrap_or("");
                    format!("  {:<width$}", line, width = COLUMN_WIDTH - 2)
                })
                .collect();
            out.push_str(cells.join(" | ").trim_end());
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::StopArrivals;
    use crate::frame::Frame;
    use crate::ArrivalResult;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;

    fn upcoming(times: &[&str]) -> ArrivalResult {
        ArrivalResult::Upcoming(times.iter().map(|t| t.to_string()).collect())
    }

    fn snapshot(weather: WeatherResult) -> Snapshot {
        Snapshot {
            // 2024-01-01 12:33 PST
            now: Los_Angeles.with_ymd_and_hms(2024, 1, 1, 12, 33, 0).unwrap(),
            weather,
            stops: [
                StopArrivals::new(
                    "14411",
                    upcoming(&["12:40 PM", "12:52 PM", "01:04 PM", "01:16 PM", "01:28 PM"]),
                ),
                StopArrivals::new("15273", ArrivalResult::NoArrivals),
                StopArrivals::new("99999", ArrivalResult::Failed("HTTP 500".into())),
                StopArrivals::new("13858", upcoming(&["12:35 PM"])),
            ],
        }
    }

    fn sunny() -> WeatherResult {
        WeatherResult::Available {
            temp_f: 68,
            description: "Partly cloudy".into(),
        }
    }

    fn layout(weather: WeatherResult) -> BoardLayout {
        BoardLayout::compose(
            &snapshot(weather),
            &StopsConfig::default(),
            Size::new(800, 480),
        )
    }

    #[test]
    fn test_banner_with_weather() {
        assert_eq!(layout(sunny()).banner, "12:33 PM | 68°F Partly cloudy");
    }

    #[test]
    fn test_banner_without_weather() {
        let layout = layout(WeatherResult::Unavailable("timeout".into()));
        assert_eq!(layout.banner, "12:33 PM | Weather unavailable");
    }

    #[test]
    fn test_grid_has_four_panels_in_configured_order() {
        let layout = layout(sunny());
        let ids: Vec<&str> = layout.panels.iter().map(|p| p.stop_id.as_str()).collect();
        assert_eq!(ids, vec!["14411", "15273", "99999", "13858"]);

        let origins: Vec<Point> = layout.panels.iter().map(|p| p.bounds.top_left).collect();
        assert_eq!(
            origins,
            vec![
                Point::new(0, 100),
                Point::new(400, 100),
                Point::new(0, 290),
                Point::new(400, 290),
            ]
        );
        assert!(layout
            .panels
            .iter()
            .all(|p| p.bounds.size == Size::new(400, 190)));
    }

    #[test]
    fn test_only_first_three_arrivals_are_kept() {
        let layout = layout(sunny());
        assert_eq!(
            layout.panels[0].lines,
            vec!["12:40 PM", "12:52 PM", "01:04 PM"]
        );
        assert_eq!(layout.panels[3].lines, vec!["12:35 PM"]);
    }

    #[test]
    fn test_placeholder_lines() {
        let layout = layout(sunny());
        assert_eq!(layout.panels[1].lines, vec!["No arrivals found"]);
        assert_eq!(layout.panels[2].lines, vec!["Error: HTTP 500"]);
    }

    #[test]
    fn test_titles_and_fallback_label() {
        let layout = layout(sunny());
        assert_eq!(layout.panels[0].title, "30 - North Beach");
        assert_eq!(layout.panels[2].title, "Stop 99999");
    }

    #[test]
    fn test_line_origins() {
        let layout = layout(sunny());
        let panel = &layout.panels[1];
        assert_eq!(panel.line_origin(0), Point::new(410, 145));
        assert_eq!(panel.line_origin(2), Point::new(410, 205));
    }

    #[test]
    fn test_draw_board_inverts_title_bars() {
        let layout = layout(sunny());
        let mut frame = Frame::new(800, 480);
        draw_board(&layout, &mut frame).unwrap();

        for panel in &layout.panels {
            let bar = panel.title_bar();
            let area = (bar.size.width * bar.size.height) as usize;
            // Mostly ink, with white title glyphs punched out
            let ink = frame.ink_in(&bar);
            assert!(ink > area * 3 / 4, "title bar should be filled");
            assert!(ink < area, "title text should be visible on the bar");
        }

        let banner = Rectangle::new(Point::zero(), Size::new(800, BANNER_HEIGHT));
        assert!(frame.ink_in(&banner) > 0, "banner text should be drawn");
    }

    #[test]
    fn test_draw_board_stops_after_three_lines() {
        let layout = layout(sunny());
        let mut frame = Frame::new(800, 480);
        draw_board(&layout, &mut frame).unwrap();

        let panel = &layout.panels[0];
        let first = Rectangle::new(panel.line_origin(0), Size::new(380, 20));
        let fourth = Rectangle::new(panel.line_origin(3), Size::new(380, 20));
        assert!(frame.ink_in(&first) > 0);
        assert_eq!(frame.ink_in(&fourth), 0);
    }

    #[test]
    fn test_long_error_line_stays_in_its_panel() {
        let ok = layout(sunny());
        let mut failed = ok.clone();
        failed.panels[0].lines = ArrivalResult::Failed(
            "HTTP error: HTTP status server error (500 Internal Server Error)".into(),
        )
        .display_lines();

        let mut ok_frame = Frame::new(800, 480);
        draw_board(&ok, &mut ok_frame).unwrap();
        let mut failed_frame = Frame::new(800, 480);
        draw_board(&failed, &mut failed_frame).unwrap();

        // The error line is wider than its cell and gets cut at the edge
        let left = failed.panels[0].bounds;
        let edge = Rectangle::new(
            left.top_left + Point::new(left.size.width as i32 - 40, TITLE_BAR_HEIGHT as i32),
            Size::new(40, 30),
        );
        assert!(failed_frame.ink_in(&edge) > 0);

        for panel in &failed.panels[1..] {
            assert_eq!(
                failed_frame.ink_in(&panel.bounds),
                ok_frame.ink_in(&panel.bounds),
                "panel {} changed",
                panel.stop_id
            );
        }
    }

    #[test]
    fn test_text_preview_contains_everything() {
        let text = draw_text(&layout(sunny()));
        assert!(text.contains("12:33 PM | 68°F Partly cloudy"));
        assert!(text.contains("30 - North Beach"));
        assert!(text.contains("Stop 99999"));
        assert!(text.contains("No arrivals found"));
        assert!(!text.contains("01:16 PM"));
    }
}
