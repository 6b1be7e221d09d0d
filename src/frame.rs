//! Bitonal frame buffer
//!
//! A packed 1-bit-per-pixel raster laid out the way the 7.5" V2 controller
//! takes it: rows of bytes, most significant bit first, a set bit meaning
//! black. A blank frame is all `0x00`. PBM uses the same convention, so the
//! bytes go to the panel and into the image file unchanged.
//!
//! The frame implements [`DrawTarget`] so the renderer can draw into it with
//! embedded-graphics.

use embedded_graphics::{pixelcolor::BinaryColor, prelude::*, primitives::Rectangle};

/// In-memory raster for one cycle. `BinaryColor::On` is ink (black).
#[derive(Clone, Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl Frame {
    /// Create an all-white frame
    pub fn new(width: u32, height: u32) -> Self {
        // Each row has (width+7)/8 bytes, total height rows
        let bytes_per_row = width.div_ceil(8);
        let buffer_size = (bytes_per_row * height) as usize;
        Self {
            width,
            height,
            buffer: vec![0x00; buffer_size], // White by default
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed rows, MSB first, 1 = black
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn fill(&mut self, color: BinaryColor) {
        let byte = match color {
            BinaryColor::Off => 0x00,
            BinaryColor::On => 0xFF,
        };
        self.buffer.fill(byte);
    }

    /// Read back one pixel; `None` outside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<BinaryColor> {
        let (index, mask) = self.locate(x, y)?;
        if self.buffer[index] & mask != 0 {
            Some(BinaryColor::On)
        } else {
            Some(BinaryColor::Off)
        }
    }

    /// Count black pixels inside a rectangle (clipped to the frame)
    pub fn ink_in(&self, area: &Rectangle) -> usize {
        let area = area.intersection(&self.bounding_box());
        area.points()
            .filter(|p| self.pixel(p.x as u32, p.y as u32) == Some(BinaryColor::On))
            .count()
    }

    /// Total number of black pixels
    pub fn ink_count(&self) -> usize {
        self.ink_in(&self.bounding_box())
    }

    /// Encode as a binary PBM (P4) image
    pub fn to_pbm(&self) -> Vec<u8> {
        let mut out = format!("P4\n{} {}\n", self.width, self.height).into_bytes();
        out.extend_from_slice(&self.buffer);
        // Keep row padding bits at zero as the format asks
        let bytes_per_row = self.width.div_ceil(8) as usize;
        let pad = (bytes_per_row * 8) as u32 - self.width;
        if pad > 0 {
            let header = out.len() - self.buffer.len();
            let keep = 0xFFu8 << pad;
            for row in out[header..].chunks_mut(bytes_per_row) {
                if let Some(last) = row.last_mut() {
                    *last &= keep;
                }
            }
        }
        out
    }

    fn locate(&self, x: u32, y: u32) -> Option<(usize, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bytes_per_row = self.width.div_ceil(8);
        let byte_index = (y * bytes_per_row + x / 8) as usize;
        let bit_mask = 0x80 >> (x % 8);
        Some((byte_index, bit_mask))
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: BinaryColor) {
        let Some((index, mask)) = self.locate(x, y) else {
            return;
        };
        match color {
            BinaryColor::Off => self.buffer[index] &= !mask,
            BinaryColor::On => self.buffer[index] |= mask,
        }
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            self.set_pixel(point.x as u32, point.y as u32, color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::PrimitiveStyle;

    #[test]
    fn test_new_frame_is_white() {
        let frame = Frame::new(800, 480);
        assert_eq!(frame.as_bytes().len(), 100 * 480);
        assert_eq!(frame.ink_count(), 0);
        assert_eq!(frame.pixel(0, 0), Some(BinaryColor::Off));
        assert_eq!(frame.pixel(800, 0), None);
    }

    #[test]
    fn test_panel_bytes_use_set_bit_for_black() {
        let mut frame = Frame::new(16, 2);
        assert!(frame.as_bytes().iter().all(|&b| b == 0x00));

        Pixel(Point::new(0, 0), BinaryColor::On)
            .draw(&mut frame)
            .unwrap();
        Pixel(Point::new(9, 1), BinaryColor::On)
            .draw(&mut frame)
            .unwrap();
        assert_eq!(frame.as_bytes(), &[0x80, 0x00, 0x00, 0x40]);

        Pixel(Point::new(0, 0), BinaryColor::Off)
            .draw(&mut frame)
            .unwrap();
        assert_eq!(frame.as_bytes()[0], 0x00);
    }

    #[test]
    fn test_filled_rectangle_sets_exact_pixels() {
        let mut frame = Frame::new(20, 10);
        Rectangle::new(Point::new(2, 3), Size::new(5, 4))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut frame)
            .unwrap();

        assert_eq!(frame.ink_count(), 20);
        assert_eq!(frame.pixel(2, 3), Some(BinaryColor::On));
        assert_eq!(frame.pixel(6, 6), Some(BinaryColor::On));
        assert_eq!(frame.pixel(7, 6), Some(BinaryColor::Off));
        assert_eq!(
            frame.ink_in(&Rectangle::new(Point::new(0, 0), Size::new(4, 10))),
            8
        );
    }

    #[test]
    fn test_drawing_outside_is_clipped() {
        let mut frame = Frame::new(8, 8);
        Rectangle::new(Point::new(-4, -4), Size::new(6, 6))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut frame)
            .unwrap();
        assert_eq!(frame.ink_count(), 4);
    }

    #[test]
    fn test_pbm_header_and_padding() {
        let mut frame = Frame::new(10, 2);
        frame.fill(BinaryColor::On);
        let pbm = frame.to_pbm();
        let header = b"P4\n10 2\n";
        assert_eq!(&pbm[..header.len()], header);
        // 10 px wide -> 2 bytes per row, last 6 bits are padding
        assert_eq!(&pbm[header.len()..], &[0xFF, 0xC0, 0xFF, 0xC0]);
    }
}
