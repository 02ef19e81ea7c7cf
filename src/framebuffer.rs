//! RGB888 framebuffer for the 64×64 matrix and the device context that owns it.
//!
//! The process has exactly one [`FrameBuffer`], held by a [`DeviceContext`].
//! The image decoder writes it through `&mut` and the renderer reads it through
//! `&`, so the borrow checker serialises the two instead of a lock or a global.

use crate::{
    codec, config::Config, ImageMode, TrackInfo, BYTES_PER_PIXEL, DISPLAY_HEIGHT, DISPLAY_WIDTH,
    FRAMEBUFFER_LEN,
};
use embedded_graphics::{
    pixelcolor::{Rgb888, RgbColor},
    prelude::*,
};
use thiserror::Error;

/// One pixel as `[r, g, b]`.
pub type Rgb = [u8; 3];

/// Errors raised while loading a payload into the framebuffer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Payload length does not match the panel size for its mode
    #[error("payload is {actual} bytes, expected {expected} for mode {mode}")]
    Length {
        mode: ImageMode,
        expected: usize,
        actual: usize,
    },
}

/// Fixed-size RGB888 framebuffer, row-major, top-left origin.
///
/// The storage is a boxed array, so its length is part of the type and can
/// never drift from [`FRAMEBUFFER_LEN`]. The type is not `Clone`;
/// use [`FrameBuffer::snapshot`] when a copy is really wanted.
pub struct FrameBuffer {
    data: Box<[u8; FRAMEBUFFER_LEN]>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self
            .data
            .chunks_exact(BYTES_PER_PIXEL)
            .filter(|px| px.iter().any(|&c| c != 0))
            .count();
        f.debug_struct("FrameBuffer")
            .field("width", &DISPLAY_WIDTH)
            .field("height", &DISPLAY_HEIGHT)
            .field("lit_pixels", &lit)
            .finish()
    }
}

impl FrameBuffer {
    /// Creates a zero-initialised (black) framebuffer.
    pub fn new() -> Self {
        Self {
            data: Box::new([0; FRAMEBUFFER_LEN]),
        }
    }

    /// Builds a framebuffer from a payload in `mode`.
    pub fn from_payload(payload: &[u8], mode: ImageMode) -> Result<Self, FrameError> {
        let mut frame = Self::new();
        frame.load(payload, mode)?;
        Ok(frame)
    }

    /// Explicit copy of the current contents.
    pub fn snapshot(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }

    /// Returns the raw RGB888 bytes.
    pub fn as_bytes(&self) -> &[u8; FRAMEBUFFER_LEN] {
        &self.data
    }

    /// Returns the raw RGB888 bytes for writing.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; FRAMEBUFFER_LEN] {
        &mut self.data
    }

    fn offset(x: usize, y: usize) -> Option<usize> {
        (x < DISPLAY_WIDTH && y < DISPLAY_HEIGHT)
            .then(|| (y * DISPLAY_WIDTH + x) * BYTES_PER_PIXEL)
    }

    /// Reads a pixel; `None` outside the panel.
    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        let i = Self::offset(x, y)?;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Writes a pixel. Coordinates outside the panel are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: Rgb) {
        if let Some(i) = Self::offset(x, y) {
            self.data[i..i + BYTES_PER_PIXEL].copy_from_slice(&rgb);
        }
    }

    /// Fills every pixel with one colour.
    pub fn fill(&mut self, rgb: Rgb) {
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgb);
        }
    }

    /// Back to black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// True when every byte is zero, which is what the server sends when idle.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Replaces the contents with a decoded payload.
    ///
    /// The payload must be exactly `mode.payload_len()` bytes. On error the
    /// framebuffer is left untouched.
    pub fn load(&mut self, payload: &[u8], mode: ImageMode) -> Result<(), FrameError> {
        codec::decode_into(payload, mode, self)
    }

    /// Encodes the contents in `mode`.
    pub fn encode(&self, mode: ImageMode) -> Vec<u8> {
        codec::encode(&self.data, mode)
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(
                    point.x as usize,
                    point.y as usize,
                    [color.r(), color.g(), color.b()],
                );
            }
        }
        Ok(())
    }
}

/// Everything the update loop works on: the injected configuration, the single
/// framebuffer, and the last known track.
#[derive(Debug)]
pub struct DeviceContext {
    config: Config,
    frame: FrameBuffer,
    /// Last track reported by the service
    pub track: Option<TrackInfo>,
    /// True while the frame on screen did not come from the art endpoint
    pub offline: bool,
}

impl DeviceContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            frame: FrameBuffer::new(),
            track: None,
            offline: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut FrameBuffer {
        &mut self.frame
    }

    /// Swaps in a fully built frame, e.g. the cached or placeholder one.
    pub fn replace_frame(&mut self, frame: FrameBuffer) {
        self.frame = frame;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn new_frame_is_zeroed_and_sized() {
        let frame = FrameBuffer::new();
        assert_eq!(frame.as_bytes().len(), 12_288);
        assert!(frame.is_blank());
    }

    #[test]
    fn set_and_read_pixel() {
        let mut frame = FrameBuffer::new();
        frame.set_pixel(63, 63, [1, 2, 3]);
        assert_eq!(frame.pixel(63, 63), Some([1, 2, 3]));
        let bytes = frame.as_bytes();
        assert_eq!(&bytes[FRAMEBUFFER_LEN - 3..], &[1, 2, 3]);
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut frame = FrameBuffer::new();
        frame.set_pixel(64, 0, [255, 255, 255]);
        frame.set_pixel(0, 64, [255, 255, 255]);
        assert!(frame.is_blank());
        assert_eq!(frame.pixel(64, 0), None);
    }

    #[test]
    fn short_payload_leaves_frame_untouched() {
        let mut frame = FrameBuffer::new();
        frame.fill([9, 9, 9]);
        let err = frame.load(&[0u8; 100], ImageMode::Rgb888).unwrap_err();
        assert_eq!(
            err,
            FrameError::Length {
                mode: ImageMode::Rgb888,
                expected: 12_288,
                actual: 100,
            }
        );
        assert_eq!(frame.pixel(10, 10), Some([9, 9, 9]));
    }

    #[test]
    fn raw_writes_show_up_as_pixels() {
        let mut frame = FrameBuffer::new();
        frame.as_bytes_mut()[3..6].copy_from_slice(&[4, 5, 6]);
        assert_eq!(frame.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(frame.encode(ImageMode::Rgb888), frame.as_bytes().to_vec());
    }

    #[test]
    fn snapshot_is_independent() {
        let mut frame = FrameBuffer::new();
        let copy = frame.snapshot();
        frame.fill([1, 1, 1]);
        assert!(copy.is_blank());
        assert!(!frame.is_blank());
    }

    #[test]
    fn draws_with_embedded_graphics() {
        let mut frame = FrameBuffer::new();
        Rectangle::new(Point::new(-2, -2), Size::new(4, 4))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::RED))
            .draw(&mut frame)
            .unwrap();
        assert_eq!(frame.pixel(0, 0), Some([255, 0, 0]));
        assert_eq!(frame.pixel(1, 1), Some([255, 0, 0]));
        assert_eq!(frame.pixel(2, 2), Some([0, 0, 0]));
    }
}
