//! # Art Matrix Core Library
//!
//! This library provides the foundational data structures and constants for the
//! album art matrix: a small networked device that shows the artwork of the track
//! currently playing on a 64×64 RGB LED panel.
//!
//! ## Display Contract
//!
//! The panel geometry and pixel format are fixed at compile time:
//! - **Width / height**: [`DISPLAY_WIDTH`] × [`DISPLAY_HEIGHT`] = 64 × 64 pixels
//! - **Pixel format**: [`IMAGE_MODE`] = 888, i.e. 8 bits per channel, R then G then B
//! - **Framebuffer**: exactly [`FRAMEBUFFER_LEN`] = 12,288 bytes, rows top to bottom
//!
//! Changing any of the three constants changes the framebuffer size and the
//! payload length expected from the art endpoint, so they move together.
//!
//! ## Injected Values
//!
//! The Wi-Fi credentials and the two service URLs are never compiled in. They
//! are loaded from a configuration file kept out of version control (see
//! [`config`]) and travel inside a [`framebuffer::DeviceContext`] together with
//! the one framebuffer the process owns.
//!
//! ## Data Flow
//! 1. **Online**: fetch art payload → decode into framebuffer → cache → display
//! 2. **Offline**: load the cached frame, or the placeholder frame → display
//! 3. **Idle**: the server answers with a zero-filled payload → black panel

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod art_data;
pub mod codec;
pub mod config;
pub mod fallback;
pub mod framebuffer;
pub mod renderer;
pub mod watchdog;

/// Panel width in pixels.
pub const DISPLAY_WIDTH: usize = 64;

/// Panel height in pixels.
pub const DISPLAY_HEIGHT: usize = 64;

/// Pixel format identifier of the framebuffer (8-8-8 bits per RGB channel).
pub const IMAGE_MODE: u16 = 888;

/// Bytes per pixel in the framebuffer.
pub const BYTES_PER_PIXEL: usize = 3;

/// Total framebuffer length in bytes.
pub const FRAMEBUFFER_LEN: usize = BYTES_PER_PIXEL * DISPLAY_WIDTH * DISPLAY_HEIGHT;

const _: () = assert!(FRAMEBUFFER_LEN == 3 * DISPLAY_WIDTH * DISPLAY_HEIGHT);
const _: () = assert!(FRAMEBUFFER_LEN == 12_288);

/// Pixel encodings the art endpoint can serve.
///
/// The framebuffer is always RGB888; an RGB565 payload is expanded while
/// decoding (see [`codec`]).
///
/// # Example
/// ```
/// use art_matrix_lib::{ImageMode, IMAGE_MODE};
///
/// assert_eq!(ImageMode::DEFAULT.code(), IMAGE_MODE);
/// assert_eq!(ImageMode::from_code(565), Some(ImageMode::Rgb565));
/// assert_eq!(ImageMode::Rgb888.payload_len(), 12_288);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum ImageMode {
    /// 8 bits red, 8 bits green, 8 bits blue
    Rgb888,
    /// 5 bits red, 6 bits green, 5 bits blue, big-endian words
    Rgb565,
}

impl ImageMode {
    /// The mode matching [`IMAGE_MODE`].
    pub const DEFAULT: ImageMode = ImageMode::Rgb888;

    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            888 => Some(ImageMode::Rgb888),
            565 => Some(ImageMode::Rgb565),
            _ => None,
        }
    }

    pub const fn code(self) -> u16 {
        match self {
            ImageMode::Rgb888 => 888,
            ImageMode::Rgb565 => 565,
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            ImageMode::Rgb888 => 3,
            ImageMode::Rgb565 => 2,
        }
    }

    /// Length in bytes of a full-panel payload in this mode.
    pub const fn payload_len(self) -> usize {
        self.bytes_per_pixel() * DISPLAY_WIDTH * DISPLAY_HEIGHT
    }
}

impl Default for ImageMode {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u16> for ImageMode {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        ImageMode::from_code(code).ok_or_else(|| format!("unsupported image mode {code}"))
    }
}

impl From<ImageMode> for u16 {
    fn from(mode: ImageMode) -> Self {
        mode.code()
    }
}

impl fmt::Display for ImageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// What the player is doing right now.
///
/// Built from the track endpoint's three-line answer. When nothing is
/// playing the server still answers, with `playing = false` and a suggested
/// wait in `remaining`.
///
/// # Example
/// ```
/// use art_matrix_lib::TrackInfo;
/// use std::time::Duration;
///
/// let track = TrackInfo {
///     name: "Windowlicker".to_string(),
///     artists: vec!["Aphex Twin".to_string()],
///     remaining: Duration::from_millis(90_000),
///     playing: true,
/// };
/// assert_eq!(track.to_string(), "Windowlicker - Aphex Twin");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Track title
    pub name: String,
    /// Artist names in the order the service lists them
    pub artists: Vec<String>,
    /// Time until the track ends (or until the next poll when idle)
    pub remaining: Duration,
    /// False when the service reports nothing playing
    pub playing: bool,
}

impl fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artists.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} - {}", self.name, self.artists.join(", "))
        }
    }
}
