//! # Fallback Frames
//!
//! What the panel shows when the art endpoint cannot be reached and no recent
//! frame is cached, plus the "nothing playing" record the server sends when the
//! player is idle.
//!
//! The placeholder is quiet: a black panel with a dim one-pixel
//! border and a small dim marker in the top-right corner, so a dark room is not
//! lit up by an error screen while the network comes back.

use crate::framebuffer::FrameBuffer;
use crate::{TrackInfo, DISPLAY_HEIGHT, DISPLAY_WIDTH};
use std::time::Duration;

/// Track name the server reports when nothing is playing.
pub const IDLE_TRACK_NAME: &str = "nothing playing";

/// Suggested wait the server attaches to the idle answer.
pub const IDLE_WAIT: Duration = Duration::from_millis(3_000);

const BORDER: [u8; 3] = [0x10, 0x10, 0x10];
const MARKER: [u8; 3] = [0x30, 0x08, 0x00];

/// The idle record.
pub fn idle_track() -> TrackInfo {
    TrackInfo {
        name: IDLE_TRACK_NAME.to_string(),
        artists: Vec::new(),
        remaining: IDLE_WAIT,
        playing: false,
    }
}

/// Offline placeholder frame.
pub fn placeholder() -> FrameBuffer {
    let mut frame = FrameBuffer::new();

    for x in 0..DISPLAY_WIDTH {
        frame.set_pixel(x, 0, BORDER);
        frame.set_pixel(x, DISPLAY_HEIGHT - 1, BORDER);
    }
    for y in 0..DISPLAY_HEIGHT {
        frame.set_pixel(0, y, BORDER);
        frame.set_pixel(DISPLAY_WIDTH - 1, y, BORDER);
    }

    // 3x3 marker, two pixels in from the top-right corner
    for y in 3..6 {
        for x in DISPLAY_WIDTH - 6..DISPLAY_WIDTH - 3 {
            frame.set_pixel(x, y, MARKER);
        }
    }

    frame
}
