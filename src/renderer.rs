//! # Frame Rendering
//!
//! This module prepares frames for the panel and renders them to the terminal.
//! The panel is usually mounted sideways, so frames are rotated in software
//! before they are handed to the matrix driver. The ASCII mode is for testing
//! on a desktop without the hardware attached.
//!
//! The matrix driver reads raw RGB888 frames from a file or FIFO. Frames are
//! written with a non-blocking open, so a FIFO nobody is reading makes the write
//! fail straight away instead of stalling the update loop.

use crate::framebuffer::FrameBuffer;
use crate::{TrackInfo, DISPLAY_HEIGHT, DISPLAY_WIDTH};
use std::io;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Clockwise panel rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }
}

/// Returns `frame` rotated clockwise. The panel is square, so the size is kept.
pub fn rotate(frame: &FrameBuffer, rotation: Rotation) -> FrameBuffer {
    if rotation == Rotation::None {
        return frame.snapshot();
    }

    const W: usize = DISPLAY_WIDTH;
    const H: usize = DISPLAY_HEIGHT;
    const _: () = assert!(W == H);

    let mut out = FrameBuffer::new();
    for y in 0..H {
        for x in 0..W {
            let (sx, sy) = match rotation {
                Rotation::None => (x, y),
                Rotation::Cw90 => (y, H - 1 - x),
                Rotation::Cw180 => (W - 1 - x, H - 1 - y),
                Rotation::Cw270 => (W - 1 - y, x),
            };
            if let Some(px) = frame.pixel(sx, sy) {
                out.set_pixel(x, y, px);
            }
        }
    }
    out
}

/// Luminance ramp, darkest first.
const RAMP: &[u8] = b" .:-=+*#%@";

fn luma(rgb: [u8; 3]) -> u32 {
    // ITU-R BT.601 weights, scaled by 1000
    (299 * rgb[0] as u32 + 587 * rgb[1] as u32 + 114 * rgb[2] as u32) / 1000
}

/// Renders the frame as ASCII art, two pixels per character vertically so the
/// picture keeps its aspect ratio in a terminal.
pub fn ascii_art(frame: &FrameBuffer) -> String {
    let mut out = String::with_capacity((DISPLAY_WIDTH + 1) * DISPLAY_HEIGHT / 2);
    for y in (0..DISPLAY_HEIGHT).step_by(2) {
        for x in 0..DISPLAY_WIDTH {
            let top = frame.pixel(x, y).map(luma).unwrap_or(0);
            let bottom = frame.pixel(x, y + 1).map(luma).unwrap_or(top);
            let level = (top + bottom) / 2;
            let index = level as usize * (RAMP.len() - 1) / 255;
            out.push(RAMP[index] as char);
        }
        out.push('\n');
    }
    out
}

/// Render the frame and track line to stdout.
pub fn draw_ascii(frame: &FrameBuffer, track: Option<&TrackInfo>, offline: bool) {
    if offline {
        println!("⚠ OFFLINE\n");
    }
    print!("{}", ascii_art(frame));
    match track {
        Some(t) if t.playing => println!("♪ {} ({}s left)", t, t.remaining.as_secs()),
        Some(t) => println!("{}", t),
        None => println!("(no track info)"),
    }
}

/// Writes the raw frame bytes to `path` (regular file or FIFO).
///
/// Errors with `ENXIO` when `path` is a FIFO without a reader, and with
/// `WouldBlock` when the reader has fallen a whole pipe buffer behind.
pub async fn write_frame(path: &Path, frame: &FrameBuffer) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.custom_flags(libc::O_NONBLOCK);

    let mut file = options.open(path).await?;
    file.write_all(frame.as_bytes()).await?;
    file.flush().await
}
