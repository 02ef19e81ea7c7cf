//! # Pixel Codecs
//!
//! Conversions between the RGB888 framebuffer and the payload formats the art
//! endpoint can serve.
//!
//! ## RGB565
//! A 565 word keeps the top 5 bits of red, 6 of green and 5 of blue
//! (`rrrrrggggggbbbbb`) and travels big-endian, high byte first. Packing
//! truncates the low bits like the server does. Unpacking goes through
//! `embedded-graphics`, which scales each channel back to 8 bits, so full
//! white stays `0xFF` and black stays `0x00`.
//!
//! ## Debug Text
//! The combined now-playing endpoint can render pixel bytes as text:
//! `0xRR, 0xGG, 0xBB, ...` for byte streams, or `0xRRGG` four-digit words for
//! 565 in debug mode. [`parse_hex_bytes`] accepts both and returns plain bytes.

use crate::framebuffer::{FrameBuffer, FrameError};
use crate::{ImageMode, BYTES_PER_PIXEL, DISPLAY_WIDTH, FRAMEBUFFER_LEN};
use embedded_graphics::{
    image::{Image, ImageRaw, ImageRawBE},
    pixelcolor::{raw::RawU16, IntoStorage, Rgb565, Rgb888, RgbColor},
    prelude::*,
};
use thiserror::Error;

/// Errors from parsing the hex text form.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HexError {
    /// A token was not `0x` followed by 2 or 4 hex digits
    #[error("bad hex token at index {index}: {token:?}")]
    Token { index: usize, token: String },
}

/// Packs an RGB888 colour into an RGB565 word, dropping the low bits.
pub fn rgb888_to_565(r: u8, g: u8, b: u8) -> u16 {
    Rgb565::new(r >> 3, g >> 2, b >> 3).into_storage()
}

/// Expands an RGB565 word to RGB888.
pub fn rgb565_to_888(word: u16) -> [u8; 3] {
    let color = Rgb888::from(Rgb565::from(RawU16::new(word)));
    [color.r(), color.g(), color.b()]
}

/// Decodes a payload in `mode` into `frame`.
///
/// Fails without touching `frame` when the payload length is wrong.
pub fn decode_into(
    payload: &[u8],
    mode: ImageMode,
    frame: &mut FrameBuffer,
) -> Result<(), FrameError> {
    let expected = mode.payload_len();
    if payload.len() != expected {
        return Err(FrameError::Length {
            mode,
            expected,
            actual: payload.len(),
        });
    }

    match mode {
        ImageMode::Rgb888 => frame.as_bytes_mut().copy_from_slice(payload),
        ImageMode::Rgb565 => {
            let raw: ImageRawBE<Rgb565> = ImageRaw::new(payload, DISPLAY_WIDTH as u32);
            Image::new(&raw, Point::zero())
                .draw(&mut frame.color_converted())
                .ok();
        }
    }
    Ok(())
}

/// Encodes an RGB888 frame in `mode`.
pub fn encode(frame: &[u8; FRAMEBUFFER_LEN], mode: ImageMode) -> Vec<u8> {
    match mode {
        ImageMode::Rgb888 => frame.to_vec(),
        ImageMode::Rgb565 => {
            let mut out = Vec::with_capacity(mode.payload_len());
            for px in frame.chunks_exact(BYTES_PER_PIXEL) {
                out.extend_from_slice(&rgb888_to_565(px[0], px[1], px[2]).to_be_bytes());
            }
            out
        }
    }
}

/// Parses `0xAB, 0xCD, ...` text into bytes. Four-digit tokens yield two
/// bytes, high byte first. Blank input yields an empty vector.
pub fn parse_hex_bytes(text: &str) -> Result<Vec<u8>, HexError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut bytes = Vec::new();
    for (index, raw) in text.split(',').enumerate() {
        let token = raw.trim();
        let bad = || HexError::Token {
            index,
            token: token.to_string(),
        };
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .ok_or_else(bad)?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(bad());
        }
        let value = u16::from_str_radix(digits, 16).map_err(|_| bad())?;
        match digits.len() {
            2 => bytes.push(value as u8),
            4 => bytes.extend_from_slice(&value.to_be_bytes()),
            _ => return Err(bad()),
        }
    }
    Ok(bytes)
}
