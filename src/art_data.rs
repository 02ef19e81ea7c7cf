//! # Now-Playing Data Fetching and Caching
//!
//! This module handles all network operations against the now-playing server:
//! the track endpoint for metadata and the art endpoint for the raw pixel
//! payload. It also keeps the last good frame on disk so a restart during a
//! network outage still shows the current cover.
//!
//! ## Endpoints
//!
//! ### Track
//! Plain text, three lines:
//! ```text
//! Windowlicker
//! Aphex Twin
//! 183000
//! ```
//! Track name, artists joined with `", "`, milliseconds remaining. When the
//! player is idle the server answers `nothing playing`, an empty artist line
//! and a suggested wait.
//!
//! ### Art
//! `GET <art_url>?mode=888` returns exactly `3 × 64 × 64` bytes (`mode=565`:
//! `2 × 64 × 64`). When nothing plays the payload is all zeros.
//!
//! ### Combined
//! The server's `/user/<name>/?mode=888` page returns the three track lines
//! followed by a fourth line of `0xRR, 0xGG, ...` text. [`NowPlaying::parse`]
//! reads it. Used instead of the two endpoints when `combined_endpoint` is set.
//!
//! ## Update Strategy
//! 1. **Track**: fetch metadata; if idle, blank the panel and skip the art request.
//!    A failed track fetch forgets the previous track
//! 2. **Art**: fetch and decode into the context's framebuffer
//! 3. **Cache**: store the frame with a timestamp (failure to write is non-fatal)
//! 4. **Fallback**: on failure, load a cached frame younger than the TTL,
//!    otherwise show [`fallback::placeholder`]
//!
//! All errors propagate through [`ArtError`] for consistent handling.

use crate::codec::{self, HexError};
use crate::config::ServiceConfig;
use crate::fallback;
use crate::framebuffer::{DeviceContext, FrameBuffer, FrameError};
use crate::{ImageMode, TrackInfo};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use std::{fs, io};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while fetching, decoding or caching now-playing data.
#[derive(Error, Debug)]
pub enum ArtError {
    /// HTTP request failed (network, timeout, or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("server answered {0}")]
    Status(StatusCode),

    /// Track answer did not have the expected three lines
    #[error("malformed track answer: {0}")]
    Track(String),

    /// Art payload did not fit the panel
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Debug hex text could not be parsed
    #[error(transparent)]
    Hex(#[from] HexError),

    /// Cache file operations failed
    #[error("cache IO: {0}")]
    Cache(#[from] io::Error),

    /// Cache file content was not a frame
    #[error("cache format: {0}")]
    CacheFormat(#[from] serde_json::Error),

    /// Cached frame is older than the TTL
    #[error("cached frame is stale ({age_minutes} min old)")]
    Stale { age_minutes: i64 },
}

/// Where the frame currently on the panel came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameSource {
    /// Fresh payload from the art endpoint
    Live,
    /// Player idle; panel blanked without asking for art
    Idle,
    /// Last good frame from the disk cache
    Cached,
    /// Nothing available; offline placeholder
    Placeholder,
}

impl FrameSource {
    /// True when the update reached the server.
    pub fn is_online(self) -> bool {
        matches!(self, FrameSource::Live | FrameSource::Idle)
    }
}

/// Track metadata and pixels from the combined debug endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NowPlaying {
    pub track: TrackInfo,
    /// Payload bytes exactly as encoded by the server
    pub pixels: Vec<u8>,
}

impl NowPlaying {
    /// Parses the four-line combined answer.
    pub fn parse(body: &str) -> Result<Self, ArtError> {
        let mut lines = body.splitn(4, '\n');
        let head: Vec<&str> = lines.by_ref().take(3).collect();
        if head.len() < 3 {
            return Err(ArtError::Track(format!(
                "expected 4 lines, got {}",
                head.len()
            )));
        }
        let track = parse_track(&head.join("\n"))?;
        let pixels = codec::parse_hex_bytes(lines.next().unwrap_or(""))?;
        Ok(Self { track, pixels })
    }

    /// Decodes the pixels into a framebuffer.
    pub fn into_frame(self, mode: ImageMode) -> Result<FrameBuffer, ArtError> {
        Ok(FrameBuffer::from_payload(&self.pixels, mode)?)
    }
}

/// Parses the track endpoint's three-line answer.
pub fn parse_track(body: &str) -> Result<TrackInfo, ArtError> {
    let lines: Vec<&str> = body.lines().collect();
    if lines.len() < 3 {
        return Err(ArtError::Track(format!(
            "expected 3 lines, got {}",
            lines.len()
        )));
    }

    let name = lines[0].trim().to_string();
    let artists: Vec<String> = lines[1]
        .split(", ")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    let remaining_ms: i64 = lines[2]
        .trim()
        .parse()
        .map_err(|_| ArtError::Track(format!("bad remaining time {:?}", lines[2])))?;

    let playing = !(name == fallback::IDLE_TRACK_NAME && artists.is_empty());

    Ok(TrackInfo {
        name,
        artists,
        remaining: Duration::from_millis(remaining_ms.max(0) as u64),
        playing,
    })
}

/// Builds the HTTP client shared by all requests.
pub fn client(timeout: Duration) -> Result<Client, ArtError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("art-matrix/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

async fn get_bytes(client: &Client, url: reqwest::Url) -> Result<Vec<u8>, ArtError> {
    debug!(%url, "GET");
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ArtError::Status(status));
    }
    Ok(response.bytes().await?.to_vec())
}

/// Fetches the current track.
pub async fn fetch_track(client: &Client, service: &ServiceConfig) -> Result<TrackInfo, ArtError> {
    let body = get_bytes(client, service.track_url.clone()).await?;
    parse_track(&String::from_utf8_lossy(&body))
}

/// Fetches the art payload in `mode`. The length is checked against the panel.
pub async fn fetch_art(
    client: &Client,
    service: &ServiceConfig,
    mode: ImageMode,
) -> Result<Vec<u8>, ArtError> {
    let payload = get_bytes(client, service.art_url_for(mode)).await?;
    let expected = mode.payload_len();
    if payload.len() != expected {
        return Err(FrameError::Length {
            mode,
            expected,
            actual: payload.len(),
        }
        .into());
    }
    Ok(payload)
}

/// Fetches track and pixels in one request from the combined page.
pub async fn fetch_now_playing(
    client: &Client,
    service: &ServiceConfig,
    mode: ImageMode,
) -> Result<NowPlaying, ArtError> {
    let body = get_bytes(client, service.now_playing_url(mode)).await?;
    NowPlaying::parse(&String::from_utf8_lossy(&body))
}

/// On-disk form of the last good frame.
#[derive(Debug, Serialize, Deserialize)]
struct CachedFrame {
    saved_at: DateTime<Utc>,
    mode: ImageMode,
    pixels: Vec<u8>,
}

/// Writes `frame` to the cache file encoded in `mode`, stamped with `now`.
pub fn save_cache(
    path: &Path,
    frame: &FrameBuffer,
    mode: ImageMode,
    now: DateTime<Utc>,
) -> Result<(), ArtError> {
    let cached = CachedFrame {
        saved_at: now,
        mode,
        pixels: frame.encode(mode),
    };
    fs::write(path, serde_json::to_vec(&cached)?)?;
    Ok(())
}

/// Loads the cached frame if it is no older than `ttl` at `now`.
pub fn load_cache(
    path: &Path,
    ttl: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<FrameBuffer, ArtError> {
    let data = fs::read(path)?;
    let cached: CachedFrame = serde_json::from_slice(&data)?;

    let age = now - cached.saved_at;
    if age > ttl {
        return Err(ArtError::Stale {
            age_minutes: age.num_minutes(),
        });
    }

    Ok(FrameBuffer::from_payload(&cached.pixels, cached.mode)?)
}

/// Runs one update against the server and leaves the result in `ctx`.
///
/// Never fails: errors are logged and the frame falls back to the cache or the
/// placeholder. The returned [`FrameSource`] tells the caller whether the
/// server was reached.
pub async fn refresh(ctx: &mut DeviceContext, client: &Client) -> FrameSource {
    let display = ctx.config().display.clone();

    let fetched = if display.combined_endpoint {
        refresh_combined(ctx, client, display.image_mode).await
    } else {
        refresh_split(ctx, client, display.image_mode).await
    };

    match fetched {
        Ok(FrameSource::Live) => {
            ctx.offline = false;
            if let Err(e) = save_cache(
                &display.cache_path,
                ctx.frame(),
                display.image_mode,
                Utc::now(),
            ) {
                debug!("cache write failed: {}", e);
            }
            FrameSource::Live
        }
        Ok(source) => source,
        Err(error) => {
            warn!("art fetch failed: {}", error);
            ctx.offline = true;
            let ttl = chrono::Duration::minutes(display.cache_ttl_minutes as i64);
            match load_cache(&display.cache_path, ttl, Utc::now()) {
                Ok(frame) => {
                    info!("showing cached frame");
                    ctx.replace_frame(frame);
                    FrameSource::Cached
                }
                Err(cache_error) => {
                    info!("no usable cached frame ({}), showing placeholder", cache_error);
                    ctx.replace_frame(fallback::placeholder());
                    FrameSource::Placeholder
                }
            }
        }
    }
}

/// Track and art from their own endpoints.
async fn refresh_split(
    ctx: &mut DeviceContext,
    client: &Client,
    mode: ImageMode,
) -> Result<FrameSource, ArtError> {
    let service = ctx.config().service.clone();

    match fetch_track(client, &service).await {
        Ok(track) => {
            if show_track(ctx, track) {
                return Ok(FrameSource::Idle);
            }
        }
        Err(e) => {
            warn!("track fetch failed: {}", e);
            ctx.track = None;
        }
    }

    let payload = fetch_art(client, &service, mode).await?;
    ctx.frame_mut().load(&payload, mode)?;
    Ok(FrameSource::Live)
}

/// Track and art from the combined page.
async fn refresh_combined(
    ctx: &mut DeviceContext,
    client: &Client,
    mode: ImageMode,
) -> Result<FrameSource, ArtError> {
    let service = ctx.config().service.clone();

    let now = match fetch_now_playing(client, &service, mode).await {
        Ok(now) => now,
        Err(e) => {
            ctx.track = None;
            return Err(e);
        }
    };
    if show_track(ctx, now.track.clone()) {
        return Ok(FrameSource::Idle);
    }
    ctx.replace_frame(now.into_frame(mode)?);
    Ok(FrameSource::Live)
}

/// Records `track`. Blanks the panel and returns true when nothing plays.
fn show_track(ctx: &mut DeviceContext, track: TrackInfo) -> bool {
    info!(track = %track, playing = track.playing, "track updated");
    let idle = !track.playing;
    ctx.track = Some(track);
    if idle {
        ctx.frame_mut().clear();
        ctx.offline = false;
    }
    idle
}

/// How long to wait before the next update: the poll interval, or sooner when
/// the current track ends first.
pub fn next_wait(track: Option<&TrackInfo>, poll: Duration) -> Duration {
    match track {
        Some(t) if t.playing && !t.remaining.is_zero() => t.remaining.min(poll),
        _ => poll,
    }
}
