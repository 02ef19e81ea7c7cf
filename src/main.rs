//! # Art Matrix Application Entry Point
//!
//! This binary crate runs the update loop: load the injected configuration,
//! poll the now-playing server, decode the cover into the framebuffer and hand
//! the frame to the output. It supports a raw output mode (frame bytes written
//! to a file or FIFO read by the matrix driver) and a development mode (ASCII
//! output on stdout).

#[cfg(test)]
mod tests;

use anyhow::{bail, Context};
use art_matrix_lib::{
    art_data::{self, FrameSource},
    config::{self, Config},
    framebuffer::{DeviceContext, FrameBuffer},
    renderer::{self, Rotation},
    watchdog::Watchdog,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Now-playing album art for a 64x64 RGB LED matrix
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file holding credentials and endpoints
    #[arg(short, long, default_value = config::DEFAULT_PATH)]
    config: PathBuf,

    /// Render frames as ASCII on stdout instead of writing them out
    #[arg(long)]
    stdout: bool,

    /// Write each RGB888 frame to this file or FIFO
    #[arg(short, long, conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Run a single update and exit
    #[arg(long)]
    once: bool,
}

/// Hand a finished frame to wherever the user asked for it.
///
/// Returns false when the frame could not be delivered.
async fn present(frame: &FrameBuffer, ctx: &DeviceContext, args: &Args) -> bool {
    if args.stdout {
        renderer::draw_ascii(frame, ctx.track.as_ref(), ctx.offline);
    } else if let Some(path) = &args.output {
        if let Err(e) = renderer::write_frame(path, frame).await {
            warn!("writing frame to {} failed: {}", path.display(), e);
            return false;
        }
        debug!("frame written to {}", path.display());
    } else {
        debug!(?frame, "frame ready (no output configured)");
    }
    true
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    // Credentials and URLs only ever come from the config file
    let config = Config::load_from_path(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!(
        ssid = %config.network.ssid,
        mode = %config.display.image_mode,
        "starting"
    );

    let settings = config.display.clone();
    let rotation = Rotation::from_degrees(settings.rotation).unwrap_or_default();
    let poll = Duration::from_secs(settings.poll_interval_secs);
    let http = art_data::client(Duration::from_secs(settings.http_timeout_secs))?;

    let mut ctx = DeviceContext::new(config);
    let mut watchdog = Watchdog::new(settings.max_missed_updates);

    loop {
        let source = art_data::refresh(&mut ctx, &http).await;
        let frame = renderer::rotate(ctx.frame(), rotation);
        let delivered = present(&frame, &ctx, &args).await;

        if source.is_online() && delivered {
            watchdog.feed();
        } else {
            watchdog.miss();
            warn!(
                missed = watchdog.missed(),
                limit = settings.max_missed_updates,
                "update did not reach the panel"
            );
        }

        if source == FrameSource::Live {
            info!("art updated");
        }

        if watchdog.expired() {
            bail!(
                "{} consecutive updates missed, giving up",
                watchdog.missed()
            );
        }

        if args.once {
            break;
        }

        let wait = art_data::next_wait(ctx.track.as_ref(), poll);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }
    }

    Ok(())
}
