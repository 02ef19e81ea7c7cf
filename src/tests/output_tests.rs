//! # Frame Output Tests
//!
//! The `--output` target is usually a FIFO read by the matrix driver. A target
//! that cannot take the frame must be reported back to the loop, never hang it.

use crate::{present, Args};
use art_matrix_lib::config::Config;
use art_matrix_lib::framebuffer::{DeviceContext, FrameBuffer};
use clap::Parser;
use std::time::Duration;

const SECRETS: &str = r#"
[network]
ssid = "studio"
password = "pw"

[service]
server = "art.local:5000"
username = "bob"
"#;

fn context() -> DeviceContext {
    DeviceContext::new(Config::from_toml(SECRETS).unwrap())
}

/// Test that `--output` receives the raw RGB888 frame.
#[tokio::test]
async fn output_file_receives_raw_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.rgb");
    let args = Args::parse_from(["art-matrix", "--once", "--output", path.to_str().unwrap()]);
    let mut frame = FrameBuffer::new();
    frame.set_pixel(1, 0, [9, 8, 7]);

    assert!(present(&frame, &context(), &args).await);

    let written = std::fs::read(&path).unwrap();
    assert_eq!(written.len(), 12_288);
    assert_eq!(&written[3..6], &[9, 8, 7]);
}

/// Test that an unwritable output is reported instead of ending the loop.
#[tokio::test]
async fn unwritable_output_is_a_missed_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("frame.rgb");
    let args = Args::parse_from(["art-matrix", "--output", path.to_str().unwrap()]);

    assert!(!present(&FrameBuffer::new(), &context(), &args).await);
}

/// Test that a driver FIFO nobody reads does not stall the update loop.
#[cfg(unix)]
#[tokio::test]
async fn unread_fifo_does_not_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("matrix.fifo");
    let c_path = std::ffi::CString::new(path.to_str().unwrap()).unwrap();
    assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);
    let args = Args::parse_from(["art-matrix", "--output", path.to_str().unwrap()]);

    let delivered = tokio::time::timeout(
        Duration::from_secs(2),
        present(&FrameBuffer::new(), &context(), &args),
    )
    .await
    .expect("present must return while the FIFO has no reader");
    assert!(!delivered);
}
