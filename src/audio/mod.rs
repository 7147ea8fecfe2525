pub mod decode;
pub mod pcm;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning an audio file into a PCM buffer.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open audio file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("unsupported audio format: {channels} channel(s) at {sample_rate} Hz, expected {expected_channels} channel(s) at {expected_rate} Hz")]
    UnsupportedFormat {
        channels: u16,
        sample_rate: u32,
        expected_channels: u16,
        expected_rate: u32,
    },

    #[error("audio buffer contains no samples")]
    Empty,
}
