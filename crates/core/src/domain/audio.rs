//! Audio primitives shared across the routing engine
//!
//! This module defines the platform-agnostic building blocks: stream
//! directions, sample specifications, the flag/use-case/effect bit spaces
//! used for applicability matching, and the `AudioDevice` trait behind which
//! concrete PCM backends (mock, cpal) live in the `infra` crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by audio device backends
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Opening the PCM device failed
    #[error("cannot open device {card}:{device}: {reason}")]
    Open {
        card: String,
        device: u32,
        reason: String,
    },

    /// Closing the PCM device failed
    #[error("cannot close device: {0}")]
    Close(String),

    /// Operation requires an opened device
    #[error("device is not open")]
    NotOpen,

    /// No stream is attached or pending where one is required
    #[error("no stream bound to route")]
    NoStream,
}

pub type Result<T> = std::result::Result<T, DeviceError>;

/// Direction of an audio path, seen from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Capture,
    Playback,
}

impl Direction {
    /// Number of directions, used to size per-direction tables
    pub const COUNT: usize = 2;

    /// Both directions, capture first
    pub const ALL: [Direction; 2] = [Direction::Capture, Direction::Playback];

    /// Stable index for per-direction arrays
    pub fn index(self) -> usize {
        match self {
            Direction::Capture => 0,
            Direction::Playback => 1,
        }
    }

    pub fn is_playback(self) -> bool {
        matches!(self, Direction::Playback)
    }

    pub fn from_index(index: usize) -> Direction {
        Direction::ALL[index]
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Capture => write!(f, "capture"),
            Direction::Playback => write!(f, "playback"),
        }
    }
}

/// Supported PCM sample formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    #[default]
    S16Le,
    S24Le,
    S32Le,
    F32Le,
}

/// Sample specification of a stream or a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSpec {
    pub channels: u32,
    pub rate: u32,
    pub format: SampleFormat,
}

impl SampleSpec {
    pub fn new(channels: u32, rate: u32, format: SampleFormat) -> Self {
        Self {
            channels,
            rate,
            format,
        }
    }

    /// Convert a frame count into a duration in microseconds
    pub fn frames_to_us(&self, frames: u32) -> u64 {
        if self.rate == 0 {
            return 0;
        }
        u64::from(frames) * 1_000_000 / u64::from(self.rate)
    }
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            channels: 2,
            rate: 48_000,
            format: SampleFormat::S16Le,
        }
    }
}

/// Output stream flag bits, matched against a playback route's flag mask
pub mod output_flags {
    /// Default flag substituted when a playback stream declares none
    pub const PRIMARY: u32 = 1 << 0;
    pub const FAST: u32 = 1 << 1;
    pub const DEEP_BUFFER: u32 = 1 << 2;
    pub const COMPRESS_OFFLOAD: u32 = 1 << 3;
    /// Stream bypasses the mixer; grants priority during route matching
    pub const DIRECT: u32 = 1 << 4;
}

/// Input stream flag bits, matched against a capture route's flag mask
pub mod input_flags {
    /// Default flag substituted when a capture stream declares none
    pub const PRIMARY: u32 = 1 << 0;
    pub const FAST: u32 = 1 << 1;
    pub const HOTWORD: u32 = 1 << 2;
}

/// Capture use cases (input sources), matched against a route's use-case mask
pub mod input_sources {
    pub const MIC: u32 = 1 << 0;
    pub const VOICE_COMMUNICATION: u32 = 1 << 1;
    pub const CAMCORDER: u32 = 1 << 2;
    pub const VOICE_RECOGNITION: u32 = 1 << 3;
}

/// Audio effect bits a stream may request and a route may implement
pub mod effects {
    pub const ECHO_CANCELLATION: u32 = 1 << 0;
    pub const NOISE_SUPPRESSION: u32 = 1 << 1;
    pub const AUTOMATIC_GAIN_CONTROL: u32 = 1 << 2;
}

/// PCM configuration a stream route opens its device with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcmConfig {
    pub channels: u32,
    pub rate: u32,
    pub format: SampleFormat,
    pub period_size: u32,
    pub period_count: u32,
}

impl PcmConfig {
    pub fn sample_spec(&self) -> SampleSpec {
        SampleSpec::new(self.channels, self.rate, self.format)
    }
}

impl Default for PcmConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            rate: 48_000,
            format: SampleFormat::S16Le,
            period_size: 1024,
            period_count: 4,
        }
    }
}

/// Opaque PCM device handle owned by a stream route
///
/// Implementations are expected to be cheap to construct and to tolerate
/// redundant `close` calls; the route manager drives them best-effort and
/// recovers through the next reconsideration cycle on failure.
pub trait AudioDevice: Send + Sync {
    /// Open the device for the given card/device pair and PCM configuration
    fn open(
        &mut self,
        card_name: &str,
        device_id: u32,
        config: &PcmConfig,
        is_out: bool,
    ) -> Result<()>;

    /// Close the device, releasing the hardware
    fn close(&mut self) -> Result<()>;

    /// Whether the device is currently open and usable
    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_indices_are_stable() {
        assert_eq!(Direction::Capture.index(), 0);
        assert_eq!(Direction::Playback.index(), 1);
        assert_eq!(Direction::from_index(1), Direction::Playback);
        assert!(Direction::Playback.is_playback());
        assert!(!Direction::Capture.is_playback());
    }

    #[test]
    fn frames_to_us_uses_rate() {
        let spec = SampleSpec::new(2, 48_000, SampleFormat::S16Le);
        assert_eq!(spec.frames_to_us(48_000), 1_000_000);
        assert_eq!(spec.frames_to_us(1024), 21_333);
    }

    #[test]
    fn frames_to_us_zero_rate_is_zero() {
        let spec = SampleSpec::new(2, 0, SampleFormat::S16Le);
        assert_eq!(spec.frames_to_us(4096), 0);
    }

    #[test]
    fn pcm_config_default_is_stereo_48k() {
        let config = PcmConfig::default();
        assert_eq!(config.channels, 2);
        assert_eq!(config.rate, 48_000);
        assert_eq!(config.sample_spec(), SampleSpec::default());
    }
}
