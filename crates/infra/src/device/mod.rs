//! PCM device backends
//!
//! The routing engine talks to hardware through the `AudioDevice` trait of
//! `signalpath-core`; this module provides the cpal-backed production
//! implementation and factory helpers for wiring a manager. The in-memory
//! mock used by tests lives in `signalpath_core::domain::testing`.

pub mod cpal_backend;

pub use cpal_backend::CpalAudioDevice;

use signalpath_core::domain::audio::AudioDevice;
use signalpath_core::domain::route::StreamRouteConfig;
use signalpath_core::domain::testing::MockDevice;

/// Factory creating cpal-backed devices, one per stream route
pub fn cpal_device_factory(_config: &StreamRouteConfig) -> Box<dyn AudioDevice> {
    Box::new(CpalAudioDevice::new())
}

/// Factory creating in-memory mock devices (tests, dry runs)
pub fn mock_device_factory(_config: &StreamRouteConfig) -> Box<dyn AudioDevice> {
    Box::new(MockDevice::new())
}
