//! Runtime plumbing for the signalpath routing engine
//!
//! This crate hosts everything the decision engine in `signalpath-core`
//! needs to run on a real system: the `RouteManager` with its dedicated
//! routing worker thread, the in-memory settings engine standing in for the
//! external configuration engine, PCM device backends, and platform state
//! glue such as telephony mode tracking and volume-key wakeup.

pub mod device;
pub mod keys;
pub mod platform;
pub mod routing;
pub mod settings;

pub use device::CpalAudioDevice;
pub use keys::VolumeKeys;
pub use platform::{PlatformState, TelephonyMode};
pub use routing::{RouteManager, RoutingError};
pub use settings::SettingsEngine;
