//! Platform state glue between the HAL layer and the routing engine
//!
//! Tracks the telephony state of the device, stages the matching criteria
//! on the route manager and drives the device-specific side effects, such
//! as arming volume-key wakeup while a call is active on a modem platform.

use std::sync::{Arc, Mutex};

use tracing::warn;

use signalpath_core::domain::stream::Stream;

use crate::keys::VolumeKeys;
use crate::routing::RouteManager;

/// Criterion holding the telephony mode, declared by the platform config
pub const TELEPHONY_MODE_CRITERION: &str = "TelephonyMode";
/// Criterion holding the modem state, declared by the platform config
pub const MODEM_STATE_CRITERION: &str = "ModemState";

/// Telephony mode of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelephonyMode {
    Normal,
    Ringtone,
    InCall,
    InCommunication,
}

impl TelephonyMode {
    pub fn as_criterion_value(self) -> u32 {
        match self {
            TelephonyMode::Normal => 0,
            TelephonyMode::Ringtone => 1,
            TelephonyMode::InCall => 2,
            TelephonyMode::InCommunication => 3,
        }
    }
}

/// Telephony-aware platform state wrapper around the route manager
pub struct PlatformState {
    manager: Arc<RouteManager>,
    /// The platform carries a modem; call mode drives volume-key wakeup
    has_modem: bool,
    volume_keys: Mutex<VolumeKeys>,
}

impl PlatformState {
    pub fn new(manager: Arc<RouteManager>, has_modem: bool) -> Self {
        Self::with_volume_keys(manager, has_modem, VolumeKeys::new())
    }

    pub fn with_volume_keys(
        manager: Arc<RouteManager>,
        has_modem: bool,
        volume_keys: VolumeKeys,
    ) -> Self {
        Self {
            manager,
            has_modem,
            volume_keys: Mutex::new(volume_keys),
        }
    }

    pub fn manager(&self) -> &Arc<RouteManager> {
        &self.manager
    }

    /// Stage the telephony mode and reconsider routing
    ///
    /// On a modem platform, entering a call arms volume-key wakeup and
    /// leaving it disarms it; the underlying guard makes the sysfs write
    /// happen once per transition, not on every repeated set.
    pub fn set_telephony_mode(&self, mode: TelephonyMode) {
        self.manager
            .set_criterion(TELEPHONY_MODE_CRITERION, mode.as_criterion_value());
        if self.has_modem {
            let mut keys = self.volume_keys.lock().unwrap();
            if keys.wakeup(mode == TelephonyMode::InCall).is_err() {
                warn!("could not toggle volume keys wakeup");
            }
        }
        self.manager.reconsider_routing(false);
    }

    /// Stage the modem state and reconsider routing
    ///
    /// A modem coming alive forces a resync: the computed masks may be
    /// unchanged while the modem-side configuration still must be pushed.
    pub fn set_modem_alive(&self, alive: bool) {
        self.manager
            .set_criterion(MODEM_STATE_CRITERION, u32::from(alive));
        self.manager.reconsider_routing_with(false, alive);
    }

    /// Echo reference stream for voice processing
    pub fn voice_output_stream(&self) -> Option<Arc<Stream>> {
        self.manager.voice_output_stream()
    }

    #[cfg(test)]
    pub(crate) fn volume_keys_enabled(&self) -> bool {
        self.volume_keys.lock().unwrap().is_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use signalpath_core::domain::config::PlatformConfig;

    use crate::device::mock_device_factory;
    use crate::settings::SettingsEngine;

    const MODE_PLATFORM: &str = r#"
        [[criterion_types]]
        name = "TelephonyMode"
        values = [
            { literal = "Normal", numeric = 0 },
            { literal = "Ringtone", numeric = 1 },
            { literal = "InCall", numeric = 2 },
            { literal = "InCommunication", numeric = 3 },
        ]

        [[criterion_types]]
        name = "ModemState"
        values = [
            { literal = "Dead", numeric = 0 },
            { literal = "Alive", numeric = 1 },
        ]

        [[criteria]]
        name = "TelephonyMode"
        type = "TelephonyMode"
        default = "Normal"

        [[criteria]]
        name = "ModemState"
        type = "ModemState"
        default = "Dead"
    "#;

    fn started_platform(has_modem: bool, keys: VolumeKeys) -> (PlatformState, Arc<SettingsEngine>) {
        let config = PlatformConfig::from_str(MODE_PLATFORM).unwrap();
        let sink = Arc::new(SettingsEngine::new());
        let mut factory = mock_device_factory;
        let manager =
            Arc::new(RouteManager::new(&config, sink.clone(), &mut factory).unwrap());
        manager.start().unwrap();
        (
            PlatformState::with_volume_keys(manager, has_modem, keys),
            sink,
        )
    }

    fn tempdir_keys(dir: &tempfile::TempDir) -> VolumeKeys {
        let enable = dir.path().join("enabled_wakeup");
        let disable = dir.path().join("disabled_wakeup");
        std::fs::write(&enable, "").unwrap();
        std::fs::write(&disable, "").unwrap();
        VolumeKeys::with_paths(enable, disable)
    }

    #[test]
    fn in_call_arms_volume_keys_once_per_transition() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, _sink) = started_platform(true, tempdir_keys(&dir));

        platform.set_telephony_mode(TelephonyMode::InCall);
        assert!(platform.volume_keys_enabled());

        // repeated sets of the same mode do not rewrite the sysfs files
        platform.set_telephony_mode(TelephonyMode::InCall);
        platform.set_telephony_mode(TelephonyMode::InCall);
        let written = std::fs::read_to_string(dir.path().join("enabled_wakeup")).unwrap();
        assert_eq!(written, "114\n115\n");

        platform.set_telephony_mode(TelephonyMode::Normal);
        assert!(!platform.volume_keys_enabled());
    }

    #[test]
    fn modeless_platform_leaves_keys_alone() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, _sink) = started_platform(false, tempdir_keys(&dir));

        platform.set_telephony_mode(TelephonyMode::InCall);
        assert!(!platform.volume_keys_enabled());
        let written = std::fs::read_to_string(dir.path().join("enabled_wakeup")).unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn mode_reaches_settings_engine_on_commit() {
        let (platform, sink) = started_platform(false, VolumeKeys::new());

        platform.set_telephony_mode(TelephonyMode::InCall);
        platform.manager().reconsider_routing(true);
        assert_eq!(sink.criterion_state("TelephonyMode"), Some(2));

        platform.set_modem_alive(true);
        platform.manager().reconsider_routing(true);
        assert_eq!(sink.criterion_state("ModemState"), Some(1));
    }
}
