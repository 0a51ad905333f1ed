//! Volume-key GPIO wakeup
//!
//! During a call the device must wake on the volume keys so in-call volume
//! keeps working with the screen off. The kernel exposes this through the
//! gpio-keys sysfs interface; writing a key code to the enable (resp.
//! disable) file arms (resp. disarms) wakeup for that key.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::{debug, warn};

const GPIO_KEYS_WAKEUP_ENABLE: &str = "/sys/devices/platform/gpio-keys/enabled_wakeup";
const GPIO_KEYS_WAKEUP_DISABLE: &str = "/sys/devices/platform/gpio-keys/disabled_wakeup";

const KEY_VOLUME_DOWN: &str = "114";
const KEY_VOLUME_UP: &str = "115";

/// Guard around the gpio-keys wakeup state
///
/// Dedups transitions: repeated requests for the current state are no-ops,
/// the sysfs files are only written when the state actually flips.
#[derive(Debug)]
pub struct VolumeKeys {
    wakeup_enabled: bool,
    enable_path: PathBuf,
    disable_path: PathBuf,
}

impl Default for VolumeKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeKeys {
    pub fn new() -> Self {
        Self::with_paths(
            PathBuf::from(GPIO_KEYS_WAKEUP_ENABLE),
            PathBuf::from(GPIO_KEYS_WAKEUP_DISABLE),
        )
    }

    /// Use alternate sysfs paths (tests)
    pub fn with_paths(enable_path: PathBuf, disable_path: PathBuf) -> Self {
        Self {
            wakeup_enabled: false,
            enable_path,
            disable_path,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.wakeup_enabled
    }

    /// Arm or disarm volume-key wakeup, once per transition
    pub fn wakeup(&mut self, enable: bool) -> io::Result<()> {
        if self.wakeup_enabled == enable {
            // nothing to do, bailing out
            return Ok(());
        }
        debug!("{} volume keys wakeup", if enable { "enable" } else { "disable" });

        let path = if enable {
            &self.enable_path
        } else {
            &self.disable_path
        };
        let result = (|| -> io::Result<()> {
            let mut file = OpenOptions::new().write(true).open(path)?;
            writeln!(file, "{KEY_VOLUME_DOWN}")?;
            writeln!(file, "{KEY_VOLUME_UP}")?;
            Ok(())
        })();
        if let Err(err) = result {
            warn!("volume keys wakeup failed: {}", err);
            return Err(err);
        }

        self.wakeup_enabled = enable;
        Ok(())
    }
}
