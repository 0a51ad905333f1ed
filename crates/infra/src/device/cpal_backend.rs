//! CPAL-backed audio device
//!
//! Resolves the card name of a stream route against the host's device list
//! and validates the requested PCM configuration. Sample transport stays
//! with the stream owner; this backend covers the open/close lifecycle the
//! route manager drives during the enable and disable stages.

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, warn};

use signalpath_core::domain::audio::{AudioDevice, DeviceError, PcmConfig, Result};

/// `AudioDevice` resolving card names through the default cpal host
pub struct CpalAudioDevice {
    device: Option<cpal::Device>,
    is_out: bool,
}

impl CpalAudioDevice {
    pub fn new() -> Self {
        Self {
            device: None,
            is_out: true,
        }
    }

    fn resolve(card_name: &str, is_out: bool) -> Option<cpal::Device> {
        let host = cpal::default_host();
        let devices = if is_out {
            host.output_devices().ok()?
        } else {
            host.input_devices().ok()?
        };
        for device in devices {
            let name = device.name().unwrap_or_default();
            if name.contains(card_name) {
                return Some(device);
            }
        }
        // fall back to the default endpoint of the host
        if is_out {
            host.default_output_device()
        } else {
            host.default_input_device()
        }
    }

    fn supports(device: &cpal::Device, config: &PcmConfig, is_out: bool) -> bool {
        let wanted_rate: cpal::SampleRate = config.rate;
        let ranges: Vec<_> = if is_out {
            match device.supported_output_configs() {
                Ok(configs) => configs.collect(),
                Err(_) => return false,
            }
        } else {
            match device.supported_input_configs() {
                Ok(configs) => configs.collect(),
                Err(_) => return false,
            }
        };
        ranges.iter().any(|range| {
            u32::from(range.channels()) >= config.channels
                && range.min_sample_rate() <= wanted_rate
                && wanted_rate <= range.max_sample_rate()
        })
    }
}

impl Default for CpalAudioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for CpalAudioDevice {
    fn open(
        &mut self,
        card_name: &str,
        device_id: u32,
        config: &PcmConfig,
        is_out: bool,
    ) -> Result<()> {
        let Some(device) = Self::resolve(card_name, is_out) else {
            return Err(DeviceError::Open {
                card: card_name.to_string(),
                device: device_id,
                reason: "no matching endpoint on host".to_string(),
            });
        };
        if !Self::supports(&device, config, is_out) {
            return Err(DeviceError::Open {
                card: card_name.to_string(),
                device: device_id,
                reason: format!(
                    "unsupported configuration {}ch @ {} Hz",
                    config.channels, config.rate
                ),
            });
        }
        debug!(
            "opened {} endpoint {} for card {}",
            if is_out { "output" } else { "input" },
            device.name().unwrap_or_default(),
            card_name
        );
        self.device = Some(device);
        self.is_out = is_out;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.device.take().is_none() {
            warn!("closing an audio device that was not open");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }
}
