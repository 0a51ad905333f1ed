//! Test doubles for the device seam
//!
//! `MockDevice` implements `AudioDevice` entirely in memory, records every
//! open/close against a shareable log and can be scripted to fail. It backs
//! the unit tests and benches of this crate and the workspace integration
//! tests; production backends live in the `infra` crate.

use std::sync::{Arc, Mutex};

use crate::domain::audio::{AudioDevice, DeviceError, PcmConfig, Result};

/// One recorded device operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOp {
    Open {
        card: String,
        device_id: u32,
        is_out: bool,
    },
    Close {
        card: String,
    },
}

/// Shareable operation log; one log may back many mock devices so tests can
/// assert cross-device ordering
pub type OpLog = Arc<Mutex<Vec<DeviceOp>>>;

pub fn op_log() -> OpLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// In-memory `AudioDevice`
pub struct MockDevice {
    open: bool,
    card: String,
    fail_open: bool,
    log: Option<OpLog>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            open: false,
            card: String::new(),
            fail_open: false,
            log: None,
        }
    }

    /// Record operations into a shared log
    pub fn with_log(log: OpLog) -> Self {
        Self {
            log: Some(log),
            ..Self::new()
        }
    }

    /// Make every `open` fail
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new()
        }
    }

    fn record(&self, op: DeviceOp) {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(op);
        }
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for MockDevice {
    fn open(
        &mut self,
        card_name: &str,
        device_id: u32,
        _config: &PcmConfig,
        is_out: bool,
    ) -> Result<()> {
        if self.fail_open {
            return Err(DeviceError::Open {
                card: card_name.to_string(),
                device: device_id,
                reason: "scripted failure".to_string(),
            });
        }
        self.open = true;
        self.card = card_name.to_string();
        self.record(DeviceOp::Open {
            card: card_name.to_string(),
            device_id,
            is_out,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.record(DeviceOp::Close {
                card: self.card.clone(),
            });
        }
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
