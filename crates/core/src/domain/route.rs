//! Routes: potential signal paths between ports
//!
//! A `Route` is identified by a unique bit within its direction's bit
//! vector. Backend routes connect two hardware ports and are driven purely
//! by criteria; stream routes additionally own a PCM device and carry the
//! client stream bound to them. The two kinds share one struct with a
//! tagged `RouteKind`, so only the operations that differ dispatch on it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, trace, warn};

use crate::domain::audio::{
    input_flags, output_flags, AudioDevice, DeviceError, Direction, PcmConfig, Result, SampleFormat,
    SampleSpec,
};
use crate::domain::criteria::stages;
use crate::domain::port::PortId;
use crate::domain::stream::{same_stream, Stream};

/// Index of a route within the route collection arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteId(pub(crate) usize);

/// One supported combination of channels/rates/formats
///
/// An empty field is a wildcard. Profiles are reloaded when the device
/// backing the route is connected and reset to wildcard on disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityProfile {
    pub channels: Vec<u32>,
    pub rates: Vec<u32>,
    pub formats: Vec<SampleFormat>,
}

impl CapabilityProfile {
    pub fn supports(&self, spec: &SampleSpec) -> bool {
        (self.channels.is_empty() || self.channels.contains(&spec.channels))
            && (self.rates.is_empty() || self.rates.contains(&spec.rate))
            && (self.formats.is_empty() || self.formats.contains(&spec.format))
    }
}

/// Static configuration of a stream route, from the platform description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamRouteConfig {
    /// Configure the path before opening the PCM device
    pub require_pre_enable: bool,
    /// Deconfigure the path before closing the PCM device
    pub require_post_disable: bool,
    pub card_name: String,
    pub device_id: u32,
    pub pcm: PcmConfig,
    /// Silence to prepend while components power up, milliseconds
    pub silence_prolog_ms: u32,
    /// Stream flags this route can serve
    pub flag_mask: u32,
    /// Stream use cases this route can serve
    pub use_case_mask: u32,
    /// Connectable devices whose capabilities this route tracks
    pub supported_device_mask: u32,
    pub capabilities: Vec<CapabilityProfile>,
}

impl Default for StreamRouteConfig {
    fn default() -> Self {
        Self {
            require_pre_enable: false,
            require_post_disable: false,
            card_name: String::new(),
            device_id: 0,
            pcm: PcmConfig::default(),
            silence_prolog_ms: 0,
            flag_mask: 0,
            use_case_mask: 0,
            supported_device_mask: 0,
            capabilities: Vec::new(),
        }
    }
}

/// Stream-route payload: device handle, PCM config and stream binding
pub struct StreamRoute {
    config: StreamRouteConfig,
    device: Box<dyn AudioDevice>,
    effects_supported: u32,
    /// Capability profiles currently in effect
    active_capabilities: Vec<CapabilityProfile>,
    current: Option<Arc<Stream>>,
    pending: Option<Arc<Stream>>,
}

impl std::fmt::Debug for StreamRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRoute")
            .field("config", &self.config)
            .field("effects_supported", &self.effects_supported)
            .field("has_current", &self.current.is_some())
            .field("has_pending", &self.pending.is_some())
            .finish()
    }
}

impl StreamRoute {
    pub fn new(config: StreamRouteConfig, device: Box<dyn AudioDevice>) -> Self {
        let active_capabilities = config.capabilities.clone();
        Self {
            config,
            device,
            effects_supported: 0,
            active_capabilities,
            current: None,
            pending: None,
        }
    }

    pub fn config(&self) -> &StreamRouteConfig {
        &self.config
    }

    pub fn sample_spec(&self) -> SampleSpec {
        self.config.pcm.sample_spec()
    }

    pub fn current_stream(&self) -> Option<&Arc<Stream>> {
        self.current.as_ref()
    }

    pub fn pending_stream(&self) -> Option<&Arc<Stream>> {
        self.pending.as_ref()
    }

    pub fn add_effect_supported(&mut self, effect: u32) {
        self.effects_supported |= effect;
    }

    /// Worst-case buffering of the route, microseconds
    pub fn latency_us(&self) -> u64 {
        self.sample_spec()
            .frames_to_us(self.config.pcm.period_size * self.config.pcm.period_count)
    }

    /// Duration of one ring-buffer period, microseconds
    pub fn period_us(&self) -> u64 {
        self.sample_spec().frames_to_us(self.config.pcm.period_size)
    }

    pub fn device(&self) -> &dyn AudioDevice {
        self.device.as_ref()
    }

    /// The bound stream identity changes with this cycle
    fn stream_changed(&self) -> bool {
        match (&self.current, &self.pending) {
            (Some(current), Some(pending)) => !same_stream(current, pending),
            (None, None) => false,
            _ => true,
        }
    }

    /// Re-arm the declared capability profiles (device connected)
    pub fn load_capabilities(&mut self) {
        self.active_capabilities = self.config.capabilities.clone();
    }

    /// Fall back to wildcard capabilities (device disconnected)
    pub fn reset_capabilities(&mut self) {
        self.active_capabilities.clear();
    }

    fn supports_spec(&self, spec: &SampleSpec) -> bool {
        self.active_capabilities.is_empty()
            || self.active_capabilities.iter().any(|p| p.supports(spec))
    }

    fn implements_effects(&self, requested: u32) -> bool {
        self.effects_supported & requested == requested
    }

    fn flags_matching(&self, stream_flags: u32) -> bool {
        stream_flags & self.config.flag_mask == stream_flags
    }

    fn use_cases_matching(&self, stream_use_case: u32) -> bool {
        stream_use_case & self.config.use_case_mask == stream_use_case
    }

    fn attach_pending(&mut self, id: RouteId, name: &str) -> Result<()> {
        let Some(pending) = self.pending.clone() else {
            error!("trying to attach route {} to no stream", name);
            return Err(DeviceError::NoStream);
        };
        pending.attach(id, self.sample_spec(), self.config.silence_prolog_ms);
        self.current = Some(pending);
        Ok(())
    }

    fn detach_current(&mut self) -> Result<()> {
        let Some(current) = self.current.take() else {
            return Err(DeviceError::NoStream);
        };
        current.detach();
        Ok(())
    }

    fn open_device(&mut self, is_out: bool) -> Result<()> {
        self.device.open(
            &self.config.card_name,
            self.config.device_id,
            &self.config.pcm,
            is_out,
        )
    }
}

/// What a route connects to besides its ports
#[derive(Debug)]
pub enum RouteKind {
    /// Pure hardware-to-hardware path, driven by criteria only
    Backend,
    /// Path terminating at a client stream, owning a PCM device
    Stream(StreamRoute),
}

/// A potential signal path, holding one bit of its direction's bit vector
#[derive(Debug)]
pub struct Route {
    id: RouteId,
    name: String,
    direction: Direction,
    mask: u32,
    blocked: bool,
    used: bool,
    previously_used: bool,
    /// Applicability pushed by the external configuration engine
    applicable: bool,
    /// Routing stages explicitly requested (reconfigure/reroute)
    stages_requested: u32,
    ports: [Option<PortId>; 2],
    kind: RouteKind,
}

impl Route {
    pub(crate) fn new(
        id: RouteId,
        name: impl Into<String>,
        direction: Direction,
        mask: u32,
        kind: RouteKind,
    ) -> Self {
        // stream routes are gated by matching, backend routes by the
        // externally pushed applicability flag
        let applicable = matches!(kind, RouteKind::Stream(_));
        Self {
            id,
            name: name.into(),
            direction,
            mask,
            blocked: false,
            used: false,
            previously_used: false,
            applicable,
            stages_requested: 0,
            ports: [None; 2],
            kind,
        }
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn kind(&self) -> &RouteKind {
        &self.kind
    }

    pub fn is_stream_route(&self) -> bool {
        matches!(self.kind, RouteKind::Stream(_))
    }

    pub fn as_stream_route(&self) -> Option<&StreamRoute> {
        match &self.kind {
            RouteKind::Stream(sr) => Some(sr),
            RouteKind::Backend => None,
        }
    }

    pub fn as_stream_route_mut(&mut self) -> Option<&mut StreamRoute> {
        match &mut self.kind {
            RouteKind::Stream(sr) => Some(sr),
            RouteKind::Backend => None,
        }
    }

    pub(crate) fn ports(&self) -> &[Option<PortId>; 2] {
        &self.ports
    }

    pub(crate) fn add_port(&mut self, port: PortId) {
        if self.ports[0].is_none() {
            self.ports[0] = Some(port);
        } else {
            self.ports[1] = Some(port);
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn previously_used(&self) -> bool {
        self.previously_used
    }

    pub fn still_used(&self) -> bool {
        self.previously_used && self.used
    }

    /// Eligibility before stream matching: not blocked and declared
    /// applicable
    pub fn is_applicable(&self) -> bool {
        !self.blocked && self.applicable
    }

    pub fn set_applicable(&mut self, applicable: bool) {
        self.applicable = applicable;
    }

    /// Request a mute/unmute pass while the route stays open
    pub fn set_need_reconfigure(&mut self, need: bool) {
        if need {
            self.stages_requested |= stages::FLOW;
        } else {
            self.stages_requested &= !stages::FLOW;
        }
    }

    /// Request a full disable/enable pass
    pub fn set_need_reroute(&mut self, need: bool) {
        if need {
            self.stages_requested |= stages::PATH;
        } else {
            self.stages_requested &= !stages::PATH;
        }
    }

    pub(crate) fn set_blocked(&mut self) {
        if !self.blocked {
            trace!("route {} is now blocked", self.name);
            self.blocked = true;
        }
    }

    pub(crate) fn mark_used(&mut self) {
        self.used = true;
    }

    /// Start-of-cycle reset: snapshot used into previously-used, clear the
    /// pending stream binding
    pub fn reset_availability(&mut self) {
        self.blocked = false;
        self.previously_used = self.used;
        self.used = false;
        if let RouteKind::Stream(sr) = &mut self.kind {
            if let Some(pending) = sr.pending.take() {
                pending.clear_pending_route();
            }
        }
    }

    /// The route stays open but must be muted and reconfigured
    pub fn need_reflow(&self) -> bool {
        if !self.still_used() {
            return false;
        }
        match &self.kind {
            RouteKind::Backend => self.stages_requested & (stages::FLOW | stages::PATH) != 0,
            RouteKind::Stream(sr) => {
                self.stages_requested & (stages::FLOW | stages::PATH) != 0 || sr.stream_changed()
            }
        }
    }

    /// The route stays selected but must be fully disabled and re-enabled
    pub fn need_repath(&self) -> bool {
        if !self.still_used() {
            return false;
        }
        match &self.kind {
            RouteKind::Backend => self.stages_requested & stages::PATH != 0,
            RouteKind::Stream(sr) => {
                self.stages_requested & stages::PATH != 0 || sr.stream_changed()
            }
        }
    }

    /// Whether this stream route can serve the given stream
    ///
    /// Checks direction, flags (a stream with no flags is treated as
    /// primary), use case, requested effects and the stream's sample spec
    /// against the active capability profiles.
    pub fn matches_stream(&self, stream: &Stream) -> bool {
        let RouteKind::Stream(sr) = &self.kind else {
            return false;
        };
        if stream.direction() != self.direction {
            return false;
        }
        let default_flags = match self.direction {
            Direction::Playback => output_flags::PRIMARY,
            Direction::Capture => input_flags::PRIMARY,
        };
        let stream_flags = if stream.flags() == 0 {
            default_flags
        } else {
            stream.flags()
        };
        let spec = stream
            .route_sample_spec()
            .unwrap_or_else(|| sr.sample_spec());
        sr.flags_matching(stream_flags)
            && sr.use_cases_matching(stream.use_case())
            && sr.implements_effects(stream.requested_effects())
            && sr.supports_spec(&spec)
    }

    /// Bind a stream for the pending cycle; at most one per route
    pub fn bind_stream(&mut self, stream: &Arc<Stream>) -> bool {
        if stream.direction() != self.direction {
            error!(
                "stream direction mismatch binding to route {}",
                self.name
            );
            return false;
        }
        let id = self.id;
        let RouteKind::Stream(sr) = &mut self.kind else {
            return false;
        };
        if sr.pending.is_some() {
            error!("route {} is busy", self.name);
            return false;
        }
        trace!("stream bound to route {}", self.name);
        sr.pending = Some(Arc::clone(stream));
        stream.set_pending_route(id);
        true
    }

    /// Enable hook, called twice per cycle
    ///
    /// The device opens on the phase selected by `require_pre_enable`; the
    /// stream attaches only in the second phase, once the path is
    /// configured.
    pub fn route(&mut self, is_pre_enable: bool) -> Result<()> {
        let id = self.id;
        let is_out = self.direction.is_playback();
        let RouteKind::Stream(sr) = &mut self.kind else {
            return Ok(());
        };
        if is_pre_enable == sr.config.require_pre_enable {
            sr.open_device(is_out)?;
        }
        if !is_pre_enable {
            if !sr.device.is_open() {
                error!(
                    "audio device of route {} not open, cannot attach stream",
                    self.name
                );
                return Err(DeviceError::NotOpen);
            }
            sr.attach_pending(id, &self.name)?;
        }
        Ok(())
    }

    /// Disable hook, called twice per cycle
    ///
    /// The stream detaches in the first phase, before the path is
    /// deconfigured; the device closes on the phase selected by
    /// `require_post_disable`.
    pub fn unroute(&mut self, is_post_disable: bool) {
        let RouteKind::Stream(sr) = &mut self.kind else {
            return;
        };
        if !is_post_disable {
            if !sr.device.is_open() {
                error!(
                    "audio device of route {} not open, cannot detach stream",
                    self.name
                );
                return;
            }
            if sr.detach_current().is_err() {
                error!("trying to detach route {} from no stream", self.name);
            }
        }
        if is_post_disable == sr.config.require_post_disable {
            if let Err(err) = sr.device.close() {
                warn!("closing device of route {}: {}", self.name, err);
            }
        }
    }

    /// Configure hook: swap streams on a route that stays open
    pub fn configure(&mut self) {
        let id = self.id;
        let RouteKind::Stream(sr) = &mut self.kind else {
            return;
        };
        if !sr.stream_changed() {
            return;
        }
        if !sr.device.is_open() {
            error!(
                "audio device of route {} not open, cannot swap streams",
                self.name
            );
            return;
        }
        if sr.current.is_some() && sr.detach_current().is_err() {
            return;
        }
        if let Err(err) = sr.attach_pending(id, &self.name) {
            error!("failed to attach new stream to route {}: {}", self.name, err);
        }
    }
}
