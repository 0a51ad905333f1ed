//! Client stream handles referenced by the routing engine
//!
//! Streams are created and owned by the HAL layer; the engine only sees the
//! attributes that drive routing (direction, flags, use case, requested
//! effects, started state) plus the route binding the engine itself
//! maintains. State is shared through an `Arc`, and stream identity is
//! `Arc` pointer identity.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::audio::{output_flags, Direction, SampleSpec};
use crate::domain::route::RouteId;

/// Route binding state, written by the routing worker only
#[derive(Debug, Default)]
struct RouteBinding {
    /// Route selected for this stream during the current cycle
    pending: Option<RouteId>,
    /// Route the stream is attached to, once routing completed
    current: Option<RouteId>,
    /// Sample spec of the attached route
    route_spec: Option<SampleSpec>,
    /// Silence to prepend on the attached route, milliseconds
    silence_prolog_ms: u32,
}

/// An open playback or capture stream
#[derive(Debug)]
pub struct Stream {
    direction: Direction,
    flags: AtomicU32,
    use_case: AtomicU32,
    effects: AtomicU32,
    started: AtomicBool,
    routed_by_policy: AtomicBool,
    binding: Mutex<RouteBinding>,
}

impl Stream {
    pub fn new(direction: Direction) -> Arc<Self> {
        Arc::new(Self {
            direction,
            flags: AtomicU32::new(0),
            use_case: AtomicU32::new(0),
            effects: AtomicU32::new(0),
            started: AtomicBool::new(false),
            // policy routing is the default; tests and policies may revoke it
            routed_by_policy: AtomicBool::new(true),
            binding: Mutex::new(RouteBinding::default()),
        })
    }

    /// Convenience constructor for a playback stream with the given flags
    pub fn playback(flags: u32) -> Arc<Self> {
        let stream = Stream::new(Direction::Playback);
        stream.set_flags(flags);
        stream
    }

    /// Convenience constructor for a capture stream with the given source
    pub fn capture(use_case: u32) -> Arc<Self> {
        let stream = Stream::new(Direction::Capture);
        stream.set_use_case(use_case);
        stream
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_playback(&self) -> bool {
        self.direction.is_playback()
    }

    /// Flag mask: output flags for playback, input flags for capture
    pub fn flags(&self) -> u32 {
        self.flags.load(Ordering::Relaxed)
    }

    pub fn set_flags(&self, flags: u32) {
        self.flags.store(flags, Ordering::Relaxed);
    }

    /// Use-case mask: the input source for capture streams
    pub fn use_case(&self) -> u32 {
        self.use_case.load(Ordering::Relaxed)
    }

    pub fn set_use_case(&self, use_case: u32) {
        self.use_case.store(use_case, Ordering::Relaxed);
    }

    /// Effects the stream requests; the route must implement all of them
    pub fn requested_effects(&self) -> u32 {
        self.effects.load(Ordering::Relaxed)
    }

    pub fn add_requested_effect(&self, effect: u32) {
        self.effects.fetch_or(effect, Ordering::Relaxed);
    }

    pub fn remove_requested_effect(&self, effect: u32) {
        self.effects.fetch_and(!effect, Ordering::Relaxed);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    pub fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::Relaxed);
    }

    pub fn is_routed_by_policy(&self) -> bool {
        self.routed_by_policy.load(Ordering::Relaxed)
    }

    pub fn set_routed_by_policy(&self, routed: bool) {
        self.routed_by_policy.store(routed, Ordering::Relaxed);
    }

    /// Direct streams bypass the mixer and get first refusal on routes
    pub fn is_direct(&self) -> bool {
        self.is_playback() && self.flags() & output_flags::DIRECT != 0
    }

    /// Whether a route already claimed this stream during the current cycle
    pub fn has_pending_route(&self) -> bool {
        self.binding.lock().unwrap().pending.is_some()
    }

    /// Whether the stream is attached to a route and may move samples
    pub fn is_routed(&self) -> bool {
        self.binding.lock().unwrap().current.is_some()
    }

    pub fn current_route(&self) -> Option<RouteId> {
        self.binding.lock().unwrap().current
    }

    /// Sample spec of the attached route, once routed
    pub fn route_sample_spec(&self) -> Option<SampleSpec> {
        self.binding.lock().unwrap().route_spec
    }

    /// Silence to prepend before valid samples on the attached route
    pub fn silence_prolog_ms(&self) -> u32 {
        self.binding.lock().unwrap().silence_prolog_ms
    }

    pub(crate) fn set_pending_route(&self, route: RouteId) {
        self.binding.lock().unwrap().pending = Some(route);
    }

    pub(crate) fn clear_pending_route(&self) {
        self.binding.lock().unwrap().pending = None;
    }

    pub(crate) fn attach(&self, route: RouteId, spec: SampleSpec, silence_prolog_ms: u32) {
        let mut binding = self.binding.lock().unwrap();
        binding.current = Some(route);
        binding.route_spec = Some(spec);
        binding.silence_prolog_ms = silence_prolog_ms;
    }

    pub(crate) fn detach(&self) {
        let mut binding = self.binding.lock().unwrap();
        binding.current = None;
        binding.route_spec = None;
        binding.silence_prolog_ms = 0;
    }
}

/// Stream identity is Arc identity
pub fn same_stream(a: &Arc<Stream>, b: &Arc<Stream>) -> bool {
    Arc::ptr_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::SampleFormat;

    #[test]
    fn direct_requires_playback_and_flag() {
        let direct = Stream::playback(output_flags::DIRECT);
        assert!(direct.is_direct());

        let primary = Stream::playback(output_flags::PRIMARY);
        assert!(!primary.is_direct());

        let capture = Stream::capture(0);
        capture.set_flags(output_flags::DIRECT);
        assert!(!capture.is_direct());
    }

    #[test]
    fn attach_detach_round_trip() {
        let stream = Stream::playback(output_flags::PRIMARY);
        assert!(!stream.is_routed());

        let spec = SampleSpec::new(2, 48_000, SampleFormat::S16Le);
        stream.attach(RouteId(3), spec, 20);
        assert!(stream.is_routed());
        assert_eq!(stream.current_route(), Some(RouteId(3)));
        assert_eq!(stream.route_sample_spec(), Some(spec));
        assert_eq!(stream.silence_prolog_ms(), 20);

        stream.detach();
        assert!(!stream.is_routed());
        assert_eq!(stream.route_sample_spec(), None);
    }

    #[test]
    fn identity_is_arc_identity() {
        let a = Stream::playback(0);
        let b = Stream::playback(0);
        assert!(same_stream(&a, &a.clone()));
        assert!(!same_stream(&a, &b));
    }
}
