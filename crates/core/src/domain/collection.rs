//! The route collection: arena, masks and the preparation pass
//!
//! Owns every port, port group and route of the platform by value and keeps
//! the per-direction routing masks. The preparation pass evaluates
//! applicability for each route (matching client streams onto stream
//! routes), propagates port usage and mutual exclusion, and accumulates the
//! four masks the commit protocol diffs against.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, trace};

use crate::domain::audio::Direction;
use crate::domain::config::ConfigError;
use crate::domain::port::{Port, PortGroup, PortGroupId, PortId};
use crate::domain::route::{Route, RouteId, RouteKind, StreamRoute};
use crate::domain::stream::{same_stream, Stream};

/// Routes a direction can hold; masks are one bit per route in a `u32`
pub const MAX_ROUTES_PER_DIRECTION: u32 = 32;

/// Per-direction routing masks, snapshot and diffed once per cycle
#[derive(Debug, Default, Clone, Copy)]
pub struct RouteMasks {
    pub enabled: u32,
    pub prev_enabled: u32,
    pub need_reflow: u32,
    pub need_repath: u32,
}

impl RouteMasks {
    /// Snapshot enabled into prev_enabled and clear the working masks
    fn reset(&mut self) {
        self.prev_enabled = self.enabled;
        self.enabled = 0;
        self.need_reflow = 0;
        self.need_repath = 0;
    }

    /// Whether this direction requires the full commit protocol
    pub fn has_changed(&self) -> bool {
        self.prev_enabled != self.enabled || self.need_reflow != 0 || self.need_repath != 0
    }

    /// Routes to silence: going away or needing reconfiguration
    pub fn routes_to_mute(&self) -> u32 {
        (self.prev_enabled & !self.enabled) | self.need_reflow
    }

    /// Routes that stay audible through the mute stage
    pub fn unmuted_routes(&self) -> u32 {
        self.prev_enabled & self.enabled & !self.need_reflow
    }

    /// Routes to tear down: going away or needing a full repath
    pub fn routes_to_disable(&self) -> u32 {
        (self.prev_enabled & !self.enabled) | self.need_repath
    }

    /// Routes that stay up through the disable stage
    pub fn opened_routes(&self) -> u32 {
        self.prev_enabled & self.enabled & !self.need_repath
    }
}

/// Arena owning the whole routing graph
pub struct RouteCollection {
    ports: Vec<Port>,
    groups: Vec<PortGroup>,
    routes: Vec<Route>,
    port_names: HashMap<String, PortId>,
    group_names: HashMap<String, PortGroupId>,
    route_names: [HashMap<String, RouteId>; Direction::COUNT],
    /// Open streams per direction, direct streams first
    streams: [Vec<Arc<Stream>>; Direction::COUNT],
    masks: [RouteMasks; Direction::COUNT],
    /// Next mask bit per direction
    allocated_bits: [u32; Direction::COUNT],
}

impl Default for RouteCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteCollection {
    pub fn new() -> Self {
        Self {
            ports: Vec::new(),
            groups: Vec::new(),
            routes: Vec::new(),
            port_names: HashMap::new(),
            group_names: HashMap::new(),
            route_names: [HashMap::new(), HashMap::new()],
            streams: [Vec::new(), Vec::new()],
            masks: [RouteMasks::default(); Direction::COUNT],
            allocated_bits: [0; Direction::COUNT],
        }
    }

    // ---- registration (configuration-load time) ----

    pub fn add_port(&mut self, name: &str) -> Result<PortId, ConfigError> {
        if self.port_names.contains_key(name) {
            return Err(ConfigError::DuplicatePort(name.to_string()));
        }
        let id = PortId(self.ports.len());
        self.ports.push(Port::new(name));
        self.port_names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_port_group(&mut self, name: &str, members: &[String]) -> Result<PortGroupId, ConfigError> {
        if self.group_names.contains_key(name) {
            return Err(ConfigError::DuplicatePortGroup(name.to_string()));
        }
        let id = PortGroupId(self.groups.len());
        let mut group = PortGroup::new(name);
        for member in members {
            let port_id = self
                .port_names
                .get(member)
                .copied()
                .ok_or_else(|| ConfigError::UnknownPort(member.clone()))?;
            group.add_member(port_id);
            self.ports[port_id.0].add_group(id);
        }
        self.groups.push(group);
        self.group_names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_backend_route(
        &mut self,
        name: &str,
        direction: Direction,
        source: Option<&str>,
        sink: Option<&str>,
    ) -> Result<RouteId, ConfigError> {
        self.add_route(name, direction, source, sink, RouteKind::Backend)
    }

    pub fn add_stream_route(
        &mut self,
        name: &str,
        direction: Direction,
        source: Option<&str>,
        sink: Option<&str>,
        stream_route: StreamRoute,
    ) -> Result<RouteId, ConfigError> {
        self.add_route(name, direction, source, sink, RouteKind::Stream(stream_route))
    }

    fn add_route(
        &mut self,
        name: &str,
        direction: Direction,
        source: Option<&str>,
        sink: Option<&str>,
        kind: RouteKind,
    ) -> Result<RouteId, ConfigError> {
        let dir = direction.index();
        if self.route_names[dir].contains_key(name) {
            return Err(ConfigError::DuplicateRoute(name.to_string(), direction));
        }
        if self.allocated_bits[dir] >= MAX_ROUTES_PER_DIRECTION {
            return Err(ConfigError::TooManyRoutes(direction));
        }
        let mask = 1u32 << self.allocated_bits[dir];
        self.allocated_bits[dir] += 1;

        let id = RouteId(self.routes.len());
        let mut route = Route::new(id, name, direction, mask, kind);
        for port_name in [source, sink].into_iter().flatten() {
            let port_id = self
                .port_names
                .get(port_name)
                .copied()
                .ok_or_else(|| ConfigError::UnknownPort(port_name.to_string()))?;
            route.add_port(port_id);
            self.ports[port_id.0].add_user(id);
        }
        trace!(
            "route {} ({}) registered with mask {:#x}",
            name,
            direction,
            mask
        );
        self.routes.push(route);
        self.route_names[dir].insert(name.to_string(), id);
        Ok(id)
    }

    // ---- lookup ----

    pub fn port_id(&self, name: &str) -> Option<PortId> {
        self.port_names.get(name).copied()
    }

    pub fn port(&self, id: PortId) -> &Port {
        &self.ports[id.0]
    }

    pub fn route_id(&self, name: &str, direction: Direction) -> Option<RouteId> {
        self.route_names[direction.index()].get(name).copied()
    }

    pub fn route(&self, id: RouteId) -> &Route {
        &self.routes[id.0]
    }

    pub fn route_mut(&mut self, id: RouteId) -> &mut Route {
        &mut self.routes[id.0]
    }

    /// Lookup that treats an unknown name as a programming error
    pub fn expect_route(&self, name: &str, direction: Direction) -> RouteId {
        self.route_id(name, direction)
            .unwrap_or_else(|| panic!("route {name} ({direction}) not found"))
    }

    /// Lookup that treats an unknown name as a programming error
    pub fn expect_port(&self, name: &str) -> PortId {
        self.port_id(name)
            .unwrap_or_else(|| panic!("port {name} not found"))
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn masks(&self, direction: Direction) -> &RouteMasks {
        &self.masks[direction.index()]
    }

    /// Names of the routes selected by a mask, for logs
    pub fn mask_to_names(&self, direction: Direction, mask: u32) -> String {
        let names: Vec<&str> = self
            .routes
            .iter()
            .filter(|r| r.direction() == direction && r.mask() & mask != 0)
            .map(|r| r.name())
            .collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join("|")
        }
    }

    // ---- stream registry ----

    /// Register an open stream; direct streams go to the front so they get
    /// first refusal on routes
    pub fn add_stream(&mut self, stream: Arc<Stream>) {
        let dir = stream.direction().index();
        if stream.is_direct() {
            self.streams[dir].insert(0, stream);
        } else {
            self.streams[dir].push(stream);
        }
    }

    pub fn remove_stream(&mut self, stream: &Arc<Stream>) {
        let dir = stream.direction().index();
        self.streams[dir].retain(|s| !same_stream(s, stream));
    }

    pub fn stream_count(&self, direction: Direction) -> usize {
        self.streams[direction.index()].len()
    }

    /// First registered playback stream, used as the voice echo reference
    pub fn voice_output_stream(&self) -> Option<Arc<Stream>> {
        let streams = &self.streams[Direction::Playback.index()];
        if streams.is_empty() {
            error!("no playback stream registered for echo reference");
        }
        streams.first().cloned()
    }

    /// Best route for a stream by attributes alone, ignoring availability;
    /// used for buffer-sizing queries before the stream is routed
    pub fn find_matching_route_for_stream(&self, stream: &Stream) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches_stream(stream))
    }

    // ---- reconsideration cycle ----

    /// Stage 1: snapshot the masks and reset every element's availability
    pub fn reset_availability(&mut self) {
        for masks in &mut self.masks {
            masks.reset();
        }
        for route in &mut self.routes {
            route.reset_availability();
        }
        for port in &mut self.ports {
            port.reset_availability();
        }
    }

    /// Stage 2: recompute applicability and accumulate the masks
    ///
    /// Returns true when any direction saw a change that requires the full
    /// commit protocol.
    pub fn prepare_routing(&mut self) -> bool {
        for idx in 0..self.routes.len() {
            let id = RouteId(idx);
            let applicable = if self.routes[idx].is_stream_route() {
                // a stream route is applicable only when a started stream
                // actually matches and claims it
                self.routes[idx].is_applicable()
                    && !self.routes[idx].is_used()
                    && self.bind_stream_for_route(id)
            } else {
                self.routes[idx].is_applicable()
            };
            if applicable {
                self.set_route_used(id);
            }
            let route = &self.routes[idx];
            let dir = route.direction().index();
            if route.is_used() {
                self.masks[dir].enabled |= route.mask();
            }
            if route.need_reflow() {
                self.masks[dir].need_reflow |= route.mask();
            }
            if route.need_repath() {
                self.masks[dir].need_repath |= route.mask();
            }
        }
        self.routing_has_changed()
    }

    pub fn routing_has_changed(&self) -> bool {
        self.masks.iter().any(RouteMasks::has_changed)
    }

    /// Find a started, policy-routed, unclaimed stream for the route
    fn bind_stream_for_route(&mut self, id: RouteId) -> bool {
        let dir = self.routes[id.0].direction().index();
        let candidates: Vec<Arc<Stream>> = self.streams[dir].to_vec();
        for stream in candidates {
            if !stream.is_started() || !stream.is_routed_by_policy() || stream.has_pending_route()
            {
                continue;
            }
            if self.routes[id.0].matches_stream(&stream) {
                trace!("stream route {} is applicable", self.routes[id.0].name());
                return self.routes[id.0].bind_stream(&stream);
            }
        }
        false
    }

    /// Mark a route used and propagate port usage and mutual exclusion
    fn set_route_used(&mut self, id: RouteId) {
        if !self.routes[id.0].is_applicable() {
            // blocked by an earlier route within this same pass
            return;
        }
        trace!(
            "route {} is now in use in {}",
            self.routes[id.0].name(),
            self.routes[id.0].direction()
        );
        self.routes[id.0].mark_used();
        let direction = self.routes[id.0].direction();
        let ports: Vec<PortId> = self.routes[id.0].ports().iter().flatten().copied().collect();
        for port in ports {
            self.set_port_used(port, id, direction);
        }
    }

    fn set_port_used(&mut self, port: PortId, route: RouteId, direction: Direction) {
        if !self.ports[port.0].set_used(route, direction) {
            // port already in use, first claimer wins
            return;
        }
        trace!("port {} is in use", self.ports[port.0].name());

        let groups = self.ports[port.0].groups().to_vec();
        for group in groups {
            self.block_mutual_exclusive_ports(group, port);
        }

        // Block every other route using this port, except the one sharing
        // the claiming route's name: full duplex over one port is allowed.
        let users = self.ports[port.0].users().to_vec();
        let claimer = self.routes[route.0].name().to_string();
        for user in users {
            if user == route || self.routes[user.0].name() == claimer {
                continue;
            }
            self.routes[user.0].set_blocked();
        }
    }

    /// Block every sibling of `except` within the group
    fn block_mutual_exclusive_ports(&mut self, group: PortGroupId, except: PortId) {
        let members = self.groups[group.0].members().to_vec();
        for member in members {
            if member != except {
                self.set_port_blocked_internal(member, true);
            }
        }
    }

    fn set_port_blocked_internal(&mut self, port: PortId, blocked: bool) {
        if !self.ports[port.0].set_blocked(blocked) {
            return;
        }
        trace!(
            "port {} is now {}",
            self.ports[port.0].name(),
            if blocked { "blocked" } else { "unblocked" }
        );
        if blocked {
            let users = self.ports[port.0].users().to_vec();
            for user in users {
                self.routes[user.0].set_blocked();
            }
        }
    }

    /// External blocking of a port (device unavailable, exclusive access)
    pub fn set_port_blocked(&mut self, name: &str, blocked: bool) {
        let id = self.expect_port(name);
        self.set_port_blocked_internal(id, blocked);
    }

    // ---- per-stage route loops ----

    /// Detach/close every route going away or needing a repath
    pub fn disable_routes(&mut self, is_post_disable: bool) {
        for route in &mut self.routes {
            if (route.previously_used() && !route.is_used()) || route.need_repath() {
                trace!("route {} to be disabled", route.name());
                route.unroute(is_post_disable);
            }
        }
    }

    /// Open/attach every route newly selected or needing a repath
    pub fn enable_routes(&mut self, is_pre_enable: bool) {
        for route in &mut self.routes {
            if (!route.previously_used() && route.is_used()) || route.need_repath() {
                trace!("route {} to be enabled", route.name());
                if let Err(err) = route.route(is_pre_enable) {
                    error!("error while routing {}: {}", route.name(), err);
                }
            }
        }
    }

    /// Swap streams on every still-open route needing reconfiguration
    ///
    /// Routes that also need a repath are skipped: their device was closed
    /// during the disable stage and the new stream attaches when the route
    /// is re-enabled.
    pub fn configure_routes(&mut self) {
        for route in &mut self.routes {
            if route.need_reflow() && !route.need_repath() {
                route.configure();
            }
        }
    }

    /// Whether any route closing this cycle defers its device close to the
    /// post-disable phase
    pub fn closing_requires_post_disable(&self) -> bool {
        self.routes.iter().any(|route| {
            let closing =
                (route.previously_used() && !route.is_used()) || route.need_repath();
            closing
                && route
                    .as_stream_route()
                    .is_some_and(|sr| sr.config().require_post_disable)
        })
    }

    // ---- capability reload ----

    /// Reload or reset capabilities of routes covering a connectable device
    pub fn handle_device_connection_state(&mut self, device_mask: u32, connected: bool) {
        if device_mask == 0 {
            return;
        }
        for route in &mut self.routes {
            let Some(sr) = route.as_stream_route_mut() else {
                continue;
            };
            if sr.config().supported_device_mask & device_mask == device_mask {
                if connected {
                    sr.load_capabilities();
                } else {
                    sr.reset_capabilities();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::{output_flags, Direction};
    use crate::domain::route::StreamRouteConfig;
    use crate::domain::testing::MockDevice;

    fn collection_with_ports(ports: &[&str]) -> RouteCollection {
        let mut collection = RouteCollection::new();
        for port in ports {
            collection.add_port(port).unwrap();
        }
        collection
    }

    fn primary_config() -> StreamRouteConfig {
        StreamRouteConfig {
            flag_mask: output_flags::PRIMARY,
            ..Default::default()
        }
    }

    fn add_playback_route(
        collection: &mut RouteCollection,
        name: &str,
        sink: Option<&str>,
        config: StreamRouteConfig,
    ) -> RouteId {
        collection
            .add_stream_route(
                name,
                Direction::Playback,
                None,
                sink,
                StreamRoute::new(config, Box::new(MockDevice::new())),
            )
            .unwrap()
    }

    #[test]
    fn masks_are_unique_bits_per_direction() {
        let mut collection = RouteCollection::new();
        let mut seen = [0u32; 2];
        for i in 0..8 {
            for direction in Direction::ALL {
                let id = collection
                    .add_backend_route(&format!("route{i}"), direction, None, None)
                    .unwrap();
                let mask = collection.route(id).mask();
                assert_eq!(mask.count_ones(), 1);
                assert_eq!(seen[direction.index()] & mask, 0);
                seen[direction.index()] |= mask;
            }
        }
        // same bit sequence in both directions: spaces are independent
        assert_eq!(seen[0], seen[1]);
    }

    #[test]
    fn duplicate_route_name_is_rejected_per_direction() {
        let mut collection = RouteCollection::new();
        collection
            .add_backend_route("Voice", Direction::Playback, None, None)
            .unwrap();
        // same name in the other direction is the full-duplex idiom
        collection
            .add_backend_route("Voice", Direction::Capture, None, None)
            .unwrap();
        assert!(collection
            .add_backend_route("Voice", Direction::Playback, None, None)
            .is_err());
    }

    #[test]
    fn route_cap_is_enforced() {
        let mut collection = RouteCollection::new();
        for i in 0..MAX_ROUTES_PER_DIRECTION {
            collection
                .add_backend_route(&format!("r{i}"), Direction::Playback, None, None)
                .unwrap();
        }
        assert!(matches!(
            collection.add_backend_route("overflow", Direction::Playback, None, None),
            Err(ConfigError::TooManyRoutes(Direction::Playback))
        ));
    }

    #[test]
    fn prepare_routes_started_stream() {
        let mut collection = RouteCollection::new();
        let id = add_playback_route(&mut collection, "Media", None, primary_config());

        let stream = Stream::playback(output_flags::PRIMARY);
        collection.add_stream(Arc::clone(&stream));

        // not started: no route enabled
        collection.reset_availability();
        assert!(!collection.prepare_routing());
        assert_eq!(collection.masks(Direction::Playback).enabled, 0);

        stream.set_started(true);
        collection.reset_availability();
        assert!(collection.prepare_routing());
        assert_eq!(
            collection.masks(Direction::Playback).enabled,
            collection.route(id).mask()
        );
        assert!(collection.route(id).is_used());
    }

    #[test]
    fn streams_not_routed_by_policy_are_skipped() {
        let mut collection = RouteCollection::new();
        add_playback_route(&mut collection, "Media", None, primary_config());

        let stream = Stream::playback(output_flags::PRIMARY);
        stream.set_started(true);
        stream.set_routed_by_policy(false);
        collection.add_stream(stream);

        collection.reset_availability();
        assert!(!collection.prepare_routing());
    }

    #[test]
    fn port_group_blocks_sibling_route() {
        let mut collection = collection_with_ports(&["i2s_a", "i2s_b"]);
        collection
            .add_port_group("shared_i2s", &["i2s_a".to_string(), "i2s_b".to_string()])
            .unwrap();

        let first = add_playback_route(&mut collection, "Media", Some("i2s_a"), primary_config());
        let second = add_playback_route(
            &mut collection,
            "Aux",
            Some("i2s_b"),
            StreamRouteConfig {
                flag_mask: output_flags::PRIMARY | output_flags::FAST,
                ..Default::default()
            },
        );

        let media = Stream::playback(output_flags::PRIMARY);
        media.set_started(true);
        let aux = Stream::playback(output_flags::FAST);
        aux.set_started(true);
        collection.add_stream(media);
        collection.add_stream(aux);

        collection.reset_availability();
        collection.prepare_routing();

        // Media claimed i2s_a first, so i2s_b and Aux are blocked even
        // though Aux's own flags match
        assert!(collection.route(first).is_used());
        assert!(!collection.route(second).is_used());
        assert!(collection.route(second).is_blocked());
        assert!(collection.port(collection.port_id("i2s_b").unwrap()).is_blocked());
    }

    #[test]
    fn full_duplex_shares_a_port() {
        let mut collection = collection_with_ports(&["voice_bus"]);
        let playback = collection
            .add_backend_route("Voice", Direction::Playback, None, Some("voice_bus"))
            .unwrap();
        let capture = collection
            .add_backend_route("Voice", Direction::Capture, None, Some("voice_bus"))
            .unwrap();

        collection.reset_availability();
        collection.route_mut(playback).set_applicable(true);
        collection.route_mut(capture).set_applicable(true);
        collection.prepare_routing();

        assert!(collection.route(playback).is_used());
        // same name: the capture half is not blocked by the shared port
        assert!(collection.route(capture).is_used());
    }

    #[test]
    fn shared_port_blocks_unrelated_route() {
        let mut collection = collection_with_ports(&["codec"]);
        let voice = collection
            .add_backend_route("Voice", Direction::Playback, None, Some("codec"))
            .unwrap();
        let fm = collection
            .add_backend_route("Fm", Direction::Playback, None, Some("codec"))
            .unwrap();

        collection.reset_availability();
        collection.route_mut(voice).set_applicable(true);
        collection.route_mut(fm).set_applicable(true);
        collection.prepare_routing();

        assert!(collection.route(voice).is_used());
        assert!(collection.route(fm).is_blocked());
        assert!(!collection.route(fm).is_used());
    }

    #[test]
    fn direct_streams_get_first_refusal() {
        let mut collection = RouteCollection::new();
        let id = add_playback_route(
            &mut collection,
            "Offload",
            None,
            StreamRouteConfig {
                flag_mask: output_flags::PRIMARY | output_flags::DIRECT,
                ..Default::default()
            },
        );

        let ordinary = Stream::playback(output_flags::PRIMARY);
        ordinary.set_started(true);
        let direct = Stream::playback(output_flags::DIRECT);
        direct.set_started(true);

        // registered after, but direct goes to the front of the registry
        collection.add_stream(Arc::clone(&ordinary));
        collection.add_stream(Arc::clone(&direct));

        collection.reset_availability();
        collection.prepare_routing();

        let bound = collection
            .route(id)
            .as_stream_route()
            .unwrap()
            .pending_stream()
            .cloned()
            .unwrap();
        assert!(same_stream(&bound, &direct));
        assert!(!ordinary.has_pending_route());
    }

    #[test]
    fn each_stream_claimed_once_per_cycle() {
        let mut collection = RouteCollection::new();
        let first = add_playback_route(&mut collection, "Primary", None, primary_config());
        let second = add_playback_route(&mut collection, "Spare", None, primary_config());

        let stream = Stream::playback(output_flags::PRIMARY);
        stream.set_started(true);
        collection.add_stream(stream);

        collection.reset_availability();
        collection.prepare_routing();

        assert!(collection.route(first).is_used());
        assert!(!collection.route(second).is_used());
    }

    #[test]
    fn second_prepare_without_changes_reports_no_change() {
        let mut collection = RouteCollection::new();
        add_playback_route(&mut collection, "Media", None, primary_config());
        let stream = Stream::playback(output_flags::PRIMARY);
        stream.set_started(true);
        collection.add_stream(stream);

        collection.reset_availability();
        assert!(collection.prepare_routing());
        collection.enable_routes(true);
        collection.enable_routes(false);

        collection.reset_availability();
        assert!(!collection.prepare_routing());
        // enabled stays stable across the no-op cycle
        let masks = collection.masks(Direction::Playback);
        assert_eq!(masks.enabled, masks.prev_enabled);
    }

    #[test]
    fn capability_reload_tracks_connection_state() {
        let mut collection = RouteCollection::new();
        let id = add_playback_route(
            &mut collection,
            "Hdmi",
            None,
            StreamRouteConfig {
                flag_mask: output_flags::PRIMARY,
                supported_device_mask: 0x4,
                capabilities: vec![crate::domain::route::CapabilityProfile {
                    channels: vec![8],
                    rates: vec![192_000],
                    formats: vec![],
                }],
                ..Default::default()
            },
        );

        let stream = Stream::playback(output_flags::PRIMARY);
        // profile rejects the route's own stereo pcm spec
        assert!(!collection.route(id).matches_stream(&stream));

        collection.handle_device_connection_state(0x4, false);
        assert!(collection.route(id).matches_stream(&stream));

        collection.handle_device_connection_state(0x4, true);
        assert!(!collection.route(id).matches_stream(&stream));
    }

    #[test]
    fn mask_to_names_joins_route_names() {
        let mut collection = RouteCollection::new();
        let a = add_playback_route(&mut collection, "Media", None, primary_config());
        let b = add_playback_route(&mut collection, "Voice", None, primary_config());
        let mask = collection.route(a).mask() | collection.route(b).mask();
        assert_eq!(collection.mask_to_names(Direction::Playback, mask), "Media|Voice");
        assert_eq!(collection.mask_to_names(Direction::Playback, 0), "none");
    }
}
