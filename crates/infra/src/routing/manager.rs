//! The route manager: public surface and the five-stage commit protocol
//!
//! One reconsideration cycle runs entirely on the routing worker thread and
//! holds the graph write lock from reset to unmute. The five stages are
//! strictly ordered: muting before any hardware change prevents pops,
//! disabling before configuring keeps configuration away from live routes,
//! configuring before enabling makes hardware power up with final settings,
//! and unmuting last hides every transient.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crossbeam::channel::bounded;
use thiserror::Error;
use tracing::{debug, error, warn};

use signalpath_core::domain::audio::{AudioDevice, Direction};
use signalpath_core::domain::collection::RouteCollection;
use signalpath_core::domain::config::{ConfigError, PlatformConfig};
use signalpath_core::domain::criteria::{
    stages, CriteriaSet, CriteriaSink, Criterion, SinkError, ROUTING_STAGE_CRITERION,
};
use signalpath_core::domain::route::StreamRouteConfig;
use signalpath_core::domain::stream::Stream;

use super::worker::{Request, RoutingWorker};

/// Names of the per-direction closing-routes criteria
const CLOSING_ROUTE_CRITERION: [&str; 2] = ["ClosingCaptureRoutes", "ClosingPlaybackRoutes"];
/// Names of the per-direction opened-routes criteria
const OPENED_ROUTE_CRITERION: [&str; 2] = ["OpenedCaptureRoutes", "OpenedPlaybackRoutes"];
/// Names of the per-direction route criterion types
const ROUTE_CRITERION_TYPE: [&str; 2] = ["RouteCaptureType", "RoutePlaybackType"];

/// Errors of the manager lifecycle
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("route manager already started")]
    AlreadyStarted,

    #[error("failed to spawn routing worker: {0}")]
    Worker(#[from] std::io::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Everything the routing worker shares with the public surface
pub(crate) struct ManagerShared {
    pub(crate) graph: RwLock<RoutingState>,
    pub(crate) sink: Arc<dyn CriteriaSink>,
    started: AtomicBool,
}

/// The graph and criteria state a cycle operates on
pub(crate) struct RoutingState {
    pub(crate) collection: RouteCollection,
    criteria: CriteriaSet,
    closing_criteria: [Criterion; Direction::COUNT],
    opened_criteria: [Criterion; Direction::COUNT],
    stage_criterion: Criterion,
}

/// Public entry point of the routing engine
///
/// Owns the graph behind one reader/writer lock and the routing worker
/// thread. Streams, criteria and reconsideration requests all funnel
/// through here.
pub struct RouteManager {
    shared: Arc<ManagerShared>,
    worker: Mutex<Option<RoutingWorker>>,
}

impl RouteManager {
    /// Build the manager from a platform description
    ///
    /// Creates one device per stream route through `device_factory`, and
    /// declares every criterion type and criterion (platform criteria,
    /// per-direction route masks, the routing stage) to the sink. The sink
    /// must not be started yet.
    pub fn new(
        config: &PlatformConfig,
        sink: Arc<dyn CriteriaSink>,
        device_factory: &mut dyn FnMut(&StreamRouteConfig) -> Box<dyn AudioDevice>,
    ) -> Result<Self, ConfigError> {
        let collection = config.build_collection(device_factory)?;
        let criteria = config.build_criteria()?;
        criteria.declare(sink.as_ref());

        for direction in Direction::ALL {
            sink.add_criterion_type(ROUTE_CRITERION_TYPE[direction.index()], true);
        }
        for route in collection.routes() {
            sink.add_criterion_type_value(
                ROUTE_CRITERION_TYPE[route.direction().index()],
                route.name(),
                route.mask(),
            );
        }

        let closing_criteria = Direction::ALL.map(|direction| {
            let name = CLOSING_ROUTE_CRITERION[direction.index()];
            sink.add_criterion(name, ROUTE_CRITERION_TYPE[direction.index()], 0);
            Criterion::new(name, ROUTE_CRITERION_TYPE[direction.index()], 0)
        });
        let opened_criteria = Direction::ALL.map(|direction| {
            let name = OPENED_ROUTE_CRITERION[direction.index()];
            sink.add_criterion(name, ROUTE_CRITERION_TYPE[direction.index()], 0);
            Criterion::new(name, ROUTE_CRITERION_TYPE[direction.index()], 0)
        });

        sink.add_criterion_type(ROUTING_STAGE_CRITERION, true);
        for (literal, numeric) in stages::VALUE_PAIRS {
            sink.add_criterion_type_value(ROUTING_STAGE_CRITERION, literal, numeric);
        }
        // all stages selected at init, so the first cycle applies every
        // pending configuration and first playback starts with low latency
        let initial_stage = stages::CONFIGURE | stages::PATH | stages::FLOW;
        sink.add_criterion(ROUTING_STAGE_CRITERION, ROUTING_STAGE_CRITERION, initial_stage);
        let stage_criterion =
            Criterion::new(ROUTING_STAGE_CRITERION, ROUTING_STAGE_CRITERION, initial_stage);

        Ok(Self {
            shared: Arc::new(ManagerShared {
                graph: RwLock::new(RoutingState {
                    collection,
                    criteria,
                    closing_criteria,
                    opened_criteria,
                    stage_criterion,
                }),
                sink,
                started: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        })
    }

    /// Start the sink and the routing worker
    pub fn start(&self) -> Result<(), RoutingError> {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return Err(RoutingError::AlreadyStarted);
        }
        self.shared.sink.start()?;
        *worker = Some(RoutingWorker::spawn(Arc::clone(&self.shared))?);
        self.shared.started.store(true, Ordering::SeqCst);
        debug!("route manager started");
        Ok(())
    }

    /// Stop the routing worker; pending requests are served first
    pub fn stop(&self) {
        let worker = self.worker.lock().unwrap().take();
        if let Some(worker) = worker {
            self.shared.started.store(false, Ordering::SeqCst);
            worker.stop();
            debug!("route manager stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst)
    }

    // ---- stream registration ----

    /// Register an open stream with the routing engine
    pub fn add_stream(&self, stream: Arc<Stream>) {
        let mut state = self.shared.graph.write().unwrap();
        state.collection.add_stream(stream);
    }

    /// Unregister a stream; the caller must have stopped it first
    pub fn remove_stream(&self, stream: &Arc<Stream>) {
        let mut state = self.shared.graph.write().unwrap();
        state.collection.remove_stream(stream);
    }

    /// Mark a stream started and synchronously reroute
    ///
    /// Synchronous so that no samples are lost in the window between the
    /// stream starting and its route being enabled.
    pub fn start_stream(&self, stream: &Arc<Stream>) {
        stream.set_started(true);
        self.reconsider_routing(true);
    }

    /// Mark a stream stopped and synchronously reroute
    pub fn stop_stream(&self, stream: &Arc<Stream>) {
        stream.set_started(false);
        self.reconsider_routing(true);
    }

    // ---- reconsideration ----

    /// Request a reconsideration cycle
    ///
    /// When `synchronous`, blocks until the worker completed the cycle.
    pub fn reconsider_routing(&self, synchronous: bool) {
        self.reconsider_routing_with(synchronous, false);
    }

    /// Request a reconsideration cycle, optionally bypassing the
    /// nothing-changed shortcut
    ///
    /// # Panics
    ///
    /// Panics when called from the routing worker thread; a synchronous
    /// request from there would deadlock on itself.
    pub fn reconsider_routing_with(&self, synchronous: bool, force_resync: bool) {
        let sender = {
            let worker = self.worker.lock().unwrap();
            let Some(worker) = worker.as_ref() else {
                warn!("cannot serve request, route manager is not started");
                return;
            };
            assert!(
                std::thread::current().id() != worker.thread_id(),
                "reconsideration requested from the routing thread"
            );
            worker.sender()
        };

        if !synchronous {
            let _ = sender.send(Request::Reconsider {
                force_resync,
                done: None,
            });
            return;
        }

        let (done_tx, done_rx) = bounded(1);
        if sender
            .send(Request::Reconsider {
                force_resync,
                done: Some(done_tx),
            })
            .is_ok()
        {
            // no timeout: waiters block until the worker completes
            let _ = done_rx.recv();
        }
    }

    // ---- criteria ----

    /// Stage a criterion value; it reaches the settings engine at the next
    /// commit. Panics on an unknown criterion name.
    pub fn set_criterion(&self, name: &str, value: u32) -> bool {
        let mut state = self.shared.graph.write().unwrap();
        state.criteria.set_value(name, value)
    }

    /// Stage a criterion by literal; false when the literal is unknown
    pub fn set_criterion_literal(&self, name: &str, literal: &str) -> bool {
        let mut state = self.shared.graph.write().unwrap();
        state.criteria.set_literal(name, literal)
    }

    /// Last staged value of a criterion; panics on an unknown name
    pub fn criterion_value(&self, name: &str) -> u32 {
        let state = self.shared.graph.read().unwrap();
        state.criteria.value(name)
    }

    // ---- route and port state pushed by the configuration engine ----

    /// Declare a backend route applicable (or not) for the next cycles
    pub fn set_route_applicable(&self, name: &str, direction: Direction, applicable: bool) {
        let mut state = self.shared.graph.write().unwrap();
        let id = state.collection.expect_route(name, direction);
        state.collection.route_mut(id).set_applicable(applicable);
    }

    /// Request a mute/unmute pass for a route that stays open
    pub fn set_route_need_reconfigure(&self, name: &str, direction: Direction, need: bool) {
        let mut state = self.shared.graph.write().unwrap();
        let id = state.collection.expect_route(name, direction);
        state.collection.route_mut(id).set_need_reconfigure(need);
    }

    /// Request a full disable/enable pass for a route that stays selected
    pub fn set_route_need_reroute(&self, name: &str, direction: Direction, need: bool) {
        let mut state = self.shared.graph.write().unwrap();
        let id = state.collection.expect_route(name, direction);
        state.collection.route_mut(id).set_need_reroute(need);
    }

    /// Block or unblock a port and every route using it
    pub fn set_port_blocked(&self, name: &str, blocked: bool) {
        let mut state = self.shared.graph.write().unwrap();
        state.collection.set_port_blocked(name, blocked);
    }

    /// Declare an effect implemented by a stream route
    ///
    /// # Panics
    ///
    /// Panics when the route is unknown or not a stream route.
    pub fn add_route_supported_effect(&self, name: &str, direction: Direction, effect: u32) {
        let mut state = self.shared.graph.write().unwrap();
        let id = state.collection.expect_route(name, direction);
        state
            .collection
            .route_mut(id)
            .as_stream_route_mut()
            .unwrap_or_else(|| panic!("route {name} is not a stream route"))
            .add_effect_supported(effect);
    }

    /// Reload or reset capabilities of routes covering a connectable device
    pub fn handle_device_connection_state(&self, device_mask: u32, connected: bool) {
        let mut state = self.shared.graph.write().unwrap();
        state
            .collection
            .handle_device_connection_state(device_mask, connected);
    }

    // ---- stream queries ----

    /// Worst-case latency of the route that would serve the stream,
    /// microseconds; zero when no route matches
    pub fn latency_us(&self, stream: &Stream) -> u64 {
        let state = self.shared.graph.read().unwrap();
        match state.collection.find_matching_route_for_stream(stream) {
            Some(route) => route.as_stream_route().map_or(0, |sr| sr.latency_us()),
            None => {
                error!(
                    "no route found for stream with flags={:#x}, use case={:#x}",
                    stream.flags(),
                    stream.use_case()
                );
                0
            }
        }
    }

    /// Period of the route that would serve the stream, microseconds; zero
    /// when no route matches
    pub fn period_us(&self, stream: &Stream) -> u64 {
        let state = self.shared.graph.read().unwrap();
        match state.collection.find_matching_route_for_stream(stream) {
            Some(route) => route.as_stream_route().map_or(0, |sr| sr.period_us()),
            None => {
                error!(
                    "no route found for stream with flags={:#x}, use case={:#x}",
                    stream.flags(),
                    stream.use_case()
                );
                0
            }
        }
    }

    /// First registered playback stream, used as the voice echo reference
    pub fn voice_output_stream(&self) -> Option<Arc<Stream>> {
        let state = self.shared.graph.read().unwrap();
        state.collection.voice_output_stream()
    }

    /// Currently enabled route names in a direction, for dumps
    pub fn enabled_routes(&self, direction: Direction) -> String {
        let state = self.shared.graph.read().unwrap();
        let mask = state.collection.masks(direction).enabled;
        state.collection.mask_to_names(direction, mask)
    }
}

impl Drop for RouteManager {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---- the five-stage commit protocol, worker-thread only ----

pub(crate) fn do_reconsider_routing(
    state: &mut RoutingState,
    sink: &dyn CriteriaSink,
    force_resync: bool,
) {
    state.collection.reset_availability();
    let changed = state.collection.prepare_routing();
    if !changed && !force_resync {
        // Nothing to reroute. Criteria may still have moved (tuning that is
        // glitch free), so commit them all and apply without going through
        // the 5-stage protocol.
        state.criteria.commit(sink);
        sink.apply_configurations();
        return;
    }

    for direction in Direction::ALL {
        let masks = state.collection.masks(direction);
        debug!(
            "route state in {}: previously enabled [{}], selected [{}], reflow [{}], repath [{}]",
            direction,
            state
                .collection
                .mask_to_names(direction, masks.prev_enabled),
            state.collection.mask_to_names(direction, masks.enabled),
            state
                .collection
                .mask_to_names(direction, masks.need_reflow),
            state
                .collection
                .mask_to_names(direction, masks.need_repath),
        );
    }

    execute_mute_stage(state, sink);
    execute_disable_stage(state, sink);
    execute_configure_stage(state, sink);
    execute_enable_stage(state, sink);
    execute_unmute_stage(state, sink);
    debug!("routing done");
}

/// Silence everything about to change; untouched routes stay audible
fn execute_mute_stage(state: &mut RoutingState, sink: &dyn CriteriaSink) {
    debug!("-mute routing stage-");
    state.stage_criterion.set_state(sink, stages::FLOW);
    for direction in Direction::ALL {
        let masks = *state.collection.masks(direction);
        state.closing_criteria[direction.index()].set_state(sink, masks.routes_to_mute());
        state.opened_criteria[direction.index()].set_state(sink, masks.unmuted_routes());
    }
    sink.apply_configurations();
}

/// Tear down closing routes: detach streams, then close devices
fn execute_disable_stage(state: &mut RoutingState, sink: &dyn CriteriaSink) {
    debug!("-disable routing stage-");
    state.stage_criterion.set_state(sink, stages::PATH);
    for direction in Direction::ALL {
        let masks = *state.collection.masks(direction);
        state.closing_criteria[direction.index()].set_state(sink, masks.routes_to_disable());
        state.opened_criteria[direction.index()].set_state(sink, masks.opened_routes());
    }
    sink.apply_configurations();

    let has_post_disable = state.collection.closing_requires_post_disable();
    state.collection.disable_routes(false);
    state.collection.disable_routes(true);
    if has_post_disable {
        // two-phase devices closed after the path teardown was applied
        sink.apply_configurations();
    }
}

/// Push the final configuration while everything changing is silent
fn execute_configure_stage(state: &mut RoutingState, sink: &dyn CriteriaSink) {
    debug!("-configure routing stage-");
    state.stage_criterion.set_state(sink, stages::CONFIGURE);
    state.collection.configure_routes();
    for direction in Direction::ALL {
        let enabled = state.collection.masks(direction).enabled;
        state.closing_criteria[direction.index()].set_state(sink, 0);
        state.opened_criteria[direction.index()].set_state(sink, enabled);
    }
    state.criteria.commit(sink);
    sink.apply_configurations();
}

/// Bring up newly selected routes: open devices, then attach streams
fn execute_enable_stage(state: &mut RoutingState, sink: &dyn CriteriaSink) {
    debug!("-enable routing stage-");
    state
        .stage_criterion
        .set_state(sink, stages::PATH | stages::CONFIGURE);
    state.collection.enable_routes(true);
    sink.apply_configurations();
    state.collection.enable_routes(false);
}

/// Everything now enabled becomes audible
fn execute_unmute_stage(state: &mut RoutingState, sink: &dyn CriteriaSink) {
    debug!("-unmute routing stage-");
    state
        .stage_criterion
        .set_state(sink, stages::CONFIGURE | stages::PATH | stages::FLOW);
    sink.apply_configurations();
}
