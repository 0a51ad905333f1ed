//! Integration tests for the route manager
//!
//! These tests drive complete reconsideration cycles through the public
//! manager surface and verify the stage sequences recorded by the settings
//! engine, the device open/close ordering, and the stream bindings.

use std::sync::Arc;

use signalpath_core::domain::audio::{input_sources, output_flags, AudioDevice, Direction};
use signalpath_core::domain::config::PlatformConfig;
use signalpath_core::domain::criteria::stages;
use signalpath_core::domain::route::StreamRouteConfig;
use signalpath_core::domain::stream::Stream;
use signalpath_core::domain::testing::{op_log, DeviceOp, MockDevice, OpLog};
use signalpath_infra::routing::RouteManager;
use signalpath_infra::settings::SettingsEngine;

/// Demo phone platform: a backend voice path and two stream routes, all
/// playback elements competing for one shared codec bus pair
const PHONE_PLATFORM: &str = r#"
    [[ports]]
    name = "media_bus"

    [[ports]]
    name = "voice_bus"

    [[port_groups]]
    name = "codec_ssp"
    members = ["media_bus", "voice_bus"]

    [[routes]]
    name = "ModemVoice"
    direction = "playback"
    sink = "voice_bus"

    [[stream_routes]]
    name = "Media"
    direction = "playback"
    sink = "media_bus"

    [stream_routes.config]
    card_name = "media"
    device_id = 0
    flag_mask = 0x15
    silence_prolog_ms = 10

    [stream_routes.config.pcm]
    channels = 2
    rate = 48000
    period_size = 960
    period_count = 4

    [[stream_routes]]
    name = "VoiceRec"
    direction = "capture"

    [stream_routes.config]
    card_name = "voice"
    device_id = 1
    flag_mask = 0x1
    use_case_mask = 0x3

    [[criterion_types]]
    name = "OutputDevices"
    inclusive = true
    values = [
        { literal = "Speaker" },
        { literal = "Headset" },
    ]

    [[criteria]]
    name = "SelectedOutputDevices"
    type = "OutputDevices"
    default = "Speaker"
"#;

/// Masks follow registration order per direction
const MODEM_VOICE_MASK: u32 = 1;
const MEDIA_MASK: u32 = 2;

struct Harness {
    manager: Arc<RouteManager>,
    sink: Arc<SettingsEngine>,
    log: OpLog,
}

fn start_harness(platform: &str) -> Harness {
    let config = PlatformConfig::from_str(platform).expect("platform parses");
    let sink = Arc::new(SettingsEngine::new());
    let log = op_log();
    let factory_log = log.clone();
    let mut factory = move |config: &StreamRouteConfig| -> Box<dyn AudioDevice> {
        if config.card_name == "failing" {
            Box::new(MockDevice::failing())
        } else {
            Box::new(MockDevice::with_log(factory_log.clone()))
        }
    };
    let manager =
        Arc::new(RouteManager::new(&config, sink.clone(), &mut factory).expect("manager builds"));
    manager.start().expect("manager starts");
    Harness { manager, sink, log }
}

fn ops(log: &OpLog) -> Vec<DeviceOp> {
    log.lock().unwrap().clone()
}

#[test]
fn first_playback_executes_five_stages() {
    let h = start_harness(PHONE_PLATFORM);
    let media = Stream::playback(output_flags::PRIMARY);
    h.manager.add_stream(Arc::clone(&media));
    h.manager.start_stream(&media);

    assert!(media.is_routed());
    assert_eq!(media.silence_prolog_ms(), 10);

    // mute, disable, configure, enable, unmute
    assert_eq!(h.sink.apply_count(), 5);
    assert_eq!(
        h.sink.applied_history("RoutingStage"),
        vec![
            stages::FLOW,
            stages::PATH,
            stages::CONFIGURE,
            stages::PATH | stages::CONFIGURE,
            stages::CONFIGURE | stages::PATH | stages::FLOW,
        ]
    );
    // nothing was previously open: closing stays empty, the new route
    // appears as opened from the configure stage on
    assert_eq!(
        h.sink.applied_history("ClosingPlaybackRoutes"),
        vec![0, 0, 0, 0, 0]
    );
    assert_eq!(
        h.sink.applied_history("OpenedPlaybackRoutes"),
        vec![0, 0, MEDIA_MASK, MEDIA_MASK, MEDIA_MASK]
    );

    // the device opened once, in the enable stage
    assert_eq!(
        ops(&h.log),
        vec![DeviceOp::Open {
            card: "media".to_string(),
            device_id: 0,
            is_out: true,
        }]
    );
}

#[test]
fn second_reconsideration_takes_cheap_path() {
    let h = start_harness(PHONE_PLATFORM);
    let media = Stream::playback(output_flags::PRIMARY);
    h.manager.add_stream(Arc::clone(&media));
    h.manager.start_stream(&media);
    let applies_after_start = h.sink.apply_count();
    let ops_after_start = ops(&h.log).len();

    h.manager.reconsider_routing(true);

    // one apply, no stages, no device traffic
    assert_eq!(h.sink.apply_count(), applies_after_start + 1);
    assert_eq!(ops(&h.log).len(), ops_after_start);
    assert_eq!(
        h.sink.applied_history("RoutingStage").last().copied(),
        Some(stages::CONFIGURE | stages::PATH | stages::FLOW)
    );
}

#[test]
fn staged_criteria_flow_through_cheap_path() {
    let h = start_harness(PHONE_PLATFORM);

    // Headset is bit 2 of the inclusive OutputDevices type
    assert!(h.manager.set_criterion("SelectedOutputDevices", 2));
    assert_eq!(h.manager.criterion_value("SelectedOutputDevices"), 2);
    // staged only: the engine still sees the declared default
    assert_eq!(h.sink.criterion_state("SelectedOutputDevices"), Some(1));

    h.manager.reconsider_routing(true);
    assert_eq!(h.sink.criterion_state("SelectedOutputDevices"), Some(2));
    assert_eq!(h.sink.apply_count(), 1);
}

#[test]
fn stop_stream_tears_route_down() {
    let h = start_harness(PHONE_PLATFORM);
    let media = Stream::playback(output_flags::PRIMARY);
    h.manager.add_stream(Arc::clone(&media));
    h.manager.start_stream(&media);

    h.manager.stop_stream(&media);

    assert!(!media.is_routed());
    // teardown cycle: the route is closing through mute and disable
    assert_eq!(
        h.sink.applied_history("ClosingPlaybackRoutes"),
        vec![0, 0, 0, 0, 0, MEDIA_MASK, MEDIA_MASK, 0, 0, 0]
    );
    assert_eq!(
        h.sink.applied_history("OpenedPlaybackRoutes"),
        vec![0, 0, MEDIA_MASK, MEDIA_MASK, MEDIA_MASK, 0, 0, 0, 0, 0]
    );
    assert_eq!(
        ops(&h.log).last(),
        Some(&DeviceOp::Close {
            card: "media".to_string()
        })
    );
}

#[test]
fn stream_swap_closes_before_reopening() {
    let h = start_harness(PHONE_PLATFORM);
    let ordinary = Stream::playback(output_flags::PRIMARY);
    h.manager.add_stream(Arc::clone(&ordinary));
    h.manager.start_stream(&ordinary);
    assert!(ordinary.is_routed());

    // a direct stream preempts the route serving the ordinary stream
    let direct = Stream::playback(output_flags::DIRECT);
    h.manager.add_stream(Arc::clone(&direct));
    h.manager.start_stream(&direct);

    assert!(!ordinary.is_routed());
    assert!(direct.is_routed());

    // the route never overlaps its own open/close: open, close, open
    let recorded = ops(&h.log);
    assert_eq!(
        recorded,
        vec![
            DeviceOp::Open {
                card: "media".to_string(),
                device_id: 0,
                is_out: true,
            },
            DeviceOp::Close {
                card: "media".to_string()
            },
            DeviceOp::Open {
                card: "media".to_string(),
                device_id: 0,
                is_out: true,
            },
        ]
    );
}

#[test]
fn backend_route_steals_shared_bus() {
    let h = start_harness(PHONE_PLATFORM);
    let media = Stream::playback(output_flags::PRIMARY);
    h.manager.add_stream(Arc::clone(&media));
    h.manager.start_stream(&media);
    assert!(media.is_routed());

    // the modem voice path becomes applicable; its bus is mutually
    // exclusive with the media bus, so media loses its route
    h.manager
        .set_route_applicable("ModemVoice", Direction::Playback, true);
    h.manager.reconsider_routing(true);

    assert!(!media.is_routed());
    assert_eq!(
        h.sink.criterion_state("OpenedPlaybackRoutes"),
        Some(MODEM_VOICE_MASK)
    );

    // the call path goes away again and media gets its route back
    h.manager
        .set_route_applicable("ModemVoice", Direction::Playback, false);
    h.manager.reconsider_routing(true);
    assert!(media.is_routed());
    assert_eq!(h.sink.criterion_state("OpenedPlaybackRoutes"), Some(MEDIA_MASK));
}

#[test]
fn capture_and_playback_route_independently() {
    let h = start_harness(PHONE_PLATFORM);
    let media = Stream::playback(output_flags::PRIMARY);
    let mic = Stream::capture(input_sources::MIC);
    h.manager.add_stream(Arc::clone(&media));
    h.manager.add_stream(Arc::clone(&mic));

    h.manager.start_stream(&mic);
    assert!(mic.is_routed());
    assert!(!media.is_routed());
    assert_eq!(h.sink.criterion_state("OpenedCaptureRoutes"), Some(1));
    assert_eq!(h.sink.criterion_state("OpenedPlaybackRoutes"), Some(0));

    h.manager.start_stream(&media);
    assert!(media.is_routed());
    assert_eq!(h.sink.criterion_state("OpenedCaptureRoutes"), Some(1));
    assert_eq!(h.sink.criterion_state("OpenedPlaybackRoutes"), Some(MEDIA_MASK));
}

#[test]
fn latency_and_period_follow_route_pcm_config() {
    let h = start_harness(PHONE_PLATFORM);
    let media = Stream::playback(output_flags::PRIMARY);

    // 960 frames at 48 kHz per period, 4 periods
    assert_eq!(h.manager.period_us(&media), 20_000);
    assert_eq!(h.manager.latency_us(&media), 80_000);

    // no capture route serves the camcorder source
    let camcorder = Stream::capture(input_sources::CAMCORDER);
    assert_eq!(h.manager.latency_us(&camcorder), 0);
}

#[test]
fn voice_output_stream_is_first_registered_playback() {
    let h = start_harness(PHONE_PLATFORM);
    assert!(h.manager.voice_output_stream().is_none());

    let media = Stream::playback(output_flags::PRIMARY);
    h.manager.add_stream(Arc::clone(&media));
    let voice = h.manager.voice_output_stream().unwrap();
    assert!(signalpath_core::domain::stream::same_stream(&voice, &media));
}

const POST_DISABLE_PLATFORM: &str = r#"
    [[stream_routes]]
    name = "Aux"
    direction = "playback"

    [stream_routes.config]
    card_name = "aux"
    require_pre_enable = true
    require_post_disable = true
    flag_mask = 0x1
"#;

#[test]
fn post_disable_route_applies_twice_on_teardown() {
    let h = start_harness(POST_DISABLE_PLATFORM);
    let stream = Stream::playback(output_flags::PRIMARY);
    h.manager.add_stream(Arc::clone(&stream));

    h.manager.start_stream(&stream);
    // no route closed: the enable cycle applies five times
    assert_eq!(h.sink.apply_count(), 5);
    assert!(stream.is_routed());

    h.manager.stop_stream(&stream);
    // the closing route defers its device close past a sixth apply
    assert_eq!(h.sink.apply_count(), 11);
    assert_eq!(
        ops(&h.log).last(),
        Some(&DeviceOp::Close {
            card: "aux".to_string()
        })
    );
}

const FAILING_PLATFORM: &str = r#"
    [[stream_routes]]
    name = "Broken"
    direction = "playback"

    [stream_routes.config]
    card_name = "failing"
    flag_mask = 0x1
"#;

#[test]
fn device_failure_leaves_stream_unrouted() {
    let h = start_harness(FAILING_PLATFORM);
    let stream = Stream::playback(output_flags::PRIMARY);
    h.manager.add_stream(Arc::clone(&stream));

    h.manager.start_stream(&stream);

    // the cycle ran to completion, the stream just stayed unrouted
    assert_eq!(h.sink.apply_count(), 5);
    assert!(!stream.is_routed());

    // recovery happens through a later cycle once the stream retries
    h.manager.stop_stream(&stream);
    assert!(!stream.is_routed());
}

#[test]
fn removed_stream_is_never_matched_again() {
    let h = start_harness(PHONE_PLATFORM);
    let media = Stream::playback(output_flags::PRIMARY);
    h.manager.add_stream(Arc::clone(&media));
    h.manager.start_stream(&media);

    h.manager.stop_stream(&media);
    h.manager.remove_stream(&media);
    media.set_started(true);
    h.manager.reconsider_routing(true);

    assert!(!media.is_routed());
    assert_eq!(h.sink.criterion_state("OpenedPlaybackRoutes"), Some(0));
}
