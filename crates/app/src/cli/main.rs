//! Signalpath CLI
//!
//! Drives the route manager through a scripted phone-audio session over
//! mock devices: media playback starts, a call comes in, voice capture
//! starts, then everything unwinds. Useful to eyeball the stage sequence a
//! platform description produces before putting it on a device.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use signalpath_core::domain::audio::{input_sources, output_flags, Direction};
use signalpath_core::domain::config::PlatformConfig;
use signalpath_core::domain::stream::Stream;
use signalpath_infra::device::mock_device_factory;
use signalpath_infra::platform::{PlatformState, TelephonyMode};
use signalpath_infra::routing::RouteManager;
use signalpath_infra::settings::SettingsEngine;

/// Built-in demo platform: one shared bus pair, media and voice routes
const DEMO_PLATFORM: &str = r#"
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
card_name = "demo-card"
device_id = 0
flag_mask = 0x7
silence_prolog_ms = 10

[[stream_routes]]
name = "VoiceRec"
direction = "capture"

[stream_routes.config]
card_name = "demo-card"
device_id = 1
flag_mask = 0x1
use_case_mask = 0x3

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

[[criterion_types]]
name = "OutputDevices"
inclusive = true
values = [
    { literal = "Speaker" },
    { literal = "Headset" },
]

[[criteria]]
name = "TelephonyMode"
type = "TelephonyMode"
default = "Normal"

[[criteria]]
name = "ModemState"
type = "ModemState"
default = "Dead"

[[criteria]]
name = "SelectedOutputDevices"
type = "OutputDevices"
default = "Speaker"
"#;

#[derive(Parser)]
#[command(name = "signalpath")]
#[command(about = "Audio route manager demo driver", long_about = None)]
struct Cli {
    /// Platform description file; the built-in demo platform when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the applied configuration snapshots as JSON on exit
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    let config = match &cli.config {
        Some(path) => PlatformConfig::from_path(path)?,
        None => PlatformConfig::from_str(DEMO_PLATFORM)?,
    };

    let sink = Arc::new(SettingsEngine::new());
    let mut factory = mock_device_factory;
    let manager = Arc::new(RouteManager::new(&config, sink.clone(), &mut factory)?);
    manager.start()?;
    let platform = PlatformState::new(Arc::clone(&manager), false);

    // media playback session
    let media = Stream::playback(output_flags::PRIMARY);
    manager.add_stream(Arc::clone(&media));
    info!(
        "media stream: latency {} us, period {} us",
        manager.latency_us(&media),
        manager.period_us(&media)
    );
    manager.start_stream(&media);
    info!(
        "playback routes enabled: {}",
        manager.enabled_routes(Direction::Playback)
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    // incoming call: mode change plus voice capture
    platform.set_modem_alive(true);
    platform.set_telephony_mode(TelephonyMode::InCall);
    let voice = Stream::capture(input_sources::VOICE_COMMUNICATION);
    manager.add_stream(Arc::clone(&voice));
    manager.start_stream(&voice);
    info!(
        "capture routes enabled: {}",
        manager.enabled_routes(Direction::Capture)
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    // call ends, everything unwinds
    manager.stop_stream(&voice);
    manager.remove_stream(&voice);
    platform.set_telephony_mode(TelephonyMode::Normal);
    manager.stop_stream(&media);
    manager.remove_stream(&media);
    manager.reconsider_routing(true);
    info!(
        "playback routes enabled after teardown: {}",
        manager.enabled_routes(Direction::Playback)
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&sink.applied_snapshots())?);
    }

    manager.stop();
    Ok(())
}
