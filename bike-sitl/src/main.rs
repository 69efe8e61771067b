mod scenario;
mod sink;

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, anyhow};
use bike_core::blackboard::{INTERRUPTS, RideStatus, TELEMETRY};
use bike_core::{
    BikeClassifier, BikeConfig, DecoderHealth, FLASH_PERIOD_MS, Lights, LogOutcome,
    NavSnapshot, PointExtras, RX_BUFFER_SIZE, SpeedEstimator, TrackLogger, TrackRecorder, on_flash_tick,
};
use clap::Parser;
use serde::Serialize;

use crate::scenario::{ScriptedRide, SimPin, WheelSim};
use crate::sink::FileSink;

/// Polls between two simulated receive transfers.
const POLLS_PER_TRANSFER: u32 = 10;

#[derive(Parser, Debug)]
#[command(version, about = "Replays a recorded NMEA ride through bike-core")]
struct Args {
    /// Recorded NMEA log to replay.
    #[arg(long, default_value = "bike-sitl/data/ride.nmea")]
    nmea: PathBuf,

    /// GPX file to write.
    #[arg(long, default_value = "ride.gpx")]
    out: PathBuf,

    /// JSON `BikeConfig`; built-in defaults when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wheel diameter in inches, overrides the configured circumference.
    #[arg(long)]
    wheel_diameter: Option<f32>,

    /// Zero the speed after this many seconds without a wheel capture.
    #[arg(long)]
    stall_timeout: Option<f32>,

    /// Foreground polls to run.
    #[arg(long, default_value_t = 400)]
    polls: u32,

    /// Foreground poll period.
    #[arg(long, default_value_t = 20)]
    poll_ms: u64,

    #[arg(long, default_value = "Ride")]
    track_name: String,
}

#[derive(Serialize)]
struct Summary<'a> {
    ride: RideStatus,
    points_suppressed: u32,
    segments: u32,
    lost_wheel_events: u32,
    dropped_rx_bytes: u32,
    decoder: DecoderHealth,
    last_fix: &'a NavSnapshot,
}

fn load_config(args: &Args) -> anyhow::Result<BikeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => BikeConfig::default(),
    };
    if let Some(diameter) = args.wheel_diameter {
        config.wheel = config.wheel.with_diameter_inches(diameter);
    }
    if args.stall_timeout.is_some() {
        config.wheel.stall_timeout_s = args.stall_timeout;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;
    log::info!("config: {config:?}");

    let nmea = fs::read(&args.nmea).with_context(|| format!("reading {}", args.nmea.display()))?;
    let mut transfers = nmea.chunks(RX_BUFFER_SIZE);

    let mut logger = TrackLogger::new(TrackRecorder::new(FileSink::create(&args.out)?), config.gate);
    logger.start(Some(args.track_name.as_str()))?;

    let lights = Arc::new(Mutex::new(Lights::new(SimPin::new("front"), SimPin::new("rear"))));
    let running = Arc::new(AtomicBool::new(true));

    // Periodic flash interrupt.
    let flash_timer = {
        let lights = Arc::clone(&lights);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(u64::from(FLASH_PERIOD_MS)));
                if let Ok(mut lights) = lights.lock() {
                    lights.flash(on_flash_tick(&INTERRUPTS.control));
                }
            }
        })
    };

    let mut classifier: BikeClassifier<'static> = BikeClassifier::new(config.classifier, &INTERRUPTS.control);
    let mut estimator = SpeedEstimator::new(config.wheel);
    let mut wheel = WheelSim::new(config.wheel);
    let mut sensors = ScriptedRide::new();
    let mut snapshot = NavSnapshot::new();
    let mut rx = heapless::Vec::<u8, RX_BUFFER_SIZE>::new();
    let dt_s = args.poll_ms as f32 / 1000.0;

    println!("SITL running: {} polls, replaying {}", args.polls, args.nmea.display());

    for poll in 0..args.polls {
        sensors.advance(poll);

        // 1. Receive interrupt
        if poll % POLLS_PER_TRANSFER == 0 {
            if let Some(chunk) = transfers.next() {
                INTERRUPTS.nav_rx.receive(chunk);
                if chunk.len() < RX_BUFFER_SIZE {
                    INTERRUPTS.nav_rx.mark_complete();
                }
            }
        }

        // 2. Decode and log
        if INTERRUPTS.nav_rx.read_ready(&mut rx) {
            let batch = snapshot.ingest(&rx);
            INTERRUPTS.nav_rx.rearm();
            log::debug!("decoded {} sentences, {} rejected", batch.decoded, batch.checksum_errors + batch.malformed);
            TELEMETRY.decoder.update(snapshot.health);

            let extras = PointExtras {
                temperature_c: Some(sensors.board_temperature_c()),
                cadence_rpm: Some(sensors.cadence_rpm()),
            };
            match logger.log(&snapshot, extras)? {
                LogOutcome::Logged { segment_started: true } => log::info!("track: new segment"),
                LogOutcome::Logged { .. } => {}
                LogOutcome::Suppressed(reason) => log::debug!("track: point suppressed ({reason:?})"),
            }
        }

        // 3. Wheel capture
        wheel.advance(dt_s, sensors.speed_kmh(), &INTERRUPTS.wheel);
        estimator.update(&INTERRUPTS.wheel);

        // 4. Classifier
        let old_state = classifier.state();
        {
            // Holding the lights lock masks the flash interrupt.
            let mut lights = lights.lock().map_err(|_| anyhow!("flash timer thread panicked"))?;
            let command = classifier.poll(&mut sensors);
            lights.apply(command);
        }
        if classifier.state() != old_state && (old_state.is_dwell() || classifier.state().is_dwell()) {
            println!("STATE CHANGE: {} -> {}", old_state.name(), classifier.state().name());
        }

        TELEMETRY.ride.update(RideStatus {
            state: classifier.state(),
            speed_kmh: estimator.speed_kmh(),
            distance_m: estimator.distance_m(),
            points_logged: logger.recorder().points_written(),
        });

        thread::sleep(Duration::from_millis(args.poll_ms));
    }

    running.store(false, Ordering::Relaxed);
    if flash_timer.join().is_err() {
        log::warn!("flash timer thread panicked");
    }

    let summary = Summary {
        ride: TELEMETRY.ride.read(),
        points_suppressed: logger.suppressed(),
        segments: logger.recorder().segments_written(),
        lost_wheel_events: INTERRUPTS.wheel.lost_events(),
        dropped_rx_bytes: INTERRUPTS.nav_rx.dropped_bytes(),
        decoder: TELEMETRY.decoder.read(),
        last_fix: &snapshot,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    logger.finish()?;
    println!("Track written to {}", args.out.display());
    Ok(())
}
