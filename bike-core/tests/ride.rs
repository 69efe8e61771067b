use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bike_core::lights::Lights;
use bike_core::{
    BikeClassifier, BikeState, ClassifierConfig, ControlCells, GateConfig, LogOutcome, NUM_FLASH,
    NavBuffer, NavSnapshot, PointExtras, RX_BUFFER_SIZE, Reading, TrackLogger, TrackRecorder,
    on_flash_tick,
};
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use embedded_io::ErrorKind;

#[derive(Debug)]
struct NeverFails;

impl embedded_io::Error for NeverFails {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Default)]
struct VecSink(Vec<u8>);

impl embedded_io::ErrorType for VecSink {
    type Error = NeverFails;
}

impl embedded_io::Write for VecSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, NeverFails> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), NeverFails> {
        Ok(())
    }
}

#[derive(Default)]
struct CountingPin {
    high: bool,
    toggles: u32,
}

impl ErrorType for CountingPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for CountingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

impl StatefulOutputPin for CountingPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        self.high = !self.high;
        self.toggles += 1;
        Ok(())
    }
}

/// One receive transfer per second of the recording.
const SECONDS: [&[u8]; 5] = [
    b"$GPGGA,142105.000,4604.6230,N,01107.2221,E,2,09,1.2,546.0,M,46.9,M,,*5F\r\n\
      $GPGSA,A,3,10,07,05,02,29,04,08,13,,,,,1.72,1.03,1.38*0A\r\n\
      $GPRMC,142105.000,A,4604.6230,N,01107.2221,E,0.20,310.00,120124,,,D*69\r\n",
    b"$GPGSA,A,1,,,,,,,,,,,,,99.99,99.99,99.99*30\r\n\
      $GPRMC,142104.000,V,,,,,,,120124,,,N*4B\r\n",
    b"$GPGGA,142108.000,4604.6260,N,01107.2250,E,2,09,1.1,548.5,M,46.9,M,,*59\r\n\
      $GPGSA,A,3,10,07,05,02,29,04,08,13,,,,,1.72,1.03,1.38*0A\r\n\
      $GPRMC,142108.000,A,4604.6260,N,01107.2250,E,0.30,311.00,120124,,,D*67\r\n",
    b"$GPGGA,142109.000,4604.6270,N,01107.2260,E,2,09,1.0,549.0,M,46.9,M,,*5F\r\n\
      $GPRMC,142109.000,A,4604.6270,N,01107.2260,E,0.30,311.00,120124,,,D*64\r\n",
    b"$GPGGA,142109.000,4604.6270,N,01107.2260,E,2,09,1.0,549.0,M,46.9,M,,*00\r\n",
];

#[test]
fn recorded_ride_with_outage_has_two_segments() {
    let rx: NavBuffer<RX_BUFFER_SIZE> = NavBuffer::new();
    let mut snapshot = NavSnapshot::new();
    let mut logger = TrackLogger::new(TrackRecorder::new(VecSink::default()), GateConfig::new());
    logger.start(Some("Trento loop")).unwrap();

    let mut copy = heapless::Vec::<u8, RX_BUFFER_SIZE>::new();
    let mut outcomes = Vec::new();
    for second in SECONDS {
        rx.receive(second);
        rx.mark_complete();
        assert!(rx.read_ready(&mut copy));
        snapshot.ingest(&copy);
        rx.rearm();
        outcomes.push(logger.log(&snapshot, PointExtras::default()).unwrap());
    }

    assert!(matches!(outcomes[0], LogOutcome::Logged { segment_started: true }));
    assert!(matches!(outcomes[1], LogOutcome::Suppressed(_)));
    assert!(matches!(outcomes[2], LogOutcome::Logged { segment_started: true }));
    assert!(matches!(outcomes[3], LogOutcome::Logged { segment_started: false }));
    // Corrupt last transfer leaves the snapshot on the 14:21:09 fix.
    assert!(matches!(outcomes[4], LogOutcome::Suppressed(_)));
    assert_eq!(snapshot.health.checksum_errors, 1);

    let gpx = String::from_utf8(logger.finish().unwrap().0).unwrap();
    assert!(gpx.contains("<name>Trento loop</name>"));
    assert_eq!(gpx.matches("<trkseg>").count(), 2);
    assert_eq!(gpx.matches("<trkpt ").count(), 3);
    assert!(gpx.trim_end().ends_with("</gpx>"));
}

#[test]
fn sitl_recording_decodes_in_receive_transfers() {
    let recording = include_bytes!("../../bike-sitl/data/ride.nmea");
    let mut snapshot = NavSnapshot::new();
    let mut logger = TrackLogger::new(TrackRecorder::new(VecSink::default()), GateConfig::new());
    logger.start(None).unwrap();

    for transfer in recording.chunks(RX_BUFFER_SIZE) {
        snapshot.ingest(transfer);
        logger.log(&snapshot, PointExtras::default()).unwrap();
    }

    assert!(snapshot.health.decoded > 200);
    // Two corrupted sentences plus the ones cut at transfer boundaries.
    assert!(snapshot.health.checksum_errors >= 2);
    assert!(logger.recorder().points_written() > 10);
    assert!(logger.recorder().segments_written() >= 2);
}

#[test]
fn flash_interrupt_thread_ends_braking_dwell() {
    let cells: &'static ControlCells = Box::leak(Box::new(ControlCells::new()));
    let lights = Arc::new(Mutex::new(Lights::new(CountingPin::default(), CountingPin::default())));
    let running = Arc::new(AtomicBool::new(true));

    let ticker = {
        let lights = Arc::clone(&lights);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(2));
                let mut lights = lights.lock().unwrap();
                lights.flash(on_flash_tick(cells));
            }
        })
    };

    let mut classifier: BikeClassifier<'_> = BikeClassifier::new(ClassifierConfig::new(), cells);
    let braking = Reading {
        avg_accel_x_g: -0.4,
        temperature_c: 25.0,
        light_pct: 80.0,
    };
    classifier.step(braking);
    assert_eq!(classifier.state(), BikeState::Braking);

    let deadline = Instant::now() + Duration::from_secs(5);
    while classifier.state() == BikeState::Braking && Instant::now() < deadline {
        {
            // The lights lock stands in for masking the flash interrupt.
            let _masked = lights.lock().unwrap();
            classifier.step(Reading {
                avg_accel_x_g: 0.0,
                ..braking
            });
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(classifier.state(), BikeState::Idle);

    // IDLE ticks neither count nor toggle.
    thread::sleep(Duration::from_millis(20));
    running.store(false, Ordering::Relaxed);
    ticker.join().unwrap();
    assert_eq!(cells.flashes.get(), 0);

    let lights = Arc::try_unwrap(lights).ok().unwrap().into_inner().unwrap();
    let (front, rear) = lights.release();
    assert!(rear.toggles >= NUM_FLASH);
    assert_eq!(front.toggles, 0);
}
