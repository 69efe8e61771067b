use core::convert::Infallible;

use bike_core::{AccelSample, SensorSource, WheelConfig, WheelTimer};
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};

/// Ride phases, in polls per scenario loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Cruise,
    Braking,
    Dusk,
    Stopped,
    Overheat,
}

const SCRIPT: [(u32, Phase); 8] = [
    (60, Phase::Cruise),
    (10, Phase::Braking),
    (80, Phase::Cruise),
    (80, Phase::Dusk),
    (30, Phase::Stopped),
    (40, Phase::Cruise),
    (30, Phase::Overheat),
    (70, Phase::Cruise),
];

/// Simulated sensor board following `SCRIPT`.
pub struct ScriptedRide {
    poll: u32,
    samples: u32,
}

impl ScriptedRide {
    pub fn new() -> Self {
        Self { poll: 0, samples: 0 }
    }

    pub fn advance(&mut self, poll: u32) {
        self.poll = poll;
    }

    pub fn phase(&self) -> Phase {
        let cycle: u32 = SCRIPT.iter().map(|(len, _)| len).sum();
        let mut at = self.poll % cycle;
        for (len, phase) in SCRIPT {
            if at < len {
                return phase;
            }
            at -= len;
        }
        Phase::Cruise
    }

    pub fn speed_kmh(&self) -> f32 {
        match self.phase() {
            Phase::Cruise | Phase::Dusk | Phase::Overheat => 24.0,
            Phase::Braking => 12.0,
            Phase::Stopped => 0.0,
        }
    }

    pub fn cadence_rpm(&self) -> u8 {
        (self.speed_kmh() * 3.5) as u8
    }

    /// Non-consuming read for the track extensions.
    pub fn board_temperature_c(&self) -> f32 {
        match self.phase() {
            Phase::Overheat => 68.0,
            _ => 22.5,
        }
    }
}

impl SensorSource for ScriptedRide {
    fn accel(&mut self) -> AccelSample {
        self.samples = self.samples.wrapping_add(1);
        let jitter = 0.02 * (self.samples as f32 * 0.7).sin();
        let x = match self.phase() {
            Phase::Braking => -0.45,
            _ => 0.0,
        };
        AccelSample::new(x + jitter, jitter, 1.0)
    }

    fn temperature_c(&mut self) -> f32 {
        self.board_temperature_c()
    }

    fn ambient_light_pct(&mut self) -> f32 {
        match self.phase() {
            Phase::Dusk => 25.0,
            _ => 85.0,
        }
    }
}

/// Drives the wheel timer interrupts from a simulated wheel speed.
pub struct WheelSim {
    config: WheelConfig,
    since_capture_s: f32,
    overflows: u32,
}

impl WheelSim {
    pub fn new(config: WheelConfig) -> Self {
        Self {
            config,
            since_capture_s: 0.0,
            overflows: 0,
        }
    }

    pub fn advance(&mut self, dt_s: f32, speed_kmh: f32, timer: &WheelTimer) {
        self.since_capture_s += dt_s;
        let freq = self.config.timer_frequency_hz;
        let period = self.config.timer_period_ticks;

        let ticks = (self.since_capture_s * freq) as u64;
        while u64::from(self.overflows + 1) * u64::from(period) <= ticks {
            timer.on_overflow();
            self.overflows += 1;
        }

        if speed_kmh <= 0.0 {
            return;
        }
        let revolution_s = self.config.circumference_m / (speed_kmh / 3.6);
        if self.since_capture_s >= revolution_s {
            let captured = ticks - u64::from(self.overflows) * u64::from(period);
            timer.on_capture(u16::try_from(captured).unwrap_or(u16::MAX));
            self.since_capture_s = 0.0;
            self.overflows = 0;
        }
    }
}

/// Light output that logs its level changes.
pub struct SimPin {
    name: &'static str,
    high: bool,
}

impl SimPin {
    pub fn new(name: &'static str) -> Self {
        Self { name, high: false }
    }

    fn set(&mut self, high: bool) {
        if self.high != high {
            log::trace!("{} light {}", self.name, if high { "on" } else { "off" });
        }
        self.high = high;
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.set(true);
        Ok(())
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.high)
    }
}
