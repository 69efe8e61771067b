// state_machine.rs
use heapless::Vec;

use crate::config::{ACCEL_WINDOW_SIZE, ClassifierConfig};
use crate::datacells::{FlashCounter, StateCell};
use crate::sensors::SensorSource;
use crate::types::{AccelSample, BikeState, FlashAction, LightCommand};

/// Cells the classifier shares with the flash interrupt.
pub struct ControlCells {
    /// Written by the classifier only.
    pub state: StateCell,
    /// Incremented by the flash interrupt only, reset by the classifier only.
    pub flashes: FlashCounter,
}

impl ControlCells {
    pub const fn new() -> Self {
        Self {
            state: StateCell::new(BikeState::Idle),
            flashes: FlashCounter::new(),
        }
    }
}

impl Default for ControlCells {
    fn default() -> Self {
        Self::new()
    }
}

/// Inputs of one classifier step.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    /// Window average of the X acceleration, in g.
    pub avg_accel_x_g: f32,
    pub temperature_c: f32,
    pub light_pct: f32,
}

/// Accelerometer samples gathered for one poll.
pub struct AccelWindow<const N: usize> {
    samples: Vec<AccelSample, N>,
}

impl<const N: usize> AccelWindow<N> {
    pub const fn new() -> Self {
        Self { samples: Vec::new() }
    }

    /// Replaces the window with `N` fresh samples.
    pub fn fill<S: SensorSource>(&mut self, sensors: &mut S) {
        self.samples.clear();
        while !self.samples.is_full() {
            let _ = self.samples.push(sensors.accel());
        }
    }

    pub fn average_x(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.samples.iter().map(|s| s.x).sum();
        sum / self.samples.len() as f32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl<const N: usize> Default for AccelWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Class chosen from IDLE. The first matching rule wins: overheat, braking,
/// darkness, then plain riding.
pub fn classify(reading: &Reading, config: &ClassifierConfig) -> BikeState {
    if reading.temperature_c > config.t_max_c {
        BikeState::Error
    } else if reading.avg_accel_x_g < config.acc_threshold_g {
        BikeState::Braking
    } else if reading.light_pct < config.light_threshold_pct {
        BikeState::LowAmbientLight
    } else {
        BikeState::Moving
    }
}

/// Body of the periodic flash interrupt.
///
/// Counts a tick and asks for a toggle only while a dwell state is active.
pub fn on_flash_tick(cells: &ControlCells) -> FlashAction {
    match cells.state.load() {
        BikeState::Error => {
            cells.flashes.increment();
            FlashAction::RearAndFront
        }
        BikeState::Braking => {
            cells.flashes.increment();
            FlashAction::Rear
        }
        _ => FlashAction::None,
    }
}

/// Foreground half of the light state machine.
///
/// ERROR and BRAKING dwell until the flash interrupt has ticked
/// `num_flash` times; MOVING and LOW_AMBIENT_LIGHT set the lights and fall
/// back to IDLE on the next poll.
pub struct BikeClassifier<'a, const N: usize = ACCEL_WINDOW_SIZE> {
    state: BikeState,
    pub config: ClassifierConfig,
    /// Inputs of the most recent step.
    pub last_reading: Reading,
    window: AccelWindow<N>,
    cells: &'a ControlCells,
}

impl<'a, const N: usize> BikeClassifier<'a, N> {
    pub fn new(config: ClassifierConfig, cells: &'a ControlCells) -> Self {
        cells.state.store(BikeState::Idle);
        cells.flashes.reset();
        Self {
            state: BikeState::Idle,
            config,
            last_reading: Reading::default(),
            window: AccelWindow::new(),
            cells,
        }
    }

    pub fn state(&self) -> BikeState {
        self.state
    }

    /// Samples the sensors and runs one step.
    pub fn poll<S: SensorSource>(&mut self, sensors: &mut S) -> LightCommand {
        self.window.fill(sensors);
        let reading = Reading {
            avg_accel_x_g: self.window.average_x(),
            temperature_c: sensors.temperature_c(),
            light_pct: sensors.ambient_light_pct(),
        };
        self.step(reading)
    }

    pub fn step(&mut self, reading: Reading) -> LightCommand {
        self.last_reading = reading;
        let flashes = self.cells.flashes.get();

        let (next, command) = match self.state {
            BikeState::Idle => (classify(&reading, &self.config), LightCommand::None),
            BikeState::Error => {
                if flashes >= self.config.num_flash && reading.temperature_c <= self.config.t_max_c {
                    (BikeState::Idle, LightCommand::None)
                } else {
                    (BikeState::Error, LightCommand::None)
                }
            }
            BikeState::Braking => {
                if flashes >= self.config.num_flash {
                    (BikeState::Idle, LightCommand::None)
                } else {
                    (BikeState::Braking, LightCommand::None)
                }
            }
            BikeState::Moving => (BikeState::Idle, LightCommand::AllOff),
            BikeState::LowAmbientLight => (BikeState::Idle, LightCommand::AllOn),
        };

        self.enter(next);
        command
    }

    fn enter(&mut self, next: BikeState) {
        let prev = self.state;
        if prev == next {
            return;
        }

        self.state = next;
        self.cells.state.store(next);
        // Reset after the store, so a tick landing in between sees the new
        // state and does not count.
        if next == BikeState::Idle {
            self.cells.flashes.reset();
        }

        if prev.is_dwell() || next.is_dwell() {
            debug!("state: {} -> {}", prev.name(), next.name());
        } else {
            trace!("state: {} -> {}", prev.name(), next.name());
        }
    }
}

#[cfg(test)]
mod tests;
