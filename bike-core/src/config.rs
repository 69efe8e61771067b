// config.rs
// Compile-time defaults and the runtime configuration built from them.

use core::f32::consts::PI;

use crate::gps::types::FixQuality;

/// Number of samples averaged per classifier poll.
pub const ACCEL_WINDOW_SIZE: usize = 10;

/// Average X acceleration (g) below which the bike counts as braking.
pub const ACC_THRESHOLD_G: f32 = -0.1;

/// Ambient light (percent) below which the lights are switched on.
pub const LIGHT_THRESHOLD_PCT: f32 = 40.0;

/// Flash interrupt ticks spent in a dwell state before it may be left.
pub const NUM_FLASH: u32 = 4;

/// Sensor temperature (°C) above which the system enters ERROR.
pub const T_MAX_C: f32 = 60.0;

/// Lowest operating temperature (°C) of the sensor board.
pub const T_MIN_C: f32 = -20.0;

/// Period of the flash interrupt.
pub const FLASH_PERIOD_MS: u32 = 150;

/// Wheel timer input clock: 3 MHz SMCLK divided by 64.
pub const TIMER_FREQUENCY_HZ: f32 = 46_875.0;

/// Ticks per wrap of the 16-bit wheel timer.
pub const TIMER_PERIOD_TICKS: u32 = 65_536;

/// Default wheel circumference in meters (700x23c road wheel).
pub const WHEEL_CIRCUMFERENCE_M: f32 = 2.3141;

/// Suggested stall timeout when one is enabled in `WheelConfig`.
pub const STALL_TIMEOUT_S: f32 = 3.0;

const METERS_PER_INCH: f32 = 0.0254;

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct ClassifierConfig {
    pub acc_threshold_g: f32,
    pub light_threshold_pct: f32,
    pub num_flash: u32,
    pub t_max_c: f32,
}

impl ClassifierConfig {
    pub const fn new() -> Self {
        Self {
            acc_threshold_g: ACC_THRESHOLD_G,
            light_threshold_pct: LIGHT_THRESHOLD_PCT,
            num_flash: NUM_FLASH,
            t_max_c: T_MAX_C,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct WheelConfig {
    pub circumference_m: f32,
    pub timer_frequency_hz: f32,
    pub timer_period_ticks: u32,
    /// No capture for this long zeroes the speed. `None`, the default, keeps
    /// the last speed once the wheel stops.
    pub stall_timeout_s: Option<f32>,
}

impl WheelConfig {
    pub const fn new() -> Self {
        Self {
            circumference_m: WHEEL_CIRCUMFERENCE_M,
            timer_frequency_hz: TIMER_FREQUENCY_HZ,
            timer_period_ticks: TIMER_PERIOD_TICKS,
            stall_timeout_s: None,
        }
    }

    /// Builds the circumference from the wheel diameter the user picks in inches.
    pub fn with_diameter_inches(mut self, diameter_in: f32) -> Self {
        self.circumference_m = circumference_from_inches(diameter_in);
        self
    }
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub fn circumference_from_inches(diameter_in: f32) -> f32 {
    PI * diameter_in * METERS_PER_INCH
}

/// Fix quality a point must meet before it is written to the track.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct GateConfig {
    /// Lowest GGA fix quality accepted.
    pub min_fix_quality: FixQuality,
    /// GSA fix mode (1 = none, 2 = 2D, 3 = 3D), checked when a GSA was received.
    pub min_fix_mode: u8,
    pub max_hdop: f32,
}

impl GateConfig {
    pub const fn new() -> Self {
        Self {
            min_fix_quality: FixQuality::Dgps,
            min_fix_mode: 2,
            max_hdop: 4.0,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BikeConfig {
    pub classifier: ClassifierConfig,
    pub wheel: WheelConfig,
    pub gate: GateConfig,
}
