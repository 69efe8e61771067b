// types.rs

/// Operating state of the bike safety system.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BikeState {
    Idle = 0,            // Evaluating the next class
    Error = 1,           // Sensor temperature above the limit, flash both lights
    Braking = 2,         // Deceleration detected, flash the rear light
    Moving = 3,          // Normal riding, lights off
    LowAmbientLight = 4, // Normal riding in the dark, lights on
}

impl BikeState {
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => BikeState::Error,
            2 => BikeState::Braking,
            3 => BikeState::Moving,
            4 => BikeState::LowAmbientLight,
            _ => BikeState::Idle,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            BikeState::Idle => "IDLE",
            BikeState::Error => "ERROR",
            BikeState::Braking => "BRAKING",
            BikeState::Moving => "MOVING",
            BikeState::LowAmbientLight => "LOW_AMBIENT_LIGHT",
        }
    }

    /// States that hold across polls until the flash counter says otherwise.
    pub const fn is_dwell(&self) -> bool {
        matches!(self, BikeState::Error | BikeState::Braking)
    }
}

/// One accelerometer reading, in g.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccelSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AccelSample {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Steady light output requested by the classifier on a transient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LightCommand {
    None,
    AllOff,
    AllOn,
}

/// Lights to toggle on one tick of the flash interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashAction {
    None,
    Rear,
    RearAndFront,
}
