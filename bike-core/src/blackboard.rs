// blackboard.rs
use crate::datacells::DataCell;
use crate::gps::receiver::{NavBuffer, RX_BUFFER_SIZE};
use crate::gps::types::DecoderHealth;
use crate::speed::WheelTimer;
use crate::state_machine::ControlCells;
use crate::types::BikeState;

/// Ride figures published by the foreground loop for the display.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RideStatus {
    pub state: BikeState,
    pub speed_kmh: f32,
    pub distance_m: f32,
    pub points_logged: u32,
}

impl RideStatus {
    pub const fn new() -> Self {
        Self {
            state: BikeState::Idle,
            speed_kmh: 0.0,
            distance_m: 0.0,
            points_logged: 0,
        }
    }
}

/// Cells written from interrupt context.
pub struct InterruptCells {
    pub control: ControlCells,
    pub wheel: WheelTimer,
    pub nav_rx: NavBuffer<RX_BUFFER_SIZE>,
}

/// Cells written from the foreground loop.
pub struct Telemetry {
    pub ride: DataCell<RideStatus>,
    pub decoder: DataCell<DecoderHealth>,
}

pub static INTERRUPTS: InterruptCells = InterruptCells {
    control: ControlCells::new(),
    wheel: WheelTimer::new(),
    nav_rx: NavBuffer::new(),
};

pub static TELEMETRY: Telemetry = Telemetry {
    ride: DataCell::new(RideStatus::new()),
    decoder: DataCell::new(DecoderHealth::new()),
};
