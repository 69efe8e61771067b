// lights.rs
use embedded_hal::digital::StatefulOutputPin;

use crate::types::{FlashAction, LightCommand};

/// Front and rear warning lights on two output pins.
///
/// Pin errors are logged and otherwise ignored; a stuck light must not stop
/// the control loop or the flash interrupt.
pub struct Lights<F, R> {
    front: F,
    rear: R,
}

impl<F: StatefulOutputPin, R: StatefulOutputPin> Lights<F, R> {
    pub fn new(front: F, rear: R) -> Self {
        Self { front, rear }
    }

    /// Steady output requested by the classifier.
    pub fn apply(&mut self, command: LightCommand) {
        let ok = match command {
            LightCommand::None => return,
            LightCommand::AllOff => self.front.set_low().is_ok() & self.rear.set_low().is_ok(),
            LightCommand::AllOn => self.front.set_high().is_ok() & self.rear.set_high().is_ok(),
        };
        if !ok {
            warn!("lights: steady command not applied");
        }
    }

    /// Called from the flash interrupt.
    pub fn flash(&mut self, action: FlashAction) {
        let ok = match action {
            FlashAction::None => return,
            FlashAction::Rear => self.rear.toggle().is_ok(),
            FlashAction::RearAndFront => self.rear.toggle().is_ok() & self.front.toggle().is_ok(),
        };
        if !ok {
            warn!("lights: toggle failed");
        }
    }

    pub fn front_is_on(&mut self) -> bool {
        self.front.is_set_high().unwrap_or(false)
    }

    pub fn rear_is_on(&mut self) -> bool {
        self.rear.is_set_high().unwrap_or(false)
    }

    pub fn release(self) -> (F, R) {
        (self.front, self.rear)
    }
}
