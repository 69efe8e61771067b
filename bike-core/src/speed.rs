// speed.rs
use portable_atomic::{AtomicU32, Ordering};

use crate::config::{WheelConfig, circumference_from_inches};
use crate::datacells::Latch;

/// One wheel revolution as seen by the capture unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureEvent {
    /// Timer value latched at the sensor edge.
    pub captured_ticks: u16,
    /// Timer wraps since the previous edge.
    pub overflow_count: u32,
}

impl CaptureEvent {
    pub fn elapsed_ticks(&self, period_ticks: u32) -> u64 {
        u64::from(self.captured_ticks) + u64::from(self.overflow_count) * u64::from(period_ticks)
    }
}

/// Interrupt-side state of the wheel timer.
///
/// The timer is cleared on every capture, so the overflows counted since the
/// last capture belong to the next event. The capture handler moves them
/// into the event and zeroes the counter in one step.
pub struct WheelTimer {
    overflows: AtomicU32,
    capture: Latch<CaptureEvent>,
}

impl WheelTimer {
    pub const fn new() -> Self {
        Self {
            overflows: AtomicU32::new(0),
            capture: Latch::new(),
        }
    }

    /// Timer overflow interrupt.
    pub fn on_overflow(&self) {
        self.overflows
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_add(1)))
            .ok();
    }

    /// Capture interrupt. Returns `true` if an unconsumed event was overwritten.
    pub fn on_capture(&self, captured_ticks: u16) -> bool {
        let overflow_count = self.overflows.swap(0, Ordering::AcqRel);
        self.capture.publish(CaptureEvent {
            captured_ticks,
            overflow_count,
        })
    }

    /// Wraps since the last capture.
    pub fn pending_overflows(&self) -> u32 {
        self.overflows.load(Ordering::Acquire)
    }

    pub fn take_event(&self) -> Option<CaptureEvent> {
        self.capture.take()
    }

    /// Events replaced before the foreground consumed them.
    pub fn lost_events(&self) -> u32 {
        self.capture.overwrites()
    }
}

impl Default for WheelTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns capture events into speed and distance.
pub struct SpeedEstimator {
    pub config: WheelConfig,
    speed_kmh: f32,
    rotations: u32,
}

impl SpeedEstimator {
    pub const fn new(config: WheelConfig) -> Self {
        Self {
            config,
            speed_kmh: 0.0,
            rotations: 0,
        }
    }

    pub fn set_wheel_diameter_inches(&mut self, diameter_in: f32) {
        self.config.circumference_m = circumference_from_inches(diameter_in);
    }

    /// Consumes a pending capture, or applies the stall timeout when none is
    /// pending. Returns the new speed when it changed.
    pub fn update(&mut self, timer: &WheelTimer) -> Option<f32> {
        match timer.take_event() {
            Some(event) => self.consume(event),
            None if self.check_stall(timer.pending_overflows()) => Some(self.speed_kmh),
            None => None,
        }
    }

    /// Speed in km/h for one revolution. Events with zero elapsed time are ignored.
    pub fn consume(&mut self, event: CaptureEvent) -> Option<f32> {
        let elapsed_ticks = event.elapsed_ticks(self.config.timer_period_ticks);
        if elapsed_ticks == 0 || self.config.timer_frequency_hz <= 0.0 {
            return None;
        }

        let elapsed_s = elapsed_ticks as f32 / self.config.timer_frequency_hz;
        let speed_ms = self.config.circumference_m / elapsed_s;
        self.speed_kmh = speed_ms * 3.6;
        self.rotations = self.rotations.saturating_add(1);
        Some(self.speed_kmh)
    }

    /// Drops the speed to zero once no capture has arrived for the stall timeout.
    fn check_stall(&mut self, pending_overflows: u32) -> bool {
        let Some(timeout_s) = self.config.stall_timeout_s else {
            return false;
        };
        if self.speed_kmh == 0.0 {
            return false;
        }

        let idle_ticks = u64::from(pending_overflows) * u64::from(self.config.timer_period_ticks);
        let idle_s = idle_ticks as f32 / self.config.timer_frequency_hz;
        if idle_s < timeout_s {
            return false;
        }

        debug!("speed: wheel stalled");
        self.speed_kmh = 0.0;
        true
    }

    pub fn speed_kmh(&self) -> f32 {
        self.speed_kmh
    }

    pub fn rotations(&self) -> u32 {
        self.rotations
    }

    /// Distance since the last reset, in meters.
    pub fn distance_m(&self) -> f32 {
        self.rotations as f32 * self.config.circumference_m
    }

    pub fn reset_distance(&mut self) {
        self.rotations = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{STALL_TIMEOUT_S, TIMER_FREQUENCY_HZ, TIMER_PERIOD_TICKS, WHEEL_CIRCUMFERENCE_M};
    use approx::assert_relative_eq;

    #[test]
    fn test_speed_with_overflows() {
        let timer = WheelTimer::new();
        let mut est = SpeedEstimator::new(WheelConfig::new());

        timer.on_overflow();
        timer.on_overflow();
        timer.on_capture(100);

        let speed = est.update(&timer).unwrap();
        let elapsed_s = (100.0 + 2.0 * TIMER_PERIOD_TICKS as f32) / TIMER_FREQUENCY_HZ;
        assert_relative_eq!(speed, WHEEL_CIRCUMFERENCE_M / elapsed_s * 3.6, epsilon = 1e-4);

        // Consumed exactly once, with the overflow count already zeroed.
        assert_eq!(timer.pending_overflows(), 0);
        assert_eq!(timer.take_event(), None);
        assert_eq!(est.rotations(), 1);
    }

    #[test]
    fn test_speed_without_overflow() {
        let mut est = SpeedEstimator::new(WheelConfig::new());
        // A quarter second per revolution.
        let speed = est
            .consume(CaptureEvent {
                captured_ticks: 11_718,
                overflow_count: 0,
            })
            .unwrap();
        let expected = WHEEL_CIRCUMFERENCE_M / (11_718.0 / TIMER_FREQUENCY_HZ) * 3.6;
        assert_relative_eq!(speed, expected, epsilon = 1e-3);
    }

    #[test]
    fn test_zero_elapsed_is_ignored() {
        let mut est = SpeedEstimator::new(WheelConfig::new());
        assert_eq!(
            est.consume(CaptureEvent {
                captured_ticks: 0,
                overflow_count: 0,
            }),
            None
        );
        assert_eq!(est.rotations(), 0);
    }

    #[test]
    fn test_capture_is_last_value_wins() {
        let timer = WheelTimer::new();
        timer.on_overflow();
        assert!(!timer.on_capture(500));
        assert!(timer.on_capture(700));
        assert_eq!(timer.lost_events(), 1);
        assert_eq!(
            timer.take_event(),
            Some(CaptureEvent {
                captured_ticks: 700,
                overflow_count: 0,
            })
        );
    }

    #[test]
    fn test_distance_accumulates_and_resets() {
        let mut est = SpeedEstimator::new(WheelConfig::new().with_diameter_inches(28.0));
        for _ in 0..10 {
            est.consume(CaptureEvent {
                captured_ticks: 12_000,
                overflow_count: 0,
            });
        }
        assert_relative_eq!(est.distance_m(), 10.0 * est.config.circumference_m, epsilon = 1e-4);
        est.reset_distance();
        assert_relative_eq!(est.distance_m(), 0.0);
    }

    #[test]
    fn test_stall_timeout_zeroes_speed() {
        let timer = WheelTimer::new();
        let mut config = WheelConfig::new();
        config.stall_timeout_s = Some(STALL_TIMEOUT_S);
        let mut est = SpeedEstimator::new(config);
        timer.on_capture(20_000);
        assert!(est.update(&timer).is_some());

        // Two wraps (about 2.8 s) are still under the 3 s timeout.
        timer.on_overflow();
        timer.on_overflow();
        assert_eq!(est.update(&timer), None);
        assert!(est.speed_kmh() > 0.0);

        timer.on_overflow();
        assert_eq!(est.update(&timer), Some(0.0));
        assert_eq!(est.update(&timer), None);
    }

    #[test]
    fn test_stopped_wheel_keeps_speed_by_default() {
        let timer = WheelTimer::new();
        let mut est = SpeedEstimator::new(WheelConfig::new());
        timer.on_capture(20_000);
        est.update(&timer);
        for _ in 0..10 {
            timer.on_overflow();
        }
        assert_eq!(est.update(&timer), None);
        assert!(est.speed_kmh() > 0.0);
    }
}
