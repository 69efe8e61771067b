// datacells.rs
// Cells shared between the foreground loop and interrupt handlers. Each cell
// has exactly one writer context and one reader context.
use core::cell::Cell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use portable_atomic::{AtomicU8, AtomicU32, Ordering};

use crate::types::BikeState;

/// A blackboard-style value: readers always see the latest write.
pub struct DataCell<T: Copy> {
    storage: Mutex<CriticalSectionRawMutex, Cell<T>>,
    generation: AtomicU32,
}

impl<T: Copy> DataCell<T> {
    /// Create a new cell with an initial value.
    pub const fn new(init: T) -> Self {
        Self {
            storage: Mutex::new(Cell::new(init)),
            generation: AtomicU32::new(0),
        }
    }

    /// Update the data in the cell (The "Write").
    pub fn update(&self, data: T) {
        self.storage.lock(|cell| {
            cell.set(data);
        });
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of writes since creation; lets a reader spot fresh data.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Fetch the latest data from the cell (The "Read").
    pub fn read(&self) -> T {
        self.storage.lock(|cell| cell.get())
    }
}

/// Single-slot handoff from an interrupt to the foreground loop.
///
/// Publishing while a previous value is still pending replaces it
/// (last value wins); the replaced value is counted, never queued.
pub struct Latch<T: Copy> {
    slot: Mutex<CriticalSectionRawMutex, Cell<Option<T>>>,
    overwrites: AtomicU32,
}

impl<T: Copy> Latch<T> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
            overwrites: AtomicU32::new(0),
        }
    }

    /// Producer side. Returns `true` if an undrained value was overwritten.
    pub fn publish(&self, value: T) -> bool {
        let replaced = self.slot.lock(|slot| slot.replace(Some(value)).is_some());
        if replaced {
            self.overwrites.fetch_add(1, Ordering::Relaxed);
        }
        replaced
    }

    /// Consumer side. Drains the pending value, if any.
    pub fn take(&self) -> Option<T> {
        self.slot.lock(|slot| slot.take())
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock(|slot| slot.get().is_some())
    }

    /// Values lost to last-value-wins since creation.
    pub fn overwrites(&self) -> u32 {
        self.overwrites.load(Ordering::Relaxed)
    }
}

impl<T: Copy> Default for Latch<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Current `BikeState`, written by the classifier and read by the flash interrupt.
pub struct StateCell(AtomicU8);

impl StateCell {
    pub const fn new(state: BikeState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> BikeState {
        BikeState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: BikeState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Flash ticks seen in the current dwell state.
///
/// Only the flash interrupt increments it and only the classifier resets it.
/// Increments saturate so a long dwell can never wrap back under the limit.
pub struct FlashCounter(AtomicU32);

impl FlashCounter {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn increment(&self) -> u32 {
        let prev = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                Some(c.saturating_add(1))
            })
            .unwrap_or(u32::MAX);
        prev.saturating_add(1)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for FlashCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datacell_init() {
        let cell = DataCell::new(42);
        assert_eq!(cell.read(), 42);
        assert_eq!(cell.generation(), 0);
    }

    #[test]
    fn test_datacell_update() {
        let cell = DataCell::new(0);
        cell.update(100);
        assert_eq!(cell.read(), 100);
        assert_eq!(cell.generation(), 1);
    }

    #[test]
    fn test_latch_take_drains() {
        let latch = Latch::new();
        assert!(!latch.publish(7u32));
        assert!(latch.is_pending());
        assert_eq!(latch.take(), Some(7));
        assert_eq!(latch.take(), None);
    }

    #[test]
    fn test_latch_last_value_wins() {
        let latch = Latch::new();
        latch.publish(1u32);
        assert!(latch.publish(2));
        assert!(latch.publish(3));
        assert_eq!(latch.take(), Some(3));
        assert_eq!(latch.overwrites(), 2);

        // A drained latch accepts the next value without counting a loss.
        assert!(!latch.publish(4));
        assert_eq!(latch.overwrites(), 2);
    }

    #[test]
    fn test_state_cell_round_trip() {
        let cell = StateCell::new(BikeState::Idle);
        cell.store(BikeState::Braking);
        assert_eq!(cell.load(), BikeState::Braking);
    }

    #[test]
    fn test_flash_counter_saturates() {
        let counter = FlashCounter::new();
        counter.0.store(u32::MAX - 1, Ordering::Relaxed);
        assert_eq!(counter.increment(), u32::MAX);
        assert_eq!(counter.increment(), u32::MAX);
        counter.reset();
        assert_eq!(counter.get(), 0);
    }
}
