// gps/receiver.rs
// Receive-side handoff for the navigation UART. The interrupt (or DMA
// completion) fills the buffer; the foreground copies it out, decodes it and
// re-arms reception.
use core::cell::RefCell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// One DMA transfer worth of NMEA text.
pub const RX_BUFFER_SIZE: usize = 512;

pub struct NavBuffer<const N: usize = RX_BUFFER_SIZE> {
    data: Mutex<CriticalSectionRawMutex, RefCell<Vec<u8, N>>>,
    armed: AtomicBool,
    complete: AtomicBool,
    dropped: AtomicU32,
}

impl<const N: usize> NavBuffer<N> {
    /// Starts armed, as after receiver initialisation.
    pub const fn new() -> Self {
        Self {
            data: Mutex::new(RefCell::new(Vec::new())),
            armed: AtomicBool::new(true),
            complete: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
        }
    }

    /// Receiver side. Appends while armed; a full buffer completes the
    /// transfer and disarms. Returns the number of bytes taken.
    pub fn receive(&self, bytes: &[u8]) -> usize {
        if !self.armed.load(Ordering::Acquire) {
            self.count_dropped(bytes.len());
            return 0;
        }

        let (taken, full) = self.data.lock(|data| {
            let mut data = data.borrow_mut();
            let room = N - data.len();
            let taken = room.min(bytes.len());
            // `taken` never exceeds the free capacity.
            let _ = data.extend_from_slice(&bytes[..taken]);
            (taken, data.len() == N)
        });

        if taken < bytes.len() {
            self.count_dropped(bytes.len() - taken);
        }
        if full {
            self.mark_complete();
        }
        taken
    }

    /// Reception-complete interrupt: hands the current contents to the foreground.
    pub fn mark_complete(&self) {
        self.armed.store(false, Ordering::Release);
        self.complete.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Foreground side. Copies a completed buffer into `out`; `false` when nothing is ready.
    pub fn read_ready(&self, out: &mut Vec<u8, N>) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.data.lock(|data| {
            out.clear();
            // Same capacity on both sides.
            let _ = out.extend_from_slice(&data.borrow());
        });
        true
    }

    /// Clears the buffer and restarts reception.
    pub fn rearm(&self) {
        self.data.lock(|data| data.borrow_mut().clear());
        self.complete.store(false, Ordering::Release);
        self.armed.store(true, Ordering::Release);
    }

    /// Bytes that arrived while disarmed or after the buffer filled.
    pub fn dropped_bytes(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn count_dropped(&self, count: usize) {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.dropped
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| Some(d.saturating_add(count)))
            .ok();
    }
}

impl<const N: usize> Default for NavBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_until_full_then_completes() {
        let rx = NavBuffer::<8>::new();
        assert_eq!(rx.receive(b"$GPG"), 4);
        assert!(!rx.is_ready());
        assert_eq!(rx.receive(b"GA,1234"), 4);
        assert!(rx.is_ready());
        assert_eq!(rx.dropped_bytes(), 3);

        let mut out = Vec::new();
        assert!(rx.read_ready(&mut out));
        assert_eq!(out.as_slice(), b"$GPGGA,1");
    }

    #[test]
    fn test_disarmed_until_rearm() {
        let rx = NavBuffer::<16>::new();
        rx.receive(b"$GPVTG");
        rx.mark_complete();
        assert_eq!(rx.receive(b"more"), 0);
        assert_eq!(rx.dropped_bytes(), 4);

        rx.rearm();
        assert!(!rx.is_ready());
        let mut out = Vec::new();
        assert!(!rx.read_ready(&mut out));

        rx.receive(b"$GPRMC");
        rx.mark_complete();
        assert!(rx.read_ready(&mut out));
        assert_eq!(out.as_slice(), b"$GPRMC");
    }
}
