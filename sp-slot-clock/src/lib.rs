// Copyright (c) 2018-2025 The Botho Foundation

//! Slot clock (spec.md §4.1): maps wall-time to slot numbers, signals seal
//! cutover.
//!
//! `SlotClock` is the generic interface; [`SystemSlotClock`] is the
//! wall-clock-driven production implementation and [`ManualSlotClock`] is a
//! test double, following the role `consensus/service.rs`'s
//! `current_slot_duration` dynamic-timing logic plays in the teacher as the
//! thing a test harness substitutes for wall time.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use sp_types::ports::SlotManager;
use thiserror::Error;

/// Errors constructing a slot clock.
#[derive(Debug, Error)]
pub enum SlotClockError {
    /// The configured seal cutover ratio was outside `(0, 1)`.
    #[error("seal cutover ratio must be in (0, 1), got {0}")]
    InvalidSealCutover(f64),

    /// The configured slot duration was zero.
    #[error("slot duration must be non-zero")]
    ZeroSlotDuration,
}

/// Maps wall-time to slot numbers, signals seal cutover.
pub trait SlotClock: SlotManager {
    /// Current slot number.
    fn current_slot(&self) -> u64;

    /// True iff the fraction of the current slot elapsed is past the
    /// configured seal cutover ratio.
    fn is_seal_time(&self) -> bool;

    /// Milliseconds elapsed into the current slot.
    fn elapsed_in_slot_ms(&self) -> u64;
}

/// Wall-clock-driven production slot clock.
///
/// The clock is monotone: `current_slot` only ever increases, and callers
/// must tolerate slot skips (e.g. process pause, restart) by jumping ahead
/// rather than replaying.
pub struct SystemSlotClock {
    genesis_time: SystemTime,
    slot_duration: Duration,
    seal_cutover: f64,
}

impl SystemSlotClock {
    /// Build a new clock. `seal_cutover` must be in `(0, 1)`, typically
    /// `2.0 / 3.0`.
    pub fn new(
        genesis_time: SystemTime,
        slot_duration: Duration,
        seal_cutover: f64,
    ) -> Result<Self, SlotClockError> {
        if slot_duration.is_zero() {
            return Err(SlotClockError::ZeroSlotDuration);
        }
        if !(seal_cutover > 0.0 && seal_cutover < 1.0) {
            return Err(SlotClockError::InvalidSealCutover(seal_cutover));
        }
        Ok(Self {
            genesis_time,
            slot_duration,
            seal_cutover,
        })
    }

    fn elapsed_since_genesis(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.genesis_time)
            .unwrap_or(Duration::ZERO)
    }
}

impl SlotClock for SystemSlotClock {
    fn current_slot(&self) -> u64 {
        let elapsed = self.elapsed_since_genesis();
        (elapsed.as_secs_f64() / self.slot_duration.as_secs_f64()).floor() as u64
    }

    fn is_seal_time(&self) -> bool {
        let fraction = self.elapsed_in_slot_ms() as f64 / self.slot_duration.as_millis() as f64;
        fraction >= self.seal_cutover
    }

    fn elapsed_in_slot_ms(&self) -> u64 {
        let elapsed = self.elapsed_since_genesis();
        let slot_ms = self.slot_duration.as_millis() as u64;
        if slot_ms == 0 {
            return 0;
        }
        elapsed.as_millis() as u64 % slot_ms
    }
}

impl SlotManager for SystemSlotClock {
    fn get_current_slot(&self) -> u64 {
        self.current_slot()
    }

    fn is_slot_seal_time(&self) -> bool {
        self.is_seal_time()
    }
}

/// A test double whose slot and seal-time state is set directly, rather than
/// derived from `SystemTime::now()`.
pub struct ManualSlotClock {
    inner: RwLock<ManualState>,
}

struct ManualState {
    slot: u64,
    seal_time: bool,
    elapsed_in_slot_ms: u64,
}

impl ManualSlotClock {
    pub fn new(slot: u64) -> Self {
        Self {
            inner: RwLock::new(ManualState {
                slot,
                seal_time: false,
                elapsed_in_slot_ms: 0,
            }),
        }
    }

    /// Advance to `slot` (monotone; panics if `slot` goes backwards).
    pub fn set_slot(&self, slot: u64) {
        let mut state = self.inner.write();
        assert!(slot >= state.slot, "slot clock must be monotone");
        state.slot = slot;
        state.seal_time = false;
        state.elapsed_in_slot_ms = 0;
    }

    /// Flip seal-cutover on or off within the current slot.
    pub fn set_seal_time(&self, seal_time: bool) {
        self.inner.write().seal_time = seal_time;
    }

    pub fn set_elapsed_in_slot_ms(&self, elapsed_ms: u64) {
        self.inner.write().elapsed_in_slot_ms = elapsed_ms;
    }
}

impl SlotClock for ManualSlotClock {
    fn current_slot(&self) -> u64 {
        self.inner.read().slot
    }

    fn is_seal_time(&self) -> bool {
        self.inner.read().seal_time
    }

    fn elapsed_in_slot_ms(&self) -> u64 {
        self.inner.read().elapsed_in_slot_ms
    }
}

impl SlotManager for ManualSlotClock {
    fn get_current_slot(&self) -> u64 {
        self.current_slot()
    }

    fn is_slot_seal_time(&self) -> bool {
        self.is_seal_time()
    }
}

/// Helper used by constructors that want a `UNIX_EPOCH`-relative genesis
/// time from a Unix-seconds value, mirroring how config files specify
/// genesis.
pub fn genesis_time_from_unix_secs(unix_secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(unix_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_seal_cutover() {
        assert!(SystemSlotClock::new(UNIX_EPOCH, Duration::from_secs(12), 0.0).is_err());
        assert!(SystemSlotClock::new(UNIX_EPOCH, Duration::from_secs(12), 1.0).is_err());
        assert!(SystemSlotClock::new(UNIX_EPOCH, Duration::from_secs(12), 1.5).is_err());
    }

    #[test]
    fn rejects_zero_duration() {
        assert!(SystemSlotClock::new(UNIX_EPOCH, Duration::ZERO, 2.0 / 3.0).is_err());
    }

    #[test]
    fn future_genesis_yields_slot_zero() {
        let future = SystemTime::now() + Duration::from_secs(3600);
        let clock = SystemSlotClock::new(future, Duration::from_secs(12), 2.0 / 3.0).unwrap();
        assert_eq!(clock.current_slot(), 0);
    }

    #[test]
    fn manual_clock_is_monotone() {
        let clock = ManualSlotClock::new(5);
        clock.set_slot(10);
        assert_eq!(clock.current_slot(), 10);
    }

    #[test]
    #[should_panic(expected = "monotone")]
    fn manual_clock_rejects_going_backwards() {
        let clock = ManualSlotClock::new(10);
        clock.set_slot(5);
    }

    #[test]
    fn manual_clock_seal_time_toggle() {
        let clock = ManualSlotClock::new(0);
        assert!(!clock.is_seal_time());
        clock.set_seal_time(true);
        assert!(clock.is_seal_time());
    }
}
