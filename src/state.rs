//! State shared between the control loop (core 0) and the transmission loop
//! (core 1).
//!
//! Cortex-M0+ has atomic 32-bit loads and stores but no compare-and-swap, so
//! each field is one word written by a single core.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_time::{Duration, Instant};

use crate::drivers::dshot::ThrottleCommand;

// ── Throttle pair ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThrottlePair {
    pub m1: ThrottleCommand,
    pub m2: ThrottleCommand,
}

impl ThrottlePair {
    pub const ZERO: Self = Self { m1: ThrottleCommand::ZERO, m2: ThrottleCommand::ZERO };

    /// m1 in the low half, m2 in the high half.
    pub const fn pack(self) -> u32 {
        (self.m1.raw() as u32) | ((self.m2.raw() as u32) << 16)
    }

    pub const fn unpack(word: u32) -> Self {
        Self {
            m1: ThrottleCommand::new(word as u16),
            m2: ThrottleCommand::new((word >> 16) as u16),
        }
    }

    pub const fn is_zero(self) -> bool {
        self.m1.is_zero() && self.m2.is_zero()
    }
}

// ── Shared control state ─────────────────────────────────────────────────────

/// Written by the control loop (pair, heartbeat) and the transmission loop
/// (armed flag).
pub struct SharedControlState {
    pair: AtomicU32,
    /// Publish time of `pair`, in ms since boot. Wraps after ~49 days.
    heartbeat_ms: AtomicU32,
    armed: AtomicBool,
}

impl SharedControlState {
    pub const fn new() -> Self {
        Self {
            pair: AtomicU32::new(ThrottlePair::ZERO.pack()),
            heartbeat_ms: AtomicU32::new(0),
            armed: AtomicBool::new(false),
        }
    }

    pub fn publish(&self, pair: ThrottlePair, now: Instant) {
        self.pair.store(pair.pack(), Ordering::Release);
        self.heartbeat_ms.store(now.as_millis() as u32, Ordering::Release);
    }

    pub fn throttle_pair(&self) -> ThrottlePair {
        ThrottlePair::unpack(self.pair.load(Ordering::Acquire))
    }

    /// Time since the last publish.
    pub fn age(&self, now: Instant) -> Duration {
        let last = self.heartbeat_ms.load(Ordering::Acquire);
        Duration::from_millis((now.as_millis() as u32).wrapping_sub(last) as u64)
    }

    /// The published pair, or zero when the publisher has gone quiet for
    /// longer than `timeout`.
    pub fn fresh_pair(&self, now: Instant, timeout: Duration) -> Option<ThrottlePair> {
        if self.age(now) > timeout {
            None
        } else {
            Some(self.throttle_pair())
        }
    }

    pub fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

impl Default for SharedControlState {
    fn default() -> Self {
        Self::new()
    }
}

pub static CONTROL_STATE: SharedControlState = SharedControlState::new();

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(m1: u16, m2: u16) -> ThrottlePair {
        ThrottlePair { m1: ThrottleCommand::new(m1), m2: ThrottleCommand::new(m2) }
    }

    #[test]
    fn pair_packs_into_one_word() {
        for (m1, m2) in [(0, 0), (2047, 0), (0, 2047), (1100, 200), (48, 2000)] {
            let p = pair(m1, m2);
            assert_eq!(ThrottlePair::unpack(p.pack()), p);
        }
        assert_eq!(pair(1, 2).pack(), 0x0002_0001);
        assert_eq!(ThrottlePair::ZERO.pack(), 0);
    }

    #[test]
    fn unpack_saturates_garbage() {
        let p = ThrottlePair::unpack(0xffff_ffff);
        assert_eq!(p, pair(2047, 2047));
    }

    #[test]
    fn publish_then_read() {
        let shared = SharedControlState::new();
        let now = Instant::from_millis(1_000);
        shared.publish(pair(1500, 700), now);

        assert_eq!(shared.throttle_pair(), pair(1500, 700));
        assert_eq!(shared.age(now + Duration::from_millis(30)), Duration::from_millis(30));
    }

    #[test]
    fn stale_pair_is_withheld() {
        let shared = SharedControlState::new();
        let t0 = Instant::from_millis(5_000);
        let timeout = Duration::from_millis(100);
        shared.publish(pair(1500, 700), t0);

        assert_eq!(shared.fresh_pair(t0 + Duration::from_millis(100), timeout), Some(pair(1500, 700)));
        assert_eq!(shared.fresh_pair(t0 + Duration::from_millis(101), timeout), None);

        shared.publish(pair(900, 900), t0 + Duration::from_millis(150));
        assert_eq!(shared.fresh_pair(t0 + Duration::from_millis(160), timeout), Some(pair(900, 900)));
    }

    #[test]
    fn armed_flag() {
        let shared = SharedControlState::default();
        assert!(!shared.is_armed());
        shared.set_armed(true);
        assert!(shared.is_armed());
        shared.set_armed(false);
        assert!(!shared.is_armed());
    }
}
