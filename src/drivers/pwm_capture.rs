//! Receiver duty-cycle capture on four PWM slices.
//!
//! Each slice runs in level-gated mode: its counter only advances while the
//! B pin is high. Comparing that count with the counts a full window would
//! hold gives the duty fraction.

use embassy_time::Instant;

use crate::config::{CAPTURE_CLOCK_DIVIDER, CAPTURE_WINDOW};
use crate::error::{Error, Result};

/// Count rate while the input is high.
const COUNT_HZ: u64 = 125_000_000 / CAPTURE_CLOCK_DIVIDER as u64;

/// Window bookkeeping for one gated counter.
///
/// Before the first window completes the fraction reads as zero. After an
/// overflow it reads as an error until a full window fits the counter again.
#[derive(Debug, Clone, Copy)]
pub struct DutyWindow {
    window_start: Instant,
    fraction: Option<f32>,
    faulted: bool,
}

impl DutyWindow {
    pub const fn new(start: Instant) -> Self {
        Self { window_start: start, fraction: None, faulted: false }
    }

    /// Latest completed window, closing the current one if it is due.
    /// `read_and_reset` returns the high count and clears the counter.
    pub fn poll(&mut self, now: Instant, read_and_reset: impl FnOnce() -> u16) -> Result<f32> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < CAPTURE_WINDOW {
            return self.current();
        }

        let high = read_and_reset() as u64;
        self.window_start = now;

        let window = elapsed.as_micros() * COUNT_HZ / 1_000_000;
        if window > u16::MAX as u64 {
            self.faulted = true;
            return Err(Error::CaptureOverflow);
        }
        if window == 0 {
            return self.current();
        }

        self.faulted = false;
        let fraction = (high as f32 / window as f32).min(1.0);
        self.fraction = Some(fraction);
        Ok(fraction)
    }

    fn current(&self) -> Result<f32> {
        if self.faulted {
            return Err(Error::CaptureOverflow);
        }
        Ok(self.fraction.unwrap_or(0.0))
    }
}

#[cfg(feature = "rp2040")]
pub use self::hw::{capture_config, PwmCapture};

#[cfg(feature = "rp2040")]
mod hw {
    use embassy_rp::pwm::{Config, Pwm};
    use embassy_time::Instant;

    use super::DutyWindow;
    use crate::config::CAPTURE_CLOCK_DIVIDER;
    use crate::control::receiver::{DutySource, RcChannel};
    use crate::error::Result;

    pub fn capture_config() -> Config {
        let mut cfg = Config::default();
        cfg.divider = CAPTURE_CLOCK_DIVIDER.into();
        cfg
    }

    struct Capture<'d> {
        pwm: Pwm<'d>,
        window: DutyWindow,
    }

    impl<'d> Capture<'d> {
        fn new(mut pwm: Pwm<'d>) -> Self {
            pwm.set_counter(0);
            Self { pwm, window: DutyWindow::new(Instant::now()) }
        }

        fn poll(&mut self, now: Instant) -> Result<f32> {
            let pwm = &mut self.pwm;
            self.window.poll(now, || {
                let high = pwm.counter();
                pwm.set_counter(0);
                high
            })
        }
    }

    /// Slices for ch1..ch4, each built with [`Pwm::new_input`] on its B pin in
    /// `InputMode::Level` with [`capture_config`].
    pub struct PwmCapture<'d> {
        channels: [Capture<'d>; 4],
    }

    impl<'d> PwmCapture<'d> {
        pub fn new(ch1: Pwm<'d>, ch2: Pwm<'d>, ch3: Pwm<'d>, ch4: Pwm<'d>) -> Self {
            Self {
                channels: [
                    Capture::new(ch1),
                    Capture::new(ch2),
                    Capture::new(ch3),
                    Capture::new(ch4),
                ],
            }
        }
    }

    impl<'d> DutySource for PwmCapture<'d> {
        fn read_duty_fraction(&mut self, channel: RcChannel) -> Result<f32> {
            self.channels[channel.index()].poll(Instant::now())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(t: u64) -> Instant {
        Instant::from_millis(t)
    }

    /// 60 ms at 500 kHz.
    const FULL_WINDOW: u16 = 30_000;

    fn untouched() -> u16 {
        panic!("counter read inside an open window")
    }

    #[test]
    fn reads_zero_before_first_window() {
        let mut w = DutyWindow::new(ms(0));
        assert_eq!(w.poll(ms(0), untouched), Ok(0.0));
        assert_eq!(w.poll(ms(59), untouched), Ok(0.0));
    }

    #[test]
    fn closed_window_gives_high_fraction() {
        let mut w = DutyWindow::new(ms(0));
        assert_eq!(w.poll(ms(60), || FULL_WINDOW / 2), Ok(0.5));
        // Held until the next window closes.
        assert_eq!(w.poll(ms(100), untouched), Ok(0.5));
        assert_eq!(w.poll(ms(120), || FULL_WINDOW), Ok(1.0));
    }

    #[test]
    fn fraction_is_clamped() {
        let mut w = DutyWindow::new(ms(0));
        assert_eq!(w.poll(ms(60), || u16::MAX), Ok(1.0));
    }

    #[test]
    fn overflow_reads_as_error_until_a_window_fits() {
        let mut w = DutyWindow::new(ms(0));
        assert_eq!(w.poll(ms(60), || FULL_WINDOW / 4), Ok(0.25));

        // 200 ms is more counts than the counter holds.
        assert_eq!(w.poll(ms(260), || u16::MAX), Err(Error::CaptureOverflow));
        assert_eq!(w.poll(ms(261), untouched), Err(Error::CaptureOverflow));
        assert_eq!(w.poll(ms(319), untouched), Err(Error::CaptureOverflow));

        assert_eq!(w.poll(ms(320), || FULL_WINDOW / 10), Ok(0.1));
        assert_eq!(w.poll(ms(330), untouched), Ok(0.1));
    }

    #[test]
    fn overflow_on_first_window_is_not_zero() {
        let mut w = DutyWindow::new(ms(0));
        assert_eq!(w.poll(ms(500), || 0), Err(Error::CaptureOverflow));
        assert_eq!(w.poll(ms(510), untouched), Err(Error::CaptureOverflow));
    }
}
