//! Sensing and mixing loop: accelerometer → heading, receiver → vector,
//! both → throttle pair, published for the transmission loop.

use embassy_time::Instant;

use crate::config::{ACCEL_AVERAGE_SAMPLES, MAX_CONTROL_DT_S, TURNING_RADIUS_M};
use crate::control::heading::HeadingEstimator;
use crate::control::mixer::Mixer;
use crate::control::receiver::ReceiverVector;
use crate::drivers::h3lis331dl::AccelAverager;
use crate::error::Result;
use crate::state::{SharedControlState, ThrottlePair};

/// Consecutive accelerometer failures between two warnings.
const ACCEL_WARN_EVERY: u32 = 1000;

pub struct ControlLoop {
    heading: HeadingEstimator,
    mixer: Mixer,
    accel: AccelAverager<ACCEL_AVERAGE_SAMPLES>,
    receiver: ReceiverVector,
    acceleration: f32,
    last_step: Option<Instant>,
    accel_failures: u32,
}

impl ControlLoop {
    pub fn new(mixer: Mixer) -> Self {
        Self {
            heading: HeadingEstimator::new(),
            mixer,
            accel: AccelAverager::new(),
            receiver: ReceiverVector::default(),
            acceleration: 0.0,
            last_step: None,
            accel_failures: 0,
        }
    }

    /// One iteration. A failed accelerometer read reuses the previous
    /// magnitude; `None` from the receiver keeps the previous vector.
    pub fn step(
        &mut self,
        now: Instant,
        sample: Result<(i16, i16, i16)>,
        receiver: Option<ReceiverVector>,
    ) -> ThrottlePair {
        if let Some(vector) = receiver {
            self.receiver = vector;
        }

        match sample {
            Ok(raw) => {
                if self.accel_failures > 0 {
                    log_info!("accelerometer back after {} failed reads", self.accel_failures);
                    self.accel_failures = 0;
                }
                self.accel.push(raw);
                if let Some(magnitude) = self.accel.magnitude() {
                    self.acceleration = magnitude;
                }
            }
            Err(e) => {
                if self.accel_failures % ACCEL_WARN_EVERY == 0 {
                    log_warn!("accelerometer read failed: {:?}", e);
                }
                self.accel_failures = self.accel_failures.saturating_add(1);
            }
        }

        if let Some(last) = self.last_step {
            let dt = now.saturating_duration_since(last).as_micros() as f32 / 1_000_000.0;
            if dt > 0.0 {
                self.heading
                    .update(self.acceleration, dt.min(MAX_CONTROL_DT_S), TURNING_RADIUS_M);
            }
        }
        self.last_step = Some(now);

        self.mixer.mix(
            self.heading.heading(),
            self.receiver.direction,
            self.receiver.throttle_magnitude(),
        )
    }

    /// Publishes `pair` once the ESCs are armed, zero before that. Always
    /// refreshes the heartbeat.
    pub fn publish(&self, now: Instant, pair: ThrottlePair, shared: &SharedControlState) -> ThrottlePair {
        let pair = if shared.is_armed() { pair } else { ThrottlePair::ZERO };
        shared.publish(pair, now);
        pair
    }

    pub fn heading(&self) -> f32 {
        self.heading.heading()
    }

    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }

    pub fn receiver(&self) -> ReceiverVector {
        self.receiver
    }
}

impl Default for ControlLoop {
    fn default() -> Self {
        Self::new(Mixer::default())
    }
}

#[cfg(feature = "rp2040")]
mod task {
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::channel::{Receiver, Sender};
    use embassy_time::{Duration, Instant, Ticker};

    use super::ControlLoop;
    use crate::board::AccelBus;
    use crate::config::{CONTROL_LOOP_HZ, RECEIVER_RATE_HZ};
    use crate::control::receiver::{ReceiverSampler, ReceiverVector};
    use crate::drivers::h3lis331dl::H3lis331dl;
    use crate::drivers::pwm_capture::PwmCapture;
    use crate::state::CONTROL_STATE;

    #[embassy_executor::task]
    pub async fn control_task(
        mut accel: H3lis331dl<AccelBus>,
        receiver_rx: Receiver<'static, CriticalSectionRawMutex, ReceiverVector, 1>,
    ) {
        let mut control = ControlLoop::default();
        let mut ticker = Ticker::every(Duration::from_hz(CONTROL_LOOP_HZ));
        loop {
            let sample = accel.read_accel_raw().await;
            let vector = receiver_rx.try_receive().ok();

            let now = Instant::now();
            let pair = control.step(now, sample, vector);
            control.publish(now, pair, &CONTROL_STATE);

            ticker.next().await;
        }
    }

    #[embassy_executor::task]
    pub async fn receiver_task(
        mut sampler: ReceiverSampler<PwmCapture<'static>>,
        receiver_tx: Sender<'static, CriticalSectionRawMutex, ReceiverVector, 1>,
    ) {
        let mut ticker = Ticker::every(Duration::from_hz(RECEIVER_RATE_HZ));
        loop {
            let vector = sampler.sample();
            // Capacity 1: if the control loop has not taken the last one yet,
            // this one is dropped and the next tick sends a newer vector.
            let _ = receiver_tx.try_send(vector);
            ticker.next().await;
        }
    }
}

#[cfg(feature = "rp2040")]
pub use task::{control_task, receiver_task};

#[cfg(test)]
mod tests {
    use core::f32::consts::FRAC_PI_2;

    use super::*;
    use crate::error::Error;

    fn ms(t: u64) -> Instant {
        Instant::from_millis(t)
    }

    /// Raw Z reading of 1 g: 20 digits of 49 mg.
    const REST: (i16, i16, i16) = (0, 0, 20 << 4);

    fn full_forward() -> ReceiverVector {
        ReceiverVector { direction: 0.0, magnitude: 1.0 }
    }

    /// X reading of about 10 g, well above gravity.
    const SPINNING: (i16, i16, i16) = (3264, 0, 20 << 4);

    #[test]
    fn first_step_does_not_integrate() {
        let mut control = ControlLoop::default();
        control.step(ms(0), Ok(SPINNING), None);
        assert!(control.acceleration() > 90.0);
        assert_eq!(control.heading(), 0.0);

        control.step(ms(1), Ok(SPINNING), None);
        assert!(control.heading() > 0.0);
    }

    #[test]
    fn receiver_vector_reaches_mixer() {
        let mut control = ControlLoop::default();
        let pair = control.step(ms(0), Ok(REST), Some(full_forward()));
        // heading 0, direction 0: m1 = baseline + 900, m2 = baseline - 900
        assert!((pair.m1.raw() as i32 - 2000).abs() <= 2);
        assert!((pair.m2.raw() as i32 - 200).abs() <= 2);

        // The vector sticks when no new one arrives.
        let pair = control.step(ms(1), Ok(REST), None);
        assert!(pair.m1.raw() > pair.m2.raw());
        assert_eq!(control.receiver(), full_forward());
    }

    #[test]
    fn accel_failure_reuses_last_magnitude() {
        let mut control = ControlLoop::default();
        control.step(ms(0), Ok(SPINNING), None);
        let magnitude = control.acceleration();

        control.step(ms(1), Err(Error::I2c), None);
        assert_eq!(control.acceleration(), magnitude);
        assert!(control.heading() > 0.0);
    }

    #[test]
    fn long_gaps_are_clamped() {
        let mut control = ControlLoop::default();
        control.step(ms(0), Ok(SPINNING), None);
        control.step(ms(1), Ok(SPINNING), None);
        let per_ms = control.heading();

        let mut stalled = ControlLoop::default();
        stalled.step(ms(0), Ok(SPINNING), None);
        stalled.step(ms(5_000), Ok(SPINNING), None);
        let expected = per_ms * (MAX_CONTROL_DT_S * 1000.0);
        assert!((stalled.heading() - expected).abs() < 1e-3);
    }

    #[test]
    fn publishes_zero_until_armed() {
        let shared = SharedControlState::new();
        let mut control = ControlLoop::default();

        let pair = control.step(ms(0), Ok(REST), Some(full_forward()));
        assert!(!pair.is_zero());
        assert_eq!(control.publish(ms(0), pair, &shared), ThrottlePair::ZERO);
        assert_eq!(shared.throttle_pair(), ThrottlePair::ZERO);

        shared.set_armed(true);
        assert_eq!(control.publish(ms(1), pair, &shared), pair);
        assert_eq!(shared.throttle_pair(), pair);
    }

    #[test]
    fn quadrature_heading_balances_motors() {
        let mut control = ControlLoop::default();
        let vector = ReceiverVector { direction: -FRAC_PI_2, magnitude: 0.5 };
        let pair = control.step(ms(0), Ok(REST), Some(vector));
        assert!((pair.m1.raw() as i32 - pair.m2.raw() as i32).abs() <= 2);
    }
}
