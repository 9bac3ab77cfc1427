//! Transmission loop: re-sends the latest throttle pair to both ESCs every
//! frame period, whether or not it changed.

use embassy_time::Instant;

use crate::config::{REQUEST_TELEMETRY, WATCHDOG_TIMEOUT};
use crate::control::motor::MotorChannel;
use crate::drivers::signal::SignalDriver;
use crate::state::{SharedControlState, ThrottlePair};

pub struct Transmitter<A, B> {
    m1: MotorChannel<A>,
    m2: MotorChannel<B>,
    armed: bool,
    watchdog_tripped: bool,
    dropped_frames: u32,
}

impl<A: SignalDriver, B: SignalDriver> Transmitter<A, B> {
    pub fn new(m1: A, m2: B) -> Self {
        Self {
            m1: MotorChannel::new(1, m1, REQUEST_TELEMETRY),
            m2: MotorChannel::new(2, m2, REQUEST_TELEMETRY),
            armed: false,
            watchdog_tripped: false,
            dropped_frames: 0,
        }
    }

    /// One frame period: pick the pair to send, send it on both lines and
    /// publish whether both ESCs are armed. Returns the pair that was used.
    pub fn tick(&mut self, now: Instant, shared: &SharedControlState) -> ThrottlePair {
        let pair = match shared.fresh_pair(now, WATCHDOG_TIMEOUT) {
            Some(pair) => {
                if self.watchdog_tripped {
                    self.watchdog_tripped = false;
                    log_info!("control data fresh again");
                }
                pair
            }
            None => {
                if !self.watchdog_tripped {
                    self.watchdog_tripped = true;
                    log_warn!("control data stale, sending zero throttle");
                }
                ThrottlePair::ZERO
            }
        };

        // Neither motor spins until both have armed.
        let pair = if self.armed { pair } else { ThrottlePair::ZERO };
        self.m1.set_throttle(pair.m1);
        self.m2.set_throttle(pair.m2);

        if self.m1.transmit(now).is_err() {
            self.dropped_frames = self.dropped_frames.wrapping_add(1);
        }
        if self.m2.transmit(now).is_err() {
            self.dropped_frames = self.dropped_frames.wrapping_add(1);
        }

        let armed = self.m1.is_armed() && self.m2.is_armed();
        if armed != self.armed {
            self.armed = armed;
            shared.set_armed(armed);
            if armed {
                log_info!("both ESCs armed, {} frames dropped so far", self.dropped_frames);
            } else {
                // Both lines re-run arming so they come back together.
                self.m1.disarm();
                self.m2.disarm();
                log_warn!("ESC disarmed, {} frames dropped so far", self.dropped_frames);
            }
        }
        pair
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn watchdog_tripped(&self) -> bool {
        self.watchdog_tripped
    }

    #[cfg(test)]
    pub fn dropped_frames(&self) -> u32 {
        self.dropped_frames
    }

    pub fn motors(&self) -> (&MotorChannel<A>, &MotorChannel<B>) {
        (&self.m1, &self.m2)
    }
}

#[cfg(feature = "rp2040")]
mod task {
    use embassy_time::{Duration, Instant, Ticker};

    use super::Transmitter;
    use crate::board::{Motor1Signal, Motor2Signal};
    use crate::config::FRAME_RATE_HZ;
    use crate::state::CONTROL_STATE;

    /// Runs on core 1 and owns it.
    #[embassy_executor::task]
    pub async fn transmit_task(mut transmitter: Transmitter<Motor1Signal, Motor2Signal>) {
        log_info!("transmission loop at {} Hz", FRAME_RATE_HZ);
        let mut ticker = Ticker::every(Duration::from_hz(FRAME_RATE_HZ));
        loop {
            transmitter.tick(Instant::now(), &CONTROL_STATE);
            ticker.next().await;
        }
    }
}

#[cfg(feature = "rp2040")]
pub use task::transmit_task;
