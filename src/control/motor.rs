use embassy_time::Instant;

use crate::config::{ARMING_DURATION, MAX_FRAME_GAP};
use crate::drivers::dshot::{DshotFrame, ThrottleCommand, MOTOR_STOP};
use crate::drivers::signal::SignalDriver;
use crate::error::Result;

/// ESC arming handshake: the ESC only accepts throttle after it has seen
/// zero frames continuously for a while, and it drops out again on silence.
#[derive(Debug, Clone, Copy)]
struct ArmingTracker {
    zero_since: Option<Instant>,
    last_sent: Option<Instant>,
    armed: bool,
}

impl ArmingTracker {
    const fn new() -> Self {
        Self { zero_since: None, last_sent: None, armed: false }
    }

    /// True if the line was silent long enough for the ESC to disarm.
    fn signal_lost(&self, now: Instant) -> bool {
        self.last_sent
            .is_some_and(|last| now.saturating_duration_since(last) > MAX_FRAME_GAP)
    }

    fn restart(&mut self) {
        self.zero_since = None;
        self.armed = false;
    }

    /// Records a transmitted frame; returns true on the frame that arms.
    fn record(&mut self, frame: DshotFrame, now: Instant) -> bool {
        self.last_sent = Some(now);
        if self.armed {
            return false;
        }
        // The telemetry bit does not matter, only the throttle field.
        if frame.throttle() != MOTOR_STOP {
            self.zero_since = None;
            return false;
        }
        let since = *self.zero_since.get_or_insert(now);
        if now.saturating_duration_since(since) >= ARMING_DURATION {
            self.armed = true;
            return true;
        }
        false
    }

    #[cfg(test)]
    fn zero_streak(&self, now: Instant) -> embassy_time::Duration {
        self.zero_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or(embassy_time::Duration::from_ticks(0))
    }
}

/// One motor: a signal driver, the requested throttle and the arming state.
pub struct MotorChannel<S> {
    driver: S,
    request: ThrottleCommand,
    last_frame: Option<DshotFrame>,
    arming: ArmingTracker,
    telemetry: bool,
    id: u8,
}

impl<S: SignalDriver> MotorChannel<S> {
    pub fn new(id: u8, driver: S, telemetry: bool) -> Self {
        Self {
            driver,
            request: ThrottleCommand::ZERO,
            last_frame: None,
            arming: ArmingTracker::new(),
            telemetry,
            id,
        }
    }

    /// Sends a zero frame and advances arming. Returns whether the channel
    /// is armed afterwards.
    pub fn arm(&mut self, now: Instant) -> bool {
        self.request = ThrottleCommand::ZERO;
        if let Err(e) = self.transmit(now) {
            log_warn!("motor {} arming frame dropped: {:?}", self.id, e);
        }
        self.arming.armed
    }

    /// Stores the request for the next transmission. Ignored (held at zero)
    /// until the channel is armed.
    pub fn set_throttle(&mut self, command: ThrottleCommand) {
        self.request = if self.arming.armed { command } else { ThrottleCommand::ZERO };
    }

    /// Frames the current request and sends it. Driver errors leave the
    /// channel untouched.
    pub fn transmit(&mut self, now: Instant) -> Result<DshotFrame> {
        if self.arming.signal_lost(now) {
            if self.arming.armed {
                log_warn!("motor {} frame gap exceeded, re-arming", self.id);
            }
            self.arming.restart();
            self.request = ThrottleCommand::ZERO;
        }

        let command = if self.arming.armed { self.request } else { ThrottleCommand::ZERO };
        let frame = command.frame(self.telemetry);
        self.driver.send_frame(frame)?;

        self.last_frame = Some(frame);
        if self.arming.record(frame, now) {
            log_info!("motor {} armed", self.id);
        }
        Ok(frame)
    }

    /// Drops back to the unarmed state; the next frames re-run arming.
    pub fn disarm(&mut self) {
        self.arming.restart();
        self.request = ThrottleCommand::ZERO;
    }

    pub fn is_armed(&self) -> bool {
        self.arming.armed
    }

    pub fn throttle(&self) -> ThrottleCommand {
        self.request
    }

    pub fn last_frame(&self) -> Option<DshotFrame> {
        self.last_frame
    }

    /// How long zero frames have been sent without a break.
    #[cfg(test)]
    pub fn zero_streak(&self, now: Instant) -> embassy_time::Duration {
        self.arming.zero_streak(now)
    }

    pub fn driver(&self) -> &S {
        &self.driver
    }

    #[cfg(test)]
    pub(crate) fn driver_mut(&mut self) -> &mut S {
        &mut self.driver
    }
}
