//! Compile-time configuration. There is no runtime configuration surface.

use embassy_time::Duration;

use crate::drivers::dshot::DshotSpeed;
use crate::drivers::signal::BitTiming;

// ── DShot ─────────────────────────────────────────────────────────────────────

pub const DSHOT_SPEED: DshotSpeed = DshotSpeed::DShot150;
/// Telemetry request bit carried in every frame.
pub const REQUEST_TELEMETRY: bool = false;
/// Tick clock the busy-wait timing is calibrated against (RP2040 sys clock).
pub const TICK_CLOCK_HZ: u32 = 125_000_000;
/// Scheduling jitter the busy-wait strategy must absorb, in ticks.
pub const JITTER_TOLERANCE_TICKS: u32 = 20;
pub const BIT_TIMING: BitTiming = BitTiming::for_speed(DSHOT_SPEED, TICK_CLOCK_HZ);

// Only DShot150..DShot600 leave enough margin at 125 MHz; DShot1200 does not.
const _: () = assert!(BIT_TIMING.tolerates(JITTER_TOLERANCE_TICKS));

// ── Loop rates ────────────────────────────────────────────────────────────────

/// Transmission loop: one frame per motor per tick.
pub const FRAME_RATE_HZ: u64 = 1000;
pub const CONTROL_LOOP_HZ: u64 = 1000;
pub const RECEIVER_RATE_HZ: u64 = 50;

// ── Safety ────────────────────────────────────────────────────────────────────

/// Continuous zero-throttle frames required before a channel accepts throttle.
pub const ARMING_DURATION: Duration = Duration::from_millis(200);
/// Longest tolerated silence between two frames; beyond it the ESC is
/// assumed to have disarmed.
pub const MAX_FRAME_GAP: Duration = Duration::from_millis(20);
/// Transmission falls back to zero throttle when the control loop has not
/// published for this long.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_millis(100);

// ── Control ───────────────────────────────────────────────────────────────────

/// Highest throttle the motors can hold while cruising.
pub const MAX_SUSTAINABLE_COMMAND: f32 = 2000.0;
/// Throttle band the receiver magnitude is scaled into.
pub const MAX_MAGNITUDE_COMMAND: f32 = 900.0;
/// Accelerometer distance from the spin axis: half of the 8 in chassis (m).
pub const TURNING_RADIUS_M: f32 = 0.1016;
/// Upper bound on the integration step; longer gaps are stalls, not motion.
pub const MAX_CONTROL_DT_S: f32 = 0.02;
/// Raw accelerometer samples averaged per heading update.
pub const ACCEL_AVERAGE_SAMPLES: usize = 4;

// ── Receiver capture ──────────────────────────────────────────────────────────

/// Duty-cycle measurement window, at least three RC frames long.
pub const CAPTURE_WINDOW: Duration = Duration::from_millis(60);
/// PWM slice divider for level-gated counting: 125 MHz / 250 = 500 kHz.
pub const CAPTURE_CLOCK_DIVIDER: u8 = 250;
