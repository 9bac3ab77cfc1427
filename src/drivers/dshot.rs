//! DShot frame codec.
//!
//! A frame is 16 bits sent MSB first: 11 bits of throttle, one telemetry
//! request bit and a 4-bit checksum over the upper 12 bits.

/// Highest value representable in the 11-bit throttle field.
pub const THROTTLE_MAX: u16 = 2047;
/// Lowest value that is throttle rather than a special command.
pub const THROTTLE_MIN: u16 = 48;
/// Literal value sent while arming and to stop the motor.
pub const MOTOR_STOP: u16 = 0;

/// Builds the 16-bit transmission word. Throttle above 2047 saturates.
pub const fn encode(throttle: u16, telemetry: bool) -> u16 {
    let throttle = if throttle > THROTTLE_MAX { THROTTLE_MAX } else { throttle };
    let packet = (throttle << 1) | telemetry as u16;
    (packet << 4) | checksum(packet)
}

/// XOR fold of the 12-bit packet (throttle + telemetry) down to a nibble.
pub const fn checksum(packet: u16) -> u16 {
    (packet ^ (packet >> 4) ^ (packet >> 8)) & 0x000f
}

/// A checksummed frame. Only obtainable through the encoder or a validated
/// raw word, so a malformed frame cannot reach a signal driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DshotFrame(u16);

impl DshotFrame {
    pub const STOP: Self = Self::encode(MOTOR_STOP, false);

    pub const fn encode(throttle: u16, telemetry: bool) -> Self {
        Self(encode(throttle, telemetry))
    }

    /// Accepts a raw word only if its checksum matches.
    pub const fn from_raw(raw: u16) -> Option<Self> {
        if checksum(raw >> 4) == raw & 0x000f {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn throttle(self) -> u16 {
        self.0 >> 5
    }

    pub const fn telemetry(self) -> bool {
        (self.0 >> 4) & 0x1 != 0
    }

    pub const fn crc(self) -> u16 {
        self.0 & 0x000f
    }

    /// Bit `i` of the frame, counting from the most significant.
    pub const fn bit(self, i: u32) -> bool {
        (self.0 >> (15 - i)) & 0x1 != 0
    }
}

/// Requested motor speed as a DShot wire value, always in `0..=2047`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThrottleCommand(u16);

impl ThrottleCommand {
    pub const ZERO: Self = Self(MOTOR_STOP);
    pub const MAX: Self = Self(THROTTLE_MAX);

    /// Saturates anything above the 11-bit range.
    pub const fn new(raw: u16) -> Self {
        if raw > THROTTLE_MAX {
            Self(THROTTLE_MAX)
        } else {
            Self(raw)
        }
    }

    /// Clamps to `0..=2047` and rounds; NaN maps to zero.
    pub fn from_f32(value: f32) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        let clamped = value.clamp(0.0, THROTTLE_MAX as f32);
        Self((clamped + 0.5) as u16).min(Self::MAX)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == MOTOR_STOP
    }

    /// Value placed in the frame. Reserved command codes 1..=47 are lifted
    /// to the lowest throttle so they are never sent as commands.
    pub const fn wire_value(self) -> u16 {
        if self.0 != MOTOR_STOP && self.0 < THROTTLE_MIN {
            THROTTLE_MIN
        } else {
            self.0
        }
    }

    pub const fn frame(self, telemetry: bool) -> DshotFrame {
        DshotFrame::encode(self.wire_value(), telemetry)
    }
}

/// DShot speed classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DshotSpeed {
    DShot150,
    DShot300,
    DShot600,
    DShot1200,
}

impl DshotSpeed {
    /// Bits per second on the wire.
    pub const fn bit_rate(self) -> u32 {
        match self {
            Self::DShot150 => 150_000,
            Self::DShot300 => 300_000,
            Self::DShot600 => 600_000,
            Self::DShot1200 => 1_200_000,
        }
    }

    /// Clock the waveform generator runs at: 8 cycles per bit.
    pub const fn pio_clock_hz(self) -> u32 {
        self.bit_rate() * 8
    }

    /// Duration of one 16-bit frame in nanoseconds.
    pub const fn frame_time_ns(self) -> u32 {
        16 * (1_000_000_000 / self.bit_rate())
    }
}
