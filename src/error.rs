use core::fmt;

/// Failures reported by the hardware collaborators.
///
/// None of these cross into the transmission loop: callers fall back to the
/// last good value or to a zero-throttle frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// I2C transaction failed (NACK, arbitration loss, bus fault).
    I2c,
    /// WHO_AM_I returned something other than the expected device id.
    UnexpectedDevice(u8),
    /// A PWM capture counter saturated before its window closed.
    CaptureOverflow,
    /// The waveform generator FIFO had no room for another frame.
    FifoFull,
    /// The output line could not be driven.
    Pin,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I2c => f.write_str("i2c transaction failed"),
            Self::UnexpectedDevice(id) => write!(f, "unexpected device id {:#04x}", id),
            Self::CaptureOverflow => f.write_str("pwm capture counter overflow"),
            Self::FifoFull => f.write_str("waveform fifo full"),
            Self::Pin => f.write_str("output pin error"),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
