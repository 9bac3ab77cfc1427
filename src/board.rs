//! RP2040 bring-up and pin map.
//!
//! | Function        | Pin    | Peripheral      |
//! |-----------------|--------|-----------------|
//! | Motor 1 DShot   | GPIO0  | PIO0 SM0        |
//! | Motor 2 DShot   | GPIO1  | PIO0 SM1        |
//! | RC ch1          | GPIO3  | PWM slice 1 B   |
//! | RC ch2          | GPIO5  | PWM slice 2 B   |
//! | RC ch3          | GPIO11 | PWM slice 5 B   |
//! | RC ch4          | GPIO13 | PWM slice 6 B   |
//! | Accel SDA       | GPIO8  | I2C0 @ 400 kHz  |
//! | Accel SCL       | GPIO9  | I2C0            |
//! | Heartbeat LED   | GPIO25 |                 |
//!
//! PWM slices can only count an input on their B channel, hence the odd pins.

use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_rp::Peripherals;

#[cfg(not(feature = "bitbang"))]
use crate::drivers::pio_dshot::PioDshot;
#[cfg(feature = "bitbang")]
use crate::drivers::signal::{BitBangDriver, CortexMTicks};
#[cfg(not(feature = "bitbang"))]
use crate::drivers::signal::WaveformDriver;

pub type AccelBus = I2c<'static, I2C0, i2c::Async>;

#[cfg(not(feature = "bitbang"))]
pub type Motor1Signal = WaveformDriver<PioDshot<'static, embassy_rp::peripherals::PIO0, 0>>;
#[cfg(not(feature = "bitbang"))]
pub type Motor2Signal = WaveformDriver<PioDshot<'static, embassy_rp::peripherals::PIO0, 1>>;

#[cfg(feature = "bitbang")]
pub type Motor1Signal = BitBangDriver<embassy_rp::gpio::Output<'static>, CortexMTicks>;
#[cfg(feature = "bitbang")]
pub type Motor2Signal = BitBangDriver<embassy_rp::gpio::Output<'static>, CortexMTicks>;

pub const I2C_FREQUENCY_HZ: u32 = 400_000;

pub struct Board {
    pub p: Peripherals,
}

impl Board {
    /// Default clocks: 12 MHz crystal, 125 MHz system clock. The bit-bang
    /// timing in `config` assumes this frequency.
    pub fn init() -> Self {
        let p = embassy_rp::init(Default::default());
        Self { p }
    }
}

pub fn i2c_config() -> i2c::Config {
    let mut config = i2c::Config::default();
    config.frequency = I2C_FREQUENCY_HZ;
    config
}
