pub mod dshot;
pub mod h3lis331dl;
pub mod pwm_capture;
pub mod signal;

#[cfg(feature = "rp2040")]
pub mod pio_dshot;
