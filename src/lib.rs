//! Twin-motor DShot controller for the RP2040.
//!
//! Core 1 re-sends a throttle pair to two ESCs every millisecond. Core 0
//! estimates heading from centripetal acceleration, reads the receiver and
//! mixes both into that pair.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod logging;

pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod state;
pub mod tasks;

#[cfg(feature = "rp2040")]
pub mod board;

pub use error::{Error, Result};
