use core::f32::consts::SQRT_2;

use micromath::F32Ext;

use crate::config::MAX_MAGNITUDE_COMMAND;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RcChannel {
    Ch1,
    Ch2,
    Ch3,
    Ch4,
}

impl RcChannel {
    pub const ALL: [Self; 4] = [Self::Ch1, Self::Ch2, Self::Ch3, Self::Ch4];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Source of per-channel duty fractions in `[0, 1]`.
pub trait DutySource {
    fn read_duty_fraction(&mut self, channel: RcChannel) -> Result<f32>;
}

/// Most recent duty fraction of each channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcChannels(pub [f32; 4]);

impl RcChannels {
    pub fn get(&self, channel: RcChannel) -> f32 {
        self.0[channel.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiverVector {
    /// Radians.
    pub direction: f32,
    /// Normalised to `[0, 1]`.
    pub magnitude: f32,
}

impl ReceiverVector {
    /// Derives the vector from the two stick channels.
    pub fn from_sticks(ch3: f32, ch4: f32) -> Self {
        let direction = ch3.atan2(ch4);
        let magnitude = ((ch3 * ch3 + ch4 * ch4).sqrt() / SQRT_2).min(1.0);
        Self { direction, magnitude }
    }

    /// Magnitude in throttle units for the mixer.
    pub fn throttle_magnitude(&self) -> f32 {
        self.magnitude * MAX_MAGNITUDE_COMMAND
    }
}

pub struct ReceiverSampler<D> {
    source: D,
    channels: RcChannels,
    last_good: ReceiverVector,
}

impl<D: DutySource> ReceiverSampler<D> {
    pub fn new(source: D) -> Self {
        Self {
            source,
            channels: RcChannels::default(),
            last_good: ReceiverVector::default(),
        }
    }

    /// Reads all four channels. A channel that fails keeps its previous
    /// value; if a stick channel fails the previous vector is returned.
    pub fn sample(&mut self) -> ReceiverVector {
        let mut sticks_ok = true;
        for channel in RcChannel::ALL {
            match self.read(channel) {
                Some(duty) => self.channels.0[channel.index()] = duty,
                None => {
                    if matches!(channel, RcChannel::Ch3 | RcChannel::Ch4) {
                        sticks_ok = false;
                    }
                }
            }
        }

        if sticks_ok {
            self.last_good = ReceiverVector::from_sticks(
                self.channels.get(RcChannel::Ch3),
                self.channels.get(RcChannel::Ch4),
            );
        }
        self.last_good
    }

    pub fn channels(&self) -> RcChannels {
        self.channels
    }

    pub fn last_vector(&self) -> ReceiverVector {
        self.last_good
    }

    fn read(&mut self, channel: RcChannel) -> Option<f32> {
        match self.source.read_duty_fraction(channel) {
            Ok(duty) if duty.is_finite() => Some(duty.clamp(0.0, 1.0)),
            Ok(_) => None,
            Err(e) => {
                log_debug!("receiver {:?} read failed: {:?}", channel, e);
                None
            }
        }
    }
}
