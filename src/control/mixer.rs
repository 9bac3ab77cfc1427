use micromath::F32Ext;

use crate::config::MAX_SUSTAINABLE_COMMAND;
use crate::drivers::dshot::ThrottleCommand;
use crate::state::ThrottlePair;

/// Differential mix for a spinning twin-motor chassis.
///
/// Both motors hold a baseline below the sustainable maximum and the
/// receiver magnitude is added to one and subtracted from the other in phase
/// with the heading, which pushes the chassis towards `direction` once per
/// revolution.
#[derive(Debug, Clone, Copy)]
pub struct Mixer {
    max_sustainable: f32,
}

impl Mixer {
    pub const fn new(max_sustainable: f32) -> Self {
        Self { max_sustainable }
    }

    /// `heading` and `direction` in radians, `magnitude` in throttle units.
    pub fn mix(&self, heading: f32, direction: f32, magnitude: f32) -> ThrottlePair {
        if !heading.is_finite() || !direction.is_finite() || !magnitude.is_finite() {
            return ThrottlePair::ZERO;
        }

        let magnitude = magnitude.clamp(0.0, self.max_sustainable);
        let baseline = self.max_sustainable - magnitude;
        let swing = magnitude * (heading - direction).cos();

        ThrottlePair {
            m1: ThrottleCommand::from_f32(baseline + swing),
            m2: ThrottleCommand::from_f32(baseline - swing),
        }
    }

    pub fn baseline(&self, magnitude: f32) -> f32 {
        self.max_sustainable - magnitude.clamp(0.0, self.max_sustainable)
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(MAX_SUSTAINABLE_COMMAND)
    }
}
