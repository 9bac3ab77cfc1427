//! Dead-reckoned heading from centripetal acceleration.
//!
//! On a spinning chassis the accelerometer at radius `r` sees `a = ω²r`, so
//! `ω = sqrt(a·r) / r`. Integrating `ω` over time gives the heading. Nothing
//! corrects the drift this accumulates.

use core::f32::consts::{PI, TAU};

use micromath::F32Ext;

#[derive(Debug, Default)]
pub struct HeadingEstimator {
    heading: f32,
}

impl HeadingEstimator {
    pub const fn new() -> Self {
        Self { heading: 0.0 }
    }

    /// Integrates one sample. `acceleration` in m/s², `elapsed` in s,
    /// `turning_radius` in m. Invalid inputs leave the heading untouched.
    pub fn update(&mut self, acceleration: f32, elapsed: f32, turning_radius: f32) {
        if !acceleration.is_finite() || !elapsed.is_finite() || !turning_radius.is_finite() {
            return;
        }
        if elapsed <= 0.0 || turning_radius <= 0.0 {
            return;
        }

        let rate_proxy = (acceleration * turning_radius).max(0.0).sqrt();
        self.heading = wrap(self.heading + rate_proxy * elapsed / turning_radius);
    }

    /// Radians in `[-π, π)`.
    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn reset(&mut self) {
        self.heading = 0.0;
    }
}

/// Wraps an angle into `[-π, π)`.
pub fn wrap(angle: f32) -> f32 {
    let wrapped = angle - TAU * ((angle + PI) / TAU).floor();
    // Rounding can land exactly on +π.
    if wrapped >= PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_rest_heading_is_unchanged() {
        let mut est = HeadingEstimator::new();
        for elapsed in [0.001, 0.02, 1.0, 3600.0] {
            est.update(0.0, elapsed, 0.1016);
            assert_eq!(est.heading(), 0.0);
        }
    }

    #[test]
    fn negative_acceleration_counts_as_rest() {
        let mut est = HeadingEstimator::new();
        est.update(-4.0, 0.01, 0.1016);
        assert_eq!(est.heading(), 0.0);
    }

    #[test]
    fn integrates_angular_rate() {
        // a = ω²r with ω = 10 rad/s, r = 0.1 m
        let mut est = HeadingEstimator::new();
        est.update(10.0, 0.01, 0.1);
        assert!((est.heading() - 0.1).abs() < 1e-4);
        est.update(10.0, 0.01, 0.1);
        assert!((est.heading() - 0.2).abs() < 1e-4);
    }

    #[test]
    fn invalid_inputs_are_ignored() {
        let mut est = HeadingEstimator::new();
        est.update(10.0, 0.01, 0.1);
        let before = est.heading();
        est.update(f32::NAN, 0.01, 0.1);
        est.update(10.0, f32::INFINITY, 0.1);
        est.update(10.0, 0.0, 0.1);
        est.update(10.0, -0.01, 0.1);
        est.update(10.0, 0.01, 0.0);
        assert_eq!(est.heading(), before);
    }

    #[test]
    fn heading_stays_wrapped() {
        let mut est = HeadingEstimator::new();
        for _ in 0..10_000 {
            est.update(250.0, 0.005, 0.1016);
            let h = est.heading();
            assert!((-PI..PI).contains(&h), "heading {}", h);
        }
        est.reset();
        assert_eq!(est.heading(), 0.0);
    }

    #[test]
    fn wrap_bounds() {
        assert!((wrap(PI + 0.5) - (-PI + 0.5)).abs() < 1e-5);
        assert!((wrap(-PI - 0.5) - (PI - 0.5)).abs() < 1e-5);
        assert!((wrap(5.0 * TAU + 1.0) - 1.0).abs() < 1e-4);
        assert_eq!(wrap(-PI), -PI);
        assert!(wrap(PI) < PI);
    }
}
