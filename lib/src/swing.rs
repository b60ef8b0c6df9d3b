//! Swing analysis: orientation history + locked aim -> shot descriptor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SwingTuning;
use crate::sample::OrientationSample;

/// Final shot direction and strength, produced once per swing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotDescriptor {
    pub final_angle_degrees: f64,
    /// In `[0, max_power]` (1.5 by default).
    pub power: f64,
}

/// Everything the analyzer learned from one swing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingReport {
    pub deviation_degrees: f64,
    /// Peak angular speed, deg/s.
    pub peak_speed: f64,
    pub shot: ShotDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwingError {
    /// Too few samples; an accidental tap rather than a swing.
    TooShort { samples: usize, required: usize },
}

impl fmt::Display for SwingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { samples, required } => {
                write!(f, "swing too short ({samples} of {required} samples)")
            }
        }
    }
}

impl std::error::Error for SwingError {}

/// Wrap an angle difference into `(-180, 180]`.
///
/// `((a + 540) mod 360) - 180` with a Euclidean modulus yields `[-180, 180)`;
/// the lower bound is folded onto `+180`.
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = (angle + 540.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 { wrapped + 360.0 } else { wrapped }
}

/// Peak `sqrt(Δβ² + Δγ²) / Δt` over consecutive pairs, deg/s. Pairs with
/// non-positive `Δt` (sensor fusion clock jitter) are skipped.
pub fn peak_angular_speed(history: &[OrientationSample]) -> f64 {
    history
        .windows(2)
        .filter_map(|pair| {
            let dt = (pair[1].timestamp_ms - pair[0].timestamp_ms) / 1000.0;
            if dt <= 0.0 {
                return None;
            }
            let d_beta = pair[1].beta - pair[0].beta;
            let d_gamma = pair[1].gamma - pair[0].gamma;
            let speed = (d_beta * d_beta + d_gamma * d_gamma).sqrt() / dt;
            speed.is_finite().then_some(speed)
        })
        .fold(0.0, f64::max)
}

/// Heading change from first to last sample, positive = clockwise.
pub fn deviation(history: &[OrientationSample]) -> f64 {
    match (history.first(), history.last()) {
        (Some(first), Some(last)) => normalize_degrees(last.alpha - first.alpha),
        _ => 0.0,
    }
}

/// Turns a swing history into a shot. Pure given its inputs.
#[derive(Debug, Clone)]
pub struct SwingAnalyzer {
    tuning: SwingTuning,
}

impl SwingAnalyzer {
    pub fn new(tuning: SwingTuning) -> Self {
        Self { tuning }
    }

    /// Map a peak speed to power: `min(speed / solid_hit_speed, max_power)`.
    pub fn normalized_power(&self, peak_speed: f64) -> f64 {
        (peak_speed.max(0.0) / self.tuning.solid_hit_speed).min(self.tuning.max_power)
    }

    pub fn analyze(
        &self,
        history: &[OrientationSample],
        locked_angle: f64,
    ) -> Result<SwingReport, SwingError> {
        if history.len() < self.tuning.min_samples {
            return Err(SwingError::TooShort {
                samples: history.len(),
                required: self.tuning.min_samples,
            });
        }
        let peak_speed = peak_angular_speed(history);
        let deviation_degrees = deviation(history);
        Ok(SwingReport {
            deviation_degrees,
            peak_speed,
            shot: ShotDescriptor {
                final_angle_degrees: locked_angle + deviation_degrees,
                power: self.normalized_power(peak_speed),
            },
        })
    }
}

impl Default for SwingAnalyzer {
    fn default() -> Self {
        Self::new(SwingTuning::default())
    }
}
