//! Device orientation samples and the per-swing history buffer.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One raw device-orientation event as delivered by the phone.
///
/// Several heading signals may be present at once depending on the platform;
/// `heading()` picks one by a fixed priority.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReading {
    /// Raw yaw, degrees. Relative on most devices.
    pub alpha: Option<f64>,
    /// Front-back tilt, degrees.
    pub beta: f64,
    /// Left-right tilt, degrees.
    pub gamma: f64,
    /// Dedicated compass heading, degrees clockwise from north.
    pub compass_heading: Option<f64>,
    /// Yaw from the fused absolute-orientation stream.
    pub absolute_alpha: Option<f64>,
    /// Monotonic-ish milliseconds. Not guaranteed ordered across sources.
    pub timestamp_ms: f64,
}

impl SensorReading {
    /// Resolve the heading: compass > absolute orientation > raw alpha > 0.
    /// Non-finite values are treated as absent.
    pub fn heading(&self) -> f64 {
        [self.compass_heading, self.absolute_alpha, self.alpha]
            .into_iter()
            .flatten()
            .find(|h| h.is_finite())
            .unwrap_or(0.0)
    }

    fn is_usable(&self) -> bool {
        self.beta.is_finite() && self.gamma.is_finite() && self.timestamp_ms.is_finite()
    }
}

/// A time-stamped orientation sample. `alpha` holds the resolved heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub timestamp_ms: f64,
}

impl OrientationSample {
    pub fn new(alpha: f64, beta: f64, gamma: f64, timestamp_ms: f64) -> Self {
        Self {
            alpha,
            beta,
            gamma,
            timestamp_ms,
        }
    }
}

impl From<&SensorReading> for OrientationSample {
    fn from(r: &SensorReading) -> Self {
        Self::new(r.heading(), r.beta, r.gamma, r.timestamp_ms)
    }
}

/// Samples recorded during one swing, in arrival order.
pub type OrientationHistory = Vec<OrientationSample>;

/// Buffers orientation events while a swing window is open.
///
/// The history exists only between `begin()` and `end()`; a non-empty buffer
/// therefore always means a swing is in progress. When full, the first
/// sample is kept (deviation is measured from it) and the oldest of the rest
/// is evicted, so the end of a long swing is never lost.
#[derive(Debug)]
pub struct OrientationSampler {
    history: Option<VecDeque<OrientationSample>>,
    capacity: usize,
    evicted: usize,
}

impl OrientationSampler {
    /// `capacity` is at least 2: the first sample plus the latest one.
    pub fn new(capacity: usize) -> Self {
        Self {
            history: None,
            capacity: capacity.max(2),
            evicted: 0,
        }
    }

    /// Open a swing window with an empty history. Any unfinished swing is
    /// discarded.
    pub fn begin(&mut self) {
        self.history = Some(VecDeque::with_capacity(self.capacity.min(128)));
        self.evicted = 0;
    }

    pub fn is_active(&self) -> bool {
        self.history.is_some()
    }

    /// Record a reading if a swing is open. Returns false when ignored
    /// (no swing or unusable numbers).
    pub fn record(&mut self, reading: &SensorReading) -> bool {
        let Some(history) = self.history.as_mut() else {
            return false;
        };
        if !reading.is_usable() {
            return false;
        }
        if history.len() >= self.capacity {
            history.remove(1);
            self.evicted += 1;
        }
        history.push_back(OrientationSample::from(reading));
        true
    }

    /// Samples evicted from the middle of the swing because the buffer was full.
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn len(&self) -> usize {
        self.history.as_ref().map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the swing window and hand over the whole history.
    pub fn end(&mut self) -> OrientationHistory {
        self.history.take().map(Vec::from).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(alpha: f64, t: f64) -> SensorReading {
        SensorReading {
            alpha: Some(alpha),
            timestamp_ms: t,
            ..Default::default()
        }
    }

    #[test]
    fn heading_priority() {
        let mut r = SensorReading {
            alpha: Some(10.0),
            absolute_alpha: Some(20.0),
            compass_heading: Some(30.0),
            ..Default::default()
        };
        assert_eq!(r.heading(), 30.0);
        r.compass_heading = None;
        assert_eq!(r.heading(), 20.0);
        r.absolute_alpha = Some(f64::NAN);
        assert_eq!(r.heading(), 10.0);
        r.alpha = None;
        assert_eq!(r.heading(), 0.0);
    }

    #[test]
    fn records_only_inside_window() {
        let mut s = OrientationSampler::new(10);
        assert!(!s.record(&reading(0.0, 0.0)));
        s.begin();
        assert!(s.record(&reading(0.0, 0.0)));
        assert!(s.record(&reading(1.0, 16.0)));
        assert_eq!(s.len(), 2);
        let h = s.end();
        assert_eq!(h.len(), 2);
        assert!(!s.is_active());
        assert!(s.is_empty());
    }

    #[test]
    fn full_buffer_keeps_first_and_latest() {
        let mut s = OrientationSampler::new(3);
        s.begin();
        for i in 0..5 {
            assert!(s.record(&reading(i as f64, i as f64 * 16.0)));
        }
        assert_eq!(s.len(), 3);
        assert_eq!(s.evicted(), 2);
        let alphas: Vec<f64> = s.end().iter().map(|x| x.alpha).collect();
        assert_eq!(alphas, vec![0.0, 3.0, 4.0]);
    }

    #[test]
    fn begin_discards_previous_swing() {
        let mut s = OrientationSampler::new(10);
        s.begin();
        s.record(&reading(0.0, 0.0));
        s.begin();
        assert!(s.is_empty());
        assert!(s.is_active());
    }

    #[test]
    fn unusable_readings_are_skipped() {
        let mut s = OrientationSampler::new(10);
        s.begin();
        let mut r = reading(0.0, 0.0);
        r.beta = f64::NAN;
        assert!(!s.record(&r));
        assert!(s.is_empty());
    }
}
