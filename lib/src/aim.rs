//! Aim controller: continuous heading, one-shot lock, snap-to-target offset.
//!
//! Headings are degrees clockwise from the +Z axis, so a direction vector
//! `(x, z)` has heading `atan2(x, z)`.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::swing::normalize_degrees;

/// Where the aim controller is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AimPhase {
    #[default]
    Idle,
    Aiming,
    Locked,
}

/// Aim state owned by one game session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AimState {
    pub locked_angle_degrees: f64,
    pub pending_snap: bool,
    pub target_snap_angle: f64,
    /// Added to every raw heading until replaced by the next snap.
    pub aim_offset: f64,
}

/// Horizontal magnitudes below this have no usable heading.
const MIN_HORIZONTAL: f64 = 1e-9;

/// Heading (degrees) of the horizontal part of a direction vector.
pub fn heading_of(v: DVec3) -> f64 {
    v.x.atan2(v.z).to_degrees()
}

/// Unit horizontal direction for a heading in degrees.
pub fn direction_from_heading(degrees: f64) -> DVec3 {
    let r = degrees.to_radians();
    DVec3::new(r.sin(), 0.0, r.cos())
}

#[derive(Debug, Default)]
pub struct AimController {
    phase: AimPhase,
    state: AimState,
    /// Last raw heading observed, before the offset.
    raw_heading: Option<f64>,
}

impl AimController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> AimPhase {
        self.phase
    }

    pub fn state(&self) -> &AimState {
        &self.state
    }

    /// Idle/Locked -> Aiming. Restarting while already aiming is harmless.
    pub fn start_aiming(&mut self) {
        self.phase = AimPhase::Aiming;
    }

    /// Aiming -> Locked, freezing the current heading as the reference that
    /// swings deviate from. Outside `Aiming` the previous lock is kept.
    pub fn stop_aiming(&mut self) -> f64 {
        if self.phase == AimPhase::Aiming {
            self.state.locked_angle_degrees = self.current_heading();
            self.phase = AimPhase::Locked;
        }
        self.state.locked_angle_degrees
    }

    pub fn locked_angle(&self) -> f64 {
        self.state.locked_angle_degrees
    }

    /// Schedule an offset so the next raw heading reads as `target`.
    /// Deferred because the offset must be taken against a live sample.
    pub fn request_snap_to_target(&mut self, target_degrees: f64) {
        self.state.pending_snap = true;
        self.state.target_snap_angle = target_degrees;
    }

    /// Feed a raw heading (degrees). Resolves a pending snap against it.
    pub fn observe_heading(&mut self, raw_degrees: f64) {
        if !raw_degrees.is_finite() {
            return;
        }
        if self.state.pending_snap {
            self.state.aim_offset = normalize_degrees(self.state.target_snap_angle - raw_degrees);
            self.state.pending_snap = false;
        }
        self.raw_heading = Some(raw_degrees);
    }

    /// Feed a raw direction vector and get it back rotated by the aim offset,
    /// horizontal magnitude and `y` preserved. A vector with no horizontal
    /// part carries no heading and is returned unchanged without being
    /// observed.
    pub fn apply_heading_vector(&mut self, raw: DVec3) -> DVec3 {
        let magnitude = raw.x.hypot(raw.z);
        if magnitude < MIN_HORIZONTAL {
            return raw;
        }
        self.observe_heading(heading_of(raw));
        let adjusted = (heading_of(raw) + self.state.aim_offset).to_radians();
        DVec3::new(adjusted.sin() * magnitude, raw.y, adjusted.cos() * magnitude)
    }

    /// Whether any usable heading has been observed yet.
    pub fn has_heading(&self) -> bool {
        self.raw_heading.is_some()
    }

    /// Offset-adjusted heading in `(-180, 180]`; 0 before any sample.
    pub fn current_heading(&self) -> f64 {
        self.raw_heading
            .map(|h| normalize_degrees(h + self.state.aim_offset))
            .unwrap_or(0.0)
    }

    /// Unit horizontal vector of the current adjusted heading.
    pub fn current_direction(&self) -> DVec3 {
        direction_from_heading(self.current_heading())
    }
}

/// Rate limiter for streamed headings, independent of the sensor rate.
#[derive(Debug, Clone)]
pub struct EmitThrottle {
    interval_ms: f64,
    last_ms: Option<f64>,
}

impl EmitThrottle {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_ms: None,
        }
    }

    /// True at most once per interval. A clock that jumps backwards resets
    /// the window rather than stalling emission.
    pub fn ready(&mut self, now_ms: f64) -> bool {
        let due = match self.last_ms {
            None => true,
            Some(last) => now_ms - last >= self.interval_ms || now_ms < last,
        };
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }

    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn phases() {
        let mut aim = AimController::new();
        assert_eq!(aim.phase(), AimPhase::Idle);
        aim.start_aiming();
        assert_eq!(aim.phase(), AimPhase::Aiming);
        aim.observe_heading(42.0);
        assert!(close(aim.stop_aiming(), 42.0));
        assert_eq!(aim.phase(), AimPhase::Locked);
        // later headings do not move the lock
        aim.observe_heading(90.0);
        assert!(close(aim.locked_angle(), 42.0));
        assert!(close(aim.stop_aiming(), 42.0));
        aim.start_aiming();
        assert!(close(aim.stop_aiming(), 90.0));
    }

    #[test]
    fn vertical_vector_leaves_snap_pending() {
        let mut aim = AimController::new();
        aim.request_snap_to_target(90.0);

        // phone pointing straight up: no heading to snap against
        let up = DVec3::new(0.0, 1.0, 0.0);
        assert_eq!(aim.apply_heading_vector(up), up);
        assert!(aim.state().pending_snap);
        assert!(!aim.has_heading());

        aim.apply_heading_vector(DVec3::new(1.0, 0.0, 0.0));
        assert!(!aim.state().pending_snap);
        assert!(close(aim.current_heading(), 90.0));
    }

    #[test]
    fn snap_waits_for_next_sample() {
        let mut aim = AimController::new();
        aim.observe_heading(30.0);
        aim.request_snap_to_target(0.0);
        assert!(aim.state().pending_snap);
        assert!(close(aim.current_heading(), 30.0));

        aim.observe_heading(50.0);
        assert!(!aim.state().pending_snap);
        assert!(close(aim.state().aim_offset, -50.0));
        assert!(close(aim.current_heading(), 0.0));

        // offset persists on later samples
        aim.observe_heading(60.0);
        assert!(close(aim.current_heading(), 10.0));
    }

    #[test]
    fn vector_rotation_keeps_magnitude() {
        let mut aim = AimController::new();
        aim.request_snap_to_target(90.0);
        let out = aim.apply_heading_vector(DVec3::new(0.0, 0.3, 2.0));
        assert!(close(out.x, 2.0));
        assert!(close(out.z.abs(), 0.0));
        assert!(close(out.y, 0.3));

        let out = aim.apply_heading_vector(DVec3::new(2.0_f64.sqrt(), 0.0, 2.0_f64.sqrt()));
        // raw 45° + 90° offset = 135°
        assert!(close(heading_of(out), 135.0));
        assert!(close(out.x.hypot(out.z), 2.0));
    }

    #[test]
    fn non_finite_heading_ignored() {
        let mut aim = AimController::new();
        aim.observe_heading(12.0);
        aim.request_snap_to_target(0.0);
        aim.observe_heading(f64::NAN);
        assert!(aim.state().pending_snap);
        assert!(close(aim.current_heading(), 12.0));
    }

    #[test]
    fn throttle_limits_rate() {
        let mut t = EmitThrottle::new(50.0);
        let emitted = (0..60).filter(|i| t.ready(*i as f64 * 16.0)).count();
        // 16ms frames: every 4th frame clears the 50ms window
        assert_eq!(emitted, 15);
        assert!(t.ready(0.0));
    }
}
