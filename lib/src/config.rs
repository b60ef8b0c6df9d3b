use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which shot channel a controller drives.
///
/// `Swing` sends the analyzed `swing_data` descriptor (normal play).
/// `Throw` additionally sends a raw `throw` vector, the debug path that
/// exercises the magnitude power curve on the display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControllerMode {
    #[default]
    Swing,
    Throw,
}

impl fmt::Display for ControllerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swing => write!(f, "swing"),
            Self::Throw => write!(f, "throw"),
        }
    }
}

// ---------------------------------------------------------------------------
// Gameplay tuning
// ---------------------------------------------------------------------------

/// Swing analysis constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingTuning {
    /// Histories shorter than this are taps, not swings.
    pub min_samples: usize,
    /// Peak angular speed (deg/s) that maps to power 1.0.
    pub solid_hit_speed: f64,
    /// Power ceiling (permits moderate overswing).
    pub max_power: f64,
    /// Hard cap on buffered samples for a single swing.
    pub max_history: usize,
}

impl Default for SwingTuning {
    fn default() -> Self {
        Self {
            min_samples: 5,
            solid_hit_speed: 300.0,
            max_power: 1.5,
            max_history: 600,
        }
    }
}

/// Aim streaming constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AimTuning {
    /// Minimum spacing between streamed headings (50ms = 20 Hz).
    pub emit_interval_ms: f64,
}

impl Default for AimTuning {
    fn default() -> Self {
        Self {
            emit_interval_ms: 50.0,
        }
    }
}

/// Shot impulse constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShotTuning {
    pub min_force: f64,
    pub max_force: f64,
    /// Raw throw magnitude treated as full power.
    pub full_magnitude: f64,
    /// Fixed upward impulse so the ball does not stick to the turf.
    pub upward_impulse: f64,
    /// Scale from descriptor power to raw throw magnitude (controller side).
    pub throw_scale: f64,
    /// Ceiling on descriptor power accepted by the display.
    pub max_power: f64,
}

impl Default for ShotTuning {
    fn default() -> Self {
        Self {
            min_force: 0.4,
            max_force: 6.0,
            full_magnitude: 30.0,
            upward_impulse: 0.05,
            throw_scale: 20.0,
            max_power: 1.5,
        }
    }
}

/// Hole state machine thresholds. Two detection paths use separate values:
/// the per-tick check is strict, the contact-event check is looser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoleTuning {
    pub out_of_bounds_y: f64,
    pub boundary_limit: f64,
    pub settle_speed: f64,
    pub settle_grace_ms: f64,
    pub cup_radius: f64,
    pub capture_radius_factor: f64,
    pub capture_max_speed: f64,
    pub capture_max_height: f64,
    pub contact_radius_factor: f64,
    pub contact_max_speed: f64,
    pub contact_max_height: f64,
    pub attraction_radius: f64,
    pub attraction_strength: f64,
    pub advance_delay_ms: f64,
}

impl Default for HoleTuning {
    fn default() -> Self {
        Self {
            out_of_bounds_y: -2.0,
            boundary_limit: 40.0,
            settle_speed: 0.05,
            settle_grace_ms: 2000.0,
            cup_radius: 0.12,
            capture_radius_factor: 1.2,
            capture_max_speed: 1.2,
            capture_max_height: 0.25,
            contact_radius_factor: 1.6,
            contact_max_speed: 2.0,
            contact_max_height: 0.4,
            attraction_radius: 0.6,
            attraction_strength: 0.4,
            advance_delay_ms: 3000.0,
        }
    }
}

/// All gameplay constants in one place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameTuning {
    pub swing: SwingTuning,
    pub aim: AimTuning,
    pub shot: ShotTuning,
    pub hole: HoleTuning,
}

// ---------------------------------------------------------------------------
// Course layout
// ---------------------------------------------------------------------------

/// One hole: par, tee position, and cup center (x, y, z in meters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleSection {
    pub par: u32,
    pub tee: [f64; 3],
    pub cup: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSection {
    #[serde(default)]
    pub holes: Vec<HoleSection>,
}

impl Default for CourseSection {
    fn default() -> Self {
        Self {
            holes: vec![
                HoleSection {
                    par: 2,
                    tee: [0.0, 0.0, 0.0],
                    cup: [0.0, 0.0, 4.0],
                },
                HoleSection {
                    par: 3,
                    tee: [0.0, 0.0, 0.0],
                    cup: [1.5, 0.0, 6.0],
                },
                HoleSection {
                    par: 3,
                    tee: [0.0, 0.0, 0.0],
                    cup: [-2.0, 0.0, 7.5],
                },
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted config types
// ---------------------------------------------------------------------------

/// Top-level persisted config. Hand-editable TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuttlinkConfig {
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub webserver: HashMap<String, WebserverSection>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mock_controller: HashMap<String, MockControllerSection>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mock_display: HashMap<String, MockDisplaySection>,
    #[serde(default)]
    pub tuning: GameTuning,
    #[serde(default)]
    pub course: CourseSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebserverSection {
    #[serde(default)]
    pub name: String,
    pub bind: String,
}

/// Room directory settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    /// Game-type metadata echoed in `roomJoined`.
    pub game_type: String,
    /// Empty rooms older than this are evicted on the next listing.
    pub room_ttl_secs: u64,
    /// Where `/create-room` redirects (`{display_path}?room=<id>`).
    pub display_path: String,
    /// Outbound frames buffered per socket; frames for a full queue are
    /// dropped for that socket only.
    pub socket_queue: usize,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            game_type: "golf".into(),
            room_ttl_secs: 2 * 60 * 60,
            display_path: "/game".into(),
            socket_queue: 256,
        }
    }
}

/// A simulated phone controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockControllerSection {
    #[serde(default)]
    pub name: String,
    /// Room to join (created if absent).
    pub room: String,
    #[serde(default = "default_swing_interval")]
    pub swing_interval_secs: f64,
    #[serde(default)]
    pub mode: ControllerMode,
}

fn default_swing_interval() -> f64 {
    8.0
}

/// A headless display running the built-in flat green.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockDisplaySection {
    #[serde(default)]
    pub name: String,
    /// Room to join (created if absent).
    pub room: String,
}

impl Default for PuttlinkConfig {
    /// Known good defaults: a single web server, no mock devices.
    fn default() -> Self {
        let mut webserver = HashMap::new();
        webserver.insert(
            "0".into(),
            WebserverSection {
                name: "Relay Server".into(),
                bind: "0.0.0.0:3030".into(),
            },
        );
        Self {
            relay: RelaySection::default(),
            webserver,
            mock_controller: HashMap::new(),
            mock_display: HashMap::new(),
            tuning: GameTuning::default(),
            course: CourseSection::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tuning_fills_defaults() {
        let cfg: GameTuning = serde_json::from_str(r#"{"hole": {"cup_radius": 0.2}}"#).unwrap();
        assert_eq!(cfg.hole.cup_radius, 0.2);
        assert_eq!(cfg.hole.advance_delay_ms, 3000.0);
        assert_eq!(cfg.swing, SwingTuning::default());
    }

    #[test]
    fn mock_controller_defaults() {
        let s: MockControllerSection = serde_json::from_str(r#"{"room": "deadbeef"}"#).unwrap();
        assert_eq!(s.mode, ControllerMode::Swing);
        assert_eq!(s.swing_interval_secs, 8.0);
    }
}
