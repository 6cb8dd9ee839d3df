use serde::{Deserialize, Serialize};
use std::fmt;

/// Actividad deducida del movimiento dentro de las personas detectadas,
/// ordenada de más tranquila a más intensa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    NoHumans,
    Standing,
    Talking,
    Walking,
    WalkingFast,
    PossibleRunning,
    Running,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::NoHumans => "no_humans",
            ActivityLevel::Standing => "standing",
            ActivityLevel::Talking => "talking",
            ActivityLevel::Walking => "walking",
            ActivityLevel::WalkingFast => "walking_fast",
            ActivityLevel::PossibleRunning => "possible_running",
            ActivityLevel::Running => "running",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLabel {
    NoConfidence,
    Low,
    Medium,
    High,
}

impl ConfidenceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLabel::NoConfidence => "no_confidence",
            ConfidenceLabel::Low => "low",
            ConfidenceLabel::Medium => "medium",
            ConfidenceLabel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionReading {
    pub activity: ActivityLevel,
    /// Píxeles en movimiento dentro de personas sobre el total del frame, en `[0, 1]`.
    pub motion_level: f64,
    pub confidence: ConfidenceLabel,
}

impl MotionReading {
    pub fn no_humans() -> Self {
        Self {
            activity: ActivityLevel::NoHumans,
            motion_level: 0.0,
            confidence: ConfidenceLabel::NoConfidence,
        }
    }

    pub fn from_motion_level(motion_level: f64) -> Self {
        let (activity, confidence) = classify_motion_level(motion_level);
        Self { activity, motion_level, confidence }
    }
}

/// Límites superiores exclusivos, del nivel más tranquilo al más intenso.
/// Lo que iguala o supera el último límite es correr.
const ACTIVITY_TIERS: [(f64, ActivityLevel, ConfidenceLabel); 5] = [
    (0.001, ActivityLevel::Standing, ConfidenceLabel::High),
    (0.005, ActivityLevel::Talking, ConfidenceLabel::Medium),
    (0.015, ActivityLevel::Walking, ConfidenceLabel::Medium),
    (0.03, ActivityLevel::WalkingFast, ConfidenceLabel::Medium),
    (0.06, ActivityLevel::PossibleRunning, ConfidenceLabel::Low),
];

pub fn classify_motion_level(motion_level: f64) -> (ActivityLevel, ConfidenceLabel) {
    ACTIVITY_TIERS
        .iter()
        .find(|(upper, _, _)| motion_level < *upper)
        .map(|&(_, activity, confidence)| (activity, confidence))
        .unwrap_or((ActivityLevel::Running, ConfidenceLabel::High))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActivityLevel::*;

    #[test]
    fn tier_table() {
        let cases = [
            (0.0, Standing, ConfidenceLabel::High),
            (0.0005, Standing, ConfidenceLabel::High),
            (0.003, Talking, ConfidenceLabel::Medium),
            (0.01, Walking, ConfidenceLabel::Medium),
            (0.02, WalkingFast, ConfidenceLabel::Medium),
            (0.045, PossibleRunning, ConfidenceLabel::Low),
            (0.08, Running, ConfidenceLabel::High),
            (1.0, Running, ConfidenceLabel::High),
        ];
        for (level, activity, confidence) in cases {
            assert_eq!(classify_motion_level(level), (activity, confidence), "level {level}");
        }
    }

    #[test]
    fn exact_bounds_fall_into_next_tier() {
        assert_eq!(classify_motion_level(0.001).0, Talking);
        assert_eq!(classify_motion_level(0.005).0, Walking);
        assert_eq!(classify_motion_level(0.015).0, WalkingFast);
        assert_eq!(classify_motion_level(0.03).0, PossibleRunning);
        assert_eq!(classify_motion_level(0.06).0, Running);
    }

    #[test]
    fn tiers_are_strictly_ordered() {
        for pair in ACTIVITY_TIERS.windows(2) {
            assert!(pair[0].0 < pair[1].0);
            assert!(pair[0].1 < pair[1].1);
        }
        assert!(NoHumans < Standing && PossibleRunning < Running);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&MotionReading::from_motion_level(0.02)).unwrap();
        assert!(json.contains("\"walking_fast\""));
        assert!(json.contains("\"medium\""));
    }
}
