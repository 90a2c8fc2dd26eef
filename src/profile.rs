//! User profile and learned thresholds
//!
//! The profile is the output of calibration: a personal baseline pose,
//! breathing and posture baselines, range-of-motion data, and the adaptive
//! alert thresholds derived from them. A profile must validate as a whole at
//! every construction and update boundary; construction is atomic, so no
//! partially valid profile is ever exposed.

use crate::error::AnalysisError;
use crate::types::Landmark;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Averaged landmark set and body measurements from a T-pose calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselinePose {
    /// Visibility-filtered average landmarks
    pub landmarks: Vec<Landmark>,
    /// Physical joint distances (cm), e.g. shoulder width and arm span
    pub joint_distances_cm: HashMap<String, f64>,
    pub captured_at: DateTime<Utc>,
}

/// Typical breathing measured during a breathing calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreathingBaseline {
    /// Typical resting rate (breaths per minute)
    pub rate_bpm: f64,
    /// Typical depth score (0-1)
    pub depth: f64,
    /// Breath-to-breath consistency (0-1)
    pub rhythm_regularity: f64,
}

/// Typical posture measured during a T-pose calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureBaseline {
    /// Typical forward-head offset (cm)
    pub forward_head_cm: f64,
    /// Typical shoulder-line tilt (degrees)
    pub shoulder_imbalance_deg: f64,
}

/// Observed min/max angle of a joint over a movement session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RomRange {
    pub min_deg: f64,
    pub max_deg: f64,
}

/// Alert thresholds for breathing analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreathingThresholds {
    /// Depth below this fraction of typical signals fatigue
    pub fatigue_threshold: f64,
    /// Symmetric rate deviation band (bpm)
    pub rate_alert_threshold: f64,
}

/// Alert thresholds for posture monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureThresholds {
    /// Forward-head offset that triggers an alert (cm)
    pub forward_head_alert_cm: f64,
    /// Shoulder tilt that triggers an alert (degrees)
    pub shoulder_imbalance_alert_deg: f64,
}

/// Alert thresholds for balance monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceThresholds {
    /// Stability score below this triggers an alert (0-1)
    pub stability_alert: f64,
}

/// The three learned threshold groups derived from baselines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearnedThresholds {
    pub breathing: BreathingThresholds,
    pub posture: PostureThresholds,
    pub balance: BalanceThresholds,
}

/// A personalized baseline profile produced by calibration.
///
/// Profiles are created once via calibration and thereafter only replaced
/// wholesale by [`crate::calibration::update_user_profile`]; no field-level
/// mutation happens outside that operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub profile_id: Uuid,
    pub user_id: String,
    pub height_cm: f64,
    pub baseline_pose: BaselinePose,
    pub thresholds: LearnedThresholds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breathing_baseline: Option<BreathingBaseline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posture_baseline: Option<PostureBaseline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rom_ranges: Option<HashMap<String, RomRange>>,
    pub last_calibrated: DateTime<Utc>,
    pub calibration_count: u32,
    /// Engine version that produced this profile
    pub engine_version: String,
}

impl UserProfile {
    /// Validate the whole profile, returning every violation found.
    ///
    /// An empty violation list means the profile is internally consistent.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let mut violations = Vec::new();

        if self.user_id.is_empty() {
            violations.push("user_id must not be empty".to_string());
        }
        if !self.height_cm.is_finite() || !(50.0..=280.0).contains(&self.height_cm) {
            violations.push(format!(
                "height_cm {} outside plausible range 50-280",
                self.height_cm
            ));
        }
        if self.baseline_pose.landmarks.is_empty() {
            violations.push("baseline_pose has no landmarks".to_string());
        }
        for lm in &self.baseline_pose.landmarks {
            if !lm.x.is_finite() || !lm.y.is_finite() || !lm.z.is_finite() {
                violations.push(format!(
                    "baseline_pose landmark {} has non-finite coordinates",
                    lm.id.as_str()
                ));
            }
        }

        let breathing = &self.thresholds.breathing;
        if !breathing.fatigue_threshold.is_finite() || breathing.fatigue_threshold <= 0.0 {
            violations.push(format!(
                "breathing fatigue_threshold {} must be positive",
                breathing.fatigue_threshold
            ));
        }
        if !breathing.rate_alert_threshold.is_finite() || breathing.rate_alert_threshold <= 0.0 {
            violations.push(format!(
                "breathing rate_alert_threshold {} must be positive",
                breathing.rate_alert_threshold
            ));
        }

        let posture = &self.thresholds.posture;
        if !posture.forward_head_alert_cm.is_finite() || posture.forward_head_alert_cm <= 0.0 {
            violations.push(format!(
                "posture forward_head_alert_cm {} must be positive",
                posture.forward_head_alert_cm
            ));
        }
        if !posture.shoulder_imbalance_alert_deg.is_finite()
            || posture.shoulder_imbalance_alert_deg <= 0.0
        {
            violations.push(format!(
                "posture shoulder_imbalance_alert_deg {} must be positive",
                posture.shoulder_imbalance_alert_deg
            ));
        }

        let balance = &self.thresholds.balance;
        if !(0.0..=1.0).contains(&balance.stability_alert) {
            violations.push(format!(
                "balance stability_alert {} outside 0-1",
                balance.stability_alert
            ));
        }

        if let Some(base) = &self.breathing_baseline {
            if !base.rate_bpm.is_finite() || base.rate_bpm <= 0.0 || base.rate_bpm > 60.0 {
                violations.push(format!(
                    "breathing baseline rate_bpm {} outside plausible range",
                    base.rate_bpm
                ));
            }
            if !(0.0..=1.0).contains(&base.depth) {
                violations.push(format!("breathing baseline depth {} outside 0-1", base.depth));
            }
            if !(0.0..=1.0).contains(&base.rhythm_regularity) {
                violations.push(format!(
                    "breathing baseline rhythm_regularity {} outside 0-1",
                    base.rhythm_regularity
                ));
            }
        }

        if let Some(rom) = &self.rom_ranges {
            for (joint, range) in rom {
                if range.min_deg > range.max_deg {
                    violations.push(format!(
                        "rom range for {} has min {} above max {}",
                        joint, range.min_deg, range.max_deg
                    ));
                }
            }
        }

        if self.calibration_count == 0 {
            violations.push("calibration_count must be at least 1".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(AnalysisError::ProfileValidation { violations })
        }
    }

    /// Serialize the profile to JSON. Callers own storage; the engine has no
    /// persistence of its own.
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a previously serialized profile and re-validate it.
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let profile: UserProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LandmarkId;

    pub(crate) fn minimal_profile() -> UserProfile {
        UserProfile {
            profile_id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            height_cm: 178.0,
            baseline_pose: BaselinePose {
                landmarks: vec![Landmark::new(LandmarkId::Nose, 0.5, 0.1, 0.0, 0.9)],
                joint_distances_cm: HashMap::new(),
                captured_at: Utc::now(),
            },
            thresholds: LearnedThresholds {
                breathing: BreathingThresholds {
                    fatigue_threshold: 0.5,
                    rate_alert_threshold: 4.0,
                },
                posture: PostureThresholds {
                    forward_head_alert_cm: 5.34,
                    shoulder_imbalance_alert_deg: 5.0,
                },
                balance: BalanceThresholds {
                    stability_alert: 0.6,
                },
            },
            breathing_baseline: Some(BreathingBaseline {
                rate_bpm: 16.0,
                depth: 0.8,
                rhythm_regularity: 0.9,
            }),
            posture_baseline: None,
            rom_ranges: None,
            last_calibrated: Utc::now(),
            calibration_count: 3,
            engine_version: crate::ENGINE_VERSION.to_string(),
        }
    }

    #[test]
    fn valid_profile_passes_validation() {
        assert!(minimal_profile().validate().is_ok());
    }

    #[test]
    fn validation_collects_every_violation() {
        let mut profile = minimal_profile();
        profile.user_id = String::new();
        profile.height_cm = 10.0;
        profile.calibration_count = 0;

        let err = profile.validate().unwrap_err();
        match err {
            AnalysisError::ProfileValidation { violations } => {
                assert_eq!(violations.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn implausible_breathing_baseline_is_rejected() {
        let mut profile = minimal_profile();
        profile.breathing_baseline = Some(BreathingBaseline {
            rate_bpm: 90.0,
            depth: 1.5,
            rhythm_regularity: 0.9,
        });
        assert!(profile.validate().is_err());
    }

    #[test]
    fn inverted_rom_range_is_rejected() {
        let mut profile = minimal_profile();
        let mut rom = HashMap::new();
        rom.insert(
            "left_elbow".to_string(),
            RomRange {
                min_deg: 150.0,
                max_deg: 30.0,
            },
        );
        profile.rom_ranges = Some(rom);
        assert!(profile.validate().is_err());
    }

    #[test]
    fn json_round_trip_preserves_profile() {
        let profile = minimal_profile();
        let json = profile.to_json().unwrap();
        let loaded = UserProfile::from_json(&json).unwrap();
        assert_eq!(loaded.profile_id, profile.profile_id);
        assert_eq!(loaded.calibration_count, profile.calibration_count);
        assert_eq!(loaded.breathing_baseline, profile.breathing_baseline);
    }
}
