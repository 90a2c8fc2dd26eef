//! Calibration and personalization
//!
//! Converts raw calibration recordings into a personalized baseline profile:
//! T-pose → baseline pose, joint distances and posture baseline; breathing
//! recording → breathing baseline; movement recording → range-of-motion
//! table. Adaptive alert thresholds are derived from those baselines and the
//! whole profile is validated before it is returned.

use crate::breathing::{detect_breathing_rate, BreathingConfig};
use crate::error::AnalysisError;
use crate::features::{moving_average, torso_motion_signal};
use crate::geometry::all_joint_angles;
use crate::profile::{
    BalanceThresholds, BaselinePose, BreathingBaseline, BreathingThresholds, LearnedThresholds,
    PostureBaseline, PostureThresholds, RomRange, UserProfile,
};
use crate::types::{
    CalibrationKind, CalibrationSession, Landmark, LandmarkId, Pose, Timeline,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Configuration for the calibration pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Landmark visibility cutoff (0-1)
    pub visibility_cutoff: f64,
    /// Smoothing window applied before breath peak picking (frames)
    pub smoothing_window: usize,
    /// Breathing analysis settings used on the breathing recording
    pub breathing: BreathingConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            visibility_cutoff: 0.5,
            smoothing_window: 5,
            breathing: BreathingConfig::default(),
        }
    }
}

/// Fallback breathing thresholds for profiles whose breathing recording was
/// too short or too still to yield a baseline.
const DEFAULT_BREATHING_THRESHOLDS: BreathingThresholds = BreathingThresholds {
    fatigue_threshold: 0.3,
    rate_alert_threshold: 4.0,
};

/// Balance monitoring uses a fixed threshold; no balance baseline is
/// computed by this version of the engine.
const BALANCE_STABILITY_ALERT: f64 = 0.6;

/// Average a set of poses into one representative pose.
///
/// Per landmark id, only samples with visibility at or above the cutoff
/// contribute; lower-visibility samples are ignored entirely. The averaged
/// pose confidence is the mean over all input poses.
pub fn average_poses(poses: &[Pose], visibility_cutoff: f64) -> Pose {
    let mut sums: HashMap<LandmarkId, (f64, f64, f64, f64, usize)> = HashMap::new();

    for pose in poses {
        for lm in &pose.landmarks {
            if lm.visibility < visibility_cutoff {
                continue;
            }
            let entry = sums.entry(lm.id).or_insert((0.0, 0.0, 0.0, 0.0, 0));
            entry.0 += lm.x;
            entry.1 += lm.y;
            entry.2 += lm.z;
            entry.3 += lm.visibility;
            entry.4 += 1;
        }
    }

    let mut landmarks: Vec<Landmark> = sums
        .into_iter()
        .map(|(id, (x, y, z, vis, count))| {
            let n = count as f64;
            Landmark::new(id, x / n, y / n, z / n, vis / n)
        })
        .collect();
    // HashMap iteration order is arbitrary; keep the output stable
    landmarks.sort_by_key(|lm| LandmarkId::ALL.iter().position(|id| *id == lm.id));

    let confidence = if poses.is_empty() {
        0.0
    } else {
        poses.iter().map(|p| p.confidence).sum::<f64>() / poses.len() as f64
    };
    let timestamp_ms = poses.last().map(|p| p.timestamp_ms).unwrap_or(0);

    Pose::new(landmarks, confidence, timestamp_ms)
}

/// Derive a physical-units scale (cm per pose unit) from the vertical span
/// between the nose and the heel midpoint in a T-pose, given the user's
/// real height. Falls back to the ankles when the heels are not tracked.
pub fn scale_factor(t_pose: &Pose, height_cm: f64) -> Result<f64, AnalysisError> {
    let find = |id: LandmarkId| t_pose.landmarks.iter().find(|lm| lm.id == id);

    let top = find(LandmarkId::Nose).ok_or_else(|| {
        AnalysisError::Calibration("t-pose has no nose landmark for scale reference".to_string())
    })?;

    let bottom_pair = match (find(LandmarkId::LeftHeel), find(LandmarkId::RightHeel)) {
        (Some(l), Some(r)) => (l, r),
        _ => match (find(LandmarkId::LeftAnkle), find(LandmarkId::RightAnkle)) {
            (Some(l), Some(r)) => (l, r),
            _ => {
                return Err(AnalysisError::Calibration(
                    "t-pose has no heel or ankle landmarks for scale reference".to_string(),
                ))
            }
        },
    };

    let bottom_y = (bottom_pair.0.y + bottom_pair.1.y) / 2.0;
    let span = (bottom_y - top.y).abs();
    if span < 1e-6 {
        return Err(AnalysisError::Calibration(
            "degenerate vertical span in t-pose".to_string(),
        ));
    }

    Ok(height_cm / span)
}

/// Breath-to-breath consistency score from inter-breath intervals.
///
/// Coefficient-of-variation based: a perfectly regular rhythm scores near
/// 1.0, a highly irregular one well below 0.7. With fewer than 2 intervals
/// there is not enough data to judge, and a neutral 0.5 is returned.
pub fn rhythm_regularity(intervals_secs: &[f64]) -> f64 {
    if intervals_secs.len() < 2 {
        return 0.5;
    }

    let n = intervals_secs.len() as f64;
    let mean = intervals_secs.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.5;
    }

    let variance = intervals_secs
        .iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>()
        / n;
    let cv = variance.sqrt() / mean;

    (1.0 - cv).clamp(0.0, 1.0)
}

/// Scan all frames' joint angles and track each joint's observed min/max.
pub fn rom_ranges(timeline: &Timeline) -> HashMap<String, RomRange> {
    let mut ranges: HashMap<String, RomRange> = HashMap::new();

    for frame in timeline.frames() {
        for (joint, angle) in all_joint_angles(&frame.pose) {
            ranges
                .entry(joint)
                .and_modify(|range| {
                    range.min_deg = range.min_deg.min(angle);
                    range.max_deg = range.max_deg.max(angle);
                })
                .or_insert(RomRange {
                    min_deg: angle,
                    max_deg: angle,
                });
        }
    }

    ranges
}

/// Derive breathing alert thresholds from a breathing baseline.
///
/// A 30% depth drop signals fatigue; the rate alert band is a symmetric 25%
/// of the typical rate.
pub fn compute_breathing_thresholds(baseline: &BreathingBaseline) -> BreathingThresholds {
    BreathingThresholds {
        fatigue_threshold: 0.7 * baseline.depth,
        rate_alert_threshold: 0.25 * baseline.rate_bpm,
    }
}

/// Derive posture alert thresholds from height and an optional posture
/// baseline.
///
/// Without a baseline, the forward-head alert is 3% of height and the
/// shoulder alert a fixed 5 degrees; with one, the baseline plus a 2-unit
/// margin applies unless the default is stricter.
pub fn compute_posture_thresholds(
    height_cm: f64,
    baseline: Option<&PostureBaseline>,
) -> PostureThresholds {
    let default_forward = 0.03 * height_cm;

    match baseline {
        Some(base) => PostureThresholds {
            forward_head_alert_cm: (base.forward_head_cm + 2.0).max(default_forward),
            shoulder_imbalance_alert_deg: (base.shoulder_imbalance_deg.abs() + 2.0).max(5.0),
        },
        None => PostureThresholds {
            forward_head_alert_cm: default_forward,
            shoulder_imbalance_alert_deg: 5.0,
        },
    }
}

/// Physical joint distances (cm) measured from a scaled baseline pose.
fn joint_distances(pose: &Pose, cm_per_unit: f64) -> HashMap<String, f64> {
    let find = |id: LandmarkId| pose.landmarks.iter().find(|lm| lm.id == id);
    let mut distances = HashMap::new();

    let mut pair = |name: &str, a: LandmarkId, b: LandmarkId| {
        if let (Some(a), Some(b)) = (find(a), find(b)) {
            distances.insert(
                name.to_string(),
                a.position().distance_to(&b.position()) * cm_per_unit,
            );
        }
    };

    pair(
        "shoulder_width_cm",
        LandmarkId::LeftShoulder,
        LandmarkId::RightShoulder,
    );
    pair("hip_width_cm", LandmarkId::LeftHip, LandmarkId::RightHip);
    pair("arm_span_cm", LandmarkId::LeftWrist, LandmarkId::RightWrist);

    if let (Some(ls), Some(rs), Some(lh), Some(rh)) = (
        find(LandmarkId::LeftShoulder),
        find(LandmarkId::RightShoulder),
        find(LandmarkId::LeftHip),
        find(LandmarkId::RightHip),
    ) {
        let mid_shoulder = crate::features::centroid(&[ls.position(), rs.position()]);
        let mid_hip = crate::features::centroid(&[lh.position(), rh.position()]);
        distances.insert(
            "torso_length_cm".to_string(),
            mid_shoulder.distance_to(&mid_hip) * cm_per_unit,
        );
    }

    distances
}

/// Posture baseline measured from an averaged T-pose.
fn posture_baseline(avg_pose: &Pose, cm_per_unit: f64) -> Option<PostureBaseline> {
    let find = |id: LandmarkId| avg_pose.landmarks.iter().find(|lm| lm.id == id);

    let nose = find(LandmarkId::Nose)?;
    let left = find(LandmarkId::LeftShoulder)?;
    let right = find(LandmarkId::RightShoulder)?;

    let mid_z = (left.z + right.z) / 2.0;
    let forward_head_cm = (nose.z - mid_z) * cm_per_unit;

    let dy = left.y - right.y;
    let dx = (left.x - right.x).abs();
    let shoulder_imbalance_deg = if dx < 1e-9 {
        0.0
    } else {
        dy.atan2(dx).to_degrees()
    };

    Some(PostureBaseline {
        forward_head_cm,
        shoulder_imbalance_deg,
    })
}

/// Breathing baseline measured from a breathing calibration recording.
fn breathing_baseline(
    timeline: &Timeline,
    config: &CalibrationConfig,
) -> Option<BreathingBaseline> {
    let signal = torso_motion_signal(timeline, config.visibility_cutoff);
    let detection = detect_breathing_rate(&signal, &config.breathing);
    let rate_bpm = detection.rate_bpm?;

    let intervals = breath_intervals(&signal, config);

    Some(BreathingBaseline {
        rate_bpm,
        depth: detection.depth_score,
        rhythm_regularity: rhythm_regularity(&intervals),
    })
}

/// Inter-breath intervals (seconds) from local maxima of the smoothed
/// motion signal.
fn breath_intervals(signal: &[f64], config: &CalibrationConfig) -> Vec<f64> {
    let smoothed = moving_average(signal, config.smoothing_window);
    if smoothed.len() < 3 {
        return Vec::new();
    }
    let mean = smoothed.iter().sum::<f64>() / smoothed.len() as f64;

    let peaks: Vec<usize> = (1..smoothed.len() - 1)
        .filter(|&i| {
            smoothed[i] > smoothed[i - 1] && smoothed[i] >= smoothed[i + 1] && smoothed[i] > mean
        })
        .collect();

    peaks
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f64 / config.breathing.sampling_rate_hz)
        .collect()
}

/// Select the most recently created session of each required kind.
///
/// Duplicates are resolved by recency, never merged. Fails before any
/// computation when a kind is missing; this is a caller contract, not a
/// recoverable runtime condition.
fn select_sessions<'a>(
    sessions: &'a [CalibrationSession],
) -> Result<HashMap<CalibrationKind, &'a CalibrationSession>, AnalysisError> {
    let mut selected: HashMap<CalibrationKind, &CalibrationSession> = HashMap::new();

    for session in sessions {
        selected
            .entry(session.kind)
            .and_modify(|current| {
                if session.created_at > current.created_at {
                    *current = session;
                }
            })
            .or_insert(session);
    }

    for kind in CalibrationKind::ALL {
        if !selected.contains_key(&kind) {
            return Err(AnalysisError::MissingCalibration(kind));
        }
    }

    Ok(selected)
}

/// Create a user profile from a complete calibration set.
///
/// Requires at least one session of each kind (T-pose, breathing, movement).
/// The assembled profile is validated as a whole; an internally inconsistent
/// result is a construction error, never a partially valid profile.
pub fn create_user_profile(
    user_id: &str,
    sessions: &[CalibrationSession],
    height_cm: f64,
) -> Result<UserProfile, AnalysisError> {
    create_user_profile_with(user_id, sessions, height_cm, &CalibrationConfig::default())
}

/// [`create_user_profile`] with explicit configuration.
pub fn create_user_profile_with(
    user_id: &str,
    sessions: &[CalibrationSession],
    height_cm: f64,
    config: &CalibrationConfig,
) -> Result<UserProfile, AnalysisError> {
    let selected = select_sessions(sessions)?;

    // Precondition held; safe to index by kind from here on
    let t_pose_session = selected[&CalibrationKind::TPose];
    let breathing_session = selected[&CalibrationKind::Breathing];
    let movement_session = selected[&CalibrationKind::Movement];

    let poses: Vec<Pose> = t_pose_session
        .timeline
        .frames()
        .iter()
        .map(|f| f.pose.clone())
        .collect();
    let avg_pose = average_poses(&poses, config.visibility_cutoff);
    let cm_per_unit = scale_factor(&avg_pose, height_cm)?;

    let baseline_pose = BaselinePose {
        joint_distances_cm: joint_distances(&avg_pose, cm_per_unit),
        landmarks: avg_pose.landmarks.clone(),
        captured_at: t_pose_session.created_at,
    };
    let posture = posture_baseline(&avg_pose, cm_per_unit);
    let breathing = breathing_baseline(&breathing_session.timeline, config);

    let rom = rom_ranges(&movement_session.timeline);

    let thresholds = LearnedThresholds {
        breathing: breathing
            .as_ref()
            .map(compute_breathing_thresholds)
            .unwrap_or(DEFAULT_BREATHING_THRESHOLDS),
        posture: compute_posture_thresholds(height_cm, posture.as_ref()),
        balance: BalanceThresholds {
            stability_alert: BALANCE_STABILITY_ALERT,
        },
    };

    let profile = UserProfile {
        profile_id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        height_cm,
        baseline_pose,
        thresholds,
        breathing_baseline: breathing,
        posture_baseline: posture,
        rom_ranges: if rom.is_empty() { None } else { Some(rom) },
        last_calibrated: Utc::now(),
        calibration_count: sessions.len() as u32,
        engine_version: crate::ENGINE_VERSION.to_string(),
    };

    profile.validate()?;
    Ok(profile)
}

/// Rebuild baselines and thresholds from a new calibration set and merge
/// them into an existing profile.
///
/// The new set must satisfy the same precondition as creation. The merged
/// profile keeps its identity, increments the calibration count by the
/// number of new sessions, refreshes the calibration timestamp, and is
/// re-validated before being returned.
pub fn update_user_profile(
    existing: &UserProfile,
    new_sessions: &[CalibrationSession],
    height_cm: f64,
) -> Result<UserProfile, AnalysisError> {
    update_user_profile_with(
        existing,
        new_sessions,
        height_cm,
        &CalibrationConfig::default(),
    )
}

/// [`update_user_profile`] with explicit configuration.
pub fn update_user_profile_with(
    existing: &UserProfile,
    new_sessions: &[CalibrationSession],
    height_cm: f64,
    config: &CalibrationConfig,
) -> Result<UserProfile, AnalysisError> {
    let rebuilt = create_user_profile_with(&existing.user_id, new_sessions, height_cm, config)?;

    let merged = UserProfile {
        profile_id: existing.profile_id,
        calibration_count: existing.calibration_count + new_sessions.len() as u32,
        ..rebuilt
    };

    merged.validate()?;
    Ok(merged)
}
