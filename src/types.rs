//! Core types for the Kinesense pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: landmarks and poses, session timelines, calibration sessions,
//! analysis results, and longitudinal session summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Identifier for one of the 33 tracked body keypoints (BlazePose topology).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkId {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl LandmarkId {
    /// All 33 landmark identifiers in model output order.
    pub const ALL: [LandmarkId; 33] = [
        LandmarkId::Nose,
        LandmarkId::LeftEyeInner,
        LandmarkId::LeftEye,
        LandmarkId::LeftEyeOuter,
        LandmarkId::RightEyeInner,
        LandmarkId::RightEye,
        LandmarkId::RightEyeOuter,
        LandmarkId::LeftEar,
        LandmarkId::RightEar,
        LandmarkId::MouthLeft,
        LandmarkId::MouthRight,
        LandmarkId::LeftShoulder,
        LandmarkId::RightShoulder,
        LandmarkId::LeftElbow,
        LandmarkId::RightElbow,
        LandmarkId::LeftWrist,
        LandmarkId::RightWrist,
        LandmarkId::LeftPinky,
        LandmarkId::RightPinky,
        LandmarkId::LeftIndex,
        LandmarkId::RightIndex,
        LandmarkId::LeftThumb,
        LandmarkId::RightThumb,
        LandmarkId::LeftHip,
        LandmarkId::RightHip,
        LandmarkId::LeftKnee,
        LandmarkId::RightKnee,
        LandmarkId::LeftAnkle,
        LandmarkId::RightAnkle,
        LandmarkId::LeftHeel,
        LandmarkId::RightHeel,
        LandmarkId::LeftFootIndex,
        LandmarkId::RightFootIndex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LandmarkId::Nose => "nose",
            LandmarkId::LeftEyeInner => "left_eye_inner",
            LandmarkId::LeftEye => "left_eye",
            LandmarkId::LeftEyeOuter => "left_eye_outer",
            LandmarkId::RightEyeInner => "right_eye_inner",
            LandmarkId::RightEye => "right_eye",
            LandmarkId::RightEyeOuter => "right_eye_outer",
            LandmarkId::LeftEar => "left_ear",
            LandmarkId::RightEar => "right_ear",
            LandmarkId::MouthLeft => "mouth_left",
            LandmarkId::MouthRight => "mouth_right",
            LandmarkId::LeftShoulder => "left_shoulder",
            LandmarkId::RightShoulder => "right_shoulder",
            LandmarkId::LeftElbow => "left_elbow",
            LandmarkId::RightElbow => "right_elbow",
            LandmarkId::LeftWrist => "left_wrist",
            LandmarkId::RightWrist => "right_wrist",
            LandmarkId::LeftPinky => "left_pinky",
            LandmarkId::RightPinky => "right_pinky",
            LandmarkId::LeftIndex => "left_index",
            LandmarkId::RightIndex => "right_index",
            LandmarkId::LeftThumb => "left_thumb",
            LandmarkId::RightThumb => "right_thumb",
            LandmarkId::LeftHip => "left_hip",
            LandmarkId::RightHip => "right_hip",
            LandmarkId::LeftKnee => "left_knee",
            LandmarkId::RightKnee => "right_knee",
            LandmarkId::LeftAnkle => "left_ankle",
            LandmarkId::RightAnkle => "right_ankle",
            LandmarkId::LeftHeel => "left_heel",
            LandmarkId::RightHeel => "right_heel",
            LandmarkId::LeftFootIndex => "left_foot_index",
            LandmarkId::RightFootIndex => "right_foot_index",
        }
    }
}

/// A 3D point in normalized or world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// Origin, also the defined centroid of an empty point set.
    pub const ORIGIN: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A single tracked body keypoint with 3D position and visibility.
///
/// `visibility` is the canonical name for the model's 0-1 landmark score
/// (some upstream sources label the same quantity "confidence").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: LandmarkId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Landmark visibility score (0-1)
    pub visibility: f64,
}

impl Landmark {
    pub fn new(id: LandmarkId, x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            visibility,
        }
    }

    pub fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

/// The full set of landmarks detected at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub landmarks: Vec<Landmark>,
    /// Overall detection confidence (0-1)
    pub confidence: f64,
    /// Capture timestamp (milliseconds)
    pub timestamp_ms: i64,
}

impl Pose {
    pub fn new(landmarks: Vec<Landmark>, confidence: f64, timestamp_ms: i64) -> Self {
        Self {
            landmarks,
            confidence,
            timestamp_ms,
        }
    }
}

/// One captured sample in a session: a pose plus its position in the sequence.
///
/// Immutable once produced; owned by a [`Timeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub index: usize,
    pub timestamp_ms: i64,
    pub pose: Pose,
    /// Optional derived metrics attached at capture time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<HashMap<String, f64>>,
}

impl Frame {
    pub fn new(index: usize, timestamp_ms: i64, pose: Pose) -> Self {
        Self {
            index,
            timestamp_ms,
            pose,
            metrics: None,
        }
    }
}

/// Temporally ordered sequence of frames for one recording session.
///
/// Insertion order is temporal order and is semantically significant:
/// frame-to-frame differencing relies on it. Append-only during capture,
/// read-only for analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    frames: Vec<Frame>,
}

impl Timeline {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Append a frame. Callers must push frames in capture order.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Kind of a calibration recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationKind {
    TPose,
    Breathing,
    Movement,
}

impl CalibrationKind {
    pub const ALL: [CalibrationKind; 3] = [
        CalibrationKind::TPose,
        CalibrationKind::Breathing,
        CalibrationKind::Movement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationKind::TPose => "t_pose",
            CalibrationKind::Breathing => "breathing",
            CalibrationKind::Movement => "movement",
        }
    }
}

/// A typed calibration recording used to derive personal baselines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSession {
    pub id: Uuid,
    pub kind: CalibrationKind,
    pub timeline: Timeline,
    pub duration_secs: f64,
    pub created_at: DateTime<Utc>,
}

impl CalibrationSession {
    pub fn new(kind: CalibrationKind, timeline: Timeline, duration_secs: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timeline,
            duration_secs,
            created_at: Utc::now(),
        }
    }
}

/// A time interval where the breathing signal dropped well below its
/// typical amplitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueWindow {
    pub start_ms: i64,
    pub end_ms: i64,
    /// Severity of the amplitude drop (0-1)
    pub severity: f64,
}

/// Insight severity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Insight category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    BreathingRate,
    BreathingDepth,
    Fatigue,
}

/// A rule-generated observation attached to an analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub category: InsightCategory,
    pub severity: Severity,
    pub message: String,
}

/// Result of breathing analysis over one session timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreathingAnalysisResult {
    /// Detected breathing rate (breaths per minute), if detectable
    pub rate_bpm: Option<f64>,
    /// Dominant frequency in the breathing band (Hz)
    pub dominant_frequency_hz: f64,
    /// Confidence in the detected rate (0-1)
    pub confidence: f64,
    /// Breathing depth score (0-1)
    pub depth_score: f64,
    /// Detected fatigue windows
    pub fatigue_windows: Vec<FatigueWindow>,
    /// Rate delta from the profile baseline (bpm), when a profile was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_delta_bpm: Option<f64>,
    /// Rate change from the profile baseline (percent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_change_pct: Option<f64>,
    /// Rule-generated insights
    pub insights: Vec<Insight>,
    /// Present when the signal was too short to analyze
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Three-way slope classification for a metric trend.
///
/// Direction is sign-of-slope only; whether "increasing" is good or bad for
/// a given metric is left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

/// Ordinary-least-squares fit over one metric's session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    /// Metric values in session order (sessions missing the metric omitted)
    pub values: Vec<f64>,
    /// Timestamps aligned with `values` (milliseconds)
    pub timestamps_ms: Vec<i64>,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub direction: TrendDirection,
}

/// Per-session summary metrics used for longitudinal trend analysis.
///
/// Any metric may be absent for a given session; absent values are skipped
/// by the trend analyzer rather than aborting the computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub timestamp_ms: i64,
    pub breathing_rate_bpm: Option<f64>,
    pub breathing_depth: Option<f64>,
    pub posture_score: Option<f64>,
    pub forward_head_cm: Option<f64>,
}

/// Trend results across the fixed set of tracked metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendOverview {
    pub session_count: usize,
    pub breathing_rate: TrendResult,
    pub breathing_depth: TrendResult,
    pub posture_score: TrendResult,
    pub forward_head: TrendResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn landmark_id_table_covers_all_33_keypoints() {
        assert_eq!(LandmarkId::ALL.len(), 33);
        assert_eq!(LandmarkId::Nose.as_str(), "nose");
        assert_eq!(LandmarkId::LeftShoulder.as_str(), "left_shoulder");
        assert_eq!(LandmarkId::RightFootIndex.as_str(), "right_foot_index");
    }

    #[test]
    fn point_distance() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn timeline_preserves_insertion_order() {
        let mut timeline = Timeline::new();
        for i in 0..3 {
            let pose = Pose::new(vec![], 1.0, i as i64 * 66);
            timeline.push(Frame::new(i, i as i64 * 66, pose));
        }
        let indices: Vec<usize> = timeline.frames().iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn calibration_kind_serializes_snake_case() {
        let json = serde_json::to_string(&CalibrationKind::TPose).unwrap();
        assert_eq!(json, "\"t_pose\"");
    }
}
