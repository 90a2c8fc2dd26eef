//! Kinesense - On-device analysis engine for pose-derived physiological signals
//!
//! Kinesense transforms a time-ordered pose timeline (landmarks from an
//! external pose-estimation model) into quantitative signals through a
//! deterministic pipeline: pose geometry → feature extraction →
//! frequency-domain breathing analysis, alongside a calibration pipeline
//! that turns raw measurement sessions into a personalized baseline profile
//! with adaptive alert thresholds, and a trend analyzer for longitudinal
//! reporting.
//!
//! The entire engine is synchronous and side-effect-free: every operation is
//! a pure function of its inputs, so callers may parallelize analysis across
//! independent sessions without synchronization.

pub mod breathing;
pub mod calibration;
pub mod error;
pub mod features;
pub mod geometry;
pub mod profile;
pub mod spectrum;
pub mod trends;
pub mod types;

pub use breathing::{BreathingAnalyzer, BreathingConfig};
pub use calibration::{create_user_profile, update_user_profile, CalibrationConfig};
pub use error::AnalysisError;
pub use features::{FeatureConfig, FeatureSet};
pub use profile::UserProfile;
pub use trends::{compute_trend_analysis, TrackedMetric, TrendConfig};
pub use types::{
    BreathingAnalysisResult, CalibrationKind, CalibrationSession, Frame, Landmark, LandmarkId,
    Pose, SessionSummary, Timeline, TrendOverview,
};

/// Engine version embedded in all profile records
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for profile records
pub const PRODUCER_NAME: &str = "kinesense";
