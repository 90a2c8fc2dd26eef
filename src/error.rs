//! Error types for Kinesense

use crate::types::CalibrationKind;
use thiserror::Error;

/// Errors that can occur during analysis or calibration
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Missing required calibration session: {}", .0.as_str())]
    MissingCalibration(CalibrationKind),

    #[error("Profile validation failed: {}", .violations.join("; "))]
    ProfileValidation { violations: Vec<String> },

    #[error("Calibration error: {0}")]
    Calibration(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
