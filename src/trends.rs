//! Longitudinal trend analysis
//!
//! Ordinary-least-squares regression over per-session summary metrics, with
//! a slope-based three-way direction classification. Direction is
//! sign-of-slope only; it deliberately does not encode whether an
//! increasing value is good or bad for a particular metric.

use crate::types::{SessionSummary, TrendDirection, TrendOverview, TrendResult};
use serde::{Deserialize, Serialize};

/// Configuration for trend classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Slopes within this band classify as stable
    pub stability_band: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            stability_band: 0.05,
        }
    }
}

/// The fixed set of metrics tracked across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedMetric {
    BreathingRate,
    BreathingDepth,
    PostureScore,
    ForwardHead,
}

impl TrackedMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedMetric::BreathingRate => "breathing_rate",
            TrackedMetric::BreathingDepth => "breathing_depth",
            TrackedMetric::PostureScore => "posture_score",
            TrackedMetric::ForwardHead => "forward_head",
        }
    }

    /// Extract this metric from a session summary, if the session has it.
    pub fn extract(&self, session: &SessionSummary) -> Option<f64> {
        match self {
            TrackedMetric::BreathingRate => session.breathing_rate_bpm,
            TrackedMetric::BreathingDepth => session.breathing_depth,
            TrackedMetric::PostureScore => session.posture_score,
            TrackedMetric::ForwardHead => session.forward_head_cm,
        }
    }
}

/// An ordinary-least-squares line fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Fit a least-squares line over `x = 0..n-1, y = values`.
///
/// Degenerate inputs stay finite: a constant signal has R² = 1.0 (the flat
/// line is an exact fit), a single point fits as a flat line through it,
/// and an empty input fits as the zero line.
pub fn fit_linear_regression(values: &[f64]) -> LinearFit {
    let n = values.len();
    if n == 0 {
        return LinearFit {
            slope: 0.0,
            intercept: 0.0,
            r_squared: 1.0,
        };
    }
    if n == 1 {
        return LinearFit {
            slope: 0.0,
            intercept: values[0],
            r_squared: 1.0,
        };
    }

    let n_f = n as f64;
    let sum_x: f64 = (0..n).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..n).map(|i| (i as f64) * (i as f64)).sum();

    let denom = n_f * sum_x2 - sum_x * sum_x;
    let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n_f;

    let mean_y = sum_y / n_f;
    let ss_tot: f64 = values.iter().map(|y| (y - mean_y).powi(2)).sum();
    let r_squared = if ss_tot < 1e-12 {
        // Zero variance: the flat model matches exactly
        1.0
    } else {
        let ss_res: f64 = values
            .iter()
            .enumerate()
            .map(|(i, y)| {
                let predicted = slope * i as f64 + intercept;
                (y - predicted).powi(2)
            })
            .sum();
        1.0 - ss_res / ss_tot
    };

    LinearFit {
        slope,
        intercept,
        r_squared,
    }
}

fn classify_direction(slope: f64, stability_band: f64) -> TrendDirection {
    if slope > stability_band {
        TrendDirection::Increasing
    } else if slope < -stability_band {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

/// Fit one metric's trend across a session history.
///
/// Sessions missing the metric are skipped rather than aborting the whole
/// computation; the regression runs over the values that exist, in session
/// order.
pub fn compute_trend(
    sessions: &[SessionSummary],
    metric: TrackedMetric,
    config: &TrendConfig,
) -> TrendResult {
    let mut values = Vec::new();
    let mut timestamps_ms = Vec::new();

    for session in sessions {
        if let Some(value) = metric.extract(session) {
            values.push(value);
            timestamps_ms.push(session.timestamp_ms);
        }
    }

    let fit = fit_linear_regression(&values);
    let direction = classify_direction(fit.slope, config.stability_band);

    TrendResult {
        values,
        timestamps_ms,
        slope: fit.slope,
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        direction,
    }
}

/// Compute trends for every tracked metric across a session history.
///
/// Returns `None` for an empty session list.
pub fn compute_trend_analysis(sessions: &[SessionSummary]) -> Option<TrendOverview> {
    if sessions.is_empty() {
        return None;
    }
    let config = TrendConfig::default();

    Some(TrendOverview {
        session_count: sessions.len(),
        breathing_rate: compute_trend(sessions, TrackedMetric::BreathingRate, &config),
        breathing_depth: compute_trend(sessions, TrackedMetric::BreathingDepth, &config),
        posture_score: compute_trend(sessions, TrackedMetric::PostureScore, &config),
        forward_head: compute_trend(sessions, TrackedMetric::ForwardHead, &config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session(timestamp_ms: i64, rate: Option<f64>, depth: Option<f64>) -> SessionSummary {
        SessionSummary {
            session_id: Uuid::new_v4(),
            timestamp_ms,
            breathing_rate_bpm: rate,
            breathing_depth: depth,
            posture_score: None,
            forward_head_cm: None,
        }
    }

    #[test]
    fn regression_on_exact_line() {
        let fit = fit_linear_regression(&[1.0, 3.0, 5.0, 7.0, 9.0]);
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 1.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn regression_on_constant_signal() {
        let fit = fit_linear_regression(&[5.0, 5.0, 5.0, 5.0, 5.0]);
        assert!(fit.slope.abs() < 1e-9);
        assert!((fit.intercept - 5.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn regression_degenerate_inputs_stay_finite() {
        let single = fit_linear_regression(&[42.0]);
        assert_eq!(single.slope, 0.0);
        assert_eq!(single.intercept, 42.0);
        assert_eq!(single.r_squared, 1.0);

        let empty = fit_linear_regression(&[]);
        assert!(empty.slope.is_finite());
        assert!(empty.intercept.is_finite());
    }

    #[test]
    fn noisy_data_has_r_squared_below_one() {
        let fit = fit_linear_regression(&[1.0, 3.2, 4.1, 7.9, 8.5]);
        assert!(fit.r_squared < 1.0);
        assert!(fit.r_squared > 0.9);
    }

    #[test]
    fn direction_classification_bands() {
        let config = TrendConfig::default();
        let sessions: Vec<SessionSummary> = (0..5)
            .map(|i| session(i * 86_400_000, Some(14.0 + i as f64), None))
            .collect();
        let trend = compute_trend(&sessions, TrackedMetric::BreathingRate, &config);
        assert_eq!(trend.direction, TrendDirection::Increasing);

        let flat: Vec<SessionSummary> = (0..5)
            .map(|i| session(i * 86_400_000, Some(14.0 + 0.01 * i as f64), None))
            .collect();
        let trend = compute_trend(&flat, TrackedMetric::BreathingRate, &config);
        assert_eq!(trend.direction, TrendDirection::Stable);

        let falling: Vec<SessionSummary> = (0..5)
            .map(|i| session(i * 86_400_000, Some(14.0 - i as f64), None))
            .collect();
        let trend = compute_trend(&falling, TrackedMetric::BreathingRate, &config);
        assert_eq!(trend.direction, TrendDirection::Decreasing);
    }

    #[test]
    fn missing_metrics_are_skipped_not_fatal() {
        let sessions = vec![
            session(0, Some(14.0), None),
            session(86_400_000, None, None),
            session(2 * 86_400_000, Some(16.0), None),
        ];
        let trend = compute_trend(&sessions, TrackedMetric::BreathingRate, &TrendConfig::default());
        assert_eq!(trend.values, vec![14.0, 16.0]);
        assert_eq!(trend.timestamps_ms, vec![0, 2 * 86_400_000]);
    }

    #[test]
    fn overview_is_absent_for_empty_history() {
        assert!(compute_trend_analysis(&[]).is_none());
    }

    #[test]
    fn overview_covers_all_tracked_metrics() {
        let sessions: Vec<SessionSummary> = (0..4)
            .map(|i| session(i * 86_400_000, Some(15.0), Some(0.7)))
            .collect();
        let overview = compute_trend_analysis(&sessions).unwrap();
        assert_eq!(overview.session_count, 4);
        assert_eq!(overview.breathing_rate.values.len(), 4);
        assert_eq!(overview.breathing_depth.values.len(), 4);
        // No posture data was recorded; the trend is an empty fit
        assert!(overview.posture_score.values.is_empty());
    }
}
