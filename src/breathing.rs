//! Frequency-domain breathing analyzer
//!
//! A stateless pipeline over the torso motion signal: FFT, peak detection in
//! the breathing band, fatigue-window detection, and rule-based insight
//! generation. Given identical inputs the analyzer produces identical
//! output.

use crate::features::torso_motion_signal;
use crate::profile::{BreathingBaseline, UserProfile};
use crate::spectrum::{fft_magnitudes, peak_in_range};
use crate::types::{
    BreathingAnalysisResult, FatigueWindow, Insight, InsightCategory, Severity, Timeline,
};
use serde::{Deserialize, Serialize};

/// Configuration for breathing analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreathingConfig {
    /// Capture rate of the pose timeline (Hz)
    pub sampling_rate_hz: f64,
    /// Lower edge of the breathing band (Hz); 0.1 Hz = 6 breaths/min
    pub band_min_hz: f64,
    /// Upper edge of the breathing band (Hz); 0.5 Hz = 30 breaths/min
    pub band_max_hz: f64,
    /// Minimum samples required for rate detection (~2 s at 15 fps)
    pub min_samples: usize,
    /// Motion magnitude of a full breath; normalizes the depth score
    pub depth_normalizer: f64,
    /// Fatigue threshold as a fraction of the signal mean
    pub fatigue_threshold_fraction: f64,
    /// Below-threshold runs closer than this gap are merged (samples)
    pub fatigue_merge_gap: usize,
    /// Merged runs shorter than this are dropped (samples)
    pub fatigue_min_len: usize,
    /// Landmark visibility cutoff used when extracting the torso signal
    pub visibility_cutoff: f64,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 15.0,
            band_min_hz: 0.1,
            band_max_hz: 0.5,
            min_samples: 30,
            depth_normalizer: 0.05,
            fatigue_threshold_fraction: 0.3,
            fatigue_merge_gap: 30,
            fatigue_min_len: 15,
            visibility_cutoff: 0.5,
        }
    }
}

/// Outcome of breathing-rate detection over a motion signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateDetection {
    pub rate_bpm: Option<f64>,
    pub dominant_frequency_hz: f64,
    pub confidence: f64,
    pub depth_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detect the breathing rate from a torso motion signal.
///
/// Signals shorter than `min_samples` produce a structured
/// insufficient-samples result with zero confidence rather than failing the
/// pipeline; callers can still render a partial report.
pub fn detect_breathing_rate(signal: &[f64], config: &BreathingConfig) -> RateDetection {
    if signal.len() < config.min_samples {
        return RateDetection {
            rate_bpm: None,
            dominant_frequency_hz: 0.0,
            confidence: 0.0,
            depth_score: 0.0,
            error: Some(format!(
                "insufficient samples: {} of {} required",
                signal.len(),
                config.min_samples
            )),
        };
    }

    let spectrum = fft_magnitudes(signal, config.sampling_rate_hz);
    let peak = peak_in_range(&spectrum, config.band_min_hz, config.band_max_hz);

    let rms = (signal.iter().map(|x| x * x).sum::<f64>() / signal.len() as f64).sqrt();
    let depth_score = (rms / config.depth_normalizer).clamp(0.0, 1.0);

    let rate_bpm = if peak.frequency_hz > 0.0 {
        Some(peak.frequency_hz * 60.0)
    } else {
        None
    };

    RateDetection {
        rate_bpm,
        dominant_frequency_hz: peak.frequency_hz,
        confidence: peak.confidence,
        depth_score,
        error: None,
    }
}

/// Detect intervals where the signal stays well below its typical amplitude.
///
/// The threshold is dynamic: `threshold_fraction` of the signal mean. Runs
/// separated by a gap of at most `merge_gap` samples are merged, since brief
/// spikes between breath-holds are noise. Merged runs shorter than
/// `min_len` samples are dropped. Sample indices convert to milliseconds
/// via `1000 / fps`.
pub fn detect_fatigue_windows(
    signal: &[f64],
    threshold_fraction: f64,
    fps: f64,
    merge_gap: usize,
    min_len: usize,
) -> Vec<FatigueWindow> {
    if signal.is_empty() || fps <= 0.0 {
        return Vec::new();
    }

    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    let threshold = threshold_fraction * mean;
    if threshold <= 0.0 {
        return Vec::new();
    }

    // Maximal contiguous runs of below-threshold samples, as inclusive
    // (start, end) index pairs
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut current: Option<usize> = None;
    for (i, &sample) in signal.iter().enumerate() {
        if sample < threshold {
            if current.is_none() {
                current = Some(i);
            }
        } else if let Some(start) = current.take() {
            runs.push((start, i - 1));
        }
    }
    if let Some(start) = current {
        runs.push((start, signal.len() - 1));
    }

    // Merge runs separated by short gaps
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for run in runs {
        match merged.last_mut() {
            Some(last) if run.0 - last.1 - 1 <= merge_gap => last.1 = run.1,
            _ => merged.push(run),
        }
    }

    let ms_per_sample = 1000.0 / fps;
    merged
        .into_iter()
        .filter(|(start, end)| end - start + 1 >= min_len)
        .map(|(start, end)| {
            let run = &signal[start..=end];
            let run_mean = run.iter().sum::<f64>() / run.len() as f64;
            let severity = ((threshold - run_mean) / threshold).clamp(0.0, 1.0);
            FatigueWindow {
                start_ms: (start as f64 * ms_per_sample) as i64,
                end_ms: (end as f64 * ms_per_sample) as i64,
                severity,
            }
        })
        .collect()
}

/// Generate rule-based insights for a detection result.
///
/// Rate and depth rules only fire when detection confidence exceeds 0.5.
/// Fatigue windows always produce one insight each.
pub fn generate_insights(
    detection: &RateDetection,
    fatigue_windows: &[FatigueWindow],
    baseline: Option<&BreathingBaseline>,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    if detection.confidence > 0.5 {
        if let Some(rate) = detection.rate_bpm {
            match baseline {
                Some(base) if base.rate_bpm > 0.0 => {
                    let pct = (rate - base.rate_bpm) / base.rate_bpm * 100.0;
                    if pct.abs() <= 15.0 {
                        insights.push(Insight {
                            category: InsightCategory::BreathingRate,
                            severity: Severity::Low,
                            message: format!(
                                "Breathing rate {:.1} bpm is consistent with your baseline of {:.1} bpm",
                                rate, base.rate_bpm
                            ),
                        });
                    } else {
                        let severity = if pct.abs() > 25.0 {
                            Severity::High
                        } else {
                            Severity::Medium
                        };
                        let direction = if pct > 0.0 { "above" } else { "below" };
                        insights.push(Insight {
                            category: InsightCategory::BreathingRate,
                            severity,
                            message: format!(
                                "Breathing rate {:.1} bpm is {:.0}% {} your baseline of {:.1} bpm",
                                rate,
                                pct.abs(),
                                direction,
                                base.rate_bpm
                            ),
                        });
                    }
                }
                _ => {
                    if rate > 25.0 {
                        insights.push(Insight {
                            category: InsightCategory::BreathingRate,
                            severity: Severity::Medium,
                            message: format!("Breathing rate is elevated at {:.1} bpm", rate),
                        });
                    } else if rate < 8.0 {
                        insights.push(Insight {
                            category: InsightCategory::BreathingRate,
                            severity: Severity::High,
                            message: format!("Breathing rate is very slow at {:.1} bpm", rate),
                        });
                    } else if (12.0..=20.0).contains(&rate) {
                        insights.push(Insight {
                            category: InsightCategory::BreathingRate,
                            severity: Severity::Low,
                            message: format!(
                                "Breathing rate {:.1} bpm is within the typical resting range",
                                rate
                            ),
                        });
                    }
                }
            }
        }

        if detection.depth_score < 0.5 {
            insights.push(Insight {
                category: InsightCategory::BreathingDepth,
                severity: Severity::Medium,
                message: format!(
                    "Breathing is shallow (depth score {:.2})",
                    detection.depth_score
                ),
            });
        } else if detection.depth_score > 0.7 {
            insights.push(Insight {
                category: InsightCategory::BreathingDepth,
                severity: Severity::Low,
                message: format!(
                    "Breathing depth is strong (depth score {:.2})",
                    detection.depth_score
                ),
            });
        }
    }

    for window in fatigue_windows {
        let severity = if window.severity > 0.8 {
            Severity::High
        } else if window.severity > 0.5 {
            Severity::Medium
        } else {
            Severity::Low
        };
        let duration_secs = (window.end_ms - window.start_ms) as f64 / 1000.0;
        insights.push(Insight {
            category: InsightCategory::Fatigue,
            severity,
            message: format!(
                "Breathing amplitude dropped for {:.1} s starting at {:.1} s",
                duration_secs,
                window.start_ms as f64 / 1000.0
            ),
        });
    }

    insights
}

/// Top-level breathing analyzer.
pub struct BreathingAnalyzer;

impl BreathingAnalyzer {
    /// Analyze a session timeline, optionally personalized by a profile.
    ///
    /// A profile supplies the learned fatigue threshold fraction and the
    /// baseline rate used for delta and percent-change reporting.
    pub fn analyze(
        timeline: &Timeline,
        profile: Option<&UserProfile>,
        config: &BreathingConfig,
    ) -> BreathingAnalysisResult {
        let signal = torso_motion_signal(timeline, config.visibility_cutoff);
        let detection = detect_breathing_rate(&signal, config);

        let threshold_fraction = profile
            .map(|p| p.thresholds.breathing.fatigue_threshold)
            .unwrap_or(config.fatigue_threshold_fraction);

        let fatigue_windows = detect_fatigue_windows(
            &signal,
            threshold_fraction,
            config.sampling_rate_hz,
            config.fatigue_merge_gap,
            config.fatigue_min_len,
        );

        let baseline = profile.and_then(|p| p.breathing_baseline.as_ref());

        let (baseline_delta_bpm, baseline_change_pct) = match (detection.rate_bpm, baseline) {
            (Some(rate), Some(base)) if base.rate_bpm > 0.0 => {
                let delta = rate - base.rate_bpm;
                (Some(delta), Some(delta / base.rate_bpm * 100.0))
            }
            _ => (None, None),
        };

        let insights = generate_insights(&detection, &fatigue_windows, baseline);

        BreathingAnalysisResult {
            rate_bpm: detection.rate_bpm,
            dominant_frequency_hz: detection.dominant_frequency_hz,
            confidence: detection.confidence,
            depth_score: detection.depth_score,
            fatigue_windows,
            baseline_delta_bpm,
            baseline_change_pct,
            insights,
            error: detection.error,
        }
    }
}
