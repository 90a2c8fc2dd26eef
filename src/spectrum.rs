//! Frequency-domain transforms
//!
//! Real-input FFT and band-limited peak detection over scalar signals.
//! The signal is zero-padded to the next power of two (algorithmic
//! efficiency, not correctness) and only the positive-frequency half of the
//! spectrum is returned, each bin paired with its frequency in Hz.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// One frequency-domain bin: magnitude at a frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumBin {
    pub frequency_hz: f64,
    pub magnitude: f64,
}

/// The strongest bin within a frequency band.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectralPeak {
    pub frequency_hz: f64,
    pub magnitude: f64,
    /// How much the peak stands out from the band mean (0-1)
    pub confidence: f64,
}

/// Compute the magnitude spectrum of a real signal.
///
/// Returns the first `padded_len / 2` bins (0 through just below Nyquist),
/// with frequency resolution `sampling_rate_hz / padded_len`. An empty
/// signal produces an empty spectrum, not an error.
pub fn fft_magnitudes(signal: &[f64], sampling_rate_hz: f64) -> Vec<SpectrumBin> {
    if signal.is_empty() {
        return Vec::new();
    }

    let padded_len = signal.len().next_power_of_two();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(padded_len);

    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    buffer.resize(padded_len, Complex::new(0.0, 0.0));

    fft.process(&mut buffer);

    let freq_resolution = sampling_rate_hz / padded_len as f64;
    buffer
        .iter()
        .take(padded_len / 2)
        .enumerate()
        .map(|(i, c)| SpectrumBin {
            frequency_hz: i as f64 * freq_resolution,
            magnitude: c.norm(),
        })
        .collect()
}

/// Find the strongest bin in `[f_min, f_max]`.
///
/// Returns the zero peak when the spectrum is empty or no bin falls inside
/// the band. Confidence is how far the peak magnitude stands above the band
/// mean, relative to the peak itself; a near-zero peak yields confidence 0
/// rather than dividing by a tiny number.
pub fn peak_in_range(spectrum: &[SpectrumBin], f_min: f64, f_max: f64) -> SpectralPeak {
    let band: Vec<&SpectrumBin> = spectrum
        .iter()
        .filter(|bin| bin.frequency_hz >= f_min && bin.frequency_hz <= f_max)
        .collect();

    if band.is_empty() {
        return SpectralPeak::default();
    }

    let peak = band.iter().copied().fold(band[0], |best, bin| {
        if bin.magnitude > best.magnitude {
            bin
        } else {
            best
        }
    });

    if peak.magnitude < 1e-12 {
        return SpectralPeak::default();
    }

    let mean = band.iter().map(|bin| bin.magnitude).sum::<f64>() / band.len() as f64;
    let confidence = ((peak.magnitude - mean) / peak.magnitude).clamp(0.0, 1.0);

    SpectralPeak {
        frequency_hz: peak.frequency_hz,
        magnitude: peak.magnitude,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency_hz: f64, sampling_rate_hz: f64, duration_secs: f64) -> Vec<f64> {
        let n = (sampling_rate_hz * duration_secs) as usize;
        (0..n)
            .map(|i| {
                (2.0 * std::f64::consts::PI * frequency_hz * i as f64 / sampling_rate_hz).sin()
            })
            .collect()
    }

    #[test]
    fn empty_signal_produces_empty_spectrum() {
        assert!(fft_magnitudes(&[], 15.0).is_empty());
    }

    #[test]
    fn spectrum_is_half_the_padded_length() {
        let signal = vec![1.0; 100]; // pads to 128
        let spectrum = fft_magnitudes(&signal, 15.0);
        assert_eq!(spectrum.len(), 64);
        assert_eq!(spectrum[0].frequency_hz, 0.0);
        let resolution = 15.0 / 128.0;
        assert!((spectrum[1].frequency_hz - resolution).abs() < 1e-12);
    }

    #[test]
    fn sine_peak_lands_within_one_bin_of_its_frequency() {
        let sampling_rate = 15.0;
        let target = 0.25;
        let signal = sine(target, sampling_rate, 60.0);
        let spectrum = fft_magnitudes(&signal, sampling_rate);
        let peak = peak_in_range(&spectrum, 0.1, 0.5);

        let padded_len = signal.len().next_power_of_two() as f64;
        let resolution = sampling_rate / padded_len;
        assert!((peak.frequency_hz - target).abs() <= resolution);
        assert!(peak.confidence > 0.5);
    }

    #[test]
    fn peak_outside_band_returns_zero_peak() {
        let signal = sine(2.0, 15.0, 10.0);
        let spectrum = fft_magnitudes(&signal, 15.0);
        // Band far above Nyquist contains no bins at all
        let peak = peak_in_range(&spectrum, 100.0, 200.0);
        assert_eq!(peak, SpectralPeak::default());
    }

    #[test]
    fn silent_signal_has_zero_confidence() {
        let spectrum = fft_magnitudes(&vec![0.0; 64], 15.0);
        let peak = peak_in_range(&spectrum, 0.1, 0.5);
        assert_eq!(peak.confidence, 0.0);
    }
}
