//! # Pitch Detection Module
//!
//! A YIN pitch estimator tuned for the singing and speaking voice.
//!
//! ## Features
//! - Difference function and cumulative mean normalization (CMNDF)
//! - First-dip search with a local-minimum refinement to avoid octave errors
//! - Global-minimum fallback for weakly periodic frames
//! - Parabolic interpolation for sub-sample accuracy
//! - Range check on the final estimate
//!
//! A [`PitchDetector`] holds nothing but its validated configuration, so one
//! instance can be shared freely and every call is independent. Smoothing
//! over time is left to [`crate::analysis`].

use serde::{Deserialize, Serialize};

use crate::dsp;
use crate::error::{self, ConfigError};
use crate::fft;

/// Lowest CMNDF value the global-minimum fallback accepts (exclusive).
const FALLBACK_ACCEPTANCE: f32 = 0.5;

/// Settings for the YIN estimator.
///
/// The defaults cover the vocal range from a low male voice (80 Hz) to a
/// high soprano (600 Hz).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Lowest frequency reported, in Hz.
    pub min_frequency: f32,
    /// Highest frequency reported, in Hz.
    pub max_frequency: f32,
    /// CMNDF value a lag must drop below to count as the first dip.
    pub threshold: f32,
    /// Maximum number of lags to follow the dip downwards after the
    /// threshold crossing. `None` follows it all the way to the local minimum.
    pub local_minimum_lookahead: Option<usize>,
    /// Compute the difference function with FFT cross-correlation instead of
    /// the direct sum.
    pub fft_difference: bool,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            min_frequency: 80.0,
            max_frequency: 600.0,
            threshold: 0.15,
            local_minimum_lookahead: None,
            fft_difference: false,
        }
    }
}

impl PitchConfig {
    /// Checks the band and threshold.
    pub fn validate(&self) -> error::Result<()> {
        let (min, max) = (self.min_frequency, self.max_frequency);
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min < max) {
            return Err(ConfigError::InvalidFrequencyRange { min, max });
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

/// Result of a single detection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitchEstimate {
    /// Detected fundamental in Hz, `None` when no reliable periodicity was found.
    pub frequency: Option<f32>,
    /// Strength of the periodicity, from 0 to 1.
    pub confidence: f32,
}

impl PitchEstimate {
    /// The "nothing detected" estimate.
    pub const ABSENT: PitchEstimate = PitchEstimate {
        frequency: None,
        confidence: 0.0,
    };

    /// Whether a frequency was detected.
    pub fn is_voiced(&self) -> bool {
        self.frequency.is_some()
    }
}

/// YIN pitch detector with fixed configuration.
#[derive(Debug, Clone)]
pub struct PitchDetector {
    config: PitchConfig,
}

impl Default for PitchDetector {
    fn default() -> Self {
        Self {
            config: PitchConfig::default(),
        }
    }
}

impl PitchDetector {
    /// Creates a detector, rejecting inconsistent settings.
    pub fn new(config: PitchConfig) -> error::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PitchConfig {
        &self.config
    }

    /// Estimates the fundamental frequency of one buffer.
    ///
    /// # Arguments
    /// * `signal` - Mono audio samples
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Ok(estimate)` - Detection result; silence, noise, too-short buffers
    ///   and out-of-range pitch all give [`PitchEstimate::ABSENT`]
    /// * `Err(ConfigError::InvalidSampleRate)` - The sample rate is not a
    ///   positive finite number
    pub fn detect(&self, signal: &[f32], sample_rate: f32) -> error::Result<PitchEstimate> {
        error::check_sample_rate(sample_rate)?;
        let config = &self.config;

        // --- Step 1: Lag range for the configured band ---
        let min_lag = (sample_rate / config.max_frequency).round() as usize;
        let max_lag = (signal.len() / 2).min((sample_rate / config.min_frequency).round() as usize);
        if max_lag <= min_lag {
            return Ok(PitchEstimate::ABSENT);
        }

        // --- Step 2: Difference function and its normalized form ---
        let difference = if config.fft_difference {
            fft::difference_function_fft(signal, max_lag)
        } else {
            dsp::difference_function(signal, max_lag)
        };
        let yin_buffer = dsp::cumulative_mean_normalized_difference(&difference);

        // --- Step 3: First dip below the threshold, else the global minimum ---
        let Some(tau) = self.choose_lag(&yin_buffer, min_lag) else {
            return Ok(PitchEstimate::ABSENT);
        };

        // --- Step 4: Parabolic interpolation for better precision ---
        let last = yin_buffer.len() - 1;
        let refined_lag = if tau == 0 || tau >= last {
            tau as f32
        } else {
            tau as f32
                + dsp::parabolic_interpolate(yin_buffer[tau - 1], yin_buffer[tau], yin_buffer[tau + 1])
        };

        // --- Step 5 & 6: Convert and range check ---
        let frequency = dsp::lag_to_frequency(refined_lag, sample_rate);
        if !frequency.is_finite()
            || frequency < config.min_frequency
            || frequency > config.max_frequency
        {
            return Ok(PitchEstimate::ABSENT);
        }

        Ok(PitchEstimate {
            frequency: Some(frequency),
            confidence: 1.0 - yin_buffer[tau].min(1.0),
        })
    }

    /// Picks the period lag from the CMNDF, searching `min_lag..len`.
    fn choose_lag(&self, yin_buffer: &[f32], min_lag: usize) -> Option<usize> {
        let len = yin_buffer.len();

        if let Some(first_dip) = (min_lag..len).find(|&tau| yin_buffer[tau] < self.config.threshold) {
            // Follow the dip down to its local minimum.
            let limit = match self.config.local_minimum_lookahead {
                Some(steps) => (first_dip + steps).min(len - 1),
                None => len - 1,
            };
            let mut tau = first_dip;
            while tau < limit && yin_buffer[tau + 1] < yin_buffer[tau] {
                tau += 1;
            }
            return Some(tau);
        }

        // No clear dip: accept the deepest point only if it is still fairly periodic.
        let (tau, &value) = yin_buffer
            .iter()
            .enumerate()
            .skip(min_lag)
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        (value < FALLBACK_ACCEPTANCE).then_some(tau)
    }
}

/// Detects pitch with the default vocal configuration.
///
/// See [`PitchDetector::detect`].
pub fn detect_pitch(signal: &[f32], sample_rate: f32) -> error::Result<PitchEstimate> {
    PitchDetector::default().detect(signal, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE_RATE: f32 = 44100.0;

    fn sine(frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f64 / SAMPLE_RATE as f64;
                (0.5 * (2.0 * std::f64::consts::PI * frequency as f64 * t).sin()) as f32
            })
            .collect()
    }

    fn cents_between(a: f32, b: f32) -> f32 {
        (1200.0 * (a / b).log2()).abs()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(PitchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_band() {
        let config = PitchConfig {
            min_frequency: 600.0,
            max_frequency: 80.0,
            ..PitchConfig::default()
        };
        assert_eq!(
            PitchDetector::new(config).unwrap_err(),
            ConfigError::InvalidFrequencyRange { min: 600.0, max: 80.0 }
        );
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let config = PitchConfig {
            threshold: 0.0,
            ..PitchConfig::default()
        };
        assert!(matches!(
            PitchDetector::new(config),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        let signal = sine(220.0, 2048);
        assert_eq!(detect_pitch(&signal, 0.0), Err(ConfigError::InvalidSampleRate(0.0)));
        assert!(detect_pitch(&signal, -44100.0).is_err());
        assert!(detect_pitch(&signal, f32::NAN).is_err());
    }

    #[test]
    fn test_detects_sine() {
        let estimate = detect_pitch(&sine(220.0, 2048), SAMPLE_RATE).unwrap();
        let frequency = estimate.frequency.expect("220 Hz should be detected");
        assert!(cents_between(frequency, 220.0) < 10.0, "got {} Hz", frequency);
        assert!(estimate.confidence > 0.8);
    }

    #[test]
    fn test_fft_difference_agrees() {
        let config = PitchConfig {
            fft_difference: true,
            ..PitchConfig::default()
        };
        let detector = PitchDetector::new(config).unwrap();
        let signal = sine(311.13, 2048);
        let fast = detector.detect(&signal, SAMPLE_RATE).unwrap();
        let direct = detect_pitch(&signal, SAMPLE_RATE).unwrap();
        assert_relative_eq!(
            fast.frequency.unwrap(),
            direct.frequency.unwrap(),
            max_relative = 1e-3
        );
    }

    #[test]
    fn test_silence_is_absent() {
        let estimate = detect_pitch(&[0.0; 2048], SAMPLE_RATE).unwrap();
        assert_eq!(estimate, PitchEstimate::ABSENT);
        assert!(!estimate.is_voiced());
    }

    #[test]
    fn test_short_buffer_is_absent() {
        assert_eq!(detect_pitch(&[], SAMPLE_RATE).unwrap(), PitchEstimate::ABSENT);
        assert_eq!(detect_pitch(&sine(440.0, 100), SAMPLE_RATE).unwrap(), PitchEstimate::ABSENT);
    }

    #[test]
    fn test_out_of_band_is_absent() {
        // 1 kHz sits above the band; its period is shorter than the minimum lag.
        let estimate = detect_pitch(&sine(1000.0, 2048), SAMPLE_RATE).unwrap();
        if let Some(frequency) = estimate.frequency {
            assert!((80.0..=600.0).contains(&frequency));
        }
    }

    #[test]
    fn test_lookahead_cap() {
        // A one-lag cap stops on the slope of the dip, so the estimate is
        // still reported but less exact than the uncapped search.
        let capped = PitchDetector::new(PitchConfig {
            local_minimum_lookahead: Some(1),
            ..PitchConfig::default()
        })
        .unwrap();
        let signal = sine(110.0, 2048);
        let capped_estimate = capped.detect(&signal, SAMPLE_RATE).unwrap();
        let uncapped_estimate = detect_pitch(&signal, SAMPLE_RATE).unwrap();

        let capped_error = cents_between(capped_estimate.frequency.unwrap(), 110.0);
        let uncapped_error = cents_between(uncapped_estimate.frequency.unwrap(), 110.0);
        assert!(uncapped_error < 1.0);
        assert!(capped_error >= uncapped_error);
        assert!(capped_estimate.confidence <= uncapped_estimate.confidence);
    }
}
