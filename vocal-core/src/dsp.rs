//! # DSP Primitives Module
//!
//! Stateless numeric building blocks shared by the pitch estimator and the
//! analysis pipeline. Every function is a pure function of its input slice,
//! runs in bounded time and never blocks, so all of them are safe to call
//! from a real-time thread.
//!
//! ## Features
//! - RMS level and dBFS loudness
//! - Hann windowing and DC offset removal
//! - Brute-force autocorrelation and YIN difference functions
//! - Parabolic sub-sample interpolation and peak picking
//! - Zero-crossing rate and block-average downsampling
//! - Stability scoring of a short pitch history in cents

use std::f32::consts::PI;

/// Loudness floor in dBFS. Anything quieter reads as this value.
pub const DBFS_FLOOR: f32 = -60.0;

/// Reference pitch used when expressing frequencies in cents.
pub const CENTS_REFERENCE_HZ: f32 = 440.0;

/// Calculates the root-mean-square level of a signal.
///
/// Returns `0.0` for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_of_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_of_squares / samples.len() as f32).sqrt()
}

/// Converts an RMS level to decibels relative to full scale.
///
/// The result is clamped to `[-60, 0]`. A level of zero (or below) has no
/// finite logarithm and reads as the -60 dBFS floor.
///
/// # Arguments
/// * `rms` - Linear RMS level, where 1.0 is full scale
///
/// # Returns
/// * Loudness in dBFS within `[DBFS_FLOOR, 0.0]`
pub fn rms_to_dbfs(rms: f32) -> f32 {
    if rms.is_nan() || rms <= 0.0 {
        return DBFS_FLOOR;
    }
    (20.0 * rms.log10()).clamp(DBFS_FLOOR, 0.0)
}

/// Loudness of a buffer in dBFS, see [`rms_to_dbfs`].
pub fn calculate_dbfs(samples: &[f32]) -> f32 {
    rms_to_dbfs(rms(samples))
}

/// Returns a copy of the signal multiplied by a length-matched Hann window.
///
/// Buffers of zero or one sample are returned unchanged.
pub fn hann_window(samples: &[f32]) -> Vec<f32> {
    let n = samples.len();
    if n < 2 {
        return samples.to_vec();
    }
    let n_minus_1 = (n - 1) as f32;
    samples
        .iter()
        .enumerate()
        .map(|(i, &s)| s * 0.5 * (1.0 - (2.0 * PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Removes the DC offset from a signal by making its average value zero.
pub fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Number of leading samples compared at every lag, or `None` when the
/// buffer cannot hold `max_lag` lags plus a non-empty comparison window.
fn comparison_window(len: usize, max_lag: usize) -> Option<usize> {
    if max_lag == 0 || max_lag >= len {
        None
    } else {
        Some(len - max_lag)
    }
}

/// Computes the autocorrelation `r(τ) = Σ x[i]·x[i+τ]` for `τ` in
/// `[0, max_lag)`.
///
/// Every lag sums over the same window of `len - max_lag` leading samples,
/// so values at different lags are directly comparable. Returns an empty
/// vector when `max_lag` is zero or not smaller than the buffer.
pub fn autocorrelation(samples: &[f32], max_lag: usize) -> Vec<f32> {
    let Some(window) = comparison_window(samples.len(), max_lag) else {
        return Vec::new();
    };
    (0..max_lag)
        .map(|tau| {
            samples[..window]
                .iter()
                .zip(&samples[tau..tau + window])
                .map(|(&a, &b)| a * b)
                .sum()
        })
        .collect()
}

/// Computes the YIN difference function for `τ` in `[0, max_lag)`.
///
/// `d(τ)` is the sum of squared differences between the signal and itself
/// shifted by `τ`, taken over the first `len - max_lag` samples so every lag
/// uses a window of the same length. The cost is `O(max_lag · window)`; see
/// [`crate::fft::difference_function_fft`] for the accelerated equivalent.
///
/// # Arguments
/// * `samples` - Input audio signal
/// * `max_lag` - Number of lags to evaluate
///
/// # Returns
/// * `Vec<f32>` of length `max_lag`, or an empty vector when the buffer is
///   too short for the requested lag range
pub fn difference_function(samples: &[f32], max_lag: usize) -> Vec<f32> {
    let Some(window) = comparison_window(samples.len(), max_lag) else {
        return Vec::new();
    };
    (0..max_lag)
        .map(|tau| {
            samples[..window]
                .iter()
                .zip(&samples[tau..tau + window])
                .map(|(&a, &b)| {
                    let delta = a - b;
                    delta * delta
                })
                .sum()
        })
        .collect()
}

/// Normalizes a difference function by its cumulative mean (the CMNDF).
///
/// `d'(0) = 1` and for `τ ≥ 1`, `d'(τ) = d(τ)·τ / Σ_{j=1..τ} d(j)`. While the
/// running sum is not positive the value is pinned to 1, which is what an
/// all-zero (silent) buffer produces at every lag.
pub fn cumulative_mean_normalized_difference(difference: &[f32]) -> Vec<f32> {
    let mut normalized = Vec::with_capacity(difference.len());
    let mut running_sum = 0.0f32;
    for (tau, &d) in difference.iter().enumerate() {
        if tau == 0 {
            normalized.push(1.0);
            continue;
        }
        running_sum += d;
        if running_sum > 0.0 {
            normalized.push(d * tau as f32 / running_sum);
        } else {
            normalized.push(1.0);
        }
    }
    normalized
}

/// Offset of the vertex of the parabola through three equally spaced points,
/// relative to the middle point.
///
/// Returns `0.0` when the points are collinear (flat curvature).
pub fn parabolic_interpolate(y0: f32, y1: f32, y2: f32) -> f32 {
    let curvature = y0 - 2.0 * y1 + y2;
    if curvature.abs() <= f32::EPSILON {
        return 0.0;
    }
    0.5 * (y0 - y2) / curvature
}

/// Finds the indices of strict local maxima whose value is at least
/// `min_height`. The first and last elements are never reported.
pub fn find_peaks(values: &[f32], min_height: f32) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }
    values
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] >= min_height && w[1] > w[0] && w[1] > w[2])
        .map(|(i, _)| i + 1)
        .collect()
}

/// Fraction of adjacent sample pairs whose signs differ.
///
/// Zero counts as non-negative. Returns `0.0` for fewer than two samples.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() <= 1 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

/// Decimates a signal by averaging consecutive blocks of `factor` samples.
///
/// A trailing partial block is averaged over the samples it has. A factor of
/// zero or one returns the signal unchanged.
pub fn downsample(samples: &[f32], factor: usize) -> Vec<f32> {
    if factor <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(factor)
        .map(|block| block.iter().sum::<f32>() / block.len() as f32)
        .collect()
}

/// Converts a frequency to its distance from A4 (440 Hz) in cents.
pub fn frequency_to_cents(frequency: f32) -> f32 {
    1200.0 * (frequency / CENTS_REFERENCE_HZ).log2()
}

/// Scores how steady a short pitch history is, from 0 (unstable) to 100.
///
/// The frequencies are converted to cents, and their population standard
/// deviation `σ` maps to `clamp(100 - 2σ, 0, 100)`. Because the score only
/// depends on the spread in cents, transposing the whole history leaves it
/// unchanged. Entries that are not positive and finite are skipped.
///
/// # Returns
/// * `0.0` when fewer than two usable frequencies are given
pub fn pitch_stability(frequencies: &[f32]) -> f32 {
    stability_score(frequencies.iter().copied())
}

/// Single-pass form of [`pitch_stability`] for any sequence of frequencies.
pub fn stability_score(frequencies: impl IntoIterator<Item = f32>) -> f32 {
    // Welford's running mean and sum of squared deviations.
    let mut count = 0u32;
    let mut mean = 0.0f32;
    let mut m2 = 0.0f32;
    for cents in frequencies
        .into_iter()
        .filter(|f| f.is_finite() && *f > 0.0)
        .map(frequency_to_cents)
    {
        count += 1;
        let delta = cents - mean;
        mean += delta / count as f32;
        m2 += delta * (cents - mean);
    }
    if count < 2 {
        return 0.0;
    }
    let std_dev = (m2 / count as f32).max(0.0).sqrt();
    (100.0 - 2.0 * std_dev).clamp(0.0, 100.0)
}

/// Period in (fractional) samples of a frequency.
pub fn frequency_to_lag(frequency: f32, sample_rate: f32) -> f32 {
    sample_rate / frequency
}

/// Frequency whose period is `lag` samples.
pub fn lag_to_frequency(lag: f32, sample_rate: f32) -> f32 {
    sample_rate / lag
}
