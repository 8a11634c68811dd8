//! # Fast Fourier Transform (FFT) Module
//!
//! FFT-accelerated version of the YIN difference function, built on RustFFT.
//! The brute-force [`crate::dsp::difference_function`] costs
//! `O(max_lag · window)`; this version splits the squared difference into
//! two energy terms and one cross-correlation term and computes the
//! correlation in the frequency domain.
//!
//! Work is done in `f64` so the result matches the brute-force output closely
//! even near the deep minima that pitch detection depends on.

use rustfft::{FftPlanner, num_complex::Complex};

/// Computes the YIN difference function using FFT cross-correlation.
///
/// Produces the same values as [`crate::dsp::difference_function`] (within
/// floating point tolerance), using
/// `d(τ) = Σ x[i]² + Σ x[i+τ]² - 2 Σ x[i]·x[i+τ]` over the first
/// `len - max_lag` samples.
///
/// # Arguments
/// * `samples` - Input audio signal
/// * `max_lag` - Number of lags to evaluate
///
/// # Returns
/// * `Vec<f32>` of length `max_lag`, or an empty vector when the buffer is
///   too short for the requested lag range
pub fn difference_function_fft(samples: &[f32], max_lag: usize) -> Vec<f32> {
    let len = samples.len();
    if max_lag == 0 || max_lag >= len {
        return Vec::new();
    }
    let window = len - max_lag;

    // Linear correlation for lags < max_lag never wraps once both inputs are
    // zero padded to at least `len`.
    let fft_size = len.next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_size);
    let inverse = planner.plan_fft_inverse(fft_size);

    let mut signal: Vec<Complex<f64>> = samples
        .iter()
        .map(|&s| Complex::new(s as f64, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(fft_size)
        .collect();
    let mut head: Vec<Complex<f64>> = samples[..window]
        .iter()
        .map(|&s| Complex::new(s as f64, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(fft_size)
        .collect();

    forward.process(&mut signal);
    forward.process(&mut head);

    // Cross spectrum; the inverse transform yields Σ head[i]·signal[i+τ].
    for (s, h) in signal.iter_mut().zip(&head) {
        *s *= h.conj();
    }
    inverse.process(&mut signal);
    let scale = 1.0 / fft_size as f64;

    // prefix[k] = Σ_{i<k} x[i]²
    let mut prefix = Vec::with_capacity(len + 1);
    prefix.push(0.0f64);
    for &s in samples {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + (s as f64) * (s as f64));
    }
    let head_energy = prefix[window];

    (0..max_lag)
        .map(|tau| {
            if tau == 0 {
                return 0.0;
            }
            let shifted_energy = prefix[tau + window] - prefix[tau];
            let cross = signal[tau].re * scale;
            (head_energy + shifted_energy - 2.0 * cross).max(0.0) as f32
        })
        .collect()
}
