//! Accuracy and robustness of the pitch estimator and the analysis stage on
//! synthetic voice-range signals.

use std::time::Duration;

use approx::assert_abs_diff_eq;
use vocal_core::dsp::{frequency_to_lag, lag_to_frequency};
use vocal_core::{
    AnalysisConfig, Analyzer, PitchEstimate, calculate_pitch_stability, detect_pitch, rms_to_dbfs,
};

const SAMPLE_RATE: f32 = 44100.0;

/// `len` samples of a sum of sines starting at sample `start`.
fn partials(fundamental: f32, weights: &[f32], start: usize, len: usize) -> Vec<f32> {
    (start..start + len)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            let value: f64 = weights
                .iter()
                .enumerate()
                .map(|(k, &w)| {
                    let f = fundamental as f64 * (k + 1) as f64;
                    w as f64 * (2.0 * std::f64::consts::PI * f * t).sin()
                })
                .sum();
            (0.4 * value) as f32
        })
        .collect()
}

fn sine(frequency: f32, start: usize, len: usize) -> Vec<f32> {
    partials(frequency, &[1.0], start, len)
}

fn cents_between(a: f32, b: f32) -> f32 {
    (1200.0 * (a / b).log2()).abs()
}

#[test]
fn sine_within_ten_cents_across_vocal_range() {
    // 80 ms at 44.1 kHz
    let len = 3528;
    for frequency in [100.0, 123.47, 146.83, 196.0, 261.63, 329.63, 392.0, 440.0, 493.88, 500.0] {
        let estimate = detect_pitch(&sine(frequency, 0, len), SAMPLE_RATE).unwrap();
        let detected = estimate
            .frequency
            .unwrap_or_else(|| panic!("no pitch for {} Hz", frequency));
        assert!(
            cents_between(detected, frequency) < 10.0,
            "{} Hz detected as {} Hz",
            frequency,
            detected
        );
        assert!(estimate.confidence > 0.8, "confidence {} at {} Hz", estimate.confidence, frequency);
    }
}

#[test]
fn silence_is_not_voiced() {
    for len in [2048, 4096, 8192] {
        let estimate = detect_pitch(&vec![0.0; len], SAMPLE_RATE).unwrap();
        assert!(estimate.frequency.is_none() || estimate.confidence < 0.3);
    }
}

#[test]
fn short_buffers_do_not_crash() {
    // Anything shorter than 2 * 44100 / 80 samples cannot cover the lowest lag.
    for len in [0, 1, 2, 64, 147, 500, 1000, 1102] {
        let estimate = detect_pitch(&sine(220.0, 0, len), SAMPLE_RATE).unwrap();
        if let Some(frequency) = estimate.frequency {
            assert!((80.0..=600.0).contains(&frequency));
        }
    }
    assert_eq!(detect_pitch(&[0.3], SAMPLE_RATE).unwrap(), PitchEstimate::ABSENT);
}

#[test]
fn harmonic_rich_c3_within_25_cents() {
    let c3 = 130.81;
    let signal = partials(c3, &[1.0, 0.5, 0.3, 0.15], 0, 4096);
    let detected = detect_pitch(&signal, SAMPLE_RATE)
        .unwrap()
        .frequency
        .expect("C3 should be detected");
    assert!(cents_between(detected, c3) < 25.0, "C3 detected as {} Hz", detected);
}

#[test]
fn stability_edge_cases() {
    assert_eq!(calculate_pitch_stability(&[]), 0.0);
    assert_eq!(calculate_pitch_stability(&[220.0]), 0.0);
    assert_abs_diff_eq!(calculate_pitch_stability(&[196.0; 30]), 100.0, epsilon = 1e-3);

    let wobbly = [196.0, 197.5, 195.2, 196.8, 194.9];
    let transposed: Vec<f32> = wobbly.iter().map(|f| f * 1.5).collect();
    assert_abs_diff_eq!(
        calculate_pitch_stability(&wobbly),
        calculate_pitch_stability(&transposed),
        epsilon = 1e-2
    );
}

#[test]
fn loudness_floor_and_monotonicity() {
    assert_eq!(rms_to_dbfs(0.0), -60.0);
    let levels = [1e-4, 1e-3, 0.01, 0.05, 0.1, 0.5, 0.9, 1.0];
    for pair in levels.windows(2) {
        assert!(rms_to_dbfs(pair[0]) <= rms_to_dbfs(pair[1]));
    }
}

#[test]
fn lag_round_trip_over_band() {
    let mut frequency = 80.0f32;
    while frequency <= 600.0 {
        let lag = frequency_to_lag(frequency, SAMPLE_RATE);
        let back = lag_to_frequency(lag, SAMPLE_RATE);
        assert!((back - frequency).abs() / frequency < 1e-5);
        frequency *= 1.05;
    }
}

#[test]
fn sustained_a4_becomes_stable() {
    let mut analyzer = Analyzer::new(&AnalysisConfig::default()).unwrap();
    let chunk = 2048;
    let capture_interval = Duration::from_secs_f64(1.0 / 30.0);

    let mut last = None;
    for i in 0..12 {
        let samples = sine(440.0, i * chunk, chunk);
        let frame = analyzer
            .process_buffer(&samples, SAMPLE_RATE, capture_interval * i as u32)
            .unwrap();
        last = Some(frame);
    }

    let frame = last.unwrap();
    assert!(frame.stability.unwrap() > 90.0);
    let frequency = frame.frequency.unwrap();
    assert!(cents_between(frequency, 440.0) < 10.0);
    assert!(frame.cents_from(440.0).unwrap().abs() < 10.0);
    assert!(frame.loudness_dbfs > -20.0 && frame.loudness_dbfs < 0.0);
}
