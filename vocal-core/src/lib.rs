// vocal-core/src/lib.rs

//! The core logic for real-time vocal pitch analysis.
//! This crate is responsible for pitch detection, loudness, the pitch
//! stability score and the threaded pipeline that delivers results to a
//! consumer. It is completely headless and contains no UI code; microphone
//! capture is available behind the `capture` feature.

pub mod analysis;
#[cfg(feature = "capture")]
pub mod audio;
pub mod dsp;
pub mod error;
pub mod fft;
pub mod pipeline;
pub mod pitch;
pub mod stability;
pub mod tuning;

use std::time::Duration;

pub use analysis::{AnalysisConfig, Analyzer, AudioBuffer, PublishThrottle};
pub use dsp::{calculate_dbfs, pitch_stability as calculate_pitch_stability, rms as calculate_rms, rms_to_dbfs};
pub use error::ConfigError;
pub use pipeline::{AnalysisPipeline, BufferSender, FrameConsumer, PushOutcome};
pub use pitch::{PitchConfig, PitchDetector, PitchEstimate, detect_pitch};

/// Snapshot of one analyzed buffer, as handed to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchFrame {
    /// Capture time of the analyzed buffer.
    pub timestamp: Duration,
    /// The detected fundamental in Hz.
    pub frequency: Option<f32>,
    /// Confidence of the detected frequency (0.0 to 1.0); 0.0 when absent.
    pub confidence: f32,
    /// RMS level of the buffer.
    pub rms: f32,
    /// Loudness in dBFS, within [-60, 0].
    pub loudness_dbfs: f32,
    /// Stability of the recent pitch history (0 to 100), once enough history exists.
    pub stability: Option<f32>,
}

impl PitchFrame {
    /// A frame with no signal at all.
    pub fn silent(timestamp: Duration) -> Self {
        Self {
            timestamp,
            frequency: None,
            confidence: 0.0,
            rms: 0.0,
            loudness_dbfs: dsp::DBFS_FLOOR,
            stability: None,
        }
    }

    /// Deviation of the detected pitch from `target_freq` in cents.
    pub fn cents_from(&self, target_freq: f32) -> Option<f32> {
        self.frequency.map(|freq| tuning::cents_offset(freq, target_freq))
    }
}
