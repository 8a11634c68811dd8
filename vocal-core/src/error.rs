//! Error types for the analysis core.
//!
//! Only caller mistakes are errors. Silence, noise and out-of-range pitch are
//! ordinary analysis outcomes and show up as an absent frequency instead.

use thiserror::Error;

/// Configuration or precondition errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Sample rate that is zero, negative or not finite
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f32),

    /// Frequency band that is empty, inverted or not positive
    #[error("Invalid frequency range: {min} - {max} Hz")]
    InvalidFrequencyRange { min: f32, max: f32 },

    /// Detection threshold outside (0, 1]
    #[error("Invalid detection threshold: {0}")]
    InvalidThreshold(f32),

    /// Confidence gate outside [0, 1]
    #[error("Invalid confidence gate: {0}")]
    InvalidConfidence(f32),

    /// Stability window that cannot hold enough entries
    #[error("Invalid stability window: capacity {capacity}, minimum entries {min_entries}")]
    InvalidWindow { capacity: usize, min_entries: usize },

    /// Publish rate that is zero, negative or not finite
    #[error("Invalid publish rate: {0} Hz")]
    InvalidPublishRate(f32),

    /// Buffer queue without room for a single buffer
    #[error("Buffer queue capacity must be at least 1")]
    InvalidQueueCapacity,
}

/// Result type for configuration checks
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Rejects sample rates the estimator cannot divide by.
pub(crate) fn check_sample_rate(sample_rate: f32) -> Result<()> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidSampleRate(sample_rate))
    }
}
