//! # Analysis Module
//!
//! Per-buffer analysis and publish throttling. Everything here runs on the
//! single analysis worker (see [`crate::pipeline`]), and it can also be driven
//! synchronously, which is how the tests use it.
//!
//! ## Buffer lifecycle
//! `captured → analyzed → published | dropped`. Every buffer is analyzed and
//! updates the stability window; the [`PublishThrottle`] then decides whether
//! the resulting frame reaches the consumer.

use std::time::Duration;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::{self, ConfigError};
use crate::pitch::{PitchConfig, PitchDetector};
use crate::stability::StabilityWindow;
use crate::{PitchFrame, dsp};

/// Settings for the analysis stage and the worker around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Estimator settings.
    pub pitch: PitchConfig,
    /// Number of accepted frequencies kept for the stability score.
    pub window_capacity: usize,
    /// Minimum confidence for a frequency to enter the stability window.
    pub min_confidence: f32,
    /// Entries needed before a stability score is reported.
    pub min_stability_entries: usize,
    /// Maximum consumer update rate in Hz.
    pub publish_rate_hz: f32,
    /// Capture buffers held between the capture callback and the worker.
    pub queue_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pitch: PitchConfig::default(),
            window_capacity: 30,
            min_confidence: 0.6,
            min_stability_entries: 10,
            publish_rate_hz: 30.0,
            queue_capacity: 4,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> error::Result<()> {
        self.pitch.validate()?;
        if self.window_capacity == 0
            || self.min_stability_entries < 2
            || self.min_stability_entries > self.window_capacity
        {
            return Err(ConfigError::InvalidWindow {
                capacity: self.window_capacity,
                min_entries: self.min_stability_entries,
            });
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidConfidence(self.min_confidence));
        }
        // The interval must also fit in a `Duration`.
        if !(self.publish_rate_hz.is_finite() && self.publish_rate_hz > 0.0)
            || Duration::try_from_secs_f32(1.0 / self.publish_rate_hz).is_err()
        {
            return Err(ConfigError::InvalidPublishRate(self.publish_rate_hz));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        Ok(())
    }

    /// Minimum time between two deliveries to the consumer.
    pub fn publish_interval(&self) -> Duration {
        Duration::try_from_secs_f32(1.0 / self.publish_rate_hz).unwrap_or(Duration::MAX)
    }
}

/// One captured buffer of mono samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: f32,
    timestamp: Duration,
}

impl AudioBuffer {
    /// Wraps captured samples, rejecting an unusable sample rate.
    ///
    /// # Arguments
    /// * `samples` - Mono samples, ownership moves into the buffer
    /// * `sample_rate` - Sample rate in Hz
    /// * `timestamp` - Capture time relative to the start of the session
    pub fn new(samples: Vec<f32>, sample_rate: f32, timestamp: Duration) -> error::Result<Self> {
        error::check_sample_rate(sample_rate)?;
        Ok(Self {
            samples,
            sample_rate,
            timestamp,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }
}

/// Turns buffers into [`PitchFrame`]s and maintains the stability window.
#[derive(Debug, Clone)]
pub struct Analyzer {
    detector: PitchDetector,
    window: StabilityWindow,
    min_confidence: f32,
    min_stability_entries: usize,
}

impl Analyzer {
    pub fn new(config: &AnalysisConfig) -> error::Result<Self> {
        config.validate()?;
        Ok(Self {
            detector: PitchDetector::new(config.pitch.clone())?,
            window: StabilityWindow::new(config.window_capacity),
            min_confidence: config.min_confidence,
            min_stability_entries: config.min_stability_entries,
        })
    }

    /// Analyzes one buffer.
    ///
    /// A frequency detected with at least the configured confidence is added
    /// to the stability window; anything else leaves the window untouched.
    /// The frame carries a stability score once the window holds enough
    /// entries.
    ///
    /// # Returns
    /// * `Ok(frame)` - The analyzed frame
    /// * `Err(ConfigError::InvalidSampleRate)` - The sample rate is unusable;
    ///   the window is not modified
    pub fn process_buffer(
        &mut self,
        samples: &[f32],
        sample_rate: f32,
        timestamp: Duration,
    ) -> error::Result<PitchFrame> {
        let estimate = self.detector.detect(samples, sample_rate)?;
        let rms = dsp::rms(samples);

        if let Some(frequency) = estimate.frequency {
            if estimate.confidence >= self.min_confidence {
                self.window.push(frequency);
            }
        }

        let stability = (self.window.len() >= self.min_stability_entries)
            .then(|| self.window.stability());

        let frame = PitchFrame {
            timestamp,
            frequency: estimate.frequency,
            confidence: if estimate.frequency.is_some() {
                estimate.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            rms,
            loudness_dbfs: dsp::rms_to_dbfs(rms),
            stability,
        };
        trace!(target: "vocal_core::analysis", "analyzed {:?}", frame);
        Ok(frame)
    }

    /// [`Analyzer::process_buffer`] for an owned capture buffer.
    pub fn process(&mut self, buffer: &AudioBuffer) -> error::Result<PitchFrame> {
        self.process_buffer(buffer.samples(), buffer.sample_rate(), buffer.timestamp())
    }

    pub fn window(&self) -> &StabilityWindow {
        &self.window
    }

    /// Forgets the pitch history.
    pub fn reset(&mut self) {
        self.window.clear();
    }
}

/// Limits deliveries to one per interval.
///
/// A frame offered before the interval has elapsed since the last delivery
/// is held back. Only the newest held frame is kept, and it goes out as soon
/// as a later [`offer`](Self::offer) or [`poll`](Self::poll) finds the
/// interval elapsed. Times are measured from an arbitrary session epoch.
#[derive(Debug, Clone)]
pub struct PublishThrottle {
    interval: Duration,
    last_publish: Option<Duration>,
    pending: Option<PitchFrame>,
}

impl PublishThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_publish: None,
            pending: None,
        }
    }

    /// Marks `now` as a delivery time without delivering anything, so the
    /// first frame waits a full interval.
    pub fn started_at(interval: Duration, now: Duration) -> Self {
        Self {
            interval,
            last_publish: Some(now),
            pending: None,
        }
    }

    /// Offers a freshly analyzed frame. It replaces any frame still held.
    ///
    /// # Returns
    /// * `Some(frame)` - The frame to deliver now
    /// * `None` - Too soon; the frame is held until the interval elapses
    pub fn offer(&mut self, frame: PitchFrame, now: Duration) -> Option<PitchFrame> {
        self.pending = Some(frame);
        self.poll(now)
    }

    /// Releases the held frame if the interval has elapsed.
    pub fn poll(&mut self, now: Duration) -> Option<PitchFrame> {
        if self.pending.is_none() || !self.is_due(now) {
            return None;
        }
        self.last_publish = Some(now);
        self.pending.take()
    }

    /// Time at which a held frame becomes deliverable, if one is held.
    pub fn deadline(&self) -> Option<Duration> {
        self.pending.as_ref()?;
        Some(match self.last_publish {
            Some(last) => last.saturating_add(self.interval),
            None => Duration::ZERO,
        })
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops the held frame without delivering it.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    fn is_due(&self, now: Duration) -> bool {
        match self.last_publish {
            Some(last) => now.saturating_sub(last) >= self.interval,
            None => true,
        }
    }
}
