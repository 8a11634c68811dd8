//! Threaded pipeline behavior: delivery, publish rate and shutdown.

use std::thread;
use std::time::{Duration, Instant};

use vocal_core::analysis::PublishThrottle;
use vocal_core::{AnalysisConfig, AnalysisPipeline, AudioBuffer, PitchFrame, PushOutcome};

const SAMPLE_RATE: f32 = 44100.0;
const CHUNK: usize = 2048;

fn sine_chunk(frequency: f32, index: usize) -> AudioBuffer {
    let start = index * CHUNK;
    let samples = (start..start + CHUNK)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            (0.5 * (2.0 * std::f64::consts::PI * frequency as f64 * t).sin()) as f32
        })
        .collect();
    let timestamp = Duration::from_secs_f64(start as f64 / SAMPLE_RATE as f64);
    AudioBuffer::new(samples, SAMPLE_RATE, timestamp).unwrap()
}

#[test]
fn sustained_tone_reaches_consumer_with_stability() {
    let config = AnalysisConfig {
        queue_capacity: 16,
        ..AnalysisConfig::default()
    };
    let (tx, rx) = crossbeam_channel::unbounded::<PitchFrame>();
    let pipeline = AnalysisPipeline::spawn(config, tx).unwrap();
    let sender = pipeline.sender();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut index = 0;
    let mut stable = None;
    while Instant::now() < deadline && stable.is_none() {
        sender.push(sine_chunk(392.0, index));
        index += 1;
        thread::sleep(Duration::from_millis(10));
        stable = rx
            .try_iter()
            .find(|frame| frame.stability.is_some_and(|s| s > 90.0));
    }

    let frame = stable.expect("no stable frame delivered");
    let frequency = frame.frequency.unwrap();
    assert!((1200.0 * (frequency / 392.0).log2()).abs() < 10.0);

    pipeline.stop();
    assert_eq!(sender.push(sine_chunk(392.0, index)), PushOutcome::Closed);
}

#[test]
fn deliveries_respect_publish_interval() {
    let config = AnalysisConfig {
        queue_capacity: 64,
        ..AnalysisConfig::default()
    };
    let (tx, rx) = crossbeam_channel::unbounded::<Instant>();
    let consumer = move |_: PitchFrame| {
        let _ = tx.send(Instant::now());
    };
    let pipeline = AnalysisPipeline::spawn(config, consumer).unwrap();
    let sender = pipeline.sender();

    // Much faster than 30 Hz.
    for index in 0..40 {
        sender.push(sine_chunk(220.0, index));
        thread::sleep(Duration::from_millis(2));
    }
    thread::sleep(Duration::from_millis(100));
    pipeline.stop();

    let deliveries: Vec<Instant> = rx.try_iter().collect();
    assert!(!deliveries.is_empty());
    for pair in deliveries.windows(2) {
        // Small slack for timer granularity.
        assert!(pair[1] - pair[0] >= Duration::from_millis(30));
    }
}

#[test]
fn stop_discards_held_frame() {
    // A long interval keeps the second frame held by the throttle at stop time.
    let config = AnalysisConfig {
        publish_rate_hz: 2.0,
        ..AnalysisConfig::default()
    };
    let (tx, rx) = crossbeam_channel::unbounded::<PitchFrame>();
    let pipeline = AnalysisPipeline::spawn(config, tx).unwrap();
    let sender = pipeline.sender();

    sender.push(sine_chunk(330.0, 0));
    let first = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("first frame is published immediately");
    assert_eq!(first.timestamp, Duration::ZERO);

    sender.push(sine_chunk(330.0, 1));
    thread::sleep(Duration::from_millis(100));

    let stopping = Instant::now();
    pipeline.stop();
    assert!(stopping.elapsed() < Duration::from_millis(350));

    // Well past the 500 ms deadline of the held frame.
    thread::sleep(Duration::from_millis(600));
    assert_eq!(rx.try_iter().count(), 0);
    assert!(rx.recv_timeout(Duration::from_millis(10)).is_err());
}

#[test]
fn throttle_never_publishes_faster_than_interval() {
    let interval = Duration::from_secs_f64(1.0 / 30.0);
    let mut throttle = PublishThrottle::new(interval);
    let mut published = Vec::new();

    // A frame every 5 ms for one second, polling on every step.
    for step in 0..200u64 {
        let now = Duration::from_millis(step * 5);
        let frame = PitchFrame::silent(now);
        if let Some(frame) = throttle.offer(frame, now) {
            published.push((now, frame.timestamp));
        }
    }

    assert!(published.len() >= 25 && published.len() <= 31);
    for pair in published.windows(2) {
        assert!(pair[1].0 - pair[0].0 >= interval);
    }
    // Each publication carries the newest frame available at that moment.
    for (at, timestamp) in &published {
        assert_eq!(at, timestamp);
    }
}
