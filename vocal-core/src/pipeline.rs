//! # Analysis Pipeline Module
//!
//! Moves capture buffers to a dedicated analysis thread and hands throttled
//! [`PitchFrame`]s to the consumer.
//!
//! ## Architecture
//! - **Capture context**: pushes [`AudioBuffer`]s through a [`BufferSender`].
//!   Pushing never blocks; a full queue loses its oldest buffer.
//! - **Analysis worker**: one thread, buffers processed strictly in order.
//!   It owns the [`Analyzer`] (and with it the stability window) and the
//!   [`PublishThrottle`], so neither needs a lock.
//! - **Consumer**: any [`FrameConsumer`], called from the worker at most once
//!   per publish interval.
//!
//! Stopping discards queued buffers, the stability history and any held
//! frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, warn};

use crate::PitchFrame;
use crate::analysis::{AnalysisConfig, Analyzer, AudioBuffer, PublishThrottle};
use crate::error;

/// Receives published frames on the analysis thread.
pub trait FrameConsumer {
    /// Handles one frame. Returns `false` once the consumer can no longer
    /// accept frames.
    fn on_pitch_frame(&mut self, frame: PitchFrame) -> bool;
}

impl<F> FrameConsumer for F
where
    F: FnMut(PitchFrame),
{
    fn on_pitch_frame(&mut self, frame: PitchFrame) -> bool {
        self(frame);
        true
    }
}

/// Forwards frames to another thread; frames sent after the receiver is
/// dropped are discarded.
impl FrameConsumer for Sender<PitchFrame> {
    fn on_pitch_frame(&mut self, frame: PitchFrame) -> bool {
        self.send(frame).is_ok()
    }
}

/// What happened to a pushed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued without loss.
    Queued,
    /// Queued after discarding the oldest queued buffer.
    ReplacedOldest,
    /// The queue stayed full even after evicting; the new buffer was dropped.
    Dropped,
    /// The analysis worker is gone.
    Closed,
}

/// Non-blocking, drop-oldest sending half of the capture queue.
#[derive(Debug, Clone)]
pub struct BufferSender {
    tx: Sender<AudioBuffer>,
    /// Receiving end used only to evict the oldest buffer when full.
    evict: Receiver<AudioBuffer>,
    dropped: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

/// Creates a capture queue holding at most `capacity` buffers.
pub fn buffer_queue(capacity: usize) -> (BufferSender, Receiver<AudioBuffer>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let sender = BufferSender {
        tx,
        evict: rx.clone(),
        dropped: Arc::new(AtomicUsize::new(0)),
        closed: Arc::new(AtomicBool::new(false)),
    };
    (sender, rx)
}

impl BufferSender {
    /// Queues a buffer without ever waiting on the consumer side.
    ///
    /// Safe to call from an audio callback: the work is bounded by the queue
    /// capacity and no lock is held across it.
    pub fn push(&self, buffer: AudioBuffer) -> PushOutcome {
        if self.closed.load(Ordering::Acquire) {
            return PushOutcome::Closed;
        }
        let mut buffer = buffer;
        let mut evicted = false;
        // The worker may take buffers concurrently, so an eviction does not
        // guarantee room; bound the retries by the queue size.
        let attempts = self.tx.capacity().unwrap_or(1) + 1;
        for _ in 0..attempts {
            match self.tx.try_send(buffer) {
                Ok(()) => {
                    return if evicted {
                        PushOutcome::ReplacedOldest
                    } else {
                        PushOutcome::Queued
                    };
                }
                Err(TrySendError::Full(rejected)) => {
                    buffer = rejected;
                    if self.evict.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        evicted = true;
                    }
                }
                Err(TrySendError::Disconnected(_)) => return PushOutcome::Closed,
            }
        }
        self.dropped.fetch_add(1, Ordering::Relaxed);
        PushOutcome::Dropped
    }

    /// Total buffers lost to back-pressure so far.
    pub fn dropped_buffers(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A running analysis worker.
#[derive(Debug)]
pub struct AnalysisPipeline {
    sender: BufferSender,
    shutdown_tx: Sender<()>,
    stopping: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl AnalysisPipeline {
    /// Validates the configuration and starts the analysis thread.
    ///
    /// # Arguments
    /// * `config` - Analysis, throttle and queue settings
    /// * `consumer` - Receives frames at most `publish_rate_hz` times per second
    ///
    /// # Returns
    /// * `Ok(pipeline)` - Running pipeline; feed it through [`Self::sender`]
    /// * `Err(e)` - The configuration is invalid; no thread was started
    pub fn spawn<C>(config: AnalysisConfig, consumer: C) -> error::Result<Self>
    where
        C: FrameConsumer + Send + 'static,
    {
        let analyzer = Analyzer::new(&config)?;
        let throttle = PublishThrottle::new(config.publish_interval());
        let (mut sender, buffers) = buffer_queue(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let stopping = Arc::new(AtomicBool::new(false));
        // Senders see the pipeline as closed as soon as stopping begins.
        sender.closed = Arc::clone(&stopping);

        let worker = Worker {
            analyzer,
            throttle,
            consumer,
            buffers,
            shutdown: shutdown_rx,
            stopping: Arc::clone(&stopping),
            epoch: Instant::now(),
            consumer_gone: false,
        };
        let handle = thread::spawn(move || worker.run());
        debug!(target: "vocal_core::pipeline", "analysis worker started");

        Ok(Self {
            sender,
            shutdown_tx,
            stopping,
            worker: Some(handle),
        })
    }

    /// Handle for the capture context.
    pub fn sender(&self) -> BufferSender {
        self.sender.clone()
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// Queued buffers and any frame held back by the throttle are discarded.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.stopping.store(true, Ordering::Release);
        let _ = self.shutdown_tx.try_send(());
        if handle.join().is_err() {
            warn!(target: "vocal_core::pipeline", "analysis worker panicked");
        }
        debug!(
            target: "vocal_core::pipeline",
            "analysis worker stopped, {} buffers dropped",
            self.sender.dropped_buffers()
        );
    }
}

impl Drop for AnalysisPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker<C> {
    analyzer: Analyzer,
    throttle: PublishThrottle,
    consumer: C,
    buffers: Receiver<AudioBuffer>,
    shutdown: Receiver<()>,
    stopping: Arc<AtomicBool>,
    epoch: Instant,
    consumer_gone: bool,
}

enum WorkerEvent {
    Buffer(AudioBuffer),
    Tick,
    Stop,
}

impl<C: FrameConsumer> Worker<C> {
    fn run(mut self) {
        loop {
            // Wake up when a held frame becomes due.
            let tick = match self.throttle.deadline() {
                Some(deadline) => {
                    crossbeam_channel::after(deadline.saturating_sub(self.epoch.elapsed()))
                }
                None => crossbeam_channel::never(),
            };

            let event = crossbeam_channel::select! {
                recv(self.shutdown) -> _ => WorkerEvent::Stop,
                recv(self.buffers) -> msg => match msg {
                    Ok(buffer) => WorkerEvent::Buffer(buffer),
                    Err(_) => {
                        debug!(target: "vocal_core::pipeline", "capture queue closed");
                        WorkerEvent::Stop
                    }
                },
                recv(tick) -> _ => WorkerEvent::Tick,
            };

            if self.stopping.load(Ordering::Acquire) {
                break;
            }
            match event {
                WorkerEvent::Buffer(buffer) => self.analyze(buffer),
                WorkerEvent::Tick => {
                    let now = self.epoch.elapsed();
                    if let Some(frame) = self.throttle.poll(now) {
                        self.deliver(frame);
                    }
                }
                WorkerEvent::Stop => break,
            }
        }

        let discarded = self.buffers.try_iter().count();
        self.analyzer.reset();
        self.throttle.clear();
        debug!(
            target: "vocal_core::pipeline",
            "analysis worker exiting, discarded {} queued buffers",
            discarded
        );
    }

    fn analyze(&mut self, buffer: AudioBuffer) {
        match self.analyzer.process(&buffer) {
            Ok(frame) => {
                let now = self.epoch.elapsed();
                if let Some(frame) = self.throttle.offer(frame, now) {
                    self.deliver(frame);
                }
            }
            Err(e) => warn!(target: "vocal_core::pipeline", "skipping buffer: {}", e),
        }
    }

    fn deliver(&mut self, frame: PitchFrame) {
        if self.stopping.load(Ordering::Acquire) {
            return;
        }
        if !self.consumer.on_pitch_frame(frame) && !self.consumer_gone {
            self.consumer_gone = true;
            debug!(target: "vocal_core::pipeline", "frame consumer disconnected, discarding frames");
        }
    }
}
