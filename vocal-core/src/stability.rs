//! Rolling window of accepted pitch estimates.

use crate::dsp;

/// Fixed-capacity ring buffer of the most recent accepted frequencies (Hz).
///
/// Storage is allocated once; pushing onto a full window overwrites the
/// oldest entry. Frequencies are stored raw and only converted to cents when
/// the stability score is read.
#[derive(Debug, Clone)]
pub struct StabilityWindow {
    slots: Box<[f32]>,
    /// Index of the oldest entry.
    head: usize,
    len: usize,
}

impl StabilityWindow {
    /// Creates an empty window. A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0.0; capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a frequency, evicting the oldest one when full.
    pub fn push(&mut self, frequency: f32) {
        let capacity = self.capacity();
        if self.len < capacity {
            self.slots[(self.head + self.len) % capacity] = frequency;
            self.len += 1;
        } else {
            self.slots[self.head] = frequency;
            self.head = (self.head + 1) % capacity;
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Iterates from the oldest to the newest entry.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let capacity = self.capacity();
        (0..self.len).map(move |i| self.slots[(self.head + i) % capacity])
    }

    /// Stability score of the window contents, see [`dsp::pitch_stability`].
    pub fn stability(&self) -> f32 {
        dsp::stability_score(self.iter())
    }
}
