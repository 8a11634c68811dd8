//! # Musical Tuning Module
//!
//! Equal-tempered note lookups and cent offsets for coaching against a
//! target pitch. The target reference itself belongs to the caller; this
//! module only does the arithmetic.
//!
//! ## Features
//! - Note table from C1 to C8 (A4 = 440 Hz)
//! - Nearest-note lookup with cent deviation
//! - Note name to frequency conversion
//! - Cent offset between a sung frequency and a target

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// MIDI number of the lowest note in the table (C1).
const FIRST_MIDI_NOTE: i32 = 24;
/// MIDI number of the highest note in the table (C8).
const LAST_MIDI_NOTE: i32 = 108;
const A4_MIDI_NOTE: i32 = 69;
const A4_FREQUENCY: f32 = 440.0;

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Note name with octave (e.g., "A4", "C#3")
    pub name: String,
    /// MIDI note number
    pub midi: i32,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Statically computed equal-tempered notes from C1 to C8.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    (FIRST_MIDI_NOTE..=LAST_MIDI_NOTE)
        .map(|midi| {
            let frequency = A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI_NOTE) as f32 / 12.0);
            // MIDI octaves change at C; MIDI 60 is C4.
            let octave = midi / 12 - 1;
            let name = format!("{}{}", NOTE_NAMES[(midi % 12) as usize], octave);
            Note { name, midi, frequency }
        })
        .collect()
});

/// Static map for quick note name to table index lookups.
static NOTE_MAP: Lazy<BTreeMap<String, usize>> = Lazy::new(|| {
    NOTES
        .iter()
        .enumerate()
        .map(|(i, note)| (note.name.clone(), i))
        .collect()
});

/// Calculates the deviation of `freq` from `target_freq` in cents.
///
/// This is `12·log2(f/target)·100`:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values are sharp, negative values are flat
pub fn cents_offset(freq: f32, target_freq: f32) -> f32 {
    12.0 * (freq / target_freq).log2() * 100.0
}

/// Finds the closest note to a frequency.
///
/// # Returns
/// * `Some((note, cents))` - The nearest note and the deviation from it
/// * `None` - The frequency is not positive and finite
pub fn nearest_note(freq: f32) -> Option<(&'static Note, f32)> {
    if !(freq.is_finite() && freq > 0.0) {
        return None;
    }
    // Work in semitones so the nearest note is the nearest in pitch, not in Hz.
    let midi = (A4_MIDI_NOTE as f32 + 12.0 * (freq / A4_FREQUENCY).log2()).round() as i32;
    let index = (midi.clamp(FIRST_MIDI_NOTE, LAST_MIDI_NOTE) - FIRST_MIDI_NOTE) as usize;
    let note = &NOTES[index];
    Some((note, cents_offset(freq, note.frequency)))
}

/// Looks up a note's frequency by name (e.g. "A4", "C#3").
pub fn note_frequency(name: &str) -> Option<f32> {
    NOTE_MAP.get(name).map(|&i| NOTES[i].frequency)
}
