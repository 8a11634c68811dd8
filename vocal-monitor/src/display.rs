//! One-line text rendering of published frames.

use vocal_core::{PitchFrame, tuning};

/// What the cents deviation is measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reference {
    /// The closest equal-tempered note.
    NearestNote,
    /// A fixed target frequency in Hz.
    Fixed(f32),
}

pub fn render_frame(frame: &PitchFrame, reference: Reference) -> String {
    let secs = frame.timestamp.as_secs_f64();
    let loudness = format!("{:6.1} dBFS {}", frame.loudness_dbfs, meter(frame.loudness_dbfs));
    let stability = match frame.stability {
        Some(score) => format!("stab {:5.1}", score),
        None => "stab   --".to_string(),
    };

    let pitch = match frame.frequency {
        None => "     --- Hz              ".to_string(),
        Some(freq) => {
            let (label, cents) = match reference {
                Reference::NearestNote => match tuning::nearest_note(freq) {
                    Some((note, cents)) => (note.name.to_string(), cents),
                    None => ("?".to_string(), 0.0),
                },
                Reference::Fixed(target) => ("tgt".to_string(), tuning::cents_offset(freq, target)),
            };
            format!("{:7.2} Hz {:>4} {:+6.1}c", freq, label, cents)
        }
    };

    format!(
        "{:8.2}s  {}  conf {:.2}  {}  {}",
        secs, pitch, frame.confidence, stability, loudness
    )
}

/// Twenty-cell bar over the [-60, 0] dBFS range.
fn meter(dbfs: f32) -> String {
    let cells = (((dbfs + 60.0) / 60.0).clamp(0.0, 1.0) * 20.0).round() as usize;
    format!("[{}{}]", "#".repeat(cells), " ".repeat(20 - cells))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_meter_bounds() {
        assert_eq!(meter(-60.0), format!("[{}]", " ".repeat(20)));
        assert_eq!(meter(0.0), format!("[{}]", "#".repeat(20)));
        assert_eq!(meter(-30.0).matches('#').count(), 10);
    }

    #[test]
    fn test_render_silent_frame() {
        let line = render_frame(&PitchFrame::silent(Duration::from_secs(1)), Reference::NearestNote);
        assert!(line.contains("--- Hz"));
        assert!(line.contains("-60.0 dBFS"));
    }

    #[test]
    fn test_render_against_target() {
        let frame = PitchFrame {
            frequency: Some(440.0),
            confidence: 0.95,
            ..PitchFrame::silent(Duration::ZERO)
        };
        let line = render_frame(&frame, Reference::Fixed(440.0));
        assert!(line.contains("tgt"));
        assert!(line.contains("+0.0c"));
    }
}
