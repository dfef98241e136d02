//! Equal-tempered note names (A4 = 440 Hz).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
const A4_HZ: f64 = 440.0;
const A4_MIDI: i32 = 69;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteParseError {
    #[error("Empty note name")]
    Empty,
    #[error("Unknown note letter in {0:?}")]
    UnknownLetter(String),
    #[error("Missing or invalid octave in {0:?}")]
    InvalidOctave(String),
}

/// A note on the equal-tempered scale, stored as its MIDI number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Note {
    midi: i32,
}

impl Note {
    pub fn from_midi(midi: i32) -> Self {
        Self { midi }
    }

    /// Nearest note to `hz`; `None` for non-positive or non-finite input.
    pub fn from_frequency(hz: f32) -> Option<Self> {
        if !(hz.is_finite() && hz > 0.0) {
            return None;
        }
        let semitones = 12.0 * (hz as f64 / A4_HZ).log2();
        Some(Self {
            midi: A4_MIDI + semitones.round() as i32,
        })
    }

    pub fn midi(&self) -> i32 {
        self.midi
    }

    pub fn frequency(&self) -> f32 {
        (A4_HZ * 2f64.powf((self.midi - A4_MIDI) as f64 / 12.0)) as f32
    }

    pub fn octave(&self) -> i32 {
        self.midi.div_euclid(12) - 1
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = NOTE_NAMES[self.midi.rem_euclid(12) as usize];
        write!(f, "{}{}", name, self.octave())
    }
}

impl FromStr for Note {
    type Err = NoteParseError;

    /// Parses names like `A4`, `C#3`, `Bb2` or `C-1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars.next().ok_or(NoteParseError::Empty)?;
        let base = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(NoteParseError::UnknownLetter(s.to_string())),
        };

        let rest = chars.as_str();
        let (shift, octave) = if let Some(o) = rest.strip_prefix('#') {
            (1, o)
        } else if let Some(o) = rest.strip_prefix('b') {
            (-1, o)
        } else {
            (0, rest)
        };

        let octave: i32 = octave
            .parse()
            .map_err(|_| NoteParseError::InvalidOctave(s.to_string()))?;

        Ok(Self {
            midi: (octave + 1) * 12 + base + shift,
        })
    }
}

/// Nearest note name for `hz`, e.g. `"A3"` for 220 Hz.
pub fn hz_to_note(hz: f32) -> Option<String> {
    Note::from_frequency(hz).map(|n| n.to_string())
}

/// Frequency of a note name, e.g. 440.0 for `"A4"`.
pub fn note_to_frequency(name: &str) -> Option<f32> {
    name.parse::<Note>().ok().map(|n| n.frequency())
}

/// Signed distance in semitones from `lowest` to `highest`.
pub fn note_range_semitones(lowest: &str, highest: &str) -> Option<i32> {
    let lowest: Note = lowest.parse().ok()?;
    let highest: Note = highest.parse().ok()?;
    Some(highest.midi() - lowest.midi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_pitches() {
        assert_eq!(hz_to_note(440.0).as_deref(), Some("A4"));
        assert_eq!(hz_to_note(220.0).as_deref(), Some("A3"));
        assert_eq!(hz_to_note(261.63).as_deref(), Some("C4"));
        assert_eq!(hz_to_note(277.18).as_deref(), Some("C#4"));
        assert_eq!(hz_to_note(130.81).as_deref(), Some("C3"));
    }

    #[test]
    fn test_rounds_to_nearest() {
        // 450 Hz is 39 cents above A4
        assert_eq!(hz_to_note(450.0).as_deref(), Some("A4"));
        // 460 Hz is 77 cents above A4
        assert_eq!(hz_to_note(460.0).as_deref(), Some("A#4"));
    }

    #[test]
    fn test_invalid_frequency() {
        assert_eq!(hz_to_note(0.0), None);
        assert_eq!(hz_to_note(-10.0), None);
        assert_eq!(hz_to_note(f32::NAN), None);
    }

    #[test]
    fn test_parse() {
        assert!((note_to_frequency("A4").unwrap() - 440.0).abs() < 1e-3);
        assert!((note_to_frequency("C3").unwrap() - 130.81).abs() < 0.01);
        assert_eq!("Bb3".parse::<Note>(), "A#3".parse::<Note>());
        assert_eq!("C-1".parse::<Note>().unwrap().midi(), 0);
        assert_eq!("a4".parse::<Note>().unwrap().midi(), 69);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Note>(), Err(NoteParseError::Empty));
        assert!(matches!("H4".parse::<Note>(), Err(NoteParseError::UnknownLetter(_))));
        assert!(matches!("C".parse::<Note>(), Err(NoteParseError::InvalidOctave(_))));
        assert!(matches!("C#x".parse::<Note>(), Err(NoteParseError::InvalidOctave(_))));
        assert_eq!(note_to_frequency("X4"), None);
    }

    #[test]
    fn test_note_range() {
        assert_eq!(note_range_semitones("C3", "A4"), Some(21));
        assert_eq!(note_range_semitones("A4", "A3"), Some(-12));
        assert_eq!(note_range_semitones("C3", "nope"), None);
    }

    proptest! {
        #[test]
        fn prop_note_round_trip(midi in 24i32..=96) {
            let note = Note::from_midi(midi);
            let parsed: Note = note.to_string().parse().unwrap();
            prop_assert_eq!(parsed, note);
            prop_assert_eq!(Note::from_frequency(note.frequency()), Some(note));
        }

        #[test]
        fn prop_nearest_note_within_half_semitone(hz in 70.0f32..1100.0) {
            let note = Note::from_frequency(hz).unwrap();
            let cents = 1200.0 * (hz / note.frequency()).log2();
            prop_assert!(cents.abs() <= 50.0 + 1e-3);
        }
    }
}
