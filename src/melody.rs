//! Melody data: the note table and the tune the drum is pinned with.

/// One pinned note: what to sound and for how long at 1.0 tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    /// Fundamental frequency (Hz)
    pub frequency_hz: f32,

    /// Duration before tempo adjustment (seconds)
    pub base_duration_s: f32,
}

/// Note frequencies (Hz), raised ~20% over concert pitch for the sharper,
/// glassier register a small music box comb sits in.
const NOTE_TABLE: &[(&str, f32)] = &[
    ("G", 470.40),
    ("A", 528.00),
    ("B", 592.66),
    ("C", 627.90),
    ("D", 704.80),
    ("E", 791.10),
    ("F", 838.15),
    ("G5", 940.79),
];

/// Happy Birthday, phrased for a 25-pin drum.
const HAPPY_BIRTHDAY_SCORE: &[(&str, f32)] = &[
    ("G", 0.8),
    ("G", 0.4),
    ("A", 1.2),
    ("G", 1.2),
    ("C", 1.2),
    ("B", 2.4),
    //
    ("G", 0.8),
    ("G", 0.4),
    ("A", 1.2),
    ("G", 1.2),
    ("D", 1.2),
    ("C", 2.4),
    //
    ("G", 0.8),
    ("G", 0.4),
    ("G5", 1.2),
    ("E", 1.2),
    ("C", 1.2),
    ("B", 1.2),
    ("A", 2.4),
    //
    ("F", 0.8),
    ("F", 0.4),
    ("E", 1.2),
    ("C", 1.2),
    ("D", 1.2),
    ("C", 2.4),
];

/// An immutable, ordered note sequence. Playback cycles through it
/// circularly, so a melody never terminates on its own.
#[derive(Debug, Clone)]
pub struct Melody {
    notes: Vec<NoteEvent>,
}

impl Melody {
    /// Build a melody from `(note name, duration)` pairs against the fixed
    /// note table. The score is data: swapping it changes the tune without
    /// touching the engine.
    pub fn from_score(score: &[(&str, f32)]) -> Result<Self, String> {
        if score.is_empty() {
            return Err("melody score is empty".to_string());
        }
        let notes = score
            .iter()
            .map(|&(name, duration)| {
                let frequency = lookup_frequency(name)
                    .ok_or_else(|| format!("unknown note name '{}'", name))?;
                if duration <= 0.0 {
                    return Err(format!("note '{}' has non-positive duration {}", name, duration));
                }
                Ok(NoteEvent {
                    frequency_hz: frequency,
                    base_duration_s: duration,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self { notes })
    }

    /// The built-in tune.
    pub fn happy_birthday() -> Self {
        Self::from_score(HAPPY_BIRTHDAY_SCORE).expect("built-in score uses known note names")
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Note at cursor position `index` (callers keep the index in range by
    /// advancing modulo `len`).
    pub fn note(&self, index: usize) -> &NoteEvent {
        &self.notes[index]
    }
}

fn lookup_frequency(name: &str) -> Option<f32> {
    NOTE_TABLE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, freq)| freq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_birthday_has_25_pins() {
        let melody = Melody::happy_birthday();
        assert_eq!(melody.len(), 25);
    }

    #[test]
    fn test_all_notes_are_playable() {
        let melody = Melody::happy_birthday();
        for i in 0..melody.len() {
            let note = melody.note(i);
            assert!(note.frequency_hz > 0.0);
            assert!(note.base_duration_s > 0.0);
        }
    }

    #[test]
    fn test_opening_phrase() {
        let melody = Melody::happy_birthday();
        assert_eq!(melody.note(0).frequency_hz, 470.40);
        assert_eq!(melody.note(0).base_duration_s, 0.8);
        assert_eq!(melody.note(2).frequency_hz, 528.00);
    }

    #[test]
    fn test_unknown_note_name_rejected() {
        let result = Melody::from_score(&[("Q", 1.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_score_rejected() {
        assert!(Melody::from_score(&[]).is_err());
    }

    #[test]
    fn test_non_positive_duration_rejected() {
        assert!(Melody::from_score(&[("G", 0.0)]).is_err());
    }
}
